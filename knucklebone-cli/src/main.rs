use std::path::PathBuf;

use clap::Parser;
use knucklebone::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dice expressions to roll, e.g. "4d6dl1" or "1d20+5"
    expressions: Vec<String>,

    /// Random seed for reproducibility
    #[arg(long, default_value = None)]
    seed: Option<u64>,

    /// Roll the first d20 of each expression with advantage
    #[arg(long, group = "variant")]
    advantage: bool,

    /// Roll the first d20 of each expression with disadvantage
    #[arg(long, group = "variant")]
    disadvantage: bool,

    /// Multiply the dice (not the flat bonuses) of each expression
    #[arg(long, value_name = "MULTIPLIER", group = "variant")]
    critical: Option<u32>,

    /// Reroll the whole expression while any die shows this face
    #[arg(long, value_name = "FACE", group = "variant")]
    reroll_on: Option<u32>,

    /// Generate six ability scores: 4d6dl1, 3d6, 2d6+6, pointbuy or standard
    #[arg(long, value_name = "METHOD")]
    abilities: Option<String>,

    /// Run the built-in self-test battery
    #[arg(long, default_value_t = false)]
    self_test: bool,

    /// Engine configuration JSON file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the statistics snapshot to this JSON file
    #[arg(long, value_name = "FILE")]
    stats: Option<PathBuf>,

    /// Print outcomes as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn roll(&self, engine: &mut DiceEngine, expression: &str) -> RollOutcome {
        if let Some(face) = self.reroll_on {
            engine.roll_with_reroll(expression, face)
        } else if let Some(multiplier) = self.critical {
            engine.roll_critical(expression, multiplier)
        } else if self.advantage {
            engine.roll_with_advantage(expression)
        } else if self.disadvantage {
            engine.roll_with_disadvantage(expression)
        } else {
            engine.roll(expression)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::builder()
        .format_timestamp_secs()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
    log::debug!("Starting with args: {:?}", args);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading engine config from {}", path.display());
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    let roller = match args.seed {
        Some(seed) => Roller::from_seed(seed),
        None => Roller::new(),
    };
    if roller.entropy() == Entropy::ClockFallback {
        log::info!("Rolling with a clock-seeded generator");
    } else {
        log::debug!("Random source: {:?}", roller.entropy());
    }
    let mut engine = DiceEngine::with_source(config, roller);
    let mut failed = false;

    if args.self_test {
        let results = engine.self_test();
        failed |= results.iter().any(|r| !r.passed);
        if args.json {
            print_json(&results)?;
        } else {
            for result in &results {
                let status = if result.passed { "ok" } else { "FAILED" };
                println!(
                    "{:<20} {:<8} {:<6} {}",
                    result.name, result.expression, status, result.detail
                );
            }
        }
    }

    if let Some(method) = &args.abilities {
        match engine.roll_ability_scores(method) {
            Ok(scores) if args.json => print_json(&scores)?,
            Ok(scores) => {
                let stats = &scores.statistics;
                println!(
                    "{}: {:?} (total {}, modifiers {:+}, range {}-{})",
                    scores.method.name(),
                    scores.scores,
                    stats.total,
                    stats.modifier_sum,
                    stats.min,
                    stats.max
                );
            }
            Err(e) => {
                log::error!("Could not generate ability scores: {}", e);
                failed = true;
            }
        }
    }

    let outcomes: Vec<RollOutcome> = args
        .expressions
        .iter()
        .map(|expression| args.roll(&mut engine, expression))
        .collect();
    failed |= outcomes.iter().any(RollOutcome::is_error);
    if args.json {
        if !outcomes.is_empty() {
            print_json(&outcomes)?;
        }
    } else {
        for outcome in &outcomes {
            println!("{}", outcome);
        }
    }

    if let Some(path) = &args.stats {
        let stats_file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(stats_file);
        serde_json::to_writer_pretty(writer, &engine.statistics())?;
        log::info!("Statistics written to {}", path.display());
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
