use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::{
    config::NaturalPolicy,
    error::{OutcomeError, RandomSourceError, RollError},
    rules::{
        dice::{DiceTerm, Expression, Sign, Term},
        modifiers::{ModifierPipeline, RawRoll, TermResult},
    },
    statistics::roller::RandomSource,
};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub fn elapsed_ms(since: Timestamp) -> f64 {
    let elapsed = chrono::Utc::now() - since;
    elapsed
        .num_microseconds()
        .map(|us| us as f64 / 1000.0)
        .unwrap_or_else(|| elapsed.num_milliseconds() as f64)
}

/// Everything a caller learns from one roll. An outcome carrying an error has
/// a zero total, no breakdown and no term results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub expression: String,
    /// The normalized, possibly rewritten, string that was evaluated.
    pub evaluated: String,
    pub total: i64,
    pub breakdown: Vec<String>,
    pub natural1: bool,
    pub natural20: bool,
    pub terms: Vec<TermResult>,
    pub rerolls: u32,
    pub error: Option<OutcomeError>,
    pub timestamp_ms: i64,
    pub duration_ms: f64,
}

impl RollOutcome {
    pub fn empty(expression: &str, evaluated: &str) -> Self {
        Self {
            expression: expression.to_string(),
            evaluated: evaluated.to_string(),
            total: 0,
            breakdown: Vec::new(),
            natural1: false,
            natural20: false,
            terms: Vec::new(),
            rerolls: 0,
            error: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            duration_ms: 0.0,
        }
    }

    pub fn failure(expression: &str, evaluated: &str, error: &RollError) -> Self {
        Self {
            error: Some(OutcomeError::from(error)),
            ..Self::empty(expression, evaluated)
        }
    }

    pub fn from_evaluation(expression: &str, evaluated: &str, evaluation: Evaluation) -> Self {
        Self {
            total: evaluation.total,
            breakdown: evaluation.breakdown,
            natural1: evaluation.natural1,
            natural20: evaluation.natural20,
            terms: evaluation.terms,
            ..Self::empty(expression, evaluated)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn pretty_print(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(f, "Rolled {}", self.expression)?;
        if self.evaluated != self.expression {
            write!(f, " ({})", self.evaluated)?;
        }
        if let Some(error) = &self.error {
            return write!(f, ": error: {}", error.message);
        }
        write!(f, ": [{}] = {}", self.breakdown.join(", "), self.total)?;
        if self.natural20 {
            write!(f, " (Natural 20)")?;
        }
        if self.natural1 {
            write!(f, " (Natural 1)")?;
        }
        if self.rerolls > 0 {
            write!(f, " after {} reroll(s)", self.rerolls)?;
        }
        Ok(())
    }
}

impl fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pretty_print(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub total: i64,
    pub breakdown: Vec<String>,
    pub natural1: bool,
    pub natural20: bool,
    pub terms: Vec<TermResult>,
}

impl Evaluation {
    /// Natural faces of every die rolled, kept or dropped, before explosions.
    pub fn natural_faces(&self) -> impl Iterator<Item = u32> + '_ {
        self.terms
            .iter()
            .flat_map(|term| term.raw.iter().map(|die| die.value))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    pub pipeline: ModifierPipeline,
    pub natural_policy: NaturalPolicy,
}

impl Evaluator {
    pub fn new(pipeline: ModifierPipeline, natural_policy: NaturalPolicy) -> Self {
        Self {
            pipeline,
            natural_policy,
        }
    }

    pub fn evaluate<R: RandomSource + ?Sized>(
        &self,
        expression: &Expression,
        rng: &mut R,
    ) -> Result<Evaluation, RandomSourceError> {
        let mut evaluation = Evaluation {
            total: 0,
            breakdown: Vec::with_capacity(expression.terms().len()),
            natural1: false,
            natural20: false,
            terms: Vec::new(),
        };

        for (i, term) in expression.terms().iter().enumerate() {
            let prefix = match (i, term.sign()) {
                (0, Sign::Plus) => String::new(),
                (_, sign) => sign.symbol().to_string(),
            };
            match term {
                Term::Dice(dice) => {
                    let result = self.pipeline.apply(dice, rng)?;
                    evaluation.total += dice.sign.apply(result.total);
                    if dice.sides == 20 {
                        self.detect_naturals(&result, &mut evaluation);
                    }
                    evaluation
                        .breakdown
                        .push(describe_dice(&prefix, dice, &result));
                    evaluation.terms.push(result);
                }
                Term::Flat(flat) => {
                    evaluation.total += flat.signed_value();
                    evaluation.breakdown.push(format!("{}{}", prefix, flat.value));
                }
            }
        }

        Ok(evaluation)
    }

    fn detect_naturals(&self, result: &TermResult, evaluation: &mut Evaluation) {
        let dice = match self.natural_policy {
            NaturalPolicy::KeptDice => &result.kept,
            NaturalPolicy::AnyRolled => &result.raw,
        };
        for die in dice {
            match die.value {
                20 => evaluation.natural20 = true,
                1 => evaluation.natural1 = true,
                _ => {}
            }
        }
    }
}

/// e.g. `4d6dl1: 11 (dropped 2)` or `-1d6!: 9 (exploded 6+3)`.
fn describe_dice(prefix: &str, dice: &DiceTerm, result: &TermResult) -> String {
    let mut line = format!("{}{}: {}", prefix, dice, result.total);
    let exploded: Vec<&RawRoll> = result.raw.iter().filter(|d| d.exploded()).collect();
    if !exploded.is_empty() {
        let chains: Vec<String> = exploded
            .iter()
            .map(|die| {
                std::iter::once(die.value)
                    .chain(die.exploded_chain.iter().copied())
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect();
        let _ = write!(line, " (exploded {})", chains.join(", "));
    }
    if !result.dropped.is_empty() {
        let dropped: Vec<String> = result
            .dropped
            .iter()
            .map(|die| die.total().to_string())
            .collect();
        let _ = write!(line, " (dropped {})", dropped.join(", "));
    }
    line
}
