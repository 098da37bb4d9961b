use crate::{
    config::EngineConfig,
    error::{EvaluationError, Result, RollError},
    roll_parser,
    rules::{
        abilities::{ABILITY_COUNT, AbilityMethod, AbilityScores},
        dice::{DiceTerm, DropKeep},
        modifiers::ModifierPipeline,
    },
    simulation::{
        evaluator::{Evaluation, Evaluator, RollOutcome, Timestamp, elapsed_ms},
        self_test::{self, SelfTestResult},
    },
    statistics::{
        cache::ParseCache,
        recorder::{HistoryEntry, Recorder, StatisticsSnapshot},
        roller::{RandomSource, Roller},
    },
};

pub const DEFAULT_CRITICAL_MULTIPLIER: u32 = 2;

/// The cache, history and statistics belong to the instance, so independent
/// engines never observe each other. Every `roll*` method reports failure
/// through [`RollOutcome::error`] rather than returning an error.
#[derive(Debug)]
pub struct DiceEngine<R: RandomSource = Roller> {
    config: EngineConfig,
    evaluator: Evaluator,
    cache: ParseCache,
    recorder: Recorder,
    rng: R,
}

impl Default for DiceEngine<Roller> {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceEngine<Roller> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_source(config, Roller::new())
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::with_source(EngineConfig::default(), Roller::from_seed(seed))
    }
}

impl<R: RandomSource> DiceEngine<R> {
    pub fn with_source(config: EngineConfig, rng: R) -> Self {
        Self {
            evaluator: Evaluator::new(
                ModifierPipeline::new(config.explosion_cap),
                config.natural_policy,
            ),
            cache: ParseCache::new(config.cache_capacity),
            recorder: Recorder::new(config.history_capacity),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn roll(&mut self, expression: &str) -> RollOutcome {
        let normalized = roll_parser::normalize(expression);
        self.roll_normalized(expression, normalized)
    }

    pub fn roll_batch<S: AsRef<str>>(&mut self, expressions: &[S]) -> Vec<RollOutcome> {
        let start = chrono::Utc::now();
        let outcomes: Vec<RollOutcome> = expressions
            .iter()
            .map(|expression| self.roll(expression.as_ref()))
            .collect();

        let duration_ms = elapsed_ms(start);
        let over_budget = duration_ms > self.config.batch_budget_ms;
        if over_budget {
            log::warn!(
                "Batch of {} rolls took {:.2} ms, over the {:.2} ms budget",
                outcomes.len(),
                duration_ms,
                self.config.batch_budget_ms
            );
        }
        self.recorder.record_batch(duration_ms, over_budget);
        outcomes
    }

    pub fn roll_with_advantage(&mut self, expression: &str) -> RollOutcome {
        self.roll_d20_variant(expression, DropKeep::keep_highest(1))
    }

    pub fn roll_with_disadvantage(&mut self, expression: &str) -> RollOutcome {
        self.roll_d20_variant(expression, DropKeep::keep_lowest(1))
    }

    fn roll_d20_variant(&mut self, expression: &str, drop_keep: DropKeep) -> RollOutcome {
        match self.rewrite_d20(expression, drop_keep) {
            Ok(rewritten) => self.roll_normalized(expression, rewritten),
            Err(e) => self.reject(expression, e),
        }
    }

    fn rewrite_d20(&mut self, expression: &str, drop_keep: DropKeep) -> Result<String> {
        let parsed = self.cache.get_or_parse(expression)?;
        let rewritten = parsed
            .replace_first_single_d20(|d20| DiceTerm {
                count: 2,
                drop_keep: Some(drop_keep),
                ..d20
            })
            .ok_or_else(|| EvaluationError::NoD20Term(expression.to_string()))?;
        Ok(rewritten.to_string())
    }

    /// Multiplies the dice count of every dice term, leaving flat modifiers
    /// alone: `2d6+4` at ×2 rolls `4d6+4`.
    pub fn roll_critical(&mut self, expression: &str, multiplier: u32) -> RollOutcome {
        if multiplier == 0 {
            return self.reject(expression, EvaluationError::InvalidMultiplier(multiplier).into());
        }
        match self.cache.get_or_parse(expression) {
            Ok(parsed) => {
                let rewritten = parsed.map_dice(|dice| DiceTerm {
                    count: dice.count.saturating_mul(multiplier),
                    ..dice
                });
                // re-parsing the rewrite enforces the count bound
                self.roll_normalized(expression, rewritten.to_string())
            }
            Err(e) => self.reject(expression, e.into()),
        }
    }

    /// Re-evaluates the whole expression while any natural face equals
    /// `reroll_on`, at most `max_rerolls` times. Only the final evaluation is
    /// recorded.
    pub fn roll_with_reroll(&mut self, expression: &str, reroll_on: u32) -> RollOutcome {
        let normalized = roll_parser::normalize(expression);
        let start = chrono::Utc::now();
        let mut rerolls = 0;
        let result = loop {
            match self.try_evaluate(&normalized) {
                Ok(evaluation) if evaluation.natural_faces().any(|face| face == reroll_on) => {
                    if rerolls >= self.config.max_rerolls {
                        log::warn!(
                            "'{}' still shows {} after {} rerolls, keeping the last result",
                            expression,
                            reroll_on,
                            rerolls
                        );
                        break Ok(evaluation);
                    }
                    rerolls += 1;
                }
                other => break other,
            }
        };
        let mut outcome = self.complete(expression, normalized, start, result);
        outcome.rerolls = rerolls;
        outcome
    }

    pub fn roll_ability_scores(&mut self, method: &str) -> Result<AbilityScores> {
        let method: AbilityMethod = method.parse()?;
        if let Some(scores) = method.fixed_scores() {
            return Ok(AbilityScores::new(method, scores));
        }

        let expression = method.expression().unwrap_or_default();
        let mut scores = [0; ABILITY_COUNT];
        for score in &mut scores {
            let start = chrono::Utc::now();
            let result = self.try_evaluate(expression);
            let total = result.as_ref().map(|e| e.total).map_err(Clone::clone);
            self.complete(expression, expression.to_string(), start, result);
            *score = total?;
        }
        Ok(AbilityScores::new(method, scores))
    }

    /// Like [`DiceEngine::roll`] but leaves history and statistics untouched.
    pub fn evaluate(&mut self, expression: &str) -> RollOutcome {
        let normalized = roll_parser::normalize(expression);
        let start = chrono::Utc::now();
        let result = self.try_evaluate(&normalized);
        self.build(expression, normalized, start, result)
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.recorder.statistics()
    }

    pub fn history(&self, count: usize) -> Vec<HistoryEntry> {
        self.recorder.history(count)
    }

    pub fn clear_history(&mut self) {
        self.recorder.clear_history();
    }

    pub fn reset(&mut self) {
        self.recorder.reset();
        self.cache.clear();
    }

    pub fn self_test(&mut self) -> Vec<SelfTestResult> {
        self_test::run(self)
    }

    fn roll_normalized(&mut self, expression: &str, normalized: String) -> RollOutcome {
        let start = chrono::Utc::now();
        let result = self.try_evaluate(&normalized);
        self.complete(expression, normalized, start, result)
    }

    fn try_evaluate(&mut self, normalized: &str) -> Result<Evaluation> {
        let expression = self.cache.get_or_parse_normalized(normalized.to_string())?;
        Ok(self.evaluator.evaluate(&expression, &mut self.rng)?)
    }

    fn reject(&mut self, expression: &str, error: RollError) -> RollOutcome {
        let start = chrono::Utc::now();
        self.complete(expression, roll_parser::normalize(expression), start, Err(error))
    }

    fn complete(
        &mut self,
        expression: &str,
        normalized: String,
        start: Timestamp,
        result: Result<Evaluation>,
    ) -> RollOutcome {
        let outcome = self.build(expression, normalized, start, result);
        self.recorder.record(&outcome);
        outcome
    }

    fn build(
        &self,
        expression: &str,
        normalized: String,
        start: Timestamp,
        result: Result<Evaluation>,
    ) -> RollOutcome {
        let mut outcome = match result {
            Ok(evaluation) => RollOutcome::from_evaluation(expression, &normalized, evaluation),
            Err(e) => {
                match &e {
                    RollError::RandomSource(_) => {
                        log::error!("Rolling '{}' failed: {}", expression, e)
                    }
                    _ => log::debug!("Rejected '{}': {}", expression, e),
                }
                RollOutcome::failure(expression, &normalized, &e)
            }
        };
        outcome.timestamp_ms = start.timestamp_millis();
        outcome.duration_ms = elapsed_ms(start);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::NaturalPolicy,
        error::ErrorKind,
        statistics::roller::FixedSequence,
    };

    fn fixed(faces: &[u32]) -> DiceEngine<FixedSequence> {
        DiceEngine::with_source(
            EngineConfig::default(),
            FixedSequence::new(faces.iter().copied()),
        )
    }

    fn mean(totals: &[i64]) -> f64 {
        totals.iter().sum::<i64>() as f64 / totals.len() as f64
    }

    #[test]
    fn test_roll_simple() {
        let mut engine = fixed(&[3, 4, 5]);
        let outcome = engine.roll("3d6+2");
        assert_eq!(outcome.total, 14);
        assert_eq!(outcome.expression, "3d6+2");
        assert_eq!(outcome.evaluated, "3d6+2");
        assert!(outcome.error.is_none());
        assert_eq!(engine.history(10).len(), 1);
    }

    #[test]
    fn test_malformed_expression() {
        let mut engine = DiceEngine::from_seed(1);
        let outcome = engine.roll("3x6");
        let error = outcome.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidToken);
        assert_eq!(outcome.total, 0);
        assert!(outcome.breakdown.is_empty());
        assert!(outcome.terms.is_empty());
        assert_eq!(outcome.expression, "3x6");
        assert!(engine.history(10).is_empty());
        assert_eq!(engine.statistics().global.failed_rolls, 1);
    }

    #[test]
    fn test_random_source_failure_is_contained() {
        let mut engine = fixed(&[2]);
        let outcome = engine.roll("2d6");
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::RandomSource);
        assert_eq!(outcome.total, 0);
    }

    #[test]
    fn test_cache_shared_between_spellings() {
        let mut engine = DiceEngine::from_seed(3);
        engine.roll(" 3D6+2 ");
        engine.roll("3d6+2");
        assert_eq!(engine.cache().len(), 1);
        assert_eq!(engine.cache().hits(), 1);
        let stats = engine.statistics();
        assert_eq!(stats.expression("3d6+2").unwrap().count, 2);

        let mut cache = ParseCache::default();
        let a = cache.get_or_parse(" 3D6+2 ").unwrap();
        let b = cache.get_or_parse("3d6+2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_advantage_rewrite() {
        let mut engine = fixed(&[4, 17]);
        let outcome = engine.roll_with_advantage("1d20+5");
        assert_eq!(outcome.evaluated, "2d20kh1+5");
        assert_eq!(outcome.expression, "1d20+5");
        assert_eq!(outcome.total, 22);

        let mut engine = fixed(&[4, 17]);
        let outcome = engine.roll_with_disadvantage("d20");
        assert_eq!(outcome.evaluated, "2d20kl1");
        assert_eq!(outcome.total, 4);
    }

    #[test]
    fn test_advantage_keeps_explode() {
        let mut engine = fixed(&[4, 17]);
        let outcome = engine.roll_with_advantage("1d20!+5");
        assert!(outcome.error.is_none());
        assert_eq!(outcome.evaluated, "2d20kh1!+5");
        assert_eq!(outcome.total, 22);

        // the exploded 20 chains to 29 and loses to the 3
        let mut engine = fixed(&[20, 3, 9]);
        let outcome = engine.roll_with_disadvantage("d20!");
        assert_eq!(outcome.evaluated, "2d20kl1!");
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn test_advantage_requires_d20() {
        let mut engine = DiceEngine::from_seed(4);
        let outcome = engine.roll_with_advantage("2d6+3");
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::NoD20Term);
        assert_eq!(outcome.total, 0);

        let outcome = engine.roll_with_advantage("2d20kh1");
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::NoD20Term);

        let outcome = engine.roll_with_advantage("3x6");
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::InvalidToken);
    }

    #[test]
    fn test_advantage_statistics() {
        let mut engine = DiceEngine::from_seed(5);
        let mut advantage = Vec::new();
        let mut plain = Vec::new();
        for _ in 0..5000 {
            let outcome = engine.roll_with_advantage("1d20");
            assert!((1..=20).contains(&outcome.total));
            advantage.push(outcome.total);
            plain.push(engine.roll("1d20").total);
        }
        assert!(mean(&advantage) >= mean(&plain));
    }

    #[test]
    fn test_critical_doubles_dice_only() {
        let mut engine = DiceEngine::from_seed(6);
        for _ in 0..2000 {
            let outcome = engine.roll_critical("2d6+4", DEFAULT_CRITICAL_MULTIPLIER);
            assert_eq!(outcome.evaluated, "4d6+4");
            assert_eq!(outcome.expression, "2d6+4");
            assert!((8..=28).contains(&outcome.total));
        }
    }

    #[test]
    fn test_critical_errors() {
        let mut engine = DiceEngine::from_seed(7);
        let outcome = engine.roll_critical("1d6", 0);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::InvalidMultiplier);

        let outcome = engine.roll_critical("600d6", 2);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::OutOfRange);

        let outcome = engine.roll_critical("2d20kh1-1d4+3", 3);
        assert_eq!(outcome.evaluated, "6d20kh1-3d4+3");
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_exploding_statistics() {
        let mut engine = DiceEngine::from_seed(8);
        let mut exploded = false;
        for _ in 0..2000 {
            let total = engine.roll("1d6!").total;
            assert!((1..=6 * 101).contains(&total));
            exploded |= total > 6;
        }
        assert!(exploded);
    }

    #[test]
    fn test_four_d6_drop_lowest_distribution() {
        let mut engine = DiceEngine::from_seed(9);
        let totals: Vec<i64> = (0..10_000).map(|_| engine.roll("4d6dl1").total).collect();
        assert!(totals.iter().all(|t| (3..=18).contains(t)));
        assert!((mean(&totals) - 12.24).abs() < 0.5);
    }

    #[test]
    fn test_reroll_on_value() {
        // first evaluation shows a 1 and is discarded
        let mut engine = fixed(&[1, 5, 3, 4]);
        let outcome = engine.roll_with_reroll("2d6", 1);
        assert_eq!(outcome.total, 7);
        assert_eq!(outcome.rerolls, 1);
        assert_eq!(engine.statistics().global.total_rolls, 1);
    }

    #[test]
    fn test_reroll_is_bounded() {
        let config = EngineConfig::default().with_max_rerolls(5);
        let mut engine = DiceEngine::with_source(config, FixedSequence::cycling([1]));
        let outcome = engine.roll_with_reroll("1d1", 1);
        assert_eq!(outcome.rerolls, 5);
        assert_eq!(outcome.total, 1);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_ability_scores() {
        let mut engine = DiceEngine::from_seed(10);
        let scores = engine.roll_ability_scores("4d6dl1").unwrap();
        assert_eq!(scores.method, AbilityMethod::FourD6DropLowest);
        assert!(scores.scores.iter().all(|s| (3..=18).contains(s)));
        assert_eq!(engine.history(10).len(), ABILITY_COUNT);

        let scores = engine.roll_ability_scores("2d6+6").unwrap();
        assert!(scores.scores.iter().all(|s| (8..=18).contains(s)));

        let scores = engine.roll_ability_scores("pointbuy").unwrap();
        assert_eq!(scores.scores, [8; ABILITY_COUNT]);
        assert_eq!(scores.statistics.modifier_sum, -6);
        assert_eq!(engine.history(100).len(), 2 * ABILITY_COUNT);

        assert!(matches!(
            engine.roll_ability_scores("7d6"),
            Err(RollError::Evaluation(EvaluationError::UnknownAbilityMethod(_)))
        ));
    }

    #[test]
    fn test_ability_scores_source_failure() {
        let mut engine = fixed(&[1, 2, 3]);
        assert!(matches!(
            engine.roll_ability_scores("3d6"),
            Err(RollError::RandomSource(_))
        ));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut engine = DiceEngine::from_seed(11);
        let outcomes = engine.roll_batch(&["1d20", "3x6", "2d6+1"]);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].error.is_none());
        assert!(outcomes[1].error.is_some());
        assert!(outcomes[2].error.is_none());
        let stats = engine.statistics();
        assert_eq!(stats.global.total_rolls, 2);
        assert_eq!(stats.global.batches, 1);
        assert_eq!(stats.global.slow_batches, 0);
    }

    #[test]
    fn test_batch_over_budget() {
        let config = EngineConfig::default().with_batch_budget_ms(0.0);
        let mut engine = DiceEngine::with_source(config, Roller::from_seed(15));
        let expressions = vec!["10d6"; 200];
        engine.roll_batch(&expressions);
        let global = engine.statistics().global;
        assert_eq!(global.batches, 1);
        assert_eq!(global.slow_batches, 1);
        assert!(global.cumulative_batch_duration_ms > 0.0);
    }

    #[test]
    fn test_natural_policy_config() {
        let config = EngineConfig::default().with_natural_policy(NaturalPolicy::AnyRolled);
        let mut engine = DiceEngine::with_source(config, FixedSequence::new([20, 3]));
        let outcome = engine.roll_with_disadvantage("1d20");
        assert_eq!(outcome.total, 3);
        assert!(outcome.natural20);

        let mut engine = fixed(&[20, 3]);
        let outcome = engine.roll_with_disadvantage("1d20");
        assert!(!outcome.natural20);
    }

    #[test]
    fn test_evaluate_does_not_record() {
        let mut engine = DiceEngine::from_seed(12);
        let outcome = engine.evaluate("1d8");
        assert!((1..=8).contains(&outcome.total));
        assert!(engine.history(10).is_empty());
        assert_eq!(engine.statistics().global.total_rolls, 0);
    }

    #[test]
    fn test_clear_history_and_reset() {
        let mut engine = DiceEngine::from_seed(13);
        engine.roll("1d6");
        engine.roll("1d8");
        engine.clear_history();
        assert!(engine.history(10).is_empty());
        assert_eq!(engine.statistics().global.total_rolls, 2);

        engine.reset();
        assert_eq!(engine.statistics(), StatisticsSnapshot::default());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_engines_are_independent() {
        let mut a = DiceEngine::from_seed(14);
        let mut b = DiceEngine::from_seed(14);
        a.roll("1d6");
        assert_eq!(a.history(10).len(), 1);
        assert!(b.history(10).is_empty());
        assert!(b.cache().is_empty());
        b.roll("1d6");
        assert_eq!(a.history(1)[0].total, b.history(1)[0].total);
    }
}
