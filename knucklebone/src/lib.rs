pub mod config;
pub mod error;
pub mod roll_parser;
pub mod rules;
pub mod simulation;
pub mod statistics;

#[cfg(test)]
mod roll_test_strategies;

pub mod prelude {
    pub use crate::{
        config::{EngineConfig, NaturalPolicy},
        error::{ErrorKind, EvaluationError, OutcomeError, ParseError, RandomSourceError, RollError},
        roll_parser::{normalize, parse},
        rules::{
            abilities::{AbilityMethod, AbilityScores, AbilityStatistics},
            dice::{
                DiceTerm, Direction, DropKeep, DropKeepKind, ExplodeCondition, Expression,
                FlatModifier, Sign, Term,
            },
            modifiers::{DieIndex, ModifierPipeline, RawRoll, TermResult},
        },
        simulation::{
            engine::{DEFAULT_CRITICAL_MULTIPLIER, DiceEngine},
            evaluator::{Evaluation, Evaluator, RollOutcome},
            self_test::SelfTestResult,
        },
        statistics::{
            cache::ParseCache,
            recorder::{
                ExpressionStatistics, GlobalStatistics, HistoryEntry, Recorder,
                StatisticsSnapshot,
            },
            roller::{Entropy, FixedSequence, RandomSource, Roller},
        },
    };
}
