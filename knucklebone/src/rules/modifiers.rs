use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::{
    error::RandomSourceError,
    rules::dice::{DiceTerm, Direction, DropKeep, DropKeepKind},
    statistics::roller::RandomSource,
};

pub const DEFAULT_EXPLOSION_CAP: u32 = 100;

/// Position of a die within its term, assigned before any modifier runs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Display,
    Serialize,
    Deserialize,
)]
pub struct DieIndex(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRoll {
    pub index: DieIndex,
    pub value: u32,
    pub exploded_chain: Vec<u32>,
}

impl RawRoll {
    pub fn total(&self) -> i64 {
        self.value as i64 + self.exploded_chain.iter().map(|&v| v as i64).sum::<i64>()
    }

    pub fn exploded(&self) -> bool {
        !self.exploded_chain.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermResult {
    pub raw: Vec<RawRoll>,
    pub kept: Vec<RawRoll>,
    pub dropped: Vec<RawRoll>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierPipeline {
    /// Extra draws allowed per original die. A `1d1!` would otherwise never stop.
    pub explosion_cap: u32,
}

impl Default for ModifierPipeline {
    fn default() -> Self {
        Self {
            explosion_cap: DEFAULT_EXPLOSION_CAP,
        }
    }
}

impl ModifierPipeline {
    pub fn new(explosion_cap: u32) -> Self {
        Self { explosion_cap }
    }

    pub fn apply<R: RandomSource + ?Sized>(
        &self,
        term: &DiceTerm,
        rng: &mut R,
    ) -> Result<TermResult, RandomSourceError> {
        let mut raw = Vec::with_capacity(term.count as usize);
        for index in 0..term.count as usize {
            raw.push(RawRoll {
                index: DieIndex(index),
                value: rng.next(term.sides)?,
                exploded_chain: Vec::new(),
            });
        }

        if let Some(condition) = term.exploding {
            for die in &mut raw {
                let mut newest = die.value;
                while condition.triggers(newest, term.sides)
                    && (die.exploded_chain.len() as u32) < self.explosion_cap
                {
                    newest = rng.next(term.sides)?;
                    die.exploded_chain.push(newest);
                }
            }
        }

        let (kept, dropped) = match &term.drop_keep {
            Some(drop_keep) => select(&raw, drop_keep),
            None => (raw.clone(), Vec::new()),
        };
        let total = kept.iter().map(RawRoll::total).sum();

        Ok(TermResult {
            raw,
            kept,
            dropped,
            total,
        })
    }
}

/// Splits dice into (kept, dropped). Ranking is by die total with ties broken
/// by index, and membership is decided by index so equal values stay distinct.
fn select(raw: &[RawRoll], drop_keep: &DropKeep) -> (Vec<RawRoll>, Vec<RawRoll>) {
    let mut ranked: Vec<usize> = (0..raw.len()).collect();
    ranked.sort_by_key(|&i| (raw[i].total(), i));

    let amount = (drop_keep.amount as usize).min(raw.len());
    let chosen = match drop_keep.direction {
        Direction::Highest => &ranked[raw.len() - amount..],
        Direction::Lowest => &ranked[..amount],
    };
    let mut is_chosen = vec![false; raw.len()];
    for &i in chosen {
        is_chosen[i] = true;
    }

    let keep_chosen = drop_keep.kind == DropKeepKind::Keep;
    raw.iter()
        .cloned()
        .partition(|die| is_chosen[die.index.0] == keep_chosen)
}
