use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    rules::modifiers::DEFAULT_EXPLOSION_CAP, statistics::cache::DEFAULT_CACHE_CAPACITY,
    statistics::recorder::DEFAULT_HISTORY_CAPACITY,
};

pub const DEFAULT_MAX_REROLLS: u32 = 100;
pub const DEFAULT_BATCH_BUDGET_MS: f64 = 10.0;

/// Which d20 faces count as a natural 1 or 20.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NaturalPolicy {
    /// Only dice that survive drop/keep, so the die discarded by advantage
    /// never counts.
    #[default]
    KeptDice,
    AnyRolled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache_capacity: usize,
    pub history_capacity: usize,
    pub explosion_cap: u32,
    pub max_rerolls: u32,
    pub batch_budget_ms: f64,
    pub natural_policy: NaturalPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            explosion_cap: DEFAULT_EXPLOSION_CAP,
            max_rerolls: DEFAULT_MAX_REROLLS,
            batch_budget_ms: DEFAULT_BATCH_BUDGET_MS,
            natural_policy: NaturalPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_explosion_cap(mut self, cap: u32) -> Self {
        self.explosion_cap = cap;
        self
    }

    pub fn with_max_rerolls(mut self, max: u32) -> Self {
        self.max_rerolls = max;
        self
    }

    pub fn with_batch_budget_ms(mut self, budget: f64) -> Self {
        self.batch_budget_ms = budget;
        self
    }

    pub fn with_natural_policy(mut self, policy: NaturalPolicy) -> Self {
        self.natural_policy = policy;
        self
    }
}
