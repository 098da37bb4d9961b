use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::simulation::evaluator::RollOutcome;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub expression: String,
    pub total: i64,
    pub timestamp_ms: i64,
    pub duration_ms: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatistics {
    pub count: u64,
    pub sum: i64,
    pub average: f64,
    pub min: i64,
    pub max: i64,
    /// Total → number of times it was rolled.
    pub histogram: BTreeMap<i64, u64>,
}

impl ExpressionStatistics {
    fn record(&mut self, total: i64) {
        if self.count == 0 {
            self.min = total;
            self.max = total;
        } else {
            self.min = self.min.min(total);
            self.max = self.max.max(total);
        }
        self.count += 1;
        self.sum += total;
        self.average = self.sum as f64 / self.count as f64;
        *self.histogram.entry(total).or_insert(0) += 1;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    pub total_rolls: u64,
    pub failed_rolls: u64,
    pub cumulative_duration_ms: f64,
    pub average_duration_ms: f64,
    pub batches: u64,
    pub slow_batches: u64,
    pub cumulative_batch_duration_ms: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Keyed by normalized expression.
    pub expressions: BTreeMap<String, ExpressionStatistics>,
    pub global: GlobalStatistics,
}

impl StatisticsSnapshot {
    pub fn expression(&self, normalized: &str) -> Option<&ExpressionStatistics> {
        self.expressions.get(normalized)
    }

    pub fn print_summary(&self) {
        log::info!(
            "{} rolls ({} failed), average {:.3} ms",
            self.global.total_rolls,
            self.global.failed_rolls,
            self.global.average_duration_ms
        );
        for (expression, stats) in &self.expressions {
            log::info!(
                "  {}: n={} mean={:.2} min={} max={}",
                expression,
                stats.count,
                stats.average,
                stats.min,
                stats.max
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorder {
    capacity: usize,
    history: VecDeque<HistoryEntry>,
    expressions: FxHashMap<String, ExpressionStatistics>,
    global: GlobalStatistics,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl Recorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            expressions: FxHashMap::default(),
            global: GlobalStatistics::default(),
        }
    }

    pub fn record(&mut self, outcome: &RollOutcome) {
        if outcome.error.is_some() {
            self.global.failed_rolls += 1;
            return;
        }

        if self.capacity > 0 {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back(HistoryEntry {
                expression: outcome.expression.clone(),
                total: outcome.total,
                timestamp_ms: outcome.timestamp_ms,
                duration_ms: outcome.duration_ms,
            });
        }

        self.expressions
            .entry(outcome.evaluated.clone())
            .or_default()
            .record(outcome.total);

        self.global.total_rolls += 1;
        self.global.cumulative_duration_ms += outcome.duration_ms;
        self.global.average_duration_ms =
            self.global.cumulative_duration_ms / self.global.total_rolls as f64;
    }

    pub fn record_batch(&mut self, duration_ms: f64, over_budget: bool) {
        self.global.batches += 1;
        self.global.cumulative_batch_duration_ms += duration_ms;
        if over_budget {
            self.global.slow_batches += 1;
        }
    }

    /// Up to `count` of the most recent entries, oldest first.
    pub fn history(&self, count: usize) -> Vec<HistoryEntry> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            expressions: self
                .expressions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            global: self.global.clone(),
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.expressions.clear();
        self.global = GlobalStatistics::default();
    }
}
