use std::{collections::VecDeque, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{error::ParseError, roll_parser, rules::dice::Expression};

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Eviction is first-in first-out, not least-recently-used: an entry that is
/// hit often can still be evicted once `capacity` newer strings have been
/// inserted. Failed parses are never stored.
#[derive(Debug, Clone)]
pub struct ParseCache {
    capacity: usize,
    entries: FxHashMap<String, Arc<Expression>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ParseCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: FxHashMap::default(),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get_or_parse(&mut self, raw: &str) -> Result<Arc<Expression>, ParseError> {
        let normalized = roll_parser::normalize(raw);
        self.get_or_parse_normalized(normalized)
    }

    pub fn get_or_parse_normalized(
        &mut self,
        normalized: String,
    ) -> Result<Arc<Expression>, ParseError> {
        if let Some(expression) = self.entries.get(&normalized) {
            self.hits += 1;
            return Ok(Arc::clone(expression));
        }

        self.misses += 1;
        let expression = Arc::new(roll_parser::parse_normalized(&normalized)?);
        if self.capacity > 0 {
            self.insert(normalized, Arc::clone(&expression));
        }
        Ok(expression)
    }

    fn insert(&mut self, normalized: String, expression: Arc<Expression>) {
        self.order.push_back(normalized.clone());
        self.entries.insert(normalized, expression);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            log::trace!("Evicting '{}' from parse cache", oldest);
            self.entries.remove(&oldest);
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.entries.contains_key(&roll_parser::normalize(raw))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
