//! Fingerprint index over promoted states.
//!
//! Buckets hold state ids only. The bucket of an observation is the
//! analyzer's fingerprint of its normalized markup modulo the bucket count;
//! inside a bucket, structural equality decides identity.

use crawlmap_markup::MarkupAnalyzer;

use crate::state::{Observation, State, StateId};

pub const DEFAULT_BUCKET_COUNT: usize = 19;

#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    buckets: Vec<Vec<StateId>>,
}

impl FingerprintIndex {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); bucket_count.max(1)],
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    fn bucket_of(&self, observation: &Observation, analyzer: &dyn MarkupAnalyzer) -> usize {
        let hash = analyzer.fingerprint(&observation.fingerprint_text());
        (hash % self.buckets.len() as u64) as usize
    }

    /// Id of the state structurally equal to `observation`, if any.
    pub fn find(
        &self,
        observation: &Observation,
        states: &[State],
        analyzer: &dyn MarkupAnalyzer,
    ) -> Option<StateId> {
        let bucket = &self.buckets[self.bucket_of(observation, analyzer)];
        bucket.iter().copied().find(|id| {
            states
                .get(*id as usize)
                .map(|s| s.observation().same_markup(observation, analyzer))
                .unwrap_or(false)
        })
    }

    /// `(true, next_id)` after filing `next_id` when nothing matches,
    /// `(false, id)` of the first match otherwise.
    pub fn insert_or_find(
        &mut self,
        observation: &Observation,
        next_id: StateId,
        states: &[State],
        analyzer: &dyn MarkupAnalyzer,
    ) -> (bool, StateId) {
        if let Some(id) = self.find(observation, states, analyzer) {
            return (false, id);
        }
        let bucket = self.bucket_of(observation, analyzer);
        self.buckets[bucket].push(next_id);
        (true, next_id)
    }
}

impl Default for FingerprintIndex {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_COUNT)
    }
}
