use serde::{Deserialize, Serialize};

use crawlmap_model::{EdgeRecord, TraceLimits, DEFAULT_BUCKET_COUNT};

/// Configuration of one crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// URL every trace starts from.
    pub base_url: String,
    /// Extra network locations (`host` or `host:port`) counted as in domain.
    pub domains: Vec<String>,
    /// Systematic exploration does not expand states at this depth or deeper.
    pub max_depth: usize,
    /// Actions per randomized trace.
    pub max_length: usize,
    /// Traces per run.
    pub trace_amount: usize,
    /// Wall-clock budget of each trace, in seconds.
    pub max_time_secs: u64,
    /// Seed of every random stream of the run.
    pub seed: u64,
    /// Buckets of the fingerprint index.
    pub bucket_count: usize,
    /// Bounds on terminal-trace enumeration at export.
    pub trace_limits: TraceLimits,
    /// Actions replayed after the initial state of every trace (login etc).
    pub before_script: Vec<EdgeRecord>,
    /// Observe frame documents as fragments of their page.
    pub descend_frames: bool,
    /// Deepest frame nesting observed.
    pub max_frame_depth: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            domains: Vec::new(),
            max_depth: 3,
            max_length: 10,
            trace_amount: 1,
            max_time_secs: 3600, // 1 hour
            seed: 0,
            bucket_count: DEFAULT_BUCKET_COUNT,
            trace_limits: TraceLimits::default(),
            before_script: Vec::new(),
            descend_frames: true,
            max_frame_depth: 3,
        }
    }
}

impl CrawlConfig {
    pub fn for_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }
}
