//! Per-purpose RNG streams with ChaCha8.
//!
//! Every random decision of a run draws from a stream seeded with
//! `(seed + stream id)`. Same seed, same crawl.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Control values.
pub const VALUE_STREAM: u64 = 0;
/// Randomized action choice.
pub const PICK_STREAM: u64 = 1;

pub fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.wrapping_add(stream))
}
