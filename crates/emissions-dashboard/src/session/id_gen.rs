//! Session identifier strategies.

use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicI64, Ordering};

pub const DEFAULT_ID_RANGE: RangeInclusive<i64> = 1_000_000..=9_999_999;

pub trait SessionIdGenerator: Send + Sync {
    fn next_id(&self) -> i64;
}

/// Uniform draw from a fixed range. Not unique: collisions are possible.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    range: RangeInclusive<i64>,
}

impl RandomIdGenerator {
    pub fn new(range: RangeInclusive<i64>) -> Self {
        Self { range }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_RANGE)
    }
}

impl SessionIdGenerator for RandomIdGenerator {
    fn next_id(&self) -> i64 {
        rand::thread_rng().gen_range(self.range.clone())
    }
}

/// Monotonic ids starting at a known value; used where ids must be predictable.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI64,
}

impl SequentialIdGenerator {
    pub fn starting_at(first: i64) -> Self {
        Self { next: AtomicI64::new(first) }
    }
}

impl SessionIdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
