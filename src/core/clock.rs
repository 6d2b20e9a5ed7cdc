//! Wall clock and id allocation.
//!
//! Game timestamps are Unix milliseconds. Game ids are derived from the
//! creation millisecond and bumped so they stay strictly increasing.

use chrono::Utc;

/// Unix time in milliseconds.
pub type Millis = i64;

/// Current Unix time in milliseconds.
#[inline]
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Allocates strictly increasing ids from creation timestamps.
///
/// Two allocations in the same millisecond (or a clock stepping
/// backwards) yield `last + 1` instead of a duplicate.
#[derive(Debug, Default)]
pub struct MonotonicIds {
    last: u64,
}

impl MonotonicIds {
    /// Create an allocator that has handed out nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for an entity created at `now`.
    pub fn next(&mut self, now: Millis) -> u64 {
        let candidate = now.max(0) as u64;
        let id = if candidate > self.last {
            candidate
        } else {
            self.last + 1
        };
        self.last = id;
        id
    }
}
