//! Per-credential send quota accounting.

use serde::{Deserialize, Serialize};

/// Default per-credential limit of successful sends in one run.
pub const DEFAULT_DAILY_LIMIT: u32 = 2000;

/// Counter of successful sends with a fixed ceiling.
///
/// `reserved` counts jobs that hold a slot but have not reached a terminal
/// outcome yet. `used + reserved <= limit` holds at all times, so `used` can
/// never pass `limit` no matter how attempts interleave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTracker {
    used: u32,
    reserved: u32,
    limit: u32,
}

impl QuotaTracker {
    /// Create an empty tracker. A zero limit is clamped to 1.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            used: 0,
            reserved: 0,
            limit: limit.max(1),
        }
    }

    /// Successful sends recorded so far.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Slots held by in-flight jobs.
    #[must_use]
    pub const fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Ceiling for this tracker.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Units neither used nor reserved.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used + self.reserved)
    }

    /// True once every unit is used or reserved.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Reserve one unit. Returns false, leaving the tracker untouched, when
    /// nothing remains.
    pub fn try_reserve(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.reserved += 1;
        true
    }

    /// Turn one reservation into a used unit.
    ///
    /// Without an outstanding reservation this behaves like a direct
    /// check-and-increment and refuses once the limit is reached.
    pub fn commit(&mut self) -> bool {
        if self.reserved > 0 {
            self.reserved -= 1;
            self.used += 1;
            return true;
        }
        if self.used < self.limit {
            self.used += 1;
            return true;
        }
        false
    }

    /// Return a reservation that will not be used.
    pub fn release(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT)
    }
}
