use std::time::Instant;

use crate::{CapacityDecision, RateConfig, RateEngine};

/// Token bucket: the level represents available tokens.
///
/// Tokens refill at the configured rate and are spent on admission,
/// modeling ingress smoothing. The bucket starts full — the mirror image
/// of the leaky bucket's "starts empty" — so the first burst up to
/// `capacity` is admitted immediately.
///
/// # Algorithm
///
/// At probe time, with `elapsed` the wall-clock delta since the last
/// update:
///
/// 1. `level = min(capacity, level + elapsed * rate)`
/// 2. `deficit = amount - level`; admitted iff `deficit <= 0`
/// 3. On commit, `level -= amount`
pub(crate) struct TokenBucketEngine {
    capacity: f64,
    rate: f64,
    level: f64,
    last_update: Instant,
}

impl TokenBucketEngine {
    pub(crate) fn new(config: &RateConfig, now: Instant) -> Self {
        Self {
            capacity: config.capacity(),
            rate: config.rate(),
            level: config.capacity(),
            last_update: now,
        }
    } // end constructor

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.level = (self.level + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }
}

impl RateEngine for TokenBucketEngine {
    fn probe(&mut self, amount: f64, now: Instant) -> CapacityDecision {
        self.refill(now);
        CapacityDecision::from_deficit(amount - self.level)
    }

    fn commit(&mut self, amount: f64, _now: Instant) {
        self.level -= amount;
    }
}
