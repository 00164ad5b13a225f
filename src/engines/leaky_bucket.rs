use std::time::Instant;

use crate::{CapacityDecision, RateConfig, RateEngine};

/// Leaky bucket: the level represents outstanding (unleaked) demand.
///
/// Demand accumulates on admission and drains at the configured rate,
/// modeling egress smoothing. The bucket starts empty, so bursts up to
/// `capacity` are absorbed instantly and the overflow is delayed.
///
/// # Algorithm
///
/// At probe time, with `elapsed` the wall-clock delta since the last
/// update:
///
/// 1. `level = max(0, level - elapsed * rate)`
/// 2. `deficit = level + amount - capacity`; admitted iff `deficit <= 0`
/// 3. On commit, `level += amount`
///
/// The level stays within `[0, capacity]` after every update: the drain
/// clamps at zero and commits only happen when the sum fits.
pub(crate) struct LeakyBucketEngine {
    capacity: f64,
    rate: f64,
    level: f64,
    last_update: Instant,
}

impl LeakyBucketEngine {
    pub(crate) fn new(config: &RateConfig, now: Instant) -> Self {
        Self {
            capacity: config.capacity(),
            rate: config.rate(),
            level: 0.0,
            last_update: now,
        }
    } // end constructor

    fn drain(&mut self, now: Instant) {
        // saturating_duration_since clamps a backward clock to zero.
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.level = (self.level - elapsed * self.rate).max(0.0);
        self.last_update = now;
    }
}

impl RateEngine for LeakyBucketEngine {
    fn probe(&mut self, amount: f64, now: Instant) -> CapacityDecision {
        self.drain(now);
        CapacityDecision::from_deficit(self.level + amount - self.capacity)
    }

    fn commit(&mut self, amount: f64, _now: Instant) {
        self.level += amount;
    }
}
