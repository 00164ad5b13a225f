//! Generic Cell Rate Algorithm, in its two classical formulations.
//!
//! Both variants derive the same constants from the config: an
//! inter-arrival increment `I = 1/rate` seconds per unit, and a burst
//! tolerance `L = capacity * I` seconds. A request of `amount` units
//! consumes `amount * I` of cursor advance, and is conforming iff
//!
//! ```text
//! now >= TAT + amount * I - L
//! ```
//!
//! which yields exactly the bucket engines' capacity envelope (the
//! deficit reported below is `(TAT - now) * rate + amount - capacity`,
//! i.e. the leaky bucket formula with the cursor excess read as a
//! level). The two formulations differ only in state representation:
//!
//! - [`GcraLeakyBucketEngine`] stores a drained *excess* relative to the
//!   last update, like a continuous-state leaky bucket.
//! - [`GcraVirtualSchedulingEngine`] stores the theoretical arrival
//!   time itself and compares it directly against the clock.
//!
//! Denial policy (deliberate, applies to both): a denied request does
//! not reserve its slot — the cursor is untouched until an admitting
//! probe commits. Queue position under contention is instead held
//! structurally by the bucket facades, which keep the critical section
//! across the wait so no later caller can overtake a waiter. Keeping
//! denial side-effect-free is what lets a timed-out or cancelled caller
//! leave no residual state behind.

use std::cmp;
use std::time::{Duration, Instant};

use crate::{CapacityDecision, RateConfig, RateEngine};

/// GCRA, leaky-bucket-equivalent formulation.
///
/// Tracks `excess` — how far the theoretical arrival time sits ahead of
/// the last update, in seconds — and drains it by elapsed wall-clock
/// time at probe time, exactly like a leaky bucket whose level is
/// measured in seconds-of-cursor instead of units.
pub(crate) struct GcraLeakyBucketEngine {
    rate: f64,
    /// Seconds of cursor advance per admitted unit (`1 / rate`).
    increment: f64,
    /// Burst tolerance in seconds (`capacity * increment`).
    tolerance: f64,
    /// Cursor excess over `last_update`, in seconds; never negative.
    excess: f64,
    last_update: Instant,
}

impl GcraLeakyBucketEngine {
    pub(crate) fn new(config: &RateConfig, now: Instant) -> Self {
        let increment = 1.0 / config.rate();
        Self {
            rate: config.rate(),
            increment,
            tolerance: config.capacity() * increment,
            excess: 0.0,
            last_update: now,
        }
    } // end constructor
}

impl RateEngine for GcraLeakyBucketEngine {
    fn probe(&mut self, amount: f64, now: Instant) -> CapacityDecision {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.excess = (self.excess - elapsed).max(0.0);
        self.last_update = now;

        // excess + amount*I - L, converted from seconds to units.
        let deficit = (self.excess + amount * self.increment - self.tolerance) * self.rate;
        CapacityDecision::from_deficit(deficit)
    }

    fn commit(&mut self, amount: f64, _now: Instant) {
        self.excess += amount * self.increment;
    }
}

/// GCRA, virtual-scheduling formulation.
///
/// Tracks the theoretical arrival time (TAT) cursor itself: the
/// earliest instant at which the next conforming unit may be deemed to
/// have arrived. Probing compares the cursor against `now` directly —
/// there is no stored level to drain, so the lazy-update bookkeeping is
/// implicit in the comparison. The cursor is read clamped at `now`, so
/// idle time never banks more than the burst tolerance.
pub(crate) struct GcraVirtualSchedulingEngine {
    rate: f64,
    increment: f64,
    tolerance: f64,
    /// Theoretical arrival time of the next conforming unit.
    tat: Instant,
}

impl GcraVirtualSchedulingEngine {
    pub(crate) fn new(config: &RateConfig, now: Instant) -> Self {
        let increment = 1.0 / config.rate();
        Self {
            rate: config.rate(),
            increment,
            tolerance: config.capacity() * increment,
            tat: now,
        }
    } // end constructor
}

impl RateEngine for GcraVirtualSchedulingEngine {
    fn probe(&mut self, amount: f64, now: Instant) -> CapacityDecision {
        // How far the cursor sits ahead of now; zero once it has lapsed.
        let ahead = self.tat.saturating_duration_since(now).as_secs_f64();
        let deficit = (ahead + amount * self.increment - self.tolerance) * self.rate;
        CapacityDecision::from_deficit(deficit)
    }

    fn commit(&mut self, amount: f64, now: Instant) {
        self.tat = cmp::max(now, self.tat) + Duration::from_secs_f64(amount * self.increment);
    }
}
