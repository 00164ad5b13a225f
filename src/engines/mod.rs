//! Admission engines.
//!
//! Each engine is a pure state machine: it never reads the clock itself
//! and never sleeps. The caller (a bucket facade) passes `now` in, which
//! keeps the engines event-driven — state advances lazily from the
//! wall-clock delta at probe time, with no background timers — and makes
//! them trivially testable against a synthetic clock.
//!
//! Engines are selected once at construction via [`engine_for`] and
//! driven only inside a bucket's critical section.

mod leaky_bucket;
mod token_bucket;

mod gcra;

use std::time::Instant;

pub(crate) use gcra::{GcraLeakyBucketEngine, GcraVirtualSchedulingEngine};
pub(crate) use leaky_bucket::LeakyBucketEngine;
pub(crate) use token_bucket::TokenBucketEngine;

use crate::{Algorithm, CapacityDecision, RateConfig};

/// The polymorphic admission capability shared by all four algorithms.
///
/// The contract is probe-then-commit, always inside one critical
/// section:
///
/// 1. [`probe`](RateEngine::probe) advances the engine's elapsed-time
///    bookkeeping and returns a [`CapacityDecision`].
/// 2. If (and only if) the decision admitted, the caller invokes
///    [`commit`](RateEngine::commit) with the same `amount` and `now`
///    before releasing the lock.
///
/// A denied probe mutates nothing beyond the clock bookkeeping, which is
/// what makes timeouts and cancellation rollback-free at the facade
/// level.
pub trait RateEngine: Send {
    /// Evaluate whether `amount` units can be admitted at `now`.
    ///
    /// Advances the engine's notion of elapsed time as a side effect
    /// (documented, not hidden). Elapsed time is clamped to zero if the
    /// clock appears to go backward, so levels and deficits never go
    /// negative from clock skew.
    fn probe(&mut self, amount: f64, now: Instant) -> CapacityDecision;

    /// Apply the state mutation for an admission decided by the
    /// immediately preceding `probe` call.
    fn commit(&mut self, amount: f64, now: Instant);
}

/// Construct the engine for `algorithm`, with state anchored at `now`.
///
/// Leaky bucket starts empty, token bucket starts full, and both GCRA
/// formulations start with their cursor at `now`. Every variant admits
/// an initial burst up to capacity without waiting; they differ in what
/// the stored state means while doing so.
pub fn engine_for(algorithm: Algorithm, config: &RateConfig, now: Instant) -> Box<dyn RateEngine> {
    match algorithm {
        Algorithm::LeakyBucket => Box::new(LeakyBucketEngine::new(config, now)),
        Algorithm::TokenBucket => Box::new(TokenBucketEngine::new(config, now)),
        Algorithm::GcraLeakyBucket => Box::new(GcraLeakyBucketEngine::new(config, now)),
        Algorithm::GcraVirtualScheduling => Box::new(GcraVirtualSchedulingEngine::new(config, now)),
    }
}
