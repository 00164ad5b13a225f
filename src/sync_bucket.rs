use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::{engine_for, Algorithm, CapacityDecision, RateConfig, RateEngine, SluiceError};

/// Blocking admission facade.
///
/// Wraps one admission engine in a mutex so the probe-decide-commit
/// sequence is indivisible under concurrent threads: two callers that
/// probed independently could both observe "admitted" for requests that
/// together overshoot capacity, so the read-decide-write must be one
/// critical section.
///
/// [`acquire`](SyncBucket::acquire) blocks the calling thread, sleeping
/// for exactly `deficit / rate` between probes. The lock is held across
/// the sleep, so waiting callers are served in lock-acquisition order.
///
/// Admission is "use it or lose it": nothing is released after an
/// acquisition, so there is no guard to hold or drop.
///
/// # Examples
///
/// ```no_run
/// use sluice::{Algorithm, RateConfig, SyncBucket};
///
/// let bucket = SyncBucket::new(RateConfig::new(5.0, 1.0).unwrap(), Algorithm::LeakyBucket);
///
/// // Blocks until one unit fits.
/// bucket.acquire(1.0).unwrap();
///
/// // Runs the closure once one unit has been admitted.
/// let body = bucket.throttled(|| "response").unwrap();
/// assert_eq!(body, "response");
/// ```
pub struct SyncBucket {
    config: RateConfig,
    algorithm: Algorithm,
    engine: Mutex<Box<dyn RateEngine>>,
    closed: AtomicBool,
}

impl SyncBucket {
    /// Create a bucket for a validated config and a chosen algorithm.
    pub fn new(config: RateConfig, algorithm: Algorithm) -> Self {
        let now = Instant::now();
        Self {
            config,
            algorithm,
            engine: Mutex::new(engine_for(algorithm, &config, now)),
            closed: AtomicBool::new(false),
        }
    } // end constructor

    /// The bucket's configuration.
    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// The algorithm selected at construction.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Read-only probe: would `amount` be admitted right now?
    ///
    /// Never blocks beyond the critical section and never commits.
    /// Advancing the engine's internal clock bookkeeping is a documented
    /// side effect of probing; it does not change admission outcomes —
    /// probing repeatedly at the same instant yields the same decision.
    pub fn capacity_info(&self, amount: f64) -> CapacityDecision {
        self.lock_engine().probe(amount, Instant::now())
    }

    /// Acquire `amount` units, blocking until admitted.
    ///
    /// # Errors
    ///
    /// - [`SluiceError::AmountExceedsCapacity`] / [`SluiceError::NegativeAmount`]
    ///   for invalid amounts, raised before any state mutation or sleep.
    /// - [`SluiceError::ShutDown`] if the bucket is shut down before or
    ///   while waiting.
    pub fn acquire(&self, amount: f64) -> Result<(), SluiceError> {
        self.acquire_inner(amount, None)
    }

    /// Acquire `amount` units, blocking at most `timeout`.
    ///
    /// The wait is bounded by sleeping `min(wait, remaining)` each
    /// round; a deadline already in the past fails without sleeping only
    /// if the first probe also denies.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](SyncBucket::acquire), plus
    /// [`SluiceError::AcquireTimeout`] if the deadline elapses before
    /// admission. A timed-out call leaves no residual state: admission
    /// and commit are the same atomic step.
    pub fn acquire_timeout(&self, amount: f64, timeout: Duration) -> Result<(), SluiceError> {
        self.acquire_inner(amount, Some(timeout))
    }

    /// Acquire one unit, then run `f`.
    ///
    /// The scoped form of acquisition: admission happens on entry and
    /// there is nothing to give back on exit.
    pub fn throttled<R>(&self, f: impl FnOnce() -> R) -> Result<R, SluiceError> {
        self.acquire(1.0)?;
        Ok(f())
    }

    /// Shut the bucket down: subsequent acquires fail fast with
    /// [`SluiceError::ShutDown`].
    ///
    /// A thread currently sleeping inside [`acquire`](SyncBucket::acquire)
    /// notices the shutdown when its current sleep slice ends.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        debug!(algorithm = ?self.algorithm, "sync bucket shut down");
    }

    fn acquire_inner(&self, amount: f64, timeout: Option<Duration>) -> Result<(), SluiceError> {
        validate_amount(&self.config, amount)?;

        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut engine = self.lock_engine();

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(SluiceError::ShutDown);
            }

            let now = Instant::now();
            let decision = engine.probe(amount, now);
            if decision.admitted {
                engine.commit(amount, now);
                return Ok(());
            }

            // probe only returns a strictly positive deficit on denial,
            // so the wait is positive; keep it so after the nanosecond
            // rounding in from_secs_f64.
            let wait = Duration::from_secs_f64(decision.deficit / self.config.rate())
                .max(Duration::from_nanos(1));

            let sleep_for = match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    let remaining = deadline.saturating_duration_since(now);
                    if remaining.is_zero() {
                        debug!(amount, ?timeout, "acquire timed out");
                        return Err(SluiceError::AcquireTimeout { amount, timeout });
                    }
                    wait.min(remaining)
                }
                _ => wait,
            };

            if !sleep_for.is_zero() {
                trace!(amount, wait_secs = sleep_for.as_secs_f64(), "waiting for capacity");
                thread::sleep(sleep_for);
            }
        }
    } // end method acquire_inner

    fn lock_engine(&self) -> std::sync::MutexGuard<'_, Box<dyn RateEngine>> {
        // A poisoned lock only means another thread panicked mid-probe;
        // the engine state itself stays internally consistent.
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn validate_amount(config: &RateConfig, amount: f64) -> Result<(), SluiceError> {
    if amount < 0.0 {
        return Err(SluiceError::NegativeAmount { amount });
    }

    // The negated comparison also rejects NaN.
    if !(amount <= config.capacity()) {
        return Err(SluiceError::AmountExceedsCapacity {
            amount,
            capacity: config.capacity(),
        });
    }

    Ok(())
}
