use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, trace};

use crate::sync_bucket::validate_amount;
use crate::{engine_for, Algorithm, CapacityDecision, RateConfig, RateEngine, SluiceError};

/// Options for [`AsyncBucket`].
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
#[derive(Clone, Copy, Debug, Default)]
pub struct AsyncBucketOptions {
    /// Cap on how many callers may be inside the acquire path at once,
    /// including suspended ones. Callers beyond the cap queue for a
    /// slot before even attempting the bucket's lock. `None` makes this
    /// stage a no-op passthrough.
    pub max_concurrent: Option<usize>,

    /// What [`shutdown`](AsyncBucket::shutdown) does to in-flight
    /// acquisitions. `false` (default) unblocks waiters immediately with
    /// [`SluiceError::ShutDown`]; `true` lets them complete normally
    /// while new acquires fail fast.
    pub drain_in_flight: bool,
}

/// Cooperative (async) admission facade, built on tokio.
///
/// The same probe-decide-commit protocol as [`SyncBucket`](crate::SyncBucket),
/// with cooperative suspension at the wait points instead of blocking
/// threads. There are exactly two suspension points: the computed wait
/// inside the retry loop, and the bounded-waiter gate when
/// `max_concurrent` is configured. Nothing else suspends.
///
/// # Ordering
///
/// Acquisitions are admitted in strict FIFO call order. The bucket's
/// lock is a fair [`tokio::sync::Mutex`] and is held across the wait
/// suspension, so no request can jump ahead of one submitted earlier.
/// This is a deliberate contract, not an accident of scheduling, and it
/// caps achievable parallelism in exchange for predictable ordering.
///
/// # Cancellation
///
/// Dropping an in-flight `acquire` future (timeout or external abort)
/// releases the lock and any limiter slot without residual state:
/// admission and commit are a single atomic step under the lock, so a
/// cancelled caller never half-commits.
///
/// # Examples
///
/// ```no_run
/// use sluice::{Algorithm, AsyncBucket, AsyncBucketOptions, RateConfig};
///
/// # async fn demo() -> Result<(), sluice::SluiceError> {
/// let bucket = AsyncBucket::new(
///     RateConfig::new(10.0, 1.0)?,
///     Algorithm::TokenBucket,
///     AsyncBucketOptions::default(),
/// );
///
/// bucket.acquire(1.0).await?;
/// let value = bucket.throttled(|| async { 41 + 1 }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub struct AsyncBucket {
    config: RateConfig,
    algorithm: Algorithm,
    engine: Mutex<Box<dyn RateEngine>>,
    limiter: Option<Arc<Semaphore>>,
    drain_in_flight: bool,
    closed: AtomicBool,
    shutdown_signal: Notify,
}

impl AsyncBucket {
    /// Create a bucket for a validated config and a chosen algorithm.
    pub fn new(config: RateConfig, algorithm: Algorithm, options: AsyncBucketOptions) -> Self {
        let now = now();
        Self {
            config,
            algorithm,
            engine: Mutex::new(engine_for(algorithm, &config, now)),
            limiter: options
                .max_concurrent
                .map(|permits| Arc::new(Semaphore::new(permits))),
            drain_in_flight: options.drain_in_flight,
            closed: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
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
    /// Suspends only to take the bucket's lock, never on capacity.
    /// Advancing the engine's internal clock bookkeeping is a documented
    /// side effect of probing; it does not change admission outcomes.
    pub async fn capacity_info(&self, amount: f64) -> CapacityDecision {
        self.engine.lock().await.probe(amount, now())
    }

    /// Acquire `amount` units, suspending until admitted.
    ///
    /// # Errors
    ///
    /// - [`SluiceError::AmountExceedsCapacity`] / [`SluiceError::NegativeAmount`]
    ///   for invalid amounts, raised before any state mutation or
    ///   suspension.
    /// - [`SluiceError::ShutDown`] if the bucket is (or becomes) shut
    ///   down, subject to `drain_in_flight`.
    pub async fn acquire(&self, amount: f64) -> Result<(), SluiceError> {
        validate_amount(&self.config, amount)?;
        self.acquire_unchecked(amount).await
    }

    /// Acquire `amount` units, suspending at most `timeout`.
    ///
    /// The deadline covers the entire sequence: the bounded-waiter gate
    /// (if configured), the lock, and the probe-retry loop.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](AsyncBucket::acquire), plus
    /// [`SluiceError::AcquireTimeout`] if the deadline elapses first. A
    /// timed-out call leaves no residual state and releases the lock and
    /// any limiter slot it held.
    pub async fn acquire_timeout(&self, amount: f64, timeout: Duration) -> Result<(), SluiceError> {
        validate_amount(&self.config, amount)?;

        match tokio::time::timeout(timeout, self.acquire_unchecked(amount)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                debug!(amount, ?timeout, "acquire timed out");
                Err(SluiceError::AcquireTimeout { amount, timeout })
            }
        }
    }

    /// Acquire one unit, then run the future produced by `f`.
    ///
    /// The scoped form of acquisition: admission happens on entry and
    /// there is nothing to give back on exit.
    pub async fn throttled<F, Fut, R>(&self, f: F) -> Result<R, SluiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        self.acquire(1.0).await?;
        Ok(f().await)
    }

    /// Shut the bucket down.
    ///
    /// Subsequent acquires fail fast with [`SluiceError::ShutDown`]
    /// instead of hanging. In-flight acquisitions are unblocked with the
    /// same error unless the bucket was built with
    /// [`drain_in_flight`](AsyncBucketOptions::drain_in_flight), in
    /// which case they complete normally.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        if !self.drain_in_flight {
            if let Some(limiter) = &self.limiter {
                limiter.close();
            }
            self.shutdown_signal.notify_waiters();
        }

        debug!(algorithm = ?self.algorithm, drain = self.drain_in_flight, "async bucket shut down");
    }

    /// Whether [`shutdown`](AsyncBucket::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn acquire_unchecked(&self, amount: f64) -> Result<(), SluiceError> {
        if self.is_shut_down() {
            return Err(SluiceError::ShutDown);
        }

        // Bounded-waiter gate: queue for a slot before attempting the
        // lock. Held for the rest of the acquisition, released on drop.
        let _slot = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await.map_err(|_| SluiceError::ShutDown)?),
            None => None,
        };

        let mut engine = self.engine.lock().await;

        loop {
            let now = now();
            let decision = engine.probe(amount, now);
            if decision.admitted {
                engine.commit(amount, now);
                return Ok(());
            }

            // probe only returns a strictly positive deficit on denial,
            // so the wait is positive; keep it so after the nanosecond
            // rounding in from_secs_f64, or the loop could spin without
            // letting time advance.
            let wait = Duration::from_secs_f64(decision.deficit / self.config.rate())
                .max(Duration::from_nanos(1));

            trace!(amount, wait_secs = wait.as_secs_f64(), "waiting for capacity");

            if self.drain_in_flight {
                tokio::time::sleep(wait).await;
            } else {
                // Register for the shutdown signal before re-checking the
                // flag, so a shutdown between the check and the suspension
                // cannot be missed.
                let signalled = self.shutdown_signal.notified();
                tokio::pin!(signalled);
                signalled.as_mut().enable();

                if self.is_shut_down() {
                    return Err(SluiceError::ShutDown);
                }

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = signalled => return Err(SluiceError::ShutDown),
                }
            }
        }
    } // end method acquire_unchecked
}

/// Current instant, read through tokio's clock so paused-clock tests
/// observe virtual time; outside a runtime this is the system monotonic
/// clock.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
