use crate::SluiceError;

/// Validated rate configuration: `capacity` units per `seconds`.
///
/// A config defines the refill/leak rate shared by every algorithm:
/// `rate = capacity / seconds` units per second. Bursts up to `capacity`
/// are absorbed at once; sustained throughput converges on `rate`.
///
/// All quantities are `f64` end to end. Fractional capacities, amounts,
/// and waits are valid; the core performs exact comparisons with no
/// epsilon tolerance and no rounding.
///
/// A config is immutable once constructed. Invalid parameters are
/// rejected at construction, never later:
///
/// ```
/// use sluice::{RateConfig, SluiceError};
///
/// let config = RateConfig::new(10.0, 1.0).unwrap();
/// assert_eq!(config.rate(), 10.0);
///
/// assert!(matches!(
///     RateConfig::new(0.5, 1.0),
///     Err(SluiceError::InvalidCapacity(_))
/// ));
/// assert!(matches!(
///     RateConfig::new(10.0, 0.0),
///     Err(SluiceError::InvalidPeriod(_))
/// ));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateConfig {
    capacity: f64,
    seconds: f64,
}

impl RateConfig {
    /// Create a validated config.
    ///
    /// # Errors
    ///
    /// - [`SluiceError::InvalidCapacity`] if `capacity < 1` or not finite.
    /// - [`SluiceError::InvalidPeriod`] if `seconds <= 0` or not finite.
    pub fn new(capacity: f64, seconds: f64) -> Result<Self, SluiceError> {
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(SluiceError::InvalidCapacity(capacity));
        }

        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(SluiceError::InvalidPeriod(seconds));
        }

        Ok(Self { capacity, seconds })
    } // end constructor

    /// Maximum number of units the bucket can hold.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Time period over which `capacity` units drain or refill.
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Drain/refill rate in units per second. Always `> 0` for a
    /// constructed config.
    pub fn rate(&self) -> f64 {
        self.capacity / self.seconds
    }
}

impl Default for RateConfig {
    /// 10 units per second.
    fn default() -> Self {
        Self {
            capacity: 10.0,
            seconds: 1.0,
        }
    }
}

/// Outcome of a capacity probe.
///
/// `deficit` is the signed amount by which the request would overshoot
/// capacity, in capacity units: `<= 0` means admitted; `> 0` is the
/// exact amount that must drain (or fill) before a retry can succeed.
/// Dividing a positive deficit by the config's rate yields the precise
/// wait duration — never an approximation or a fixed backoff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapacityDecision {
    /// Whether the probed amount can be admitted right now.
    pub admitted: bool,
    /// Signed overshoot in capacity units; positive iff not admitted.
    pub deficit: f64,
}

impl CapacityDecision {
    pub(crate) fn from_deficit(deficit: f64) -> Self {
        Self {
            admitted: deficit <= 0.0,
            deficit,
        }
    }
}

/// Admission algorithm, selected once at bucket construction.
///
/// All four variants honor the same [`CapacityDecision`] contract and
/// the same capacity envelope; they differ in how state is represented
/// and in smoothing semantics (see each engine's docs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    /// Level tracks outstanding demand, draining at the configured
    /// rate. Starts empty.
    LeakyBucket,
    /// Level tracks available tokens, refilling at the configured
    /// rate. Starts full.
    TokenBucket,
    /// GCRA in its leaky-bucket-equivalent formulation: a drained
    /// excess relative to the last conforming arrival.
    GcraLeakyBucket,
    /// GCRA in its virtual-scheduling formulation: a theoretical
    /// arrival time cursor compared directly against the clock.
    GcraVirtualScheduling,
}
