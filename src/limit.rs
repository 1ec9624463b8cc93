use std::num::NonZeroU32;

use crate::error::InvalidConfiguration;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Configuration for the controller's sustained rate and burst capacity.
///
/// `rate` is the number of tokens generated per second; `capacity` is the
/// largest number of tokens the bucket can hold at a single moment, which is
/// also the largest amount a single request may ask for.
///
/// # Examples
///
/// ```rust
/// use zeropoint::RateLimit;
/// use std::num::NonZeroU32;
///
/// // 100 requests per second, burst of 200
/// let limit = RateLimit::per_second_and_burst(
///     NonZeroU32::new(100).unwrap(),
///     NonZeroU32::new(200).unwrap()
/// );
/// assert_eq!(limit.capacity(), 200.0);
///
/// // fractional configurations go through the checked constructor
/// let limit = RateLimit::new(2.5, 0.5).unwrap();
/// assert_eq!(limit.fill_duration(), 0.2);
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub(crate) rate: f64,
    pub(crate) capacity: f64,
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateLimit(rate_per_second={}, capacity={})",
            self.rate_per_second(),
            self.capacity()
        )
    }
}

impl RateLimit {
    /// Creates a rate limit from a real-valued rate (tokens per second) and
    /// capacity.
    ///
    /// # Errors
    ///
    /// * [`InvalidConfiguration::InvalidRate`] if `rate` is not a finite
    ///   positive number
    /// * [`InvalidConfiguration::InvalidCapacity`] if `capacity` is negative
    ///   or not finite
    pub fn new(rate: f64, capacity: f64) -> Result<Self, InvalidConfiguration> {
        Ok(Self {
            rate: check_rate(rate)?,
            capacity: check_capacity(capacity)?,
        })
    }

    /// Creates a rate limit with the specified tokens per second.
    ///
    /// The capacity is set equal to the rate, allowing for one second's
    /// worth of tokens to be claimed at once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zeropoint::RateLimit;
    /// use std::num::NonZeroU32;
    ///
    /// let limit = RateLimit::per_second(NonZeroU32::new(100).unwrap());
    /// assert_eq!(limit.rate_per_second(), 100.0);
    /// assert_eq!(limit.capacity(), 100.0);
    /// ```
    pub const fn per_second(rate: NonZeroU32) -> Self {
        Self {
            rate: rate.get() as f64,
            capacity: rate.get() as f64,
        }
    }

    /// Creates a rate limit with specified tokens per second and burst capacity.
    pub const fn per_second_and_burst(rate: NonZeroU32, burst: NonZeroU32) -> Self {
        Self {
            rate: rate.get() as f64,
            capacity: burst.get() as f64,
        }
    }

    /// Creates a rate limit with the specified tokens per minute.
    ///
    /// The capacity is set equal to the per-minute rate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zeropoint::RateLimit;
    /// use std::num::NonZeroU32;
    ///
    /// let limit = RateLimit::per_minute(NonZeroU32::new(60).unwrap());
    /// assert_eq!(limit.rate_per_second(), 1.0);
    /// assert_eq!(limit.capacity(), 60.0);
    /// ```
    pub const fn per_minute(rate: NonZeroU32) -> Self {
        Self {
            rate: rate.get() as f64 / SECONDS_PER_MINUTE,
            capacity: rate.get() as f64,
        }
    }

    /// Creates a rate limit with the specified tokens per hour.
    ///
    /// The capacity is set equal to the per-hour rate.
    pub const fn per_hour(rate: NonZeroU32) -> Self {
        Self {
            rate: rate.get() as f64 / SECONDS_PER_HOUR,
            capacity: rate.get() as f64,
        }
    }

    /// Sets a custom burst capacity for this rate limit.
    pub const fn with_burst(mut self, burst: NonZeroU32) -> Self {
        self.capacity = burst.get() as f64;
        self
    }

    /// Returns the rate in tokens per second.
    pub const fn rate_per_second(&self) -> f64 {
        self.rate
    }

    /// Returns the rate in tokens per minute.
    pub const fn rate_per_minute(&self) -> f64 {
        self.rate * SECONDS_PER_MINUTE
    }

    /// Returns the rate in tokens per hour.
    pub const fn rate_per_hour(&self) -> f64 {
        self.rate * SECONDS_PER_HOUR
    }

    /// Returns the burst capacity.
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Seconds needed to refill the bucket from empty to full.
    pub const fn fill_duration(&self) -> f64 {
        self.capacity / self.rate
    }

    /// Seconds it takes to generate `tokens` at this rate.
    pub(crate) const fn span_of(&self, tokens: f64) -> f64 {
        tokens / self.rate
    }
}

pub(crate) fn check_rate(rate: f64) -> Result<f64, InvalidConfiguration> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(InvalidConfiguration::InvalidRate(rate))
    }
}

pub(crate) fn check_capacity(capacity: f64) -> Result<f64, InvalidConfiguration> {
    if capacity.is_finite() && capacity >= 0.0 {
        Ok(capacity)
    } else {
        Err(InvalidConfiguration::InvalidCapacity(capacity))
    }
}
