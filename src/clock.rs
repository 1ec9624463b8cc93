use std::sync::Arc;

use parking_lot::Mutex;

/// Monotonic time source for a [`Controller`](crate::Controller).
///
/// Every token computation is reconstructed from the values returned here, so
/// implementations must never go backwards. Time is measured in fractional
/// seconds since an arbitrary, clock-specific origin.
pub trait Clock {
    /// Returns the current time in seconds since the clock's origin.
    fn now(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Standard clock implementation using [`std::time::Instant`].
///
/// # Examples
///
/// ```rust
/// use zeropoint::{Controller, RateLimit, StdClock};
/// use std::num::NonZeroU32;
///
/// let limit = RateLimit::per_second(NonZeroU32::new(100).unwrap());
/// let controller = Controller::with_clock(limit, StdClock::default());
/// assert!(controller.allow());
/// ```
#[derive(Clone)]
pub struct StdClock {
    origin: std::time::Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// High-precision clock implementation using the `quanta` crate.
///
/// Requires the "quanta" feature to be enabled.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct QuantaClock {
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for QuantaClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl QuantaClock {
    /// Creates a new `QuantaClock` whose origin is the current reading of
    /// `clock`.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.now();
        Self { origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for QuantaClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock driven by [`tokio::time::Instant`].
///
/// Use it when the controller's waits run on a Tokio runtime, in particular
/// under a paused test runtime where time only advances as sleeps resolve.
/// Requires the "tokio" feature.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "tokio")]
/// # {
/// use zeropoint::{Controller, RateLimit, TokioClock};
/// use std::num::NonZeroU32;
///
/// let limit = RateLimit::per_second(NonZeroU32::new(100).unwrap());
/// let controller = Controller::with_clock(limit, TokioClock::default());
/// # }
/// ```
#[cfg(feature = "tokio")]
#[derive(Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(feature = "tokio")]
impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(feature = "tokio")]
impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock using quanta's coarse timing.
///
/// Cheaper to read than [`StdClock`], with precision bounded by how often
/// quanta's upkeep thread runs. Requires the "quanta" feature.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct FastClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for FastClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl FastClock {
    /// Creates a new `FastClock` from a `quanta::Clock` instance.
    ///
    /// **Important**: Ensure the clock's upkeep thread is running, otherwise
    /// the controller will not observe time passing.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.recent();
        Self { clock, origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for FastClock {
    fn now(&self) -> f64 {
        (self.clock.recent() - self.origin).as_secs_f64()
    }
}

/// Manual clock implementation for testing and simulation.
///
/// Time only moves when [`set`](Self::set) or [`advance`](Self::advance) is
/// called, which makes every reservation deterministic.
///
/// # Examples
///
/// ```rust
/// use zeropoint::{Controller, RateLimit, ManualClock};
/// use std::num::NonZeroU32;
/// use std::sync::Arc;
///
/// let limit = RateLimit::per_second(NonZeroU32::new(10).unwrap());
/// let clock = Arc::new(ManualClock::new(0.0));
/// let controller = Controller::with_clock(limit, Arc::clone(&clock));
///
/// // the bucket starts full
/// assert!(controller.allow_n(10.0));
/// assert!(!controller.allow());
///
/// // a tenth of a second later one more token exists
/// clock.advance(0.1);
/// assert!(controller.allow());
/// ```
pub struct ManualClock {
    now: Mutex<f64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ManualClock {
    /// Creates a new manual clock starting at `now` seconds.
    pub fn new(now: f64) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Sets the current time to `now` seconds.
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Advances the current time by `delta` seconds.
    pub fn advance(&self, delta: f64) {
        *self.now.lock() += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
