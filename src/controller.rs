use likely_stable::unlikely;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::claim::Claim;
#[cfg(feature = "async")]
use crate::claim::CancelOnDrop;
use crate::error::{Error, InvalidConfiguration, saturating_duration};
use crate::limit::{check_capacity, check_rate};
use crate::{Clock, RateLimit, StdClock};

/// Wait budget that never runs out. A reservation made with it cannot fail
/// with [`Error::NotReady`].
pub const INFINITE_WAIT: f64 = f64::INFINITY;

/// A continuous-time token-bucket admission controller.
///
/// No background task regenerates tokens. The controller only remembers its
/// *zero point*: the instant at which the bucket holds exactly zero tokens
/// available for new claims. Every token generated after it can be claimed, in
/// time order, without overlap. Granting a claim pushes the zero point forward
/// by the claim's span (`tokens / rate`), and cancelling the claim pulls it
/// back by the same span, so restitution is exact no matter how many claims
/// were made or cancelled in between.
///
/// Idle time beyond what is needed to refill the bucket is discarded: the
/// bucket never holds more than its capacity.
///
/// # Type Parameters
///
/// - `C`: Clock implementation (default: [`StdClock`])
///
/// # Examples
///
/// ```rust
/// use zeropoint::{Controller, RateLimit};
/// use std::num::NonZeroU32;
///
/// let limit = RateLimit::per_second_and_burst(
///     NonZeroU32::new(10).unwrap(),
///     NonZeroU32::new(20).unwrap()
/// );
/// // the bucket starts full
/// let controller = Controller::new(limit);
/// assert!(controller.allow_n(15.0));
/// // a single request can never be larger than the capacity
/// assert!(!controller.allow_n(21.0));
/// ```
pub struct Controller<C = StdClock> {
    state: Mutex<State>,
    clock: C,
}

struct State {
    limit: RateLimit,
    zero_point: f64,
}

impl Controller<StdClock> {
    /// Creates a full controller driven by the standard clock.
    pub fn new(limit: RateLimit) -> Self {
        Self::with_clock(limit, StdClock::default())
    }
}

impl<C: Clock> Controller<C> {
    /// Creates a controller driven by `clock`. The bucket starts full.
    ///
    /// Use this when you need a specific timing source, such as `TokioClock`
    /// for async waits or `ManualClock` for testing.
    pub fn with_clock(limit: RateLimit, clock: C) -> Self {
        let zero_point = clock.now() - limit.fill_duration();
        Self {
            state: Mutex::new(State { limit, zero_point }),
            clock,
        }
    }

    /// Current time on the controller's clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Returns the current rate limit configuration.
    pub fn limit(&self) -> RateLimit {
        self.state.lock().limit
    }

    /// Changes the rate for future claims.
    ///
    /// The zero point is left untouched; claims already handed out keep the
    /// span they were granted.
    pub fn set_rate(&self, rate: f64) -> Result<(), InvalidConfiguration> {
        let rate = check_rate(rate)?;
        self.state.lock().limit.rate = rate;
        debug!(rate, "rate updated");
        Ok(())
    }

    /// Changes the capacity for future claims. See [`set_rate`](Self::set_rate).
    pub fn set_capacity(&self, capacity: f64) -> Result<(), InvalidConfiguration> {
        let capacity = check_capacity(capacity)?;
        self.state.lock().limit.capacity = capacity;
        debug!(capacity, "capacity updated");
        Ok(())
    }

    /// Replaces the rate and the capacity in one step.
    pub fn set_limit(&self, limit: RateLimit) {
        self.state.lock().limit = limit;
        debug!(?limit, "limit updated");
    }

    /// Tokens available to a new claim at time `t`, within `[0, capacity]`.
    ///
    /// This is an observation only; it never moves the zero point.
    pub fn tokens_at(&self, t: f64) -> f64 {
        self.balance_at(t).max(0.0)
    }

    /// Like [`tokens_at`](Self::tokens_at) but not clamped at zero. A negative
    /// balance means the timeline is already booked past `t`.
    pub fn balance_at(&self, t: f64) -> f64 {
        let state = self.state.lock();
        ((t - state.zero_point) * state.limit.rate).min(state.limit.capacity)
    }

    /// Tokens available right now.
    pub fn available(&self) -> f64 {
        self.tokens_at(self.now())
    }

    /// Shorthand for [`allow_n(1.0)`](Self::allow_n).
    pub fn allow(&self) -> bool {
        self.allow_n(1.0)
    }

    /// Reports whether `tokens` can be taken right now, and takes them if so.
    ///
    /// The claim is never cancelled: the action is deemed to happen
    /// immediately.
    pub fn allow_n(&self, tokens: f64) -> bool {
        self.reserve(self.now(), 0.0, tokens).is_ok()
    }

    /// Reserves `tokens` at the current time with no wait limit.
    pub fn reserve_now(&self, tokens: f64) -> Result<Claim<'_, C>, Error> {
        self.reserve(self.now(), INFINITE_WAIT, tokens)
    }

    /// Claims `tokens` at time `start`, accepting a wait of at most
    /// `wait_budget` seconds for them to become available.
    ///
    /// On success the returned [`Claim`] reports when the action may proceed
    /// via [`Claim::act_at`] and [`Claim::delay_from`].
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTime`] if `start` is not finite or `wait_budget` is
    ///   NaN
    /// * [`Error::InvalidAmount`] if `tokens` is negative or exceeds the
    ///   capacity
    /// * [`Error::NotReady`] if the tokens will not be available by
    ///   `start + wait_budget`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zeropoint::{Controller, ManualClock, RateLimit, INFINITE_WAIT};
    /// use std::num::NonZeroU32;
    /// use std::time::Duration;
    ///
    /// let limit = RateLimit::per_second(NonZeroU32::new(10).unwrap());
    /// let controller = Controller::with_clock(limit, ManualClock::new(0.0));
    ///
    /// // take the whole bucket
    /// let claim = controller.reserve(0.0, 0.0, 10.0).unwrap();
    /// assert_eq!(Duration::ZERO, claim.delay_from(0.0));
    ///
    /// // the next 5 tokens are half a second away
    /// let err = controller.reserve(0.0, 0.1, 5.0).unwrap_err();
    /// assert_eq!(Some(Duration::from_millis(500)), err.earliest_retry_after());
    ///
    /// let mut claim = controller.reserve(0.0, INFINITE_WAIT, 5.0).unwrap();
    /// assert_eq!(Duration::from_millis(500), claim.delay_from(0.0));
    /// // changed our mind: the span goes back to the controller
    /// claim.cancel_at(0.0);
    /// assert_eq!(0.0, controller.tokens_at(0.0));
    /// ```
    pub fn reserve(
        &self,
        start: f64,
        wait_budget: f64,
        tokens: f64,
    ) -> Result<Claim<'_, C>, Error> {
        let mut state = self.state.lock();
        let limit = state.limit;

        if unlikely(!start.is_finite() || wait_budget.is_nan()) {
            return Err(Error::InvalidTime { start, wait_budget });
        }
        // also rejects NaN
        if unlikely(!(0.0..=limit.capacity).contains(&tokens)) {
            return Err(Error::InvalidAmount {
                requested: tokens,
                capacity: limit.capacity,
            });
        }

        // idle time beyond a full refill is not bankable
        let fill = limit.fill_duration();
        if start - state.zero_point > fill {
            trace!(
                discarded = start - state.zero_point - fill,
                "discarding idle time beyond a full bucket"
            );
            state.zero_point = start - fill;
        }

        let span = limit.span_of(tokens);
        let ready = state.zero_point + span;
        if start + wait_budget < ready {
            return Err(Error::NotReady {
                required_wait: saturating_duration(ready - start),
            });
        }

        // when booked ahead (start < zero point) ready is already after start
        let act_at = ready.max(start);
        state.zero_point = ready;
        drop(state);

        trace!(tokens, act_at, "claim granted");
        Ok(Claim::new(self, tokens, span, act_at))
    }

    /// Pulls the zero point back by a cancelled claim's span.
    pub(crate) fn restore_span(&self, span: f64, tokens: f64) {
        self.state.lock().zero_point -= span;
        trace!(tokens, "claim cancelled, span restored");
    }

    #[cfg(test)]
    pub(crate) fn zero_point(&self) -> f64 {
        self.state.lock().zero_point
    }
}

#[cfg(feature = "async")]
impl<C: Clock> Controller<C> {
    /// Shorthand for [`wait_n(cancel, 1.0)`](Self::wait_n).
    pub async fn wait<F>(&self, cancel: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        self.wait_n(cancel, 1.0).await
    }

    /// Waits until `tokens` are available, or until `cancel` resolves.
    ///
    /// The tokens are claimed up front with an unbounded budget, so this never
    /// fails with [`Error::NotReady`]. If `cancel` resolves first the claim is
    /// cancelled before [`Error::Cancelled`] is returned, which leaves the
    /// bucket as if the wait had never happened. The same holds when the
    /// returned future is dropped mid-wait, e.g. by a timeout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zeropoint::{Controller, RateLimit};
    /// use std::num::NonZeroU32;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let limit = RateLimit::per_second(NonZeroU32::new(1000).unwrap());
    /// let controller = Controller::new(limit);
    /// let shutdown = std::future::pending::<()>();
    /// controller.wait_n(shutdown, 10.0).await.unwrap();
    /// # }
    /// ```
    pub async fn wait_n<F>(&self, cancel: F, tokens: f64) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        use futures::future::{Either, select};

        let mut cancel = std::pin::pin!(cancel);
        if futures::poll!(cancel.as_mut()).is_ready() {
            return Err(Error::Cancelled);
        }

        let claim = self.reserve(self.now(), INFINITE_WAIT, tokens)?;
        let delay = claim.delay_from(self.now());
        if delay.is_zero() {
            return Ok(());
        }

        // cancels the claim if this future is dropped before the sleep ends
        let guard = CancelOnDrop::new(claim);
        let sleep = std::pin::pin!(crate::futures::sleep(delay));
        match select(sleep, cancel).await {
            Either::Left(_) => {
                guard.commit();
                Ok(())
            }
            Either::Right(_) => {
                drop(guard);
                debug!(tokens, "wait cancelled");
                Err(Error::Cancelled)
            }
        }
    }
}
