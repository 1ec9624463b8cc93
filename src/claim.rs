use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::Clock;
use crate::controller::Controller;
use crate::error::saturating_duration;

/// A provisional hold on a block of future tokens, handed out by
/// [`Controller::reserve`].
///
/// The claim occupies a span of the controller's timeline, `tokens / rate`
/// seconds long. Dropping the claim commits it; [`cancel_at`](Self::cancel_at)
/// before [`act_at`](Self::act_at) hands the span back so that the timeline
/// looks as if the claim had never been made.
pub struct Claim<'a, C: Clock> {
    controller: &'a Controller<C>,
    booking: Booking,
    cancelled: bool,
}

/// The part of a claim that outlives a borrow of its controller: enough to
/// hand the span back later.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Booking {
    tokens: f64,
    // the timeline length this claim pushed the zero point by
    span: f64,
    act_at: f64,
}

impl Booking {
    pub(crate) fn delay_from(&self, t: f64) -> Duration {
        saturating_duration(self.act_at - t)
    }

    /// Gives the span back unless `t` is past the act time.
    pub(crate) fn release<C: Clock>(&self, controller: &Controller<C>, t: f64) {
        if t <= self.act_at {
            controller.restore_span(self.span, self.tokens);
        }
    }
}

impl<'a, C: Clock> Claim<'a, C> {
    pub(crate) fn new(controller: &'a Controller<C>, tokens: f64, span: f64, act_at: f64) -> Self {
        Self {
            controller,
            booking: Booking {
                tokens,
                span,
                act_at,
            },
            cancelled: false,
        }
    }

    /// Number of tokens held by this claim.
    pub fn tokens(&self) -> f64 {
        self.booking.tokens
    }

    /// The instant, on the controller's clock, at or after which the action
    /// may proceed.
    pub fn act_at(&self) -> f64 {
        self.booking.act_at
    }

    /// Whether [`cancel`](Self::cancel) or [`cancel_at`](Self::cancel_at)
    /// has been called, including late cancellations that returned nothing.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// How long the holder must wait, starting at `t`, before acting. Zero
    /// means act immediately.
    pub fn delay_from(&self, t: f64) -> Duration {
        self.booking.delay_from(t)
    }

    /// Shorthand for [`cancel_at`](Self::cancel_at) with the controller's
    /// current time.
    pub fn cancel(&mut self) {
        let now = self.controller.now();
        self.cancel_at(now);
    }

    /// Cancels the claim at time `t` and gives its span back to the
    /// controller.
    ///
    /// If `t` is after [`act_at`](Self::act_at) the action is deemed to have
    /// happened already; the claim is marked cancelled but nothing is
    /// returned. Cancelling twice is the same as cancelling once.
    pub fn cancel_at(&mut self, t: f64) {
        if self.cancelled {
            return;
        }
        self.booking.release(self.controller, t);
        self.cancelled = true;
    }

    /// Detaches the claim from its controller borrow. The span stays booked.
    pub(crate) fn into_booking(self) -> Booking {
        self.booking
    }
}

impl<C: Clock> Debug for Claim<'_, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claim")
            .field("tokens", &self.booking.tokens)
            .field("act_at", &self.booking.act_at)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// Cancels the wrapped claim when dropped, unless it was committed first.
///
/// Keeps a waiter that is dropped mid-wait (timeout, `select!`, task abort)
/// from leaving its span booked.
pub(crate) struct CancelOnDrop<'a, C: Clock>(Option<Claim<'a, C>>);

impl<'a, C: Clock> CancelOnDrop<'a, C> {
    pub(crate) fn new(claim: Claim<'a, C>) -> Self {
        Self(Some(claim))
    }

    /// Keeps the claim: the action is going ahead.
    pub(crate) fn commit(mut self) {
        self.0.take();
    }
}

impl<C: Clock> Drop for CancelOnDrop<'_, C> {
    fn drop(&mut self) {
        if let Some(mut claim) = self.0.take() {
            claim.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nonzero_ext::nonzero;

    use crate::{INFINITE_WAIT, ManualClock, RateLimit};

    use super::*;

    fn controller(clock: &Arc<ManualClock>) -> Controller<Arc<ManualClock>> {
        let limit = RateLimit::per_second_and_burst(nonzero!(10u32), nonzero!(20u32));
        Controller::with_clock(limit, Arc::clone(clock))
    }

    #[test]
    fn delay_from() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        // drain the bucket, then ask for 5 more: ready half a second out
        let _drain = c.reserve(0.0, 0.0, 20.0).unwrap();
        let claim = c.reserve(0.0, INFINITE_WAIT, 5.0).unwrap();
        assert_eq!(0.5, claim.act_at());
        assert_eq!(5.0, claim.tokens());
        assert_eq!(Duration::from_millis(500), claim.delay_from(0.0));
        assert_eq!(Duration::from_millis(250), claim.delay_from(0.25));
        assert_eq!(Duration::ZERO, claim.delay_from(0.5));
        assert_eq!(Duration::ZERO, claim.delay_from(3.0));
    }

    #[test]
    fn cancel_is_idempotent() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        let zero_point = c.zero_point();
        let mut claim = c.reserve(0.0, 0.0, 8.0).unwrap();
        assert!(!claim.is_cancelled());
        assert_eq!(zero_point + 0.8, c.zero_point());

        claim.cancel();
        assert!(claim.is_cancelled());
        assert_eq!(zero_point, c.zero_point());
        // a second cancellation must not hand the span back again
        claim.cancel();
        claim.cancel_at(0.0);
        assert!(claim.is_cancelled());
        assert_eq!(zero_point, c.zero_point());
    }

    #[test]
    fn late_cancel_is_a_noop() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        let mut claim = c.reserve(0.0, 0.0, 5.0).unwrap();
        assert_eq!(0.0, claim.act_at());
        let zero_point = c.zero_point();

        clock.set(1.0);
        claim.cancel();
        assert!(claim.is_cancelled());
        assert_eq!(zero_point, c.zero_point());
    }

    #[test]
    fn cancel_exactly_at_act_time_restores() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        let _drain = c.reserve(0.0, 0.0, 20.0).unwrap();
        let zero_point = c.zero_point();
        let mut claim = c.reserve(0.0, INFINITE_WAIT, 10.0).unwrap();
        assert_eq!(1.0, claim.act_at());
        claim.cancel_at(1.0);
        assert_eq!(zero_point, c.zero_point());
    }

    #[test]
    fn debug_format() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        let claim = c.reserve(0.0, 0.0, 1.0).unwrap();
        assert_eq!(
            "Claim { tokens: 1.0, act_at: 0.0, cancelled: false }",
            format!("{claim:?}")
        );
    }

    #[test]
    fn guard_cancels_unless_committed() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        let _drain = c.reserve(0.0, 0.0, 20.0).unwrap();
        let drained = c.zero_point();

        let guard = CancelOnDrop::new(c.reserve(0.0, INFINITE_WAIT, 5.0).unwrap());
        assert_eq!(drained + 0.5, c.zero_point());
        drop(guard);
        assert_eq!(drained, c.zero_point());

        let guard = CancelOnDrop::new(c.reserve(0.0, INFINITE_WAIT, 5.0).unwrap());
        guard.commit();
        assert_eq!(drained + 0.5, c.zero_point());
    }

    #[test]
    fn detached_booking_releases_until_act_time() {
        let clock = Arc::new(ManualClock::default());
        let c = controller(&clock);
        let _drain = c.reserve(0.0, 0.0, 20.0).unwrap();
        let drained = c.zero_point();

        let booking = c.reserve(0.0, INFINITE_WAIT, 10.0).unwrap().into_booking();
        assert_eq!(Duration::from_secs(1), booking.delay_from(0.0));
        // past the act time the tokens count as spent
        booking.release(&c, 1.5);
        assert_eq!(drained + 1.0, c.zero_point());
        booking.release(&c, 0.5);
        assert_eq!(drained, c.zero_point());
    }
}
