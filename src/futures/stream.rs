use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project_lite::pin_project;

use super::{Sleep, sleep};
use crate::claim::Booking;
use crate::error::Error;
use crate::{Clock, Controller, INFINITE_WAIT, RateLimit};

pin_project! {
    /// A stream wrapper that admits items through a [`Controller`].
    ///
    /// Every item claims `weight_fn(&item)` tokens with an unbounded wait
    /// budget and is held back until its claim's act time has passed. Items
    /// whose weight can never be granted (negative, or above the capacity)
    /// are yielded as [`Error::InvalidAmount`] without waiting.
    ///
    /// The controller is held behind an [`Arc`], so several streams (or a
    /// stream and direct callers) can share one budget. Dropping the stream
    /// while an item is still held back hands that item's tokens back.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zeropoint::futures::RateLimitedStream;
    /// use zeropoint::{Controller, RateLimit, TokioClock};
    /// use futures::stream;
    /// use std::num::NonZeroU32;
    ///
    /// let limit = RateLimit::per_second_and_burst(NonZeroU32::new(10).unwrap(), NonZeroU32::new(10).unwrap());
    /// let controller = Controller::with_clock(limit, TokioClock::default());
    ///
    /// let stream = stream::iter(vec!["small", "large", "medium"]);
    /// let weighted = RateLimitedStream::new(stream, controller, |item: &&str| item.len() as f64);
    /// ```
    pub struct RateLimitedStream<S, C, F>
    where
        S: Stream,
        C: Clock,
    {
        #[pin]
        stream: S,
        controller: Arc<Controller<C>>,
        weight_fn: F,
        #[pin]
        delay: Option<Sleep>,
        pending_item: Option<S::Item>,
        // the booked span of `pending_item`, released if we are dropped first
        pending_booking: Option<Booking>,
    }

    impl<S, C, F> PinnedDrop for RateLimitedStream<S, C, F>
    where
        S: Stream,
        C: Clock,
    {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(booking) = this.pending_booking.take() {
                booking.release(&**this.controller, this.controller.now());
            }
        }
    }
}

impl<S, C, F> RateLimitedStream<S, C, F>
where
    S: Stream,
    C: Clock,
    F: FnMut(&S::Item) -> f64,
{
    /// Creates a new rate-limited stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - The underlying stream to rate limit
    /// * `controller` - The controller that admits items, owned or shared
    /// * `weight_fn` - How many tokens each item costs
    pub fn new(stream: S, controller: impl Into<Arc<Controller<C>>>, weight_fn: F) -> Self {
        Self {
            stream,
            controller: controller.into(),
            weight_fn,
            delay: None,
            pending_item: None,
            pending_booking: None,
        }
    }

    /// Returns the current rate limit.
    pub fn limit(&self) -> RateLimit {
        self.controller.limit()
    }

    /// Tokens available right now.
    pub fn available(&self) -> f64 {
        self.controller.available()
    }

    /// The controller admitting this stream's items.
    pub fn controller(&self) -> &Controller<C> {
        &self.controller
    }
}

impl<S, C, F> Stream for RateLimitedStream<S, C, F>
where
    S: Stream,
    C: Clock,
    F: FnMut(&S::Item) -> f64,
{
    type Item = Result<S::Item, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.pending_item.is_none() {
            let Some(item) = ready!(this.stream.poll_next(cx)) else {
                return Poll::Ready(None);
            };

            let weight = (this.weight_fn)(&item);
            let now = this.controller.now();
            let booking = match this.controller.reserve(now, INFINITE_WAIT, weight) {
                Ok(claim) => claim.into_booking(),
                Err(err) => return Poll::Ready(Some(Err(err))),
            };
            let delay = booking.delay_from(now);
            if delay.is_zero() {
                return Poll::Ready(Some(Ok(item)));
            }
            *this.pending_item = Some(item);
            *this.pending_booking = Some(booking);
            this.delay.set(Some(sleep(delay)));
        }

        if let Some(delay) = this.delay.as_mut().as_pin_mut() {
            ready!(delay.poll(cx));
            this.delay.set(None);
        }
        // yielding the item commits its claim
        this.pending_booking.take();
        Poll::Ready(this.pending_item.take().map(Ok))
    }
}
