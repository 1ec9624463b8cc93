mod stream;

pub use stream::RateLimitedStream;

#[cfg(feature = "tokio-hrtime")]
pub(crate) use tokio_hrtime::{Sleep, sleep};

#[cfg(not(feature = "tokio-hrtime"))]
pub(crate) use tokio::time::{Sleep, sleep};

use std::sync::Arc;

use futures::Stream;

use crate::{Clock, Controller};

/// Extension trait that rate limits any [`Stream`] through a [`Controller`].
///
/// Pass the controller by value to give the stream its own budget, or an
/// `Arc<Controller<_>>` to share one.
pub trait RateLimitedStreamExt: Stream + Sized {
    /// Each item costs one token.
    fn rate_limit<C: Clock>(
        self,
        controller: impl Into<Arc<Controller<C>>>,
    ) -> RateLimitedStream<Self, C, fn(&Self::Item) -> f64>;

    /// Each item costs `weight_fn(&item)` tokens.
    fn rate_limit_weighted<C, F>(
        self,
        controller: impl Into<Arc<Controller<C>>>,
        weight_fn: F,
    ) -> RateLimitedStream<Self, C, F>
    where
        C: Clock,
        F: FnMut(&Self::Item) -> f64;
}

impl<S: Stream> RateLimitedStreamExt for S {
    fn rate_limit<C: Clock>(
        self,
        controller: impl Into<Arc<Controller<C>>>,
    ) -> RateLimitedStream<Self, C, fn(&Self::Item) -> f64> {
        RateLimitedStream::new(self, controller, unit_weight::<S::Item>)
    }

    fn rate_limit_weighted<C, F>(
        self,
        controller: impl Into<Arc<Controller<C>>>,
        weight_fn: F,
    ) -> RateLimitedStream<Self, C, F>
    where
        C: Clock,
        F: FnMut(&Self::Item) -> f64,
    {
        RateLimitedStream::new(self, controller, weight_fn)
    }
}

fn unit_weight<T>(_: &T) -> f64 {
    1.0
}
