#![doc = include_str!("../README.md")]
//!
//! # Core Components
//!
//! - [`Controller`] - The admission controller: token arithmetic, reservations and waits
//! - [`Claim`] - A cancellable hold on future tokens returned by [`Controller::reserve`]
//! - [`RateLimit`] - Configuration for rate and burst capacity
//! - [`Clock`] trait and implementations for time sources
//!
//! # Quick Start
//!
//! ```rust
//! use std::num::NonZeroU32;
//!
//! use zeropoint::{Controller, RateLimit};
//!
//! // 10 tokens per second, burst of 20
//! let limit = RateLimit::per_second_and_burst(
//!     NonZeroU32::new(10).unwrap(),
//!     NonZeroU32::new(20).unwrap()
//! );
//!
//! let controller = Controller::new(limit);
//!
//! if controller.allow_n(5.0) {
//!     println!("admitted");
//! }
//! ```

mod claim;
mod clock;
mod controller;
mod error;
#[cfg(feature = "async")]
pub mod futures;
mod limit;

pub use claim::Claim;
#[cfg(feature = "tokio")]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, StdClock};
#[cfg(feature = "quanta")]
pub use clock::{FastClock, QuantaClock};
pub use controller::{Controller, INFINITE_WAIT};
pub use error::*;
#[cfg(feature = "async")]
pub use self::futures::RateLimitedStreamExt;
pub use limit::RateLimit;
