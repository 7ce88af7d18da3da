//! Push-based data pipelines with backpressure.
//!
//! A [`Flow`] is a cold source of values behind the four-signal
//! subscription protocol: a subscriber receives `on_subscribe` exactly
//! once, then at most as many `on_next` signals as it requested, then at
//! most one of `on_error` or `on_complete`. Demand flows upstream through
//! [`Subscription::request`], values flow back down, and `cancel` severs
//! the chain from any thread.
//!
//! ```
//! use rxflow::prelude::*;
//!
//! range(1, 5)
//!   .map(|v| v * 2)
//!   .filter(|v| *v > 4)
//!   .subscribe_next(|v| println!("{v}"));
//! // prints 6, 8, 10
//! ```
//!
//! Sources live in [`source`], operators are methods on [`Flow`], and the
//! process-wide hooks and the default prefetch live in [`plugins`].

pub mod error;
pub mod flow;
pub mod ops;
pub mod plugins;
pub mod source;
pub mod subscriber;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::FlowError;
pub use flow::{Flow, Publisher};
pub use subscriber::{BoxSubscriber, SafeSubscriber, Subscriber};
pub use subscription::{Subscription, UNBOUNDED};

pub mod prelude {
  pub use crate::error::FlowError;
  pub use crate::flow::{Flow, Publisher};
  pub use crate::ops::{merge, merge_delay_error};
  pub use crate::plugins::{self, buffer_size};
  pub use crate::source::{
    defer, empty, error, error_with, from_array, from_callable, from_future,
    from_future_result, from_iter, from_stream, just, never, range,
  };
  pub use crate::subscriber::{BoxSubscriber, SafeSubscriber, Subscriber};
  pub use crate::subscription::{
    DeferredSubscription, EmptySubscription, Subscription, UNBOUNDED,
  };
}
