use std::sync::Arc;

use crate::error::FlowError;
use crate::plugins;
use crate::subscription::{EmptySubscription, Subscription};

/// A consumer of the values delivered by a flow, one method per signal:
/// `on_subscribe`, `on_next`, `on_error` and `on_complete`.
///
/// The protocol a well-behaved upstream follows:
/// - `on_subscribe` is delivered exactly once, before any other signal;
/// - `on_next` is delivered at most as often as demand was requested;
/// - `on_error` and `on_complete` are terminal and mutually exclusive;
/// - nothing is delivered after a terminal signal or after `cancel`.
///
/// `subscribe` hands signals through raw; [`Flow::safe_subscribe`] guards a
/// subscriber against upstreams that break the rules.
///
/// [`Flow::safe_subscribe`]: crate::flow::Flow::safe_subscribe
pub trait Subscriber<Item>: Send {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

  fn on_next(&mut self, value: Item);

  fn on_error(&mut self, error: FlowError);

  fn on_complete(&mut self);
}

/// The boxed form every operator chain is built from.
pub type BoxSubscriber<Item> = Box<dyn Subscriber<Item>>;

impl<Item, S> Subscriber<Item> for Box<S>
where
  S: Subscriber<Item> + ?Sized,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    (**self).on_subscribe(subscription);
  }

  #[inline]
  fn on_next(&mut self, value: Item) {
    (**self).on_next(value);
  }

  #[inline]
  fn on_error(&mut self, error: FlowError) {
    (**self).on_error(error);
  }

  #[inline]
  fn on_complete(&mut self) {
    (**self).on_complete();
  }
}

/// Enforces signal ordering and terminal idempotence around a subscriber.
///
/// A duplicate `on_subscribe` is cancelled and reported to the plugin error
/// hook. A signal arriving before `on_subscribe` is a protocol violation:
/// the inner subscriber is given an empty subscription and then the
/// violation (or the original terminal) is delivered. Signals after a
/// terminal are dropped; dropped errors go to the plugin error hook so they
/// are not lost silently.
pub struct SafeSubscriber<Item> {
  inner: Option<BoxSubscriber<Item>>,
  subscribed: bool,
}

impl<Item> SafeSubscriber<Item> {
  pub fn new(inner: BoxSubscriber<Item>) -> Self {
    SafeSubscriber { inner: Some(inner), subscribed: false }
  }

  fn take_ready(&mut self) -> Option<BoxSubscriber<Item>> {
    let mut inner = self.inner.take()?;
    if !self.subscribed {
      self.subscribed = true;
      inner.on_subscribe(EmptySubscription::arc());
    }
    Some(inner)
  }
}

impl<Item: Send> Subscriber<Item> for SafeSubscriber<Item> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    if self.subscribed || self.inner.is_none() {
      subscription.cancel();
      plugins::on_error_dropped(&FlowError::constraint(
        "on_subscribe delivered more than once",
      ));
      return;
    }
    self.subscribed = true;
    if let Some(inner) = self.inner.as_mut() {
      inner.on_subscribe(subscription);
    }
  }

  fn on_next(&mut self, value: Item) {
    if !self.subscribed {
      if let Some(mut inner) = self.take_ready() {
        inner.on_error(FlowError::constraint(
          "on_next delivered before on_subscribe",
        ));
      }
      return;
    }
    if let Some(inner) = self.inner.as_mut() {
      inner.on_next(value);
    }
  }

  fn on_error(&mut self, error: FlowError) {
    match self.take_ready() {
      Some(mut inner) => inner.on_error(error),
      None => plugins::on_error_dropped(&error),
    }
  }

  fn on_complete(&mut self) {
    if let Some(mut inner) = self.take_ready() {
      inner.on_complete();
    }
  }
}
