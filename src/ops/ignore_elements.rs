use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::{Subscription, UNBOUNDED};

impl<T: Send + 'static> Flow<T> {
  /// Drops every value and forwards only the terminal signal.
  ///
  /// Since no value ever reaches downstream, the operator requests
  /// unbounded demand from upstream on subscribe and discards downstream
  /// requests (after validating them).
  pub fn ignore_elements(self) -> Flow<T> {
    self.lift(|downstream: BoxSubscriber<T>| {
      Box::new(IgnoreElementsSubscriber { downstream: Some(downstream) })
    })
  }
}

struct IgnoreElementsSubscriber<T> {
  downstream: Option<BoxSubscriber<T>>,
}

impl<T: Send + 'static> Subscriber<T> for IgnoreElementsSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    if let Some(downstream) = self.downstream.as_mut() {
      downstream.on_subscribe(Arc::new(IgnoreElementsSubscription {
        upstream: subscription.clone(),
      }));
    }
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, _: T) {}

  fn on_error(&mut self, error: FlowError) {
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_error(error);
    }
  }

  fn on_complete(&mut self) {
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_complete();
    }
  }
}

struct IgnoreElementsSubscription {
  upstream: Arc<dyn Subscription>,
}

impl Subscription for IgnoreElementsSubscription {
  fn request(&self, n: u64) {
    if n == 0 {
      // Let the upstream raise the violation; it flows back down through
      // the terminal-only subscriber.
      self.upstream.request(0);
    }
    // Positive demand is meaningless here: nothing will ever be emitted.
  }

  fn cancel(&self) {
    self.upstream.cancel();
  }
}
