use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::Subscription;

impl<T: Send + 'static> Flow<T> {
  /// Drops the first `count` values, then passes everything through.
  /// `skip(0)` is the identity.
  ///
  /// The operator requests `count` extra values up front so the dropped
  /// prefix does not eat into downstream demand.
  pub fn skip(self, count: u64) -> Flow<T> {
    if count == 0 {
      return self;
    }
    self.lift(move |downstream: BoxSubscriber<T>| {
      Box::new(SkipSubscriber { downstream, remaining: count })
    })
  }
}

struct SkipSubscriber<T> {
  downstream: BoxSubscriber<T>,
  remaining: u64,
}

impl<T: Send + 'static> Subscriber<T> for SkipSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.downstream.on_subscribe(subscription.clone());
    subscription.request(self.remaining);
  }

  fn on_next(&mut self, value: T) {
    if self.remaining > 0 {
      self.remaining -= 1;
      return;
    }
    self.downstream.on_next(value);
  }

  fn on_error(&mut self, error: FlowError) {
    self.downstream.on_error(error);
  }

  fn on_complete(&mut self) {
    self.downstream.on_complete();
  }
}
