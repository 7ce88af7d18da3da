use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::Subscription;

impl<T: Send + 'static> Flow<T> {
  /// Suppresses the last `count` values: a sliding window delays every
  /// value by `count` positions and the window contents are discarded at
  /// completion. `skip_last(0)` is the identity.
  pub fn skip_last(self, count: usize) -> Flow<T> {
    if count == 0 {
      return self;
    }
    self.lift(move |downstream: BoxSubscriber<T>| {
      Box::new(SkipLastSubscriber {
        downstream,
        window: VecDeque::with_capacity(count + 1),
        count,
      })
    })
  }
}

struct SkipLastSubscriber<T> {
  downstream: BoxSubscriber<T>,
  window: VecDeque<T>,
  count: usize,
}

impl<T: Send + 'static> Subscriber<T> for SkipLastSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.downstream.on_subscribe(subscription.clone());
    // Prime the window so the delayed values do not starve downstream
    // demand.
    subscription.request(self.count as u64);
  }

  fn on_next(&mut self, value: T) {
    self.window.push_back(value);
    if self.window.len() > self.count {
      if let Some(evicted) = self.window.pop_front() {
        self.downstream.on_next(evicted);
      }
    }
  }

  fn on_error(&mut self, error: FlowError) {
    self.window.clear();
    self.downstream.on_error(error);
  }

  fn on_complete(&mut self) {
    self.window.clear();
    self.downstream.on_complete();
  }
}
