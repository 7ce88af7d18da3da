use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::Subscription;

impl<T: Send + 'static> Flow<T> {
  /// Forwards the first `count` values, then cancels the upstream and
  /// completes. `take(0)` is [`empty`](crate::source::empty); a shorter
  /// upstream just completes early.
  pub fn take(self, count: u64) -> Flow<T> {
    if count == 0 {
      return crate::source::empty();
    }
    self.lift(move |downstream: BoxSubscriber<T>| {
      Box::new(TakeSubscriber {
        downstream: Some(downstream),
        upstream: None,
        remaining: count,
      })
    })
  }
}

struct TakeSubscriber<T> {
  downstream: Option<BoxSubscriber<T>>,
  upstream: Option<Arc<dyn Subscription>>,
  remaining: u64,
}

impl<T: Send + 'static> Subscriber<T> for TakeSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.upstream = Some(subscription.clone());
    if let Some(downstream) = self.downstream.as_mut() {
      downstream.on_subscribe(subscription);
    }
  }

  fn on_next(&mut self, value: T) {
    // Upstream signals after the cutoff are suppressed.
    let Some(downstream) = self.downstream.as_mut() else { return };
    downstream.on_next(value);
    self.remaining -= 1;
    if self.remaining == 0 {
      if let Some(upstream) = self.upstream.take() {
        upstream.cancel();
      }
      if let Some(mut downstream) = self.downstream.take() {
        downstream.on_complete();
      }
    }
  }

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

#[cfg(test)]
mod test {
  use crate::source::from_iter;
  use crate::test_support::Recording;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::{Arc, Mutex};

  #[test]
  fn stops_after_count() {
    let seen = Arc::new(Mutex::new(vec![]));
    let completed = Arc::new(AtomicBool::new(false));
    from_iter(1..=5).take(3).subscribe(
      Recording::new(seen.clone(), Arc::new(Mutex::new(vec![])))
        .with_completed(completed.clone()),
    );
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert!(completed.load(Ordering::SeqCst));
  }

  #[test]
  fn larger_count_than_source_is_fine() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(vec![1, 2, 3])
      .take(10)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn takes_chain() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(1..=10)
      .take(5)
      .take(2)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
  }

  #[test]
  fn zero_is_empty() {
    let seen = Arc::new(Mutex::new(vec![]));
    let completed = Arc::new(AtomicBool::new(false));
    from_iter(1..=5).take(0).subscribe(
      Recording::new(seen.clone(), Arc::new(Mutex::new(vec![])))
        .with_completed(completed.clone()),
    );
    assert!(seen.lock().unwrap().is_empty());
    assert!(completed.load(Ordering::SeqCst));
  }
}
