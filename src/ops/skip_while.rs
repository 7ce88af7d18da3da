use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::Subscription;

impl<T: Send + 'static> Flow<T> {
  /// Drops values while `predicate` holds; from the first miss on,
  /// everything passes through without the predicate being consulted
  /// again.
  pub fn skip_while<P>(self, predicate: P) -> Flow<T>
  where
    P: Fn(&T) -> bool + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    self.lift(move |downstream: BoxSubscriber<T>| {
      Box::new(SkipWhileSubscriber {
        downstream,
        predicate: predicate.clone(),
        upstream: None,
        skipping: true,
      })
    })
  }
}

struct SkipWhileSubscriber<T, P> {
  downstream: BoxSubscriber<T>,
  predicate: Arc<P>,
  upstream: Option<Arc<dyn Subscription>>,
  skipping: bool,
}

impl<T, P> Subscriber<T> for SkipWhileSubscriber<T, P>
where
  T: Send + 'static,
  P: Fn(&T) -> bool + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
  }

  fn on_next(&mut self, value: T) {
    if self.skipping {
      if (self.predicate)(&value) {
        // The dropped value consumed demand; replace it.
        if let Some(upstream) = self.upstream.as_ref() {
          upstream.request(1);
        }
        return;
      }
      self.skipping = false;
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

#[cfg(test)]
mod test {
  use crate::source::from_iter;
  use std::sync::{Arc, Mutex};

  #[test]
  fn opens_permanently_on_first_miss() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(vec![1, 2, 5, 1, 2])
      .skip_while(|v| *v < 3)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    // 1 and 2 after the 5 pass even though the predicate would hold.
    assert_eq!(*seen.lock().unwrap(), vec![5, 1, 2]);
  }

  #[test]
  fn all_skipped_completes_empty() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(1..=4)
      .skip_while(|_| true)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert!(seen.lock().unwrap().is_empty());
  }
}
