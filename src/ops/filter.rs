use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::Subscription;

impl<T: Send + 'static> Flow<T> {
  /// Forwards only the values `predicate` accepts.
  ///
  /// A rejected value still consumed one unit of upstream demand, so the
  /// operator requests one replacement to keep downstream demand whole.
  pub fn filter<P>(self, predicate: P) -> Flow<T>
  where
    P: Fn(&T) -> bool + Send + Sync + 'static,
  {
    self.try_filter(move |value| Ok(predicate(value)))
  }

  /// The fallible sibling of [`filter`](Flow::filter): a predicate
  /// returning `Err` cancels the upstream and delivers the error
  /// downstream.
  pub fn try_filter<P>(self, predicate: P) -> Flow<T>
  where
    P: Fn(&T) -> Result<bool, FlowError> + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    self.lift(move |downstream: BoxSubscriber<T>| {
      Box::new(FilterSubscriber {
        downstream,
        predicate: predicate.clone(),
        upstream: None,
        done: false,
      })
    })
  }
}

struct FilterSubscriber<T, P> {
  downstream: BoxSubscriber<T>,
  predicate: Arc<P>,
  upstream: Option<Arc<dyn Subscription>>,
  done: bool,
}

impl<T, P> Subscriber<T> for FilterSubscriber<T, P>
where
  T: Send + 'static,
  P: Fn(&T) -> Result<bool, FlowError> + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
  }

  fn on_next(&mut self, value: T) {
    if self.done {
      return;
    }
    match (self.predicate)(&value) {
      Ok(true) => self.downstream.on_next(value),
      Ok(false) => {
        if let Some(upstream) = self.upstream.as_ref() {
          upstream.request(1);
        }
      }
      Err(error) => {
        self.done = true;
        if let Some(upstream) = self.upstream.take() {
          upstream.cancel();
        }
        self.downstream.on_error(error);
      }
    }
  }

  fn on_error(&mut self, error: FlowError) {
    if self.done {
      return;
    }
    self.done = true;
    self.downstream.on_error(error);
  }

  fn on_complete(&mut self) {
    if self.done {
      return;
    }
    self.done = true;
    self.downstream.on_complete();
  }
}

#[cfg(test)]
mod test {
  use crate::source::range;
  use crate::test_support::Recording;
  use crate::FlowError;
  use std::sync::{Arc, Mutex};

  #[test]
  fn keeps_matching_values() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    range(0, 10)
      .filter(|v| v % 2 == 0)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![0, 2, 4, 6, 8]);
  }

  #[test]
  fn filters_compose_like_conjunction() {
    let both = Arc::new(Mutex::new(vec![]));
    let sink = both.clone();
    range(0, 20)
      .filter(|v| v % 2 == 0)
      .filter(|v| v % 3 == 0)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));

    let conjunction = Arc::new(Mutex::new(vec![]));
    let sink = conjunction.clone();
    range(0, 20)
      .filter(|v| v % 2 == 0 && v % 3 == 0)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));

    assert_eq!(*both.lock().unwrap(), *conjunction.lock().unwrap());
  }

  #[test]
  fn predicate_failure_stops_the_stream() {
    let seen = Arc::new(Mutex::new(vec![]));
    let errors = Arc::new(Mutex::new(vec![]));

    range(0, 5)
      .try_filter(|v| {
        if *v < 2 {
          Ok(true)
        } else {
          Err(FlowError::message("bad value"))
        }
      })
      .subscribe(Recording::new(seen.clone(), errors.clone()));

    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    assert_eq!(*errors.lock().unwrap(), vec![String::from("bad value")]);
  }
}
