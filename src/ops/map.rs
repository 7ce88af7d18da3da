use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::Subscription;

impl<T: Send + 'static> Flow<T> {
  /// Transforms every upstream value with `mapper`.
  ///
  /// Demand passes through one-to-one: the downstream subscriber talks
  /// directly to the upstream subscription.
  ///
  /// ```
  /// use rxflow::prelude::*;
  ///
  /// range(1, 3).map(|v| v * 10).subscribe_next(|v| println!("{v}"));
  /// // prints 10, 20, 30
  /// ```
  pub fn map<R, F>(self, mapper: F) -> Flow<R>
  where
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
  {
    self.try_map(move |value| Ok(mapper(value)))
  }

  /// The fallible sibling of [`map`](Flow::map): a mapper returning `Err`
  /// cancels the upstream and delivers the error downstream.
  pub fn try_map<R, F>(self, mapper: F) -> Flow<R>
  where
    R: Send + 'static,
    F: Fn(T) -> Result<R, FlowError> + Send + Sync + 'static,
  {
    let mapper = Arc::new(mapper);
    self.lift(move |downstream: BoxSubscriber<R>| {
      Box::new(MapSubscriber {
        downstream,
        mapper: mapper.clone(),
        upstream: None,
        done: false,
      })
    })
  }
}

struct MapSubscriber<R, F> {
  downstream: BoxSubscriber<R>,
  mapper: Arc<F>,
  upstream: Option<Arc<dyn Subscription>>,
  done: bool,
}

impl<T, R, F> Subscriber<T> for MapSubscriber<R, F>
where
  R: Send + 'static,
  F: Fn(T) -> Result<R, FlowError> + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
  }

  fn on_next(&mut self, value: T) {
    if self.done {
      return;
    }
    match (self.mapper)(value) {
      Ok(mapped) => self.downstream.on_next(mapped),
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
  use crate::source::{from_iter, range};
  use crate::test_support::Recording;
  use crate::FlowError;
  use std::sync::{Arc, Mutex};

  #[test]
  fn maps_every_value() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    range(1, 3)
      .map(|v| v * 2)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
  }

  #[test]
  fn maps_compose() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(vec![1, 2])
      .map(|v| v + 1)
      .map(|v| v * 10)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![20, 30]);
  }

  #[test]
  fn try_map_failure_stops_the_stream() {
    let seen = Arc::new(Mutex::new(vec![]));
    let errors = Arc::new(Mutex::new(vec![]));

    range(1, 5)
      .try_map(|v| {
        if v == 3 {
          Err(FlowError::message("three is right out"))
        } else {
          Ok(v)
        }
      })
      .subscribe(Recording::new(seen.clone(), errors.clone()));

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(
      *errors.lock().unwrap(),
      vec![String::from("three is right out")]
    );
  }
}
