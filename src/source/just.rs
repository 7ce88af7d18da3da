use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::flow::Flow;
use crate::plugins;
use crate::subscriber::BoxSubscriber;
use crate::subscription::{bad_request_error, Subscription};

/// Creates a flow emitting a single value, then completing.
///
/// The value is cloned per subscription (a cold source produces
/// independently for every subscriber) and withheld until the first
/// positive request. `flat_map` recognizes flows built here and emits
/// their value directly instead of running a full inner subscription.
pub fn just<T>(value: T) -> Flow<T>
where
  T: Clone + Send + Sync + 'static,
{
  let scalar = value.clone();
  let subscribe_fn = Arc::new(move |mut subscriber: BoxSubscriber<T>| {
    let subscription = Arc::new(ScalarSubscription {
      value: Mutex::new(Some(value.clone())),
      downstream: Mutex::new(None),
      requested: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
      violated: AtomicBool::new(false),
    });
    subscriber.on_subscribe(subscription.clone() as Arc<dyn Subscription>);
    subscription.install(subscriber);
  });
  Flow::assemble(subscribe_fn, Some(Arc::new(move || scalar.clone())))
}

/// One value, one emission: `request` flips `requested` once and whoever
/// observes both the flag and an installed subscriber performs the
/// emission. The downstream slot is emptied before the signals are
/// delivered, so no lock is held across user callbacks and a reentrant
/// `request` from `on_next` finds the flag already set.
pub(crate) struct ScalarSubscription<T> {
  value: Mutex<Option<T>>,
  downstream: Mutex<Option<BoxSubscriber<T>>>,
  requested: AtomicBool,
  cancelled: AtomicBool,
  violated: AtomicBool,
}

impl<T: Send + 'static> ScalarSubscription<T> {
  pub(crate) fn install(&self, subscriber: BoxSubscriber<T>) {
    *self.downstream.lock() = Some(subscriber);
    if self.requested.load(Ordering::Acquire) {
      self.try_emit();
    }
  }

  fn try_emit(&self) {
    if self.cancelled.load(Ordering::Acquire) {
      self.downstream.lock().take();
      self.value.lock().take();
      return;
    }
    let taken = self.downstream.lock().take();
    let Some(mut subscriber) = taken else { return };
    if self.violated.load(Ordering::Acquire) {
      self.value.lock().take();
      subscriber.on_error(bad_request_error());
      return;
    }
    let value = self.value.lock().take();
    if let Some(value) = value {
      subscriber.on_next(value);
      if !self.cancelled.load(Ordering::Acquire) {
        subscriber.on_complete();
      }
    }
  }
}

impl<T: Send + 'static> Subscription for ScalarSubscription<T> {
  fn request(&self, n: u64) {
    if n == 0 {
      self.violated.store(true, Ordering::Release);
    }
    if self.requested.swap(true, Ordering::AcqRel) {
      if n == 0 {
        // Demand was already granted, so the emission (and with it the
        // terminal signal) may be gone; report instead of double-signal.
        plugins::on_error_dropped(&bad_request_error());
      }
      return;
    }
    self.try_emit();
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    self.downstream.lock().take();
    self.value.lock().take();
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::Mutex as StdMutex;

  #[test]
  fn emits_value_then_completes() {
    let seen = Arc::new(StdMutex::new(vec![]));
    let sink = seen.clone();
    just(42).subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![42]);
  }

  #[test]
  fn every_subscription_gets_the_value() {
    let flow = just(String::from("hello"));
    for _ in 0..2 {
      let seen = Arc::new(StdMutex::new(vec![]));
      let sink = seen.clone();
      flow.subscribe_next(move |v| sink.lock().unwrap().push(v));
      assert_eq!(*seen.lock().unwrap(), vec![String::from("hello")]);
    }
  }

  #[test]
  fn carries_the_scalar_tag() {
    assert!(just(1).scalar.is_some());
    assert!(crate::source::empty::<i32>().scalar.is_none());
  }
}
