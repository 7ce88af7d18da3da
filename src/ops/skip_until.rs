use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::{DeferredSubscription, Subscription};

impl<T: Send + 'static> Flow<T> {
  /// Drops upstream values until `other` emits its first value or
  /// completes; from then on everything passes through. An error from
  /// `other` terminates the flow.
  pub fn skip_until<U: Send + 'static>(self, other: Flow<U>) -> Flow<T> {
    Flow::create(move |mut subscriber: BoxSubscriber<T>| {
      let shared = Arc::new(SkipUntilShared {
        downstream: Mutex::new(None),
        gate_open: AtomicBool::new(false),
        cancelled: AtomicBool::new(false),
        main: DeferredSubscription::new(),
        other: DeferredSubscription::new(),
      });
      subscriber.on_subscribe(Arc::new(SkipUntilSubscription {
        shared: shared.clone(),
      }) as Arc<dyn Subscription>);
      *shared.downstream.lock() = Some(subscriber);
      other.subscribe_boxed(Box::new(GateSubscriber::new(shared.clone())));
      self.subscribe_boxed(Box::new(MainSubscriber { shared }));
    })
  }
}

struct SkipUntilShared<T> {
  downstream: Mutex<Option<BoxSubscriber<T>>>,
  gate_open: AtomicBool,
  cancelled: AtomicBool,
  main: DeferredSubscription,
  other: DeferredSubscription,
}

impl<T> SkipUntilShared<T> {
  fn terminate(&self, error: Option<FlowError>) {
    let taken = self.downstream.lock().take();
    if let Some(mut subscriber) = taken {
      self.main.cancel();
      self.other.cancel();
      if self.cancelled.load(Ordering::Acquire) {
        return;
      }
      match error {
        Some(error) => subscriber.on_error(error),
        None => subscriber.on_complete(),
      }
    }
  }

  fn open_gate(&self) {
    self.gate_open.store(true, Ordering::Release);
    self.other.cancel();
  }
}

struct SkipUntilSubscription<T> {
  shared: Arc<SkipUntilShared<T>>,
}

impl<T: Send> Subscription for SkipUntilSubscription<T> {
  fn request(&self, n: u64) {
    self.shared.main.request(n);
  }

  fn cancel(&self) {
    self.shared.cancelled.store(true, Ordering::Release);
    self.shared.main.cancel();
    self.shared.other.cancel();
    // The slot may be held by an emission on this very stack; the emitter
    // checks the flag and cleans up on its way out.
    if let Some(mut guard) = self.shared.downstream.try_lock() {
      guard.take();
    }
  }
}

struct MainSubscriber<T> {
  shared: Arc<SkipUntilShared<T>>,
}

impl<T: Send + 'static> Subscriber<T> for MainSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.shared.main.set(subscription);
  }

  fn on_next(&mut self, value: T) {
    if self.shared.cancelled.load(Ordering::Acquire) {
      return;
    }
    if !self.shared.gate_open.load(Ordering::Acquire) {
      // Dropped while gated: restore the consumed demand.
      self.shared.main.request(1);
      return;
    }
    let mut guard = self.shared.downstream.lock();
    if let Some(subscriber) = guard.as_mut() {
      subscriber.on_next(value);
    }
    if self.shared.cancelled.load(Ordering::Acquire) {
      guard.take();
    }
  }

  fn on_error(&mut self, error: FlowError) {
    self.shared.terminate(Some(error));
  }

  fn on_complete(&mut self) {
    self.shared.terminate(None);
  }
}

struct GateSubscriber<T, U> {
  shared: Arc<SkipUntilShared<T>>,
  _until: PhantomData<fn(U)>,
}

impl<T, U> GateSubscriber<T, U> {
  fn new(shared: Arc<SkipUntilShared<T>>) -> Self {
    GateSubscriber { shared, _until: PhantomData }
  }
}

impl<T: Send + 'static, U: Send + 'static> Subscriber<U>
  for GateSubscriber<T, U>
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.shared.other.set(subscription);
    self.shared.other.request(1);
  }

  fn on_next(&mut self, _: U) {
    self.shared.open_gate();
  }

  fn on_error(&mut self, error: FlowError) {
    if !self.shared.gate_open.load(Ordering::Acquire) {
      self.shared.terminate(Some(error));
    }
  }

  fn on_complete(&mut self) {
    self.shared.open_gate();
  }
}

#[cfg(test)]
mod test {
  use crate::source::{empty, from_iter, just, never};
  use std::sync::{Arc, Mutex};

  #[test]
  fn open_gate_passes_everything() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(1..=3)
      .skip_until(just(()))
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn closed_gate_drops_everything() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(1..=3)
      .skip_until(never::<()>())
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert!(seen.lock().unwrap().is_empty());
  }

  #[test]
  fn completed_other_opens_the_gate() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    from_iter(1..=3)
      .skip_until(empty::<()>())
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
  }
}
