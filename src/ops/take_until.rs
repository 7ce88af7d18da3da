use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::{DeferredSubscription, Subscription};

impl<T: Send + 'static> Flow<T> {
  /// Mirrors the upstream until `other` signals anything: its first value
  /// or its completion completes this flow, its error terminates it.
  ///
  /// ```
  /// use rxflow::prelude::*;
  ///
  /// never::<i32>()
  ///   .take_until(just(1))
  ///   .subscribe_next(|_| unreachable!());
  /// // completes promptly without a value
  /// ```
  pub fn take_until<U: Send + 'static>(self, other: Flow<U>) -> Flow<T> {
    Flow::create(move |mut subscriber: BoxSubscriber<T>| {
      let shared = Arc::new(TakeUntilShared {
        downstream: Mutex::new(None),
        cancelled: AtomicBool::new(false),
        main: DeferredSubscription::new(),
        other: DeferredSubscription::new(),
      });
      subscriber.on_subscribe(Arc::new(TakeUntilSubscription {
        shared: shared.clone(),
      }) as Arc<dyn Subscription>);
      *shared.downstream.lock() = Some(subscriber);
      // The gate subscribes first so an immediately-firing `other` wins
      // even against a synchronous upstream.
      other.subscribe_boxed(Box::new(OtherSubscriber::new(shared.clone())));
      self.subscribe_boxed(Box::new(MainSubscriber { shared }));
    })
  }

  /// Forwards values until one matches `predicate`; the matching value is
  /// still emitted, then the upstream is cancelled and the flow completes.
  pub fn take_until_predicate<P>(self, predicate: P) -> Flow<T>
  where
    P: Fn(&T) -> bool + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    self.lift(move |downstream: BoxSubscriber<T>| {
      Box::new(TakeUntilPredicateSubscriber {
        downstream: Some(downstream),
        upstream: None,
        predicate: predicate.clone(),
      })
    })
  }
}

struct TakeUntilShared<T> {
  downstream: Mutex<Option<BoxSubscriber<T>>>,
  cancelled: AtomicBool,
  main: DeferredSubscription,
  other: DeferredSubscription,
}

impl<T> TakeUntilShared<T> {
  /// Taking the subscriber out of the slot is the terminal gate: whoever
  /// gets it delivers exactly one terminal signal, everyone else finds the
  /// slot empty.
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
}

struct TakeUntilSubscription<T> {
  shared: Arc<TakeUntilShared<T>>,
}

impl<T: Send> Subscription for TakeUntilSubscription<T> {
  fn request(&self, n: u64) {
    // Violations included: the upstream raises them and they come back
    // down as on_error.
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
  shared: Arc<TakeUntilShared<T>>,
}

impl<T: Send + 'static> Subscriber<T> for MainSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.shared.main.set(subscription);
  }

  fn on_next(&mut self, value: T) {
    if self.shared.cancelled.load(Ordering::Acquire) {
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

struct OtherSubscriber<T, U> {
  shared: Arc<TakeUntilShared<T>>,
  _until: std::marker::PhantomData<fn(U)>,
}

impl<T, U> OtherSubscriber<T, U> {
  fn new(shared: Arc<TakeUntilShared<T>>) -> Self {
    OtherSubscriber { shared, _until: std::marker::PhantomData }
  }
}

impl<T: Send + 'static, U: Send + 'static> Subscriber<U>
  for OtherSubscriber<T, U>
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.shared.other.set(subscription);
    self.shared.other.request(1);
  }

  fn on_next(&mut self, _: U) {
    self.shared.terminate(None);
  }

  fn on_error(&mut self, error: FlowError) {
    self.shared.terminate(Some(error));
  }

  fn on_complete(&mut self) {
    self.shared.terminate(None);
  }
}

struct TakeUntilPredicateSubscriber<T, P> {
  downstream: Option<BoxSubscriber<T>>,
  upstream: Option<Arc<dyn Subscription>>,
  predicate: Arc<P>,
}

impl<T, P> Subscriber<T> for TakeUntilPredicateSubscriber<T, P>
where
  T: Send + 'static,
  P: Fn(&T) -> bool + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.upstream = Some(subscription.clone());
    if let Some(downstream) = self.downstream.as_mut() {
      downstream.on_subscribe(subscription);
    }
  }

  fn on_next(&mut self, value: T) {
    let Some(downstream) = self.downstream.as_mut() else { return };
    let stop = (self.predicate)(&value);
    downstream.on_next(value);
    if stop {
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
