use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::plugins;
use crate::subscriber::BoxSubscriber;
use crate::subscription::{bad_request_error, Subscription};

/// Creates a flow that invokes `supplier` when the first positive demand
/// arrives, emits its value and completes. A supplier failure becomes the
/// `on_error` signal.
///
/// The supplier runs once per subscription, and not at all if the
/// subscription is cancelled before any demand.
pub fn from_callable<T, F>(supplier: F) -> Flow<T>
where
  T: Send + 'static,
  F: Fn() -> Result<T, FlowError> + Send + Sync + 'static,
{
  let supplier = Arc::new(supplier);
  Flow::create(move |mut subscriber: BoxSubscriber<T>| {
    let subscription = Arc::new(CallableSubscription {
      supplier: supplier.clone(),
      downstream: Mutex::new(None),
      requested: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
      violated: AtomicBool::new(false),
    });
    subscriber.on_subscribe(subscription.clone() as Arc<dyn Subscription>);
    subscription.install(subscriber);
  })
}

struct CallableSubscription<T, F> {
  supplier: Arc<F>,
  downstream: Mutex<Option<BoxSubscriber<T>>>,
  requested: AtomicBool,
  cancelled: AtomicBool,
  violated: AtomicBool,
}

impl<T, F> CallableSubscription<T, F>
where
  T: Send + 'static,
  F: Fn() -> Result<T, FlowError> + Send + Sync + 'static,
{
  fn install(&self, subscriber: BoxSubscriber<T>) {
    *self.downstream.lock() = Some(subscriber);
    if self.requested.load(Ordering::Acquire) {
      self.try_emit();
    }
  }

  fn try_emit(&self) {
    if self.cancelled.load(Ordering::Acquire) {
      self.downstream.lock().take();
      return;
    }
    let taken = self.downstream.lock().take();
    let Some(mut subscriber) = taken else { return };
    if self.violated.load(Ordering::Acquire) {
      subscriber.on_error(bad_request_error());
      return;
    }
    match (self.supplier)() {
      Ok(value) => {
        subscriber.on_next(value);
        if !self.cancelled.load(Ordering::Acquire) {
          subscriber.on_complete();
        }
      }
      Err(error) => subscriber.on_error(error),
    }
  }
}

impl<T, F> Subscription for CallableSubscription<T, F>
where
  T: Send + 'static,
  F: Fn() -> Result<T, FlowError> + Send + Sync + 'static,
{
  fn request(&self, n: u64) {
    if n == 0 {
      self.violated.store(true, Ordering::Release);
    }
    if self.requested.swap(true, Ordering::AcqRel) {
      if n == 0 {
        plugins::on_error_dropped(&bad_request_error());
      }
      return;
    }
    self.try_emit();
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    self.downstream.lock().take();
  }
}
