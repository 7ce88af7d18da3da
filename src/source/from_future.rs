use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::executor::block_on;
use parking_lot::Mutex;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::plugins;
use crate::subscriber::BoxSubscriber;
use crate::subscription::{bad_request_error, EmptySubscription, Subscription};

/// Creates a flow from a future: its output is emitted, then the flow
/// completes.
///
/// The future is single-use (polling consumes it), so only the first
/// subscription succeeds. It is driven to completion on the thread that
/// grants the first positive demand; cancelling before that drops the
/// future, which cancels whatever it was going to do.
pub fn from_future<F>(future: F) -> Flow<F::Output>
where
  F: Future + Send + 'static,
  F::Output: Send + 'static,
{
  let slot = Arc::new(Mutex::new(Some(future)));
  Flow::create(move |mut subscriber: BoxSubscriber<F::Output>| {
    let Some(future) = slot.lock().take() else {
      subscriber.on_subscribe(EmptySubscription::arc());
      subscriber.on_error(FlowError::constraint(
        "future source allows only one subscription",
      ));
      return;
    };
    let subscription = Arc::new(FutureSubscription {
      future: Mutex::new(Some(future)),
      downstream: Mutex::new(None),
      requested: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
      violated: AtomicBool::new(false),
    });
    subscriber.on_subscribe(subscription.clone() as Arc<dyn Subscription>);
    subscription.install(subscriber);
  })
}

/// Like [`from_future`] for futures resolving to a `Result`: `Ok` is
/// emitted and completed, `Err` becomes the `on_error` signal.
pub fn from_future_result<F, T, E>(future: F) -> Flow<T>
where
  F: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Into<FlowError> + Send + 'static,
{
  from_future(future).try_map(|result| result.map_err(Into::into))
}

struct FutureSubscription<F: Future> {
  future: Mutex<Option<F>>,
  downstream: Mutex<Option<BoxSubscriber<F::Output>>>,
  requested: AtomicBool,
  cancelled: AtomicBool,
  violated: AtomicBool,
}

impl<F> FutureSubscription<F>
where
  F: Future + Send + 'static,
  F::Output: Send + 'static,
{
  fn install(&self, subscriber: BoxSubscriber<F::Output>) {
    *self.downstream.lock() = Some(subscriber);
    if self.requested.load(Ordering::Acquire) {
      self.try_emit();
    }
  }

  fn try_emit(&self) {
    if self.cancelled.load(Ordering::Acquire) {
      self.downstream.lock().take();
      self.future.lock().take();
      return;
    }
    let taken = self.downstream.lock().take();
    let Some(mut subscriber) = taken else { return };
    if self.violated.load(Ordering::Acquire) {
      self.future.lock().take();
      subscriber.on_error(bad_request_error());
      return;
    }
    let future = self.future.lock().take();
    if let Some(future) = future {
      let value = block_on(future);
      if self.cancelled.load(Ordering::Acquire) {
        return;
      }
      subscriber.on_next(value);
      if !self.cancelled.load(Ordering::Acquire) {
        subscriber.on_complete();
      }
    }
  }
}

impl<F> Subscription for FutureSubscription<F>
where
  F: Future + Send + 'static,
  F::Output: Send + 'static,
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
    self.future.lock().take();
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::Mutex as StdMutex;

  #[test]
  fn emits_the_future_output() {
    let seen = Arc::new(StdMutex::new(vec![]));
    let sink = seen.clone();
    from_future(futures::future::ready(7))
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![7]);
  }

  #[test]
  fn result_futures_split_ok_and_err() {
    let seen = Arc::new(StdMutex::new(vec![]));
    let sink = seen.clone();
    from_future_result(futures::future::ready(Ok::<_, FlowError>(3)))
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![3]);

    let errors = Arc::new(StdMutex::new(vec![]));
    let sink = errors.clone();
    from_future_result(futures::future::ready(Err::<i32, _>(
      FlowError::message("failed"),
    )))
    .subscribe(ErrorProbe { errors: sink });
    assert_eq!(*errors.lock().unwrap(), vec![String::from("failed")]);
  }

  struct ErrorProbe {
    errors: Arc<StdMutex<Vec<String>>>,
  }

  impl crate::subscriber::Subscriber<i32> for ErrorProbe {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
      subscription.request(crate::subscription::UNBOUNDED);
    }

    fn on_next(&mut self, _: i32) {}

    fn on_error(&mut self, error: FlowError) {
      self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_complete(&mut self) {}
  }
}
