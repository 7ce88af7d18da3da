use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::BoxSubscriber;
use crate::subscription::EmptySubscription;

/// Creates a flow that emits no items and completes immediately.
///
/// Completion does not consume demand, so the subscriber sees
/// `on_subscribe` followed by `on_complete` without requesting anything.
pub fn empty<T: Send + 'static>() -> Flow<T> {
  Flow::create(|mut subscriber: BoxSubscriber<T>| {
    subscriber.on_subscribe(EmptySubscription::arc());
    subscriber.on_complete();
  })
}

/// Creates a flow that never emits anything: no values, no error, no
/// completion. Only `on_subscribe` is ever delivered.
pub fn never<T: Send + 'static>() -> Flow<T> {
  Flow::create(|mut subscriber: BoxSubscriber<T>| {
    subscriber.on_subscribe(EmptySubscription::arc());
  })
}

/// Creates a flow that terminates every subscriber with `error`.
pub fn error<T: Send + 'static>(error: FlowError) -> Flow<T> {
  error_with(move || error.clone())
}

/// Like [`error`], but the error is produced by `supplier` at subscribe
/// time, once per subscription.
pub fn error_with<T, F>(supplier: F) -> Flow<T>
where
  T: Send + 'static,
  F: Fn() -> FlowError + Send + Sync + 'static,
{
  Flow::create(move |mut subscriber: BoxSubscriber<T>| {
    subscriber.on_subscribe(EmptySubscription::arc());
    subscriber.on_error(supplier());
  })
}
