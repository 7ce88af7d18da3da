use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::FlowError;
use crate::plugins;
use crate::subscriber::{BoxSubscriber, SafeSubscriber, Subscriber};
use crate::subscription::{Subscription, UNBOUNDED};

pub(crate) type SubscribeFn<T> = Arc<dyn Fn(BoxSubscriber<T>) + Send + Sync>;
pub(crate) type ScalarFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A cold, lazily evaluated source of values.
///
/// A flow is nothing but a subscribe-function behind an `Arc`: subscribing
/// runs the function, and every subscription runs it again independently.
/// Operators wrap the subscribe-function of their upstream, so a chain is
/// assembled downstream-to-upstream at subscription time; values, errors
/// and completion travel back down, demand and cancellation travel up.
///
/// ```
/// use rxflow::prelude::*;
///
/// range(1, 5)
///   .map(|v| v * 2)
///   .filter(|v| *v > 4)
///   .subscribe_next(|v| println!("{v}"));
/// ```
pub struct Flow<T> {
  subscribe_fn: SubscribeFn<T>,
  // Set by `just`: lets `flat_map` recognize a scalar inner and skip the
  // whole inner-subscription machinery.
  pub(crate) scalar: Option<ScalarFn<T>>,
}

impl<T> Clone for Flow<T> {
  fn clone(&self) -> Self {
    Flow {
      subscribe_fn: self.subscribe_fn.clone(),
      scalar: self.scalar.clone(),
    }
  }
}

impl<T: Send + 'static> Flow<T> {
  /// Wraps a subscribe-function into a flow, applying the `on_create`
  /// plugin hook.
  ///
  /// The subscribe-function owns the whole contract: it must deliver
  /// `on_subscribe` exactly once before anything else, honor demand, and
  /// stop after a terminal signal or cancellation.
  pub fn create(
    subscribe_fn: impl Fn(BoxSubscriber<T>) + Send + Sync + 'static,
  ) -> Self {
    Self::assemble(Arc::new(subscribe_fn), None)
  }

  pub(crate) fn assemble(
    subscribe_fn: SubscribeFn<T>,
    scalar: Option<ScalarFn<T>>,
  ) -> Self {
    plugins::apply_create(Flow { subscribe_fn, scalar })
  }

  /// Attaches a subscriber, raw: signals reach it exactly as the upstream
  /// produces them. Use [`Flow::safe_subscribe`] to guard against
  /// rule-breaking upstreams.
  pub fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    self.subscribe_boxed(Box::new(subscriber));
  }

  /// Attaches a subscriber behind a [`SafeSubscriber`] guard that enforces
  /// signal ordering and terminal idempotence.
  pub fn safe_subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    self.subscribe_boxed(Box::new(SafeSubscriber::new(Box::new(subscriber))));
  }

  /// Subscribes with just an `on_next` closure. Demand is unbounded;
  /// errors end up at the plugin error hook since no handler exists.
  pub fn subscribe_next(&self, next: impl FnMut(T) + Send + 'static) {
    self.subscribe(FnSubscriber { next });
  }

  pub(crate) fn subscribe_boxed(&self, subscriber: BoxSubscriber<T>) {
    let subscriber = plugins::apply_subscribe(subscriber);
    let subscribe_fn = self.subscribe_fn.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
      subscribe_fn(subscriber);
    }));
    if let Err(payload) = outcome {
      // At this point it is unknowable whether `on_subscribe` was already
      // delivered, so the failure cannot be signalled to the subscriber.
      plugins::on_error_dropped(&panic_error(payload));
    }
  }

  /// Builds a new flow whose subscriber is transformed by `lifter` before
  /// being handed upstream. Every operator in this crate is a lift.
  pub fn lift<R, L>(self, lifter: L) -> Flow<R>
  where
    R: Send + 'static,
    L: Fn(BoxSubscriber<R>) -> BoxSubscriber<T> + Send + Sync + 'static,
  {
    let upstream = self.subscribe_fn;
    Flow::create(move |downstream: BoxSubscriber<R>| {
      let lifted = plugins::apply_subscribe(lifter(downstream));
      upstream(lifted);
    })
  }

  /// Applies a whole-flow transformer, staying inside the flow world.
  pub fn compose<R>(
    self,
    transformer: impl FnOnce(Flow<T>) -> Flow<R>,
  ) -> Flow<R>
  where
    R: Send + 'static,
  {
    transformer(self)
  }

  /// Hands the flow to a converter and returns whatever it returns.
  pub fn to<R>(self, converter: impl FnOnce(Flow<T>) -> R) -> R {
    converter(self)
  }

  /// Returns a flow that forwards to this one while hiding its concrete
  /// provenance (scalar tags included).
  pub fn as_flow(&self) -> Flow<T> {
    let source = self.clone();
    Flow::create(move |subscriber| source.subscribe_boxed(subscriber))
  }

  /// Converts any publisher into a flow. A value that already is a flow is
  /// returned as-is rather than wrapped another time.
  pub fn from_publisher<P>(publisher: P) -> Flow<T>
  where
    P: Publisher<T>,
  {
    let any: &dyn Any = &publisher;
    if let Some(flow) = any.downcast_ref::<Flow<T>>() {
      return flow.clone();
    }
    let publisher = Arc::new(publisher);
    Flow::create(move |subscriber| publisher.subscribe_to(subscriber))
  }
}

/// Anything a subscriber can be attached to. [`Flow`] implements it, and
/// foreign sources can implement it to interoperate via
/// [`Flow::from_publisher`].
pub trait Publisher<T>: Send + Sync + 'static {
  fn subscribe_to(&self, subscriber: BoxSubscriber<T>);
}

impl<T: Send + 'static> Publisher<T> for Flow<T> {
  fn subscribe_to(&self, subscriber: BoxSubscriber<T>) {
    self.subscribe_boxed(subscriber);
  }
}

struct FnSubscriber<F> {
  next: F,
}

impl<T, F> Subscriber<T> for FnSubscriber<F>
where
  F: FnMut(T) + Send,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, value: T) {
    (self.next)(value);
  }

  fn on_error(&mut self, error: FlowError) {
    plugins::on_error_dropped(&error);
  }

  fn on_complete(&mut self) {}
}

fn panic_error(payload: Box<dyn Any + Send>) -> FlowError {
  if let Some(message) = payload.downcast_ref::<&str>() {
    FlowError::message(format!("subscribe panicked: {message}"))
  } else if let Some(message) = payload.downcast_ref::<String>() {
    FlowError::message(format!("subscribe panicked: {message}"))
  } else {
    FlowError::message("subscribe panicked")
  }
}
