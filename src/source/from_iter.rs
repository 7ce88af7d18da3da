use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::flow::Flow;
use crate::subscriber::BoxSubscriber;
use crate::subscription::{
  add_demand, bad_request_error, sub_demand, EmptySubscription, Subscription,
  UNBOUNDED,
};

/// Creates a flow emitting every item of `iter`, honoring demand.
///
/// The input is cloned per subscription, so each subscriber traverses its
/// own iterator. The first element is probed at subscribe time: an empty
/// input completes immediately without waiting for demand.
pub fn from_iter<I>(iter: I) -> Flow<I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  Flow::create(move |mut subscriber: BoxSubscriber<I::Item>| {
    let mut it = iter.clone().into_iter();
    match it.next() {
      None => {
        subscriber.on_subscribe(EmptySubscription::arc());
        subscriber.on_complete();
      }
      Some(head) => IterSubscription::start(Some(head), it, subscriber),
    }
  })
}

/// Creates a flow from an owned batch of values: zero values degenerate to
/// [`empty`], one to [`just`], anything longer runs through the iterator
/// machinery.
///
/// [`empty`]: crate::source::empty
/// [`just`]: crate::source::just
pub fn from_array<T>(values: impl Into<Vec<T>>) -> Flow<T>
where
  T: Clone + Send + Sync + 'static,
{
  let mut values = values.into();
  if values.is_empty() {
    return crate::source::empty();
  }
  if values.len() == 1 {
    if let Some(value) = values.pop() {
      return crate::source::just(value);
    }
  }
  from_iter(values)
}

struct IterState<I: Iterator> {
  head: Option<I::Item>,
  iter: I,
}

/// Demand-driven pull loop shared by the iterator-backed sources.
///
/// The thread that moves outstanding demand away from zero becomes the
/// drain; reentrant `request` calls from inside `on_next` only add demand
/// and return, which bounds the stack for synchronous chains. A `request`
/// while the drain is parked resumes it on the requesting thread.
pub(crate) struct IterSubscription<I: Iterator> {
  state: Mutex<Option<IterState<I>>>,
  downstream: Mutex<Option<BoxSubscriber<I::Item>>>,
  requested: AtomicU64,
  cancelled: AtomicBool,
  violated: AtomicBool,
}

impl<I> IterSubscription<I>
where
  I: Iterator + Send + 'static,
  I::Item: Send + 'static,
{
  pub(crate) fn start(
    head: Option<I::Item>,
    iter: I,
    mut subscriber: BoxSubscriber<I::Item>,
  ) {
    let subscription = Arc::new(IterSubscription {
      state: Mutex::new(Some(IterState { head, iter })),
      downstream: Mutex::new(None),
      requested: AtomicU64::new(0),
      cancelled: AtomicBool::new(false),
      violated: AtomicBool::new(false),
    });
    subscriber.on_subscribe(subscription.clone() as Arc<dyn Subscription>);
    *subscription.downstream.lock() = Some(subscriber);
    // Demand granted from inside on_subscribe found no subscriber to feed
    // yet; serve it now.
    if subscription.requested.load(Ordering::Acquire) > 0
      || subscription.violated.load(Ordering::Acquire)
    {
      subscription.drain();
    }
  }

  fn next_item(&self) -> Option<I::Item> {
    let mut state = self.state.lock();
    match state.as_mut() {
      Some(state) => state.head.take().or_else(|| state.iter.next()),
      None => None,
    }
  }

  fn finish(&self) {
    self.state.lock().take();
  }

  fn drain(&self) {
    let mut guard = self.downstream.lock();
    let Some(mut subscriber) = guard.take() else { return };
    loop {
      if self.cancelled.load(Ordering::Acquire) {
        self.finish();
        return;
      }
      if self.violated.load(Ordering::Acquire) {
        self.finish();
        subscriber.on_error(bad_request_error());
        return;
      }
      let requested = self.requested.load(Ordering::Acquire);
      if requested == UNBOUNDED {
        // Fast path: no demand accounting, emit until exhaustion.
        loop {
          if self.cancelled.load(Ordering::Acquire) {
            self.finish();
            return;
          }
          if self.violated.load(Ordering::Acquire) {
            self.finish();
            subscriber.on_error(bad_request_error());
            return;
          }
          match self.next_item() {
            Some(value) => subscriber.on_next(value),
            None => {
              self.finish();
              subscriber.on_complete();
              return;
            }
          }
        }
      }
      let mut emitted = 0u64;
      while emitted < requested {
        if self.cancelled.load(Ordering::Acquire)
          || self.violated.load(Ordering::Acquire)
        {
          break;
        }
        match self.next_item() {
          Some(value) => {
            subscriber.on_next(value);
            emitted += 1;
          }
          None => {
            self.finish();
            subscriber.on_complete();
            return;
          }
        }
      }
      if self.cancelled.load(Ordering::Acquire)
        || self.violated.load(Ordering::Acquire)
      {
        continue;
      }
      if sub_demand(&self.requested, emitted) == 0 {
        // Parked: hand the subscriber back for the next request to pick
        // up.
        *guard = Some(subscriber);
        return;
      }
    }
  }
}

impl<I> Subscription for IterSubscription<I>
where
  I: Iterator + Send + 'static,
  I::Item: Send + 'static,
{
  fn request(&self, n: u64) {
    if n == 0 {
      self.violated.store(true, Ordering::Release);
    }
    // A violation still bumps demand by one so a parked drain wakes up to
    // deliver the constraint error.
    if add_demand(&self.requested, n.max(1)) == 0 {
      self.drain();
    }
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    if add_demand(&self.requested, 1) == 0 {
      self.drain();
    }
  }
}
