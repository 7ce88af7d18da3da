use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::{
  add_demand, bad_request_error, sub_demand, DeferredSubscription,
  Subscription, UNBOUNDED,
};

impl<T: Send + 'static> Flow<T> {
  /// Buffers the last `count` values and emits them, honoring downstream
  /// demand, once the upstream completes. An upstream error drops the
  /// buffer and is forwarded. `take_last(0)` reduces to
  /// [`ignore_elements`](Flow::ignore_elements); `take_last(1)` keeps a
  /// single slot instead of a ring.
  pub fn take_last(self, count: usize) -> Flow<T> {
    if count == 0 {
      return self.ignore_elements();
    }
    self.lift(move |downstream: BoxSubscriber<T>| {
      let buffer = if count == 1 {
        LastBuffer::One(None)
      } else {
        LastBuffer::Ring(VecDeque::with_capacity(count))
      };
      Box::new(TakeLastSubscriber {
        shared: Arc::new(TakeLastShared {
          buffer: Mutex::new(buffer),
          count,
          downstream: Mutex::new(None),
          upstream: DeferredSubscription::new(),
          requested: AtomicU64::new(0),
          wip: AtomicUsize::new(0),
          done: AtomicBool::new(false),
          cancelled: AtomicBool::new(false),
          violated: AtomicBool::new(false),
          error: Mutex::new(None),
        }),
        pending: Some(downstream),
      })
    })
  }
}

/// `take_last(1)` is common enough that the ring collapses to one slot.
enum LastBuffer<T> {
  One(Option<T>),
  Ring(VecDeque<T>),
}

impl<T> LastBuffer<T> {
  fn push(&mut self, value: T, count: usize) {
    match self {
      LastBuffer::One(slot) => *slot = Some(value),
      LastBuffer::Ring(ring) => {
        if ring.len() == count {
          ring.pop_front();
        }
        ring.push_back(value);
      }
    }
  }

  fn pop(&mut self) -> Option<T> {
    match self {
      LastBuffer::One(slot) => slot.take(),
      LastBuffer::Ring(ring) => ring.pop_front(),
    }
  }

  fn clear(&mut self) {
    match self {
      LastBuffer::One(slot) => *slot = None,
      LastBuffer::Ring(ring) => ring.clear(),
    }
  }
}

struct TakeLastShared<T> {
  buffer: Mutex<LastBuffer<T>>,
  count: usize,
  downstream: Mutex<Option<BoxSubscriber<T>>>,
  upstream: DeferredSubscription,
  requested: AtomicU64,
  wip: AtomicUsize,
  done: AtomicBool,
  cancelled: AtomicBool,
  violated: AtomicBool,
  error: Mutex<Option<FlowError>>,
}

impl<T: Send + 'static> TakeLastShared<T> {
  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      self.drain_pass();
      let current = self.wip.fetch_sub(missed, Ordering::AcqRel);
      if current == missed {
        return;
      }
      missed = current - missed;
    }
  }

  fn drain_pass(&self) {
    let mut guard = self.downstream.lock();
    if guard.is_none() {
      return;
    }
    if self.cancelled.load(Ordering::Acquire) {
      *guard = None;
      self.buffer.lock().clear();
      return;
    }
    if self.violated.load(Ordering::Acquire) {
      self.buffer.lock().clear();
      if let Some(mut subscriber) = guard.take() {
        subscriber.on_error(bad_request_error());
      }
      return;
    }
    if !self.done.load(Ordering::Acquire) {
      // Nothing is emitted before the upstream terminal.
      return;
    }
    let failed = self.error.lock().take();
    if let Some(error) = failed {
      if let Some(mut subscriber) = guard.take() {
        subscriber.on_error(error);
      }
      return;
    }
    loop {
      let requested = self.requested.load(Ordering::Acquire);
      let mut emitted = 0u64;
      while requested == UNBOUNDED || emitted < requested {
        if self.cancelled.load(Ordering::Acquire) {
          *guard = None;
          self.buffer.lock().clear();
          return;
        }
        let item = self.buffer.lock().pop();
        match item {
          Some(value) => {
            if let Some(subscriber) = guard.as_mut() {
              subscriber.on_next(value);
            }
            emitted += 1;
          }
          None => {
            if let Some(mut subscriber) = guard.take() {
              subscriber.on_complete();
            }
            return;
          }
        }
      }
      if sub_demand(&self.requested, emitted) == 0 {
        return;
      }
    }
  }
}

struct TakeLastSubscriber<T> {
  shared: Arc<TakeLastShared<T>>,
  pending: Option<BoxSubscriber<T>>,
}

impl<T: Send + 'static> Subscriber<T> for TakeLastSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.shared.upstream.set(subscription);
    if let Some(mut downstream) = self.pending.take() {
      downstream.on_subscribe(Arc::new(TakeLastSubscription {
        shared: self.shared.clone(),
      }) as Arc<dyn Subscription>);
      *self.shared.downstream.lock() = Some(downstream);
    }
    // The whole upstream must be consumed to know its tail.
    self.shared.upstream.request(UNBOUNDED);
    self.shared.drain();
  }

  fn on_next(&mut self, value: T) {
    let count = self.shared.count;
    self.shared.buffer.lock().push(value, count);
  }

  fn on_error(&mut self, error: FlowError) {
    self.shared.buffer.lock().clear();
    *self.shared.error.lock() = Some(error);
    self.shared.done.store(true, Ordering::Release);
    self.shared.drain();
  }

  fn on_complete(&mut self) {
    self.shared.done.store(true, Ordering::Release);
    self.shared.drain();
  }
}

struct TakeLastSubscription<T> {
  shared: Arc<TakeLastShared<T>>,
}

impl<T: Send + 'static> Subscription for TakeLastSubscription<T> {
  fn request(&self, n: u64) {
    if n == 0 {
      self.shared.violated.store(true, Ordering::Release);
    } else {
      add_demand(&self.shared.requested, n);
    }
    self.shared.drain();
  }

  fn cancel(&self) {
    self.shared.cancelled.store(true, Ordering::Release);
    self.shared.upstream.cancel();
    self.shared.drain();
  }
}
