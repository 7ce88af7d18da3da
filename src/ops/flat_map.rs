use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::plugins;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::subscription::{
  add_demand, bad_request_error, sub_demand, DeferredSubscription,
  Subscription, UNBOUNDED,
};

impl<T: Send + 'static> Flow<T> {
  /// Maps every value to an inner flow and merges the inner flows into
  /// one output, failing fast and using [`buffer_size`] for both the
  /// concurrency limit and the per-inner prefetch.
  ///
  /// The output is unordered whenever more than one inner is active; with
  /// a concurrency limit of one the inner sequences are concatenated in
  /// order.
  ///
  /// [`buffer_size`]: crate::plugins::buffer_size
  pub fn flat_map<R, F>(self, mapper: F) -> Flow<R>
  where
    R: Send + 'static,
    F: Fn(T) -> Flow<R> + Send + Sync + 'static,
  {
    let prefetch = plugins::buffer_size();
    self.flat_map_with(mapper, false, prefetch, prefetch)
  }

  /// The fully parameterized merge-map.
  ///
  /// At most `max_concurrency` inner flows are subscribed at a time; each
  /// is granted `prefetch` demand and its surplus values wait in a queue
  /// of that size. When `delay_errors` is set, inner failures are
  /// collected and surfaced as one (possibly composite) error after the
  /// surviving inners finish; otherwise the first error cancels
  /// everything. Zero `max_concurrency` or `prefetch` is a programmer
  /// error and panics.
  ///
  /// A mapper that wants to fail returns an
  /// [`error`](crate::source::error) flow, which is treated exactly like
  /// an inner that failed.
  pub fn flat_map_with<R, F>(
    self,
    mapper: F,
    delay_errors: bool,
    max_concurrency: usize,
    prefetch: usize,
  ) -> Flow<R>
  where
    R: Send + 'static,
    F: Fn(T) -> Flow<R> + Send + Sync + 'static,
  {
    assert!(max_concurrency >= 1, "max_concurrency must be at least 1");
    assert!(prefetch >= 1, "prefetch must be at least 1");
    let mapper = Arc::new(mapper);
    self.lift(move |downstream: BoxSubscriber<R>| {
      Box::new(FlatMapSubscriber {
        coordinator: Arc::new(FlatMapCoordinator::new(delay_errors, prefetch)),
        mapper: mapper.clone(),
        pending: Some(downstream),
        max_concurrency,
      })
    })
  }
}

struct InnerSlot<R> {
  queue: Mutex<VecDeque<R>>,
  done: AtomicBool,
  subscription: DeferredSubscription,
}

impl<R> InnerSlot<R> {
  fn new(prefetch: usize) -> Self {
    InnerSlot {
      queue: Mutex::new(VecDeque::with_capacity(prefetch)),
      done: AtomicBool::new(false),
      subscription: DeferredSubscription::new(),
    }
  }
}

/// The per-subscription state of a merge: downstream slot, demand, error
/// collection and the active inner queues, serialized by the `wip`
/// trampoline. The first entrant into `drain` becomes the single worker;
/// everyone else bumps `wip` and leaves, and the worker loops until the
/// counter says nothing was missed.
struct FlatMapCoordinator<R> {
  downstream: Mutex<Option<BoxSubscriber<R>>>,
  upstream: Mutex<Option<Arc<dyn Subscription>>>,
  inners: Mutex<Vec<Arc<InnerSlot<R>>>>,
  errors: Mutex<SmallVec<[FlowError; 4]>>,
  requested: AtomicU64,
  wip: AtomicUsize,
  cursor: AtomicUsize,
  done: AtomicBool,
  cancelled: AtomicBool,
  violated: AtomicBool,
  delay_errors: bool,
  prefetch: usize,
}

impl<R: Send + 'static> FlatMapCoordinator<R> {
  fn new(delay_errors: bool, prefetch: usize) -> Self {
    FlatMapCoordinator {
      downstream: Mutex::new(None),
      upstream: Mutex::new(None),
      inners: Mutex::new(Vec::new()),
      errors: Mutex::new(SmallVec::new()),
      requested: AtomicU64::new(0),
      wip: AtomicUsize::new(0),
      cursor: AtomicUsize::new(0),
      done: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
      violated: AtomicBool::new(false),
      delay_errors,
      prefetch,
    }
  }

  fn upstream_request(&self, n: u64) {
    let upstream = self.upstream.lock().clone();
    if let Some(upstream) = upstream {
      upstream.request(n);
    }
  }

  fn cancel_sources(&self) {
    let upstream = self.upstream.lock().take();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
    let inners: Vec<_> = self.inners.lock().iter().cloned().collect();
    for slot in inners {
      slot.subscription.cancel();
    }
  }

  fn clear(&self) {
    let mut inners = self.inners.lock();
    for slot in inners.iter() {
      slot.queue.lock().clear();
    }
    inners.clear();
    self.errors.lock().clear();
  }

  fn record_error(&self, error: FlowError) {
    self.errors.lock().push(error);
  }

  /// A scalar inner (`just`) skips the subscription machinery entirely:
  /// emit straight to downstream when the drain is idle and demand is
  /// there, otherwise park the value in a synthetic, already-completed
  /// slot.
  fn scalar_value(&self, value: R) {
    if self.cancelled.load(Ordering::Acquire) {
      return;
    }
    if self
      .wip
      .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      let mut pending = Some(value);
      if self.requested.load(Ordering::Acquire) > 0 {
        let mut guard = self.downstream.lock();
        if let Some(subscriber) = guard.as_mut() {
          if let Some(value) = pending.take() {
            subscriber.on_next(value);
          }
        }
      }
      if pending.is_none() {
        sub_demand(&self.requested, 1);
        // The scalar inner is complete; refill the concurrency slot.
        self.upstream_request(1);
      } else if let Some(value) = pending.take() {
        self.push_scalar(value);
      }
      self.drain_loop(1);
    } else {
      self.push_scalar(value);
      self.drain();
    }
  }

  fn push_scalar(&self, value: R) {
    let slot = Arc::new(InnerSlot {
      queue: Mutex::new(VecDeque::from(vec![value])),
      done: AtomicBool::new(true),
      subscription: DeferredSubscription::new(),
    });
    self.inners.lock().push(slot);
  }

  /// An inner delivered a value: emit it directly when the drain is idle,
  /// demand exists and nothing of this inner is already queued (order
  /// within one inner is preserved); otherwise enqueue and poke the
  /// drain.
  fn inner_value(&self, slot: &Arc<InnerSlot<R>>, value: R) {
    if self.cancelled.load(Ordering::Acquire) {
      return;
    }
    if self
      .wip
      .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      let mut pending = Some(value);
      if self.requested.load(Ordering::Acquire) > 0
        && slot.queue.lock().is_empty()
      {
        let mut guard = self.downstream.lock();
        if let Some(subscriber) = guard.as_mut() {
          if let Some(value) = pending.take() {
            subscriber.on_next(value);
          }
        }
      }
      if pending.is_none() {
        sub_demand(&self.requested, 1);
        slot.subscription.request(1);
      } else if let Some(value) = pending.take() {
        self.enqueue(slot, value);
      }
      self.drain_loop(1);
    } else {
      self.enqueue(slot, value);
      self.drain();
    }
  }

  fn enqueue(&self, slot: &Arc<InnerSlot<R>>, value: R) {
    let overflow = {
      let mut queue = slot.queue.lock();
      if queue.len() >= self.prefetch {
        true
      } else {
        queue.push_back(value);
        false
      }
    };
    if overflow {
      slot.done.store(true, Ordering::Release);
      slot.subscription.cancel();
      self.record_error(FlowError::MissingBackpressure(
        "inner source produced more than requested".into(),
      ));
    }
  }

  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    self.drain_loop(1);
  }

  fn drain_loop(&self, mut missed: usize) {
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
    loop {
      if self.cancelled.load(Ordering::Acquire) {
        *guard = None;
        self.clear();
        return;
      }
      if self.violated.load(Ordering::Acquire) {
        self.cancel_sources();
        self.clear();
        if let Some(mut subscriber) = guard.take() {
          subscriber.on_error(bad_request_error());
        }
        return;
      }
      if !self.delay_errors {
        let first = {
          let mut errors = self.errors.lock();
          if errors.is_empty() {
            None
          } else {
            Some(errors.remove(0))
          }
        };
        if let Some(error) = first {
          self.cancel_sources();
          self.clear();
          if let Some(mut subscriber) = guard.take() {
            subscriber.on_error(error);
          }
          return;
        }
      }
      let finished = self.prune_finished();
      if self.done.load(Ordering::Acquire) && self.inners.lock().is_empty() {
        let delayed = if self.delay_errors {
          let mut errors = self.errors.lock();
          if errors.is_empty() {
            None
          } else {
            Some(FlowError::composite(errors.drain(..).collect()))
          }
        } else {
          None
        };
        if let Some(mut subscriber) = guard.take() {
          match delayed {
            Some(error) => subscriber.on_error(error),
            None => subscriber.on_complete(),
          }
        }
        return;
      }
      let requested = self.requested.load(Ordering::Acquire);
      let mut emitted = 0u64;
      while requested == UNBOUNDED || emitted < requested {
        if self.cancelled.load(Ordering::Acquire)
          || self.violated.load(Ordering::Acquire)
          || (!self.delay_errors && !self.errors.lock().is_empty())
        {
          break;
        }
        match self.poll_next() {
          Some((value, slot)) => {
            if let Some(subscriber) = guard.as_mut() {
              subscriber.on_next(value);
            }
            // Replenish the prefetch of the inner just consumed from.
            slot.subscription.request(1);
            emitted += 1;
          }
          None => break,
        }
      }
      if emitted > 0 && requested != UNBOUNDED {
        sub_demand(&self.requested, emitted);
      }
      let flagged = self.cancelled.load(Ordering::Acquire)
        || self.violated.load(Ordering::Acquire)
        || (!self.delay_errors && !self.errors.lock().is_empty());
      if flagged {
        continue;
      }
      if emitted == 0 && finished == 0 {
        return;
      }
    }
  }

  /// One queue visit per inner per pass, starting where the last pass
  /// stopped, so no inner is starved.
  fn poll_next(&self) -> Option<(R, Arc<InnerSlot<R>>)> {
    let inners = self.inners.lock();
    let len = inners.len();
    if len == 0 {
      return None;
    }
    let start = self.cursor.load(Ordering::Relaxed) % len;
    for offset in 0..len {
      let index = (start + offset) % len;
      let slot = &inners[index];
      let item = slot.queue.lock().pop_front();
      if let Some(value) = item {
        self.cursor.store((index + 1) % len, Ordering::Relaxed);
        return Some((value, slot.clone()));
      }
    }
    None
  }

  fn prune_finished(&self) -> usize {
    let mut removed = 0;
    {
      let mut inners = self.inners.lock();
      inners.retain(|slot| {
        let finished =
          slot.done.load(Ordering::Acquire) && slot.queue.lock().is_empty();
        if finished {
          removed += 1;
        }
        !finished
      });
    }
    if removed > 0 && !self.done.load(Ordering::Acquire) {
      self.upstream_request(removed as u64);
    }
    removed
  }
}

struct FlatMapSubscriber<R, F> {
  coordinator: Arc<FlatMapCoordinator<R>>,
  mapper: Arc<F>,
  pending: Option<BoxSubscriber<R>>,
  max_concurrency: usize,
}

impl<T, R, F> Subscriber<T> for FlatMapSubscriber<R, F>
where
  T: Send + 'static,
  R: Send + 'static,
  F: Fn(T) -> Flow<R> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    *self.coordinator.upstream.lock() = Some(subscription.clone());
    if let Some(mut downstream) = self.pending.take() {
      downstream.on_subscribe(Arc::new(FlatMapSubscription {
        coordinator: self.coordinator.clone(),
      }) as Arc<dyn Subscription>);
      *self.coordinator.downstream.lock() = Some(downstream);
    }
    // The initial prefetch of sources.
    subscription.request(self.max_concurrency as u64);
    self.coordinator.drain();
  }

  fn on_next(&mut self, value: T) {
    if self.coordinator.cancelled.load(Ordering::Acquire) {
      return;
    }
    let inner = (self.mapper)(value);
    if let Some(scalar) = inner.scalar.clone() {
      self.coordinator.scalar_value(scalar());
      return;
    }
    let slot = Arc::new(InnerSlot::new(self.coordinator.prefetch));
    self.coordinator.inners.lock().push(slot.clone());
    inner.subscribe_boxed(Box::new(InnerSubscriber {
      coordinator: self.coordinator.clone(),
      slot,
      prefetch: self.coordinator.prefetch,
    }));
  }

  fn on_error(&mut self, error: FlowError) {
    self.coordinator.record_error(error);
    self.coordinator.done.store(true, Ordering::Release);
    self.coordinator.drain();
  }

  fn on_complete(&mut self) {
    self.coordinator.done.store(true, Ordering::Release);
    self.coordinator.drain();
  }
}

struct InnerSubscriber<R> {
  coordinator: Arc<FlatMapCoordinator<R>>,
  slot: Arc<InnerSlot<R>>,
  prefetch: usize,
}

impl<R: Send + 'static> Subscriber<R> for InnerSubscriber<R> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.slot.subscription.set(subscription);
    self.slot.subscription.request(self.prefetch as u64);
  }

  fn on_next(&mut self, value: R) {
    self.coordinator.inner_value(&self.slot, value);
  }

  fn on_error(&mut self, error: FlowError) {
    self.slot.done.store(true, Ordering::Release);
    self.coordinator.record_error(error);
    self.coordinator.drain();
  }

  fn on_complete(&mut self) {
    self.slot.done.store(true, Ordering::Release);
    self.coordinator.drain();
  }
}

struct FlatMapSubscription<R> {
  coordinator: Arc<FlatMapCoordinator<R>>,
}

impl<R: Send + 'static> Subscription for FlatMapSubscription<R> {
  fn request(&self, n: u64) {
    if n == 0 {
      self.coordinator.violated.store(true, Ordering::Release);
    } else {
      add_demand(&self.coordinator.requested, n);
    }
    self.coordinator.drain();
  }

  fn cancel(&self) {
    self.coordinator.cancelled.store(true, Ordering::Release);
    self.coordinator.cancel_sources();
    self.coordinator.drain();
  }
}
