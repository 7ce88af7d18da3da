use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlowError;
use crate::plugins;

/// Demand value meaning "effectively unbounded".
///
/// Demand is additive and saturates here; once a subscription reaches
/// `UNBOUNDED` it stays there and producers may stop accounting.
pub const UNBOUNDED: u64 = u64::MAX;

/// The handle linking one subscriber to one upstream.
///
/// `request` grants demand, `cancel` severs the link. Both must be safe to
/// call from any thread; `cancel` is idempotent and asynchronous in effect.
/// A `request(0)` is a protocol violation and terminates the subscription
/// with a constraint error instead of granting demand.
pub trait Subscription: Send + Sync {
  fn request(&self, n: u64);

  fn cancel(&self);
}

pub(crate) fn bad_request_error() -> FlowError {
  FlowError::constraint("request amount must be positive")
}

/// Adds `n` to a demand counter, saturating at [`UNBOUNDED`]. Returns the
/// demand that was outstanding before the add.
pub(crate) fn add_demand(counter: &AtomicU64, n: u64) -> u64 {
  let mut current = counter.load(Ordering::Relaxed);
  loop {
    if current == UNBOUNDED {
      return UNBOUNDED;
    }
    let next = current.saturating_add(n);
    match counter.compare_exchange_weak(
      current,
      next,
      Ordering::AcqRel,
      Ordering::Relaxed,
    ) {
      Ok(_) => return current,
      Err(actual) => current = actual,
    }
  }
}

/// Subtracts `n` produced items from a demand counter, leaving an
/// [`UNBOUNDED`] counter untouched. Returns the demand left afterwards.
pub(crate) fn sub_demand(counter: &AtomicU64, n: u64) -> u64 {
  let mut current = counter.load(Ordering::Relaxed);
  loop {
    if current == UNBOUNDED {
      return UNBOUNDED;
    }
    let next = current.saturating_sub(n);
    match counter.compare_exchange_weak(
      current,
      next,
      Ordering::AcqRel,
      Ordering::Relaxed,
    ) {
      Ok(_) => return next,
      Err(actual) => current = actual,
    }
  }
}

/// A subscription for sources that terminate immediately (`empty`, `error`)
/// or never signal at all (`never`). Granting it demand does nothing.
pub struct EmptySubscription;

impl EmptySubscription {
  pub fn arc() -> Arc<dyn Subscription> {
    Arc::new(EmptySubscription)
  }
}

impl Subscription for EmptySubscription {
  fn request(&self, n: u64) {
    if n == 0 {
      // The terminal signal was already delivered (or never will be), so
      // the violation has no subscriber left to hear it.
      plugins::on_error_dropped(&bad_request_error());
    }
  }

  fn cancel(&self) {}
}

/// Buffers demand and cancellation until the real upstream subscription
/// arrives, then replays them.
///
/// Operators that hand their downstream a subscription before their own
/// upstream has called `on_subscribe` (`take_until`, `skip_until`,
/// `flat_map` inners) park requests here.
pub struct DeferredSubscription {
  actual: Mutex<Option<Arc<dyn Subscription>>>,
  pending: AtomicU64,
  pending_violation: AtomicBool,
  cancelled: AtomicBool,
}

impl DeferredSubscription {
  pub fn new() -> Self {
    DeferredSubscription {
      actual: Mutex::new(None),
      pending: AtomicU64::new(0),
      pending_violation: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
    }
  }

  /// Installs the upstream subscription and replays whatever accumulated
  /// while it was absent.
  pub fn set(&self, subscription: Arc<dyn Subscription>) {
    if self.cancelled.load(Ordering::Acquire) {
      subscription.cancel();
      return;
    }
    *self.actual.lock() = Some(subscription);
    self.flush();
  }

  fn flush(&self) {
    let actual = self.actual.lock().clone();
    let Some(actual) = actual else { return };
    if self.pending_violation.swap(false, Ordering::AcqRel) {
      actual.request(0);
    }
    let pending = self.pending.swap(0, Ordering::AcqRel);
    if pending > 0 {
      actual.request(pending);
    }
  }
}

impl Default for DeferredSubscription {
  fn default() -> Self {
    Self::new()
  }
}

impl Subscription for DeferredSubscription {
  fn request(&self, n: u64) {
    // Publish first, flush second: a concurrent `set` observes either the
    // published demand or an already flushed counter, never neither.
    if n == 0 {
      self.pending_violation.store(true, Ordering::Release);
    } else {
      add_demand(&self.pending, n);
    }
    self.flush();
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    if let Some(actual) = self.actual.lock().take() {
      actual.cancel();
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::atomic::AtomicU64;

  #[test]
  fn demand_saturates() {
    let counter = AtomicU64::new(0);
    assert_eq!(add_demand(&counter, 3), 0);
    assert_eq!(add_demand(&counter, UNBOUNDED), 3);
    assert_eq!(counter.load(Ordering::Relaxed), UNBOUNDED);
    // Unbounded demand is never decremented.
    assert_eq!(sub_demand(&counter, 10), UNBOUNDED);
  }

  #[test]
  fn demand_accounting() {
    let counter = AtomicU64::new(0);
    add_demand(&counter, 5);
    assert_eq!(sub_demand(&counter, 2), 3);
    assert_eq!(sub_demand(&counter, 3), 0);
  }

  struct Recording {
    requested: AtomicU64,
    cancelled: AtomicBool,
  }

  impl Subscription for Recording {
    fn request(&self, n: u64) {
      self.requested.fetch_add(n, Ordering::SeqCst);
    }

    fn cancel(&self) {
      self.cancelled.store(true, Ordering::SeqCst);
    }
  }

  #[test]
  fn deferred_replays_buffered_demand() {
    let deferred = DeferredSubscription::new();
    deferred.request(4);
    deferred.request(6);

    let upstream = Arc::new(Recording {
      requested: AtomicU64::new(0),
      cancelled: AtomicBool::new(false),
    });
    deferred.set(upstream.clone());
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 10);

    deferred.request(1);
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 11);
  }

  #[test]
  fn deferred_cancel_before_set() {
    let deferred = DeferredSubscription::new();
    deferred.cancel();

    let upstream = Arc::new(Recording {
      requested: AtomicU64::new(0),
      cancelled: AtomicBool::new(false),
    });
    deferred.set(upstream.clone());
    assert!(upstream.cancelled.load(Ordering::SeqCst));
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 0);
  }
}
