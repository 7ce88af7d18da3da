//! Shared helpers for the integration tests: a recording subscriber with
//! controllable demand, and a source that emits from its own thread.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rxflow::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T> {
  Subscribed,
  Next(T),
  Error(String),
  Complete,
}

struct Inner<T> {
  signals: Mutex<Vec<Signal<T>>>,
  subscription: Mutex<Option<Arc<dyn Subscription>>>,
  depth: AtomicUsize,
  overlapped: AtomicBool,
}

impl<T> Inner<T> {
  fn record(&self, signal: Signal<T>) {
    if self.depth.fetch_add(1, Ordering::SeqCst) > 0 {
      self.overlapped.store(true, Ordering::SeqCst);
    }
    self.signals.lock().unwrap().push(signal);
    self.depth.fetch_sub(1, Ordering::SeqCst);
  }
}

/// Records every signal it receives and requests `initial_request` when
/// subscribed. Pair it with a [`TestProbe`] to drive demand and assert on
/// what arrived.
pub struct TestSubscriber<T> {
  inner: Arc<Inner<T>>,
  initial_request: u64,
}

impl<T: Send + 'static> TestSubscriber<T> {
  pub fn with_request(initial_request: u64) -> (Self, TestProbe<T>) {
    let inner = Arc::new(Inner {
      signals: Mutex::new(Vec::new()),
      subscription: Mutex::new(None),
      depth: AtomicUsize::new(0),
      overlapped: AtomicBool::new(false),
    });
    let probe = TestProbe { inner: inner.clone() };
    (TestSubscriber { inner, initial_request }, probe)
  }

  pub fn unbounded() -> (Self, TestProbe<T>) {
    Self::with_request(UNBOUNDED)
  }
}

impl<T: Send + 'static> Subscriber<T> for TestSubscriber<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.inner.record(Signal::Subscribed);
    *self.inner.subscription.lock().unwrap() = Some(subscription.clone());
    if self.initial_request > 0 {
      subscription.request(self.initial_request);
    }
  }

  fn on_next(&mut self, value: T) {
    self.inner.record(Signal::Next(value));
  }

  fn on_error(&mut self, error: FlowError) {
    self.inner.record(Signal::Error(error.to_string()));
  }

  fn on_complete(&mut self) {
    self.inner.record(Signal::Complete);
  }
}

pub struct TestProbe<T> {
  inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + std::fmt::Debug + 'static> TestProbe<T> {
  pub fn signals(&self) -> Vec<Signal<T>> {
    self.inner.signals.lock().unwrap().clone()
  }

  pub fn values(&self) -> Vec<T> {
    self
      .signals()
      .into_iter()
      .filter_map(|signal| match signal {
        Signal::Next(value) => Some(value),
        _ => None,
      })
      .collect()
  }

  pub fn error(&self) -> Option<String> {
    self.signals().into_iter().find_map(|signal| match signal {
      Signal::Error(message) => Some(message),
      _ => None,
    })
  }

  pub fn completed(&self) -> bool {
    self
      .signals()
      .iter()
      .any(|signal| matches!(signal, Signal::Complete))
  }

  pub fn terminated(&self) -> bool {
    self.completed() || self.error().is_some()
  }

  pub fn request(&self, n: u64) {
    let subscription = self.inner.subscription.lock().unwrap().clone();
    if let Some(subscription) = subscription {
      subscription.request(n);
    }
  }

  pub fn cancel(&self) {
    let subscription = self.inner.subscription.lock().unwrap().clone();
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }

  pub fn await_terminal(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
      if self.terminated() {
        return true;
      }
      thread::sleep(Duration::from_millis(1));
    }
    self.terminated()
  }

  /// Checks the signal log against the subscription protocol:
  /// `Subscribed` exactly once and first, at most one terminal, nothing
  /// after it, and no two signals delivered concurrently or reentrantly.
  pub fn assert_protocol(&self) {
    let signals = self.signals();
    assert!(
      matches!(signals.first(), Some(Signal::Subscribed)),
      "on_subscribe must precede every other signal: {signals:?}"
    );
    let subscribes = signals
      .iter()
      .filter(|signal| matches!(signal, Signal::Subscribed))
      .count();
    assert_eq!(subscribes, 1, "on_subscribe must be delivered exactly once");
    let terminal = signals.iter().position(|signal| {
      matches!(signal, Signal::Complete | Signal::Error(_))
    });
    if let Some(position) = terminal {
      assert_eq!(
        position,
        signals.len() - 1,
        "no signal may follow a terminal signal: {signals:?}"
      );
    }
    assert!(
      !self.inner.overlapped.load(Ordering::SeqCst),
      "signals were delivered concurrently"
    );
  }
}

struct ThreadState {
  demand: Mutex<u64>,
  gate: Condvar,
  cancelled: AtomicBool,
}

struct ThreadSubscription {
  state: Arc<ThreadState>,
}

impl Subscription for ThreadSubscription {
  fn request(&self, n: u64) {
    let mut demand = self.state.demand.lock().unwrap();
    *demand = demand.saturating_add(n.max(1));
    self.state.gate.notify_all();
  }

  fn cancel(&self) {
    self.state.cancelled.store(true, Ordering::SeqCst);
    self.state.gate.notify_all();
  }
}

/// A source that honors demand from a spawned producer thread, so signals
/// genuinely arrive from another thread than the subscriber's.
pub fn thread_source<T>(items: Vec<T>) -> Flow<T>
where
  T: Clone + Send + Sync + 'static,
{
  Flow::create(move |mut subscriber| {
    let items = items.clone();
    let state = Arc::new(ThreadState {
      demand: Mutex::new(0),
      gate: Condvar::new(),
      cancelled: AtomicBool::new(false),
    });
    subscriber.on_subscribe(Arc::new(ThreadSubscription {
      state: state.clone(),
    }) as Arc<dyn Subscription>);
    thread::spawn(move || {
      let mut subscriber = subscriber;
      for item in items {
        {
          let mut demand = state.demand.lock().unwrap();
          loop {
            if state.cancelled.load(Ordering::SeqCst) {
              return;
            }
            if *demand > 0 {
              break;
            }
            demand = state.gate.wait(demand).unwrap();
          }
          if *demand != u64::MAX {
            *demand -= 1;
          }
        }
        subscriber.on_next(item);
      }
      if !state.cancelled.load(Ordering::SeqCst) {
        subscriber.on_complete();
      }
    });
  })
}
