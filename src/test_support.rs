//! Small recording subscriber shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::FlowError;
use crate::subscriber::Subscriber;
use crate::subscription::{Subscription, UNBOUNDED};

pub(crate) struct Recording<T> {
  values: Arc<Mutex<Vec<T>>>,
  errors: Arc<Mutex<Vec<String>>>,
  completed: Arc<AtomicBool>,
}

impl<T> Recording<T> {
  pub(crate) fn new(
    values: Arc<Mutex<Vec<T>>>,
    errors: Arc<Mutex<Vec<String>>>,
  ) -> Self {
    Recording { values, errors, completed: Arc::new(AtomicBool::new(false)) }
  }

  pub(crate) fn with_completed(mut self, flag: Arc<AtomicBool>) -> Self {
    self.completed = flag;
    self
  }
}

impl<T: Send> Subscriber<T> for Recording<T> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, value: T) {
    self.values.lock().unwrap().push(value);
  }

  fn on_error(&mut self, error: FlowError) {
    self.errors.lock().unwrap().push(error.to_string());
  }

  fn on_complete(&mut self) {
    self.completed.store(true, Ordering::SeqCst);
  }
}
