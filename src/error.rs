use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// The error currency of a flow.
///
/// Every `on_error` signal carries a `FlowError`. The type is cheap to clone
/// so an error source can re-deliver the same error to every one of its
/// subscribers.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
  /// An argument or protocol constraint was violated at a point where a
  /// subscriber exists to be told, e.g. `request(0)` or a second
  /// subscription to a single-use source.
  #[error("constraint violation: {0}")]
  Constraint(String),

  /// An ad-hoc error raised by a source, mapper or predicate.
  #[error("{0}")]
  Message(String),

  /// An upstream produced more items than were requested from it.
  #[error("missing backpressure: {0}")]
  MissingBackpressure(String),

  /// Several errors collected while `delay_errors` was in effect.
  #[error("{} errors occurred", .0.len())]
  Composite(Vec<FlowError>),

  /// Any foreign error, shared so the flow error stays clonable.
  #[error("{0}")]
  Shared(Arc<dyn StdError + Send + Sync + 'static>),
}

impl FlowError {
  pub fn message(message: impl Into<String>) -> Self {
    FlowError::Message(message.into())
  }

  pub fn constraint(message: impl Into<String>) -> Self {
    FlowError::Constraint(message.into())
  }

  /// Wraps any standard error into a flow error.
  pub fn wrap(error: impl StdError + Send + Sync + 'static) -> Self {
    FlowError::Shared(Arc::new(error))
  }

  /// Collapses a batch of collected errors: one error stays itself, more
  /// than one becomes a [`FlowError::Composite`].
  pub fn composite(mut errors: Vec<FlowError>) -> Self {
    match errors.len() {
      0 => FlowError::message("composite of zero errors"),
      1 => match errors.pop() {
        Some(error) => error,
        None => FlowError::message("composite of zero errors"),
      },
      _ => FlowError::Composite(errors),
    }
  }

  /// True for errors that report a protocol or argument violation.
  pub fn is_constraint(&self) -> bool {
    matches!(self, FlowError::Constraint(_))
  }
}

impl From<String> for FlowError {
  fn from(message: String) -> Self {
    FlowError::Message(message)
  }
}

impl From<&str> for FlowError {
  fn from(message: &str) -> Self {
    FlowError::Message(message.to_owned())
  }
}
