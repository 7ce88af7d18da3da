//! Process-wide interception points and configuration.
//!
//! Three replaceable hooks observe the life of every flow: `on_create`
//! intercepts assembly, `on_subscribe` intercepts every downstream
//! subscriber before handoff, and `on_error` receives errors that have no
//! subscriber left to hear them. Hooks are meant to be installed once at
//! startup, before anything subscribes; each operation snapshots the hook
//! it uses, so concurrent replacement cannot corrupt state but is not
//! atomic with respect to in-flight work.

use std::any::Any;
use std::env;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::subscriber::BoxSubscriber;

/// The floor every configured buffer size is clamped to.
pub const MIN_BUFFER_SIZE: usize = 16;

const DEFAULT_BUFFER_SIZE: usize = 128;
const BUFFER_SIZE_VAR: &str = "RXFLOW_BUFFER_SIZE";

/// An assembly hook receives the flow (or subscriber) as `dyn Any` because
/// a process-global slot cannot be generic over the element type. The hook
/// must hand back the same concrete type it was given.
pub type AssemblyHook =
  Arc<dyn Fn(Box<dyn Any + Send>) -> Box<dyn Any + Send> + Send + Sync>;

type ErrorHook = Arc<dyn Fn(&FlowError) + Send + Sync>;

static CREATE_HOOK: RwLock<Option<AssemblyHook>> = RwLock::new(None);
static SUBSCRIBE_HOOK: RwLock<Option<AssemblyHook>> = RwLock::new(None);
static ERROR_HOOK: RwLock<Option<ErrorHook>> = RwLock::new(None);
static BUFFER_SIZE: OnceCell<usize> = OnceCell::new();

/// Installs a hook applied to every flow built through [`Flow::create`]
/// and the operator factories. Identity when unset.
pub fn set_on_create(
  hook: impl Fn(Box<dyn Any + Send>) -> Box<dyn Any + Send>
    + Send
    + Sync
    + 'static,
) {
  *CREATE_HOOK.write() = Some(Arc::new(hook));
}

/// Installs a hook applied to every subscriber before it is handed to a
/// subscribe-function, once per lifted layer. Identity when unset.
pub fn set_on_subscribe(
  hook: impl Fn(Box<dyn Any + Send>) -> Box<dyn Any + Send>
    + Send
    + Sync
    + 'static,
) {
  *SUBSCRIBE_HOOK.write() = Some(Arc::new(hook));
}

/// Installs the receiver for errors that cannot be delivered to any
/// subscriber. When unset such errors are logged and dropped.
pub fn set_on_error(hook: impl Fn(&FlowError) + Send + Sync + 'static) {
  *ERROR_HOOK.write() = Some(Arc::new(hook));
}

/// Restores all hooks to their defaults.
pub fn reset() {
  *CREATE_HOOK.write() = None;
  *SUBSCRIBE_HOOK.write() = None;
  *ERROR_HOOK.write() = None;
}

pub(crate) fn apply_create<T: Send + 'static>(flow: Flow<T>) -> Flow<T> {
  let hook = CREATE_HOOK.read().clone();
  match hook {
    None => flow,
    Some(hook) => match hook(Box::new(flow)).downcast::<Flow<T>>() {
      Ok(flow) => *flow,
      Err(_) => {
        panic!("on_create hook must return the flow type it was handed")
      }
    },
  }
}

pub(crate) fn apply_subscribe<T: Send + 'static>(
  subscriber: BoxSubscriber<T>,
) -> BoxSubscriber<T> {
  let hook = SUBSCRIBE_HOOK.read().clone();
  match hook {
    None => subscriber,
    Some(hook) => {
      match hook(Box::new(subscriber)).downcast::<BoxSubscriber<T>>() {
        Ok(subscriber) => *subscriber,
        Err(_) => panic!(
          "on_subscribe hook must return the subscriber type it was handed"
        ),
      }
    }
  }
}

/// Routes an error that has no valid subscriber to the installed hook, or
/// logs and drops it.
pub fn on_error_dropped(error: &FlowError) {
  let hook = ERROR_HOOK.read().clone();
  match hook {
    Some(hook) => hook(error),
    None => {
      tracing::error!(%error, "error dropped: no subscriber can receive it");
    }
  }
}

/// Fixes the default prefetch before first use. Returns false if the value
/// was already fixed (by an earlier call or by a read).
pub fn init_buffer_size(size: usize) -> bool {
  BUFFER_SIZE.set(size.max(MIN_BUFFER_SIZE)).is_ok()
}

/// The process-wide default prefetch used by `flat_map` and `merge`.
///
/// Read once: the first access settles it from [`init_buffer_size`], the
/// `RXFLOW_BUFFER_SIZE` environment variable, or the built-in default of
/// 128, clamped to at least [`MIN_BUFFER_SIZE`].
pub fn buffer_size() -> usize {
  *BUFFER_SIZE.get_or_init(|| {
    env::var(BUFFER_SIZE_VAR)
      .ok()
      .and_then(|value| value.parse::<usize>().ok())
      .unwrap_or(DEFAULT_BUFFER_SIZE)
      .max(MIN_BUFFER_SIZE)
  })
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn buffer_size_has_floor() {
    assert!(buffer_size() >= MIN_BUFFER_SIZE);
    // Already settled above, so late initialization must be rejected.
    assert!(!init_buffer_size(4096));
  }
}
