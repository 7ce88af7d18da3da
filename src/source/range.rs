use crate::flow::Flow;
use crate::source::{empty, from_iter, just};

/// Creates a flow emitting `count` consecutive integers starting at
/// `start`.
///
/// Zero and one element collapse to [`empty`] and [`just`]. A range whose
/// last value would not fit in an `i32` is a programmer error and panics
/// at construction.
pub fn range(start: i32, count: u32) -> Flow<i32> {
  if count == 0 {
    return empty();
  }
  if count == 1 {
    return just(start);
  }
  let last = i64::from(start) + i64::from(count) - 1;
  assert!(
    last <= i64::from(i32::MAX),
    "range overflow: start + count - 1 must fit in an i32"
  );
  from_iter(start..=(last as i32))
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::{Arc, Mutex};

  #[test]
  fn emits_the_requested_span() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    range(5, 4).subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![5, 6, 7, 8]);
  }

  #[test]
  fn zero_and_one_collapse() {
    assert!(range(10, 0).scalar.is_none());
    assert!(range(10, 1).scalar.is_some());
  }

  #[test]
  fn reaches_the_i32_ceiling() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    range(i32::MAX - 1, 2)
      .subscribe_next(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![i32::MAX - 1, i32::MAX]);
  }

  #[test]
  #[should_panic(expected = "range overflow")]
  fn overflow_panics() {
    range(i32::MAX, 2);
  }
}
