use crate::flow::Flow;
use crate::plugins;
use crate::source::from_iter;

/// Merges a batch of flows into one, subscribing to all of them at once
/// and failing fast on the first error.
///
/// ```
/// use rxflow::prelude::*;
///
/// merge(vec![range(0, 2), range(10, 2)])
///   .subscribe_next(|v| println!("{v}"));
/// ```
pub fn merge<T: Send + 'static>(sources: Vec<Flow<T>>) -> Flow<T> {
  let concurrency = sources.len().max(1);
  from_iter(sources).flat_map_with(
    |flow| flow,
    false,
    concurrency,
    plugins::buffer_size(),
  )
}

/// Like [`merge`], but inner errors are collected and surfaced as one
/// (possibly composite) error once every surviving source finished.
pub fn merge_delay_error<T: Send + 'static>(sources: Vec<Flow<T>>) -> Flow<T> {
  let concurrency = sources.len().max(1);
  from_iter(sources).flat_map_with(
    |flow| flow,
    true,
    concurrency,
    plugins::buffer_size(),
  )
}
