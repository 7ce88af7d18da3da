use crate::flow::Flow;

/// Creates a flow that asks `supplier` for a fresh flow at every
/// subscription and subscribes to that.
///
/// Nothing runs until someone subscribes, and each subscriber gets its own
/// materialized flow. A supplier that can fail should return an
/// [`error`](crate::source::error) flow.
pub fn defer<T, F>(supplier: F) -> Flow<T>
where
  T: Send + 'static,
  F: Fn() -> Flow<T> + Send + Sync + 'static,
{
  Flow::create(move |subscriber| supplier().subscribe_boxed(subscriber))
}
