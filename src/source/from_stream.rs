use std::sync::Arc;

use futures::executor::block_on_stream;
use futures::Stream;
use parking_lot::Mutex;

use crate::error::FlowError;
use crate::flow::Flow;
use crate::source::from_iter::IterSubscription;
use crate::subscriber::BoxSubscriber;
use crate::subscription::EmptySubscription;

/// Creates a flow from an asynchronous stream.
///
/// The stream is single-use: the first subscription consumes it and any
/// later subscription is terminated with a constraint error. Items are
/// pulled on the requesting thread, blocking while the stream is pending,
/// so demand is honored exactly like the iterator sources.
pub fn from_stream<S>(stream: S) -> Flow<S::Item>
where
  S: Stream + Send + Unpin + 'static,
  S::Item: Send + 'static,
{
  let slot = Arc::new(Mutex::new(Some(stream)));
  Flow::create(move |mut subscriber: BoxSubscriber<S::Item>| {
    match slot.lock().take() {
      Some(stream) => {
        IterSubscription::start(None, block_on_stream(stream), subscriber);
      }
      None => {
        subscriber.on_subscribe(EmptySubscription::arc());
        subscriber.on_error(FlowError::constraint(
          "stream source allows only one subscription",
        ));
      }
    }
  })
}
