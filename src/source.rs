mod defer;
mod from_callable;
mod from_future;
mod from_iter;
mod from_stream;
mod just;
mod range;
mod trivial;

pub use defer::defer;
pub use from_callable::from_callable;
pub use from_future::{from_future, from_future_result};
pub use from_iter::{from_array, from_iter};
pub use from_stream::from_stream;
pub use just::just;
pub use range::range;
pub use trivial::{empty, error, error_with, never};
