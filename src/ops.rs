mod filter;
mod flat_map;
mod ignore_elements;
mod map;
mod merge;
mod skip;
mod skip_last;
mod skip_until;
mod skip_while;
mod take;
mod take_last;
mod take_until;

pub use merge::{merge, merge_delay_error};
