//! End-to-end scenarios and the algebraic laws of the operator set.

mod common;

use common::TestSubscriber;
use rxflow::prelude::*;

fn collect<T: Clone + Send + std::fmt::Debug + 'static>(flow: &Flow<T>) -> Vec<T> {
  let (subscriber, probe) = TestSubscriber::unbounded();
  flow.subscribe(subscriber);
  assert!(probe.terminated(), "flow did not terminate synchronously");
  probe.assert_protocol();
  probe.values()
}

#[test]
fn range_map_filter_pipeline() {
  let flow = range(1, 5).map(|v| v * 2).filter(|v| *v > 4);
  assert_eq!(collect(&flow), vec![6, 8, 10]);
}

#[test]
fn take_beyond_length_completes_without_error() {
  let (subscriber, probe) = TestSubscriber::unbounded();
  from_iter(vec![1, 2, 3]).take(10).subscribe(subscriber);
  assert_eq!(probe.values(), vec![1, 2, 3]);
  assert!(probe.completed());
  assert_eq!(probe.error(), None);
}

#[test]
fn error_source_never_touches_the_mapper() {
  let (subscriber, probe) = TestSubscriber::unbounded();
  error::<i32>(FlowError::message("x"))
    .map(|_| panic!("mapper must not run"))
    .subscribe(subscriber);
  assert_eq!(probe.error(), Some(String::from("x")));
  probe.assert_protocol();
}

#[test]
fn sequential_flat_map_is_ordered() {
  let flow = range(1, 3).flat_map_with(|v| range(10 * v, 2), false, 1, 16);
  assert_eq!(collect(&flow), vec![10, 11, 20, 21, 30, 31]);
}

#[test]
fn concurrent_flat_map_preserves_the_multiset() {
  let flow = range(1, 3).flat_map_with(|v| range(10 * v, 2), false, 3, 16);
  let mut values = collect(&flow);
  values.sort_unstable();
  assert_eq!(values, vec![10, 11, 20, 21, 30, 31]);
}

#[test]
fn take_until_fires_promptly() {
  let (subscriber, probe) = TestSubscriber::unbounded();
  never::<i32>().take_until(just(1)).subscribe(subscriber);
  assert!(probe.values().is_empty());
  assert!(probe.completed());
  probe.assert_protocol();
}

// Laws.

#[test]
fn map_identity_is_identity() {
  let plain = collect(&range(0, 50));
  let mapped = collect(&range(0, 50).map(|v| v));
  assert_eq!(plain, mapped);
}

#[test]
fn map_fusion_matches_composition() {
  let fused = collect(&range(0, 20).map(|v| (v + 1) * 3));
  let chained = collect(&range(0, 20).map(|v| v + 1).map(|v| v * 3));
  assert_eq!(fused, chained);
}

#[test]
fn filter_true_is_identity() {
  let plain = collect(&range(0, 50));
  let filtered = collect(&range(0, 50).filter(|_| true));
  assert_eq!(plain, filtered);
}

#[test]
fn take_count_bounds_the_output() {
  for count in [0u64, 1, 5, 100] {
    let flow = range(0, 50).take(count);
    let values = collect(&flow);
    assert!(values.len() as u64 <= count);
  }
}

#[test]
fn skip_zero_is_identity() {
  let plain = collect(&range(0, 10));
  let skipped = collect(&range(0, 10).skip(0));
  assert_eq!(plain, skipped);
}

#[test]
fn empty_iterables_behave_like_empty() {
  let from_nothing = collect(&from_iter(Vec::<i32>::new()));
  let empty_flow = collect(&empty::<i32>());
  assert_eq!(from_nothing, empty_flow);
}

#[test]
fn singleton_array_behaves_like_just() {
  let array = collect(&from_array(vec![9]));
  let scalar = collect(&just(9));
  assert_eq!(array, scalar);
}

#[test]
fn flat_map_of_just_is_identity_at_concurrency_one() {
  let plain = collect(&range(0, 30));
  let wrapped = collect(&range(0, 30).flat_map_with(just, false, 1, 16));
  assert_eq!(plain, wrapped);
}

#[test]
fn merge_with_empty_is_identity() {
  let plain = collect(&range(0, 10));
  let merged = collect(&merge(vec![range(0, 10), empty()]));
  assert_eq!(plain, merged);
}

#[test]
fn take_last_skip_last_split_the_stream() {
  assert_eq!(collect(&range(0, 10).take_last(3)), vec![7, 8, 9]);
  assert_eq!(
    collect(&range(0, 10).skip_last(3)),
    vec![0, 1, 2, 3, 4, 5, 6]
  );
}

#[test]
fn skip_while_and_skip_until_agree_on_open_gates() {
  let by_predicate = collect(&range(0, 10).skip_while(|_| false));
  let by_other = collect(&range(0, 10).skip_until(just(())));
  assert_eq!(by_predicate, by_other);
}

#[test]
fn composed_transformers_match_direct_chains() {
  let direct = collect(&range(0, 10).map(|v| v * 2).take(4));
  let composed =
    collect(&range(0, 10).compose(|flow| flow.map(|v| v * 2).take(4)));
  assert_eq!(direct, composed);
}

#[test]
fn hidden_flows_behave_identically() {
  let flow = range(0, 5).map(|v| v + 1);
  assert_eq!(collect(&flow.as_flow()), collect(&flow));
}
