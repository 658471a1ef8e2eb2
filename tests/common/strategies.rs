//! Proptest strategies for cursor and backoff properties

use proptest::prelude::*;

/// What happens to one task of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFate {
    Completed,
    Failed,
}

/// (min_ms, max_ms) with `min <= max`
pub fn poll_bounds_strategy() -> impl Strategy<Value = (u64, u64)> {
    (1u64..1_000).prop_flat_map(|min| (Just(min), min..=min * 64))
}

/// Sequence of "found tasks" flags fed to the backoff controller
pub fn poll_history_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..64)
}

/// Strictly increasing task ids above `floor`
pub fn task_ids_strategy(floor: i64) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(1i64..10_000, 0..40)
        .prop_map(move |ids| ids.into_iter().map(|id| id + floor).collect())
}

/// One fate per task plus the order in which workers resolve them
pub fn window_strategy() -> impl Strategy<Value = (Vec<i64>, Vec<TaskFate>, Vec<usize>)> {
    task_ids_strategy(0).prop_flat_map(|ids| {
        let len = ids.len();
        let fates = prop::collection::vec(
            prop_oneof![4 => Just(TaskFate::Completed), 1 => Just(TaskFate::Failed)],
            len,
        );
        let order = Just((0..len).collect::<Vec<_>>()).prop_shuffle();
        (Just(ids), fates, order)
    })
}
