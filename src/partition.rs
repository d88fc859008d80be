//! Deterministic division of work.
//!
//! Two functions decide who does what: [`assign`] splits the sorted input
//! files between mapper tasks, and [`owner`] splits integer keys between
//! reducer tasks. Both are pure functions of their arguments.

use std::ops::Range;

/// The half-open slice of `len` items owned by task `index` of `count`.
///
/// Tasks get contiguous blocks of `len / count` items; the last task also
/// absorbs the remainder. When `count > len` the leading tasks get empty
/// ranges.
///
/// # Panics
///
/// Panics if `count == 0` or `index >= count`. Callers validate task
/// identities before reaching here.
pub fn block_range(len: usize, index: usize, count: usize) -> Range<usize> {
    assert!(count > 0 && index < count, "task {index} out of {count}");

    let block = len / count;
    let start = index * block;
    let end = if index == count - 1 { len } else { start + block };
    start..end
}

/// The files owned by mapper `index` of `count`.
///
/// `all` is sorted into lexicographic order first, so the result does not
/// depend on the order the filesystem listed the files in.
pub fn assign<T: Ord + Clone>(all: &[T], index: usize, count: usize) -> Vec<T> {
    let mut sorted = all.to_vec();
    sorted.sort();
    let range = block_range(sorted.len(), index, count);
    sorted[range].to_vec()
}

/// The reducer task that owns `key` among `reducers` tasks.
///
/// True mathematical modulo, so negative keys land in `[0, reducers)` too.
#[inline]
pub fn owner(key: i64, reducers: u32) -> u32 {
    assert!(reducers > 0, "reducer count must be positive");
    // `rem_euclid` is always in [0, reducers), which fits in u32.
    key.rem_euclid(i64::from(reducers)) as u32
}
