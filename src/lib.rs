//! A file-coordinated MapReduce (lite) pipeline for counting integers.
//!
//! Every task (one mapper, one reducer, or the reporter) is an independent,
//! stateless invocation. Tasks never talk to each other directly: mappers
//! write one artifact each into a shared intermediate store, reducers scan
//! all mapper artifacts and keep only the keys they own, and the reporter
//! merges the reducer artifacts into a single top-K ranking.

use fnv::FnvHashMap;
use itertools::Itertools;

pub mod codec;
pub mod cmd;
pub mod error;
pub mod partition;
pub mod phase;
pub mod standalone;
pub mod store;
pub mod utils;

pub use error::{PipelineError, Result};

/// Install the process-wide logger. `RUST_LOG` overrides the default level.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init()
}

/////////////////////////////////////////////////////////////////////////////
// Integer counts
/////////////////////////////////////////////////////////////////////////////

/// A mapping from an integer key to its number of occurrences.
///
/// Internally an unordered hash map. Anything that leaves the process
/// (artifacts, rankings) goes through [`IntegerCount::sorted`] so that the
/// output never depends on hash iteration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegerCount {
    counts: FnvHashMap<i64, u64>,
}

impl IntegerCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from pairs, summing repeated keys with [`IntegerCount::add`].
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, u64)>) -> Result<Self> {
        let mut table = Self::new();
        for (key, n) in pairs {
            table.add(key, n)?;
        }
        Ok(table)
    }

    /// Add `n` occurrences of `key`.
    pub fn add(&mut self, key: i64, n: u64) -> Result<()> {
        let slot = self.counts.entry(key).or_insert(0);
        *slot = slot
            .checked_add(n)
            .ok_or(PipelineError::CountOverflow { key })?;
        Ok(())
    }

    /// Record a single occurrence of `key`.
    #[inline]
    pub fn increment(&mut self, key: i64) -> Result<()> {
        self.add(key, 1)
    }

    /// Sum every entry of `other` into `self`.
    pub fn merge(&mut self, other: &IntegerCount) -> Result<()> {
        for (&key, &n) in &other.counts {
            self.add(key, n)?;
        }
        Ok(())
    }

    /// Insert a key that must not be present yet.
    ///
    /// Returns the existing count instead of inserting when the key is
    /// already there, leaving the table untouched.
    pub fn insert_new(&mut self, key: i64, n: u64) -> std::result::Result<(), u64> {
        use std::collections::hash_map::Entry;

        match self.counts.entry(key) {
            Entry::Occupied(o) => Err(*o.get()),
            Entry::Vacant(v) => {
                v.insert(n);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: i64) -> Option<u64> {
        self.counts.get(&key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> Result<u64> {
        self.counts.iter().try_fold(0u64, |sum, (&key, &n)| {
            sum.checked_add(n).ok_or(PipelineError::CountOverflow { key })
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.counts.iter().map(|(&k, &n)| (k, n))
    }

    /// All entries, ascending by key.
    pub fn sorted(&self) -> Vec<(i64, u64)> {
        self.iter().sorted_unstable_by_key(|&(k, _)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{IntegerCount, PipelineError};

    #[test]
    fn merge_is_additive() {
        let mut a = IntegerCount::from_pairs([(1, 2), (-4, 1), (1, 0)]).unwrap();
        let b = IntegerCount::from_pairs([(1, 3), (7, 1)]).unwrap();
        a.merge(&b).unwrap();

        assert_eq!(a.sorted(), vec![(-4, 1), (1, 5), (7, 1)]);
        assert_eq!(a.total().unwrap(), 7);
    }

    #[test]
    fn insert_new_refuses_duplicates() {
        let mut table = IntegerCount::new();
        assert_eq!(table.insert_new(3, 10), Ok(()));
        assert_eq!(table.insert_new(3, 4), Err(10));
        assert_eq!(table.get(3), Some(10));
    }

    #[test]
    fn add_detects_overflow() {
        let mut table = IntegerCount::new();
        table.add(0, u64::MAX).unwrap();
        assert!(table.increment(0).is_err());
        assert_eq!(table.get(0), Some(u64::MAX));

        assert!(IntegerCount::from_pairs([(5, u64::MAX), (5, 1)]).is_err());
    }

    #[test]
    fn total_detects_overflow() {
        let table = IntegerCount::from_pairs([(0, u64::MAX), (1, 1)]).unwrap();
        let err = table.total().unwrap_err();
        assert!(matches!(err, PipelineError::CountOverflow { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
