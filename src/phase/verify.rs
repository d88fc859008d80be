//! Cross-checks the reduce artifacts against the map artifacts.
//!
//! Uses the same [`owner`] function as the reducers, so a pass here means the
//! reducers kept exactly what they own and nothing was lost or duplicated on
//! the way.

use log::info;

use super::report::merge_disjoint;
use crate::partition::owner;
use crate::store::{ArtifactKind, ArtifactStore};
use crate::{IntegerCount, PipelineError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub map_artifacts: usize,
    pub reduce_artifacts: usize,
    pub reducers: u32,
    pub distinct_keys: usize,
    pub total_count: u64,
}

/// Check ownership, disjointness and per-key conservation.
///
/// `reducers` defaults to one past the highest reduce artifact index.
pub fn verify(store: &ArtifactStore, reducers: Option<u32>) -> Result<Verification> {
    let maps = store.require(ArtifactKind::Map, None)?;
    let reduces = store.require(ArtifactKind::Reduce, reducers)?;
    let reducers = match reducers {
        Some(n) => n,
        None => reduces.last().map_or(1, |(i, _)| i + 1),
    };

    let mut expected = IntegerCount::new();
    for (_, path) in &maps {
        expected.merge(&store.read(path)?)?;
    }

    let mut parts = Vec::with_capacity(reduces.len());
    for (index, path) in &reduces {
        let part = store.read(path)?;
        if let Some((key, _)) = part.sorted().into_iter().find(|&(k, _)| owner(k, reducers) != *index) {
            return Err(PipelineError::ConservationMismatch(format!(
                "key {} is in reduce artifact {} but owned by reducer {} of {}",
                key,
                index,
                owner(key, reducers),
                reducers
            )));
        }
        parts.push((*index, part));
    }
    let actual = merge_disjoint(parts)?;

    if actual != expected {
        let mut keys = expected.iter().chain(actual.iter()).map(|(k, _)| k).collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();
        if let Some(key) = keys.into_iter().find(|&k| expected.get(k) != actual.get(k)) {
            return Err(PipelineError::ConservationMismatch(format!(
                "key {}: map artifacts count {}, reduce artifacts count {}",
                key,
                expected.get(key).unwrap_or(0),
                actual.get(key).unwrap_or(0)
            )));
        }
    }

    let verification = Verification {
        map_artifacts: maps.len(),
        reduce_artifacts: reduces.len(),
        reducers,
        distinct_keys: actual.len(),
        total_count: actual.total()?,
    };
    info!(
        "verified {} keys / {} occurrences across {} map and {} reduce artifacts",
        verification.distinct_keys,
        verification.total_count,
        verification.map_artifacts,
        verification.reduce_artifacts
    );
    Ok(verification)
}
