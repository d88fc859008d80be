//! Report phase: merge the reduce artifacts and rank the integers.

use std::cmp::Reverse;
use std::fmt::Write as _;

use fnv::FnvHashMap;
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::store::{ArtifactKind, ArtifactStore};
use crate::{utils, IntegerCount, PipelineError, Result};

pub const DEFAULT_TOP_K: usize = 6;

#[derive(Clone, Debug)]
pub struct ReportSettings {
    pub top_k: usize,
    /// When set, every reduce task index in `[0, n)` must have an artifact.
    pub expect_reducers: Option<u32>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            expect_reducers: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// 1-based.
    pub rank: usize,
    pub integer: i64,
    pub frequency: u64,
}

/// The final ranking plus a few totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub top: usize,
    pub reducer_artifacts: usize,
    pub distinct_keys: usize,
    pub total_count: u64,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// Plain-text table with `rank`, `integer` and `frequency` columns.
    pub fn render(&self) -> String {
        const HEADERS: [&str; 3] = ["rank", "integer", "frequency"];

        let rows = self
            .entries
            .iter()
            .map(|e| [e.rank.to_string(), e.integer.to_string(), e.frequency.to_string()])
            .collect::<Vec<_>>();
        let widths: [usize; 3] = std::array::from_fn(|c| {
            rows.iter()
                .map(|row| row[c].len())
                .chain([HEADERS[c].len()])
                .max()
                .unwrap_or(0)
        });
        let line = |cells: [&str; 3]| {
            cells
                .iter()
                .zip(widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .join("  ")
                .trim_end()
                .to_owned()
        };

        let mut out = String::new();
        let _ = writeln!(out, "Top {} integers by frequency", self.top);
        let _ = writeln!(out, "{}", line(HEADERS));
        for row in &rows {
            let _ = writeln!(out, "{}", line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
        }
        let _ = writeln!(
            out,
            "\n{} reduce artifacts, {} distinct integers, {} occurrences",
            self.reducer_artifacts, self.distinct_keys, self.total_count
        );
        out
    }
}

/// Order by count descending, then key ascending, and keep the first `k`.
pub fn rank(table: &IntegerCount, k: usize) -> Vec<ReportEntry> {
    table
        .iter()
        .sorted_unstable_by_key(|&(key, count)| (Reverse(count), key))
        .take(k)
        .enumerate()
        .map(|(i, (integer, frequency))| ReportEntry {
            rank: i + 1,
            integer,
            frequency,
        })
        .collect()
}

/// Union of reduce artifacts that must not share keys.
///
/// Each key has exactly one owning reducer, so a key seen twice means the
/// partitioning is broken and is reported rather than summed.
pub fn merge_disjoint(
    parts: impl IntoIterator<Item = (u32, IntegerCount)>,
) -> Result<IntegerCount> {
    let mut merged = IntegerCount::new();
    let mut origin: FnvHashMap<i64, u32> = FnvHashMap::default();
    for (index, part) in parts {
        for (key, n) in part.sorted() {
            if merged.insert_new(key, n).is_err() {
                return Err(PipelineError::PartitionConsistency {
                    key,
                    first: origin.get(&key).copied().unwrap_or_default(),
                    second: index,
                });
            }
            origin.insert(key, index);
        }
    }
    Ok(merged)
}

#[derive(Debug)]
pub struct Reporter {
    store: ArtifactStore,
    settings: ReportSettings,
}

impl Reporter {
    pub fn new(store: ArtifactStore, settings: ReportSettings) -> Result<Self> {
        if settings.top_k == 0 {
            return Err(PipelineError::Config("top must be at least 1".to_owned()));
        }
        Ok(Self { store, settings })
    }

    /// Build the report and write `report.json` and `report.txt`.
    pub fn run(&self) -> Result<Report> {
        info!("starting report (top {})", self.settings.top_k);

        let inputs = self
            .store
            .require(ArtifactKind::Reduce, self.settings.expect_reducers)?;
        let artifacts = inputs.len();
        let parts = inputs
            .into_iter()
            .map(|(index, path)| Ok((index, self.store.read(&path)?)))
            .collect::<Result<Vec<_>>>()?;
        let merged = merge_disjoint(parts)?;

        let report = Report {
            top: self.settings.top_k,
            reducer_artifacts: artifacts,
            distinct_keys: merged.len(),
            total_count: merged.total()?,
            entries: rank(&merged, self.settings.top_k),
        };

        let mut json = serde_json::to_string_pretty(&report)?;
        json.push('\n');
        utils::write_atomic(&self.store.report_json_path(), json.as_bytes())?;
        utils::write_atomic(&self.store.report_text_path(), report.render().as_bytes())?;
        info!(
            "report done: {} entries from {} distinct integers -> {}",
            report.entries.len(),
            report.distinct_keys,
            self.store.report_json_path().display()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(pairs: &[(i64, u64)]) -> IntegerCount {
        IntegerCount::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn pairs(entries: &[ReportEntry]) -> Vec<(i64, u64)> {
        entries.iter().map(|e| (e.integer, e.frequency)).collect()
    }

    #[test]
    fn ties_break_by_ascending_key() {
        let ranked = rank(&table(&[(5, 10), (3, 10), (7, 8)]), 2);
        assert_eq!(pairs(&ranked), vec![(3, 10), (5, 10)]);
        assert_eq!(ranked.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn short_tables_and_negatives() {
        let ranked = rank(&table(&[(-2, 1), (9, 4), (-8, 4)]), 6);
        assert_eq!(pairs(&ranked), vec![(-8, 4), (9, 4), (-2, 1)]);
        assert!(rank(&IntegerCount::new(), 6).is_empty());
    }

    #[test]
    fn merge_detects_shared_keys() {
        let merged = merge_disjoint([(0, table(&[(2, 1)])), (1, table(&[(1, 3)]))]).unwrap();
        assert_eq!(merged.sorted(), vec![(1, 3), (2, 1)]);

        let err = merge_disjoint([
            (0, table(&[(4, 1)])),
            (1, table(&[(5, 1)])),
            (2, table(&[(4, 2)])),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PartitionConsistency {
                key: 4,
                first: 0,
                second: 2
            }
        ));
    }

    #[test]
    fn rendered_table() {
        let report = Report {
            top: 2,
            reducer_artifacts: 2,
            distinct_keys: 3,
            total_count: 8,
            entries: rank(&table(&[(1, 3), (2, 2), (3, 3)]), 2),
        };
        let expected = "Top 2 integers by frequency\n\
                        rank  integer  frequency\n\
                        1     1        3\n\
                        2     3        3\n\
                        \n\
                        2 reduce artifacts, 3 distinct integers, 8 occurrences\n";
        assert_eq!(report.render(), expected);
    }

    #[test]
    fn total_overflow_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write(ArtifactKind::Reduce, 0, &table(&[(0, u64::MAX)])).unwrap();
        store.write(ArtifactKind::Reduce, 1, &table(&[(1, 1)])).unwrap();

        let err = Reporter::new(store.clone(), ReportSettings::default())
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, PipelineError::CountOverflow { .. }));
        assert!(!store.report_json_path().exists());
    }
}
