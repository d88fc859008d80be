//! The intermediate store: where artifacts live and what they are called.
//!
//! Writers and readers both go through [`ArtifactKind::file_name`] and
//! [`ArtifactStore::list`], so the naming convention exists in exactly one
//! place.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use glob::{glob, Pattern};
use log::{debug, warn};

use crate::{codec, utils, IntegerCount, PipelineError, Result};

const INTERMEDIATE_DIR: &str = "intermediate";
const EXTENSION: &str = "ifc";
const REPORT_JSON: &str = "report.json";
const REPORT_TEXT: &str = "report.txt";

/// The two kinds of intermediate artifact.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArtifactKind {
    Map,
    Reduce,
}

impl ArtifactKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Reduce => "reduce",
        }
    }

    /// `mr-map-3.ifc`, `mr-reduce-0.ifc`, ...
    pub fn file_name(self, index: u32) -> String {
        format!("mr-{}-{}.{}", self.tag(), index, EXTENSION)
    }

    /// Inverse of [`ArtifactKind::file_name`].
    pub fn parse_index(self, file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix("mr-")?
            .strip_prefix(self.tag())?
            .strip_prefix('-')?
            .strip_suffix(EXTENSION)?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn glob_suffix(self) -> String {
        format!("mr-{}-*.{}", self.tag(), EXTENSION)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Layout of a work directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    intermediate: PathBuf,
}

impl ArtifactStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let root = work_dir.into();
        let intermediate = root.join(INTERMEDIATE_DIR);
        Self { root, intermediate }
    }

    pub fn intermediate_dir(&self) -> &Path {
        &self.intermediate
    }

    pub fn artifact_path(&self, kind: ArtifactKind, index: u32) -> PathBuf {
        self.intermediate.join(kind.file_name(index))
    }

    pub fn report_json_path(&self) -> PathBuf {
        self.root.join(REPORT_JSON)
    }

    pub fn report_text_path(&self) -> PathBuf {
        self.root.join(REPORT_TEXT)
    }

    /// Write the artifact for `(kind, index)`, replacing any previous one.
    pub fn write(&self, kind: ArtifactKind, index: u32, table: &IntegerCount) -> Result<PathBuf> {
        utils::ensure_dir(&self.intermediate)?;
        let path = self.artifact_path(kind, index);
        utils::write_atomic(&path, &codec::encode(table))?;
        debug!("wrote {} ({} keys)", path.display(), table.len());
        Ok(path)
    }

    /// Load one artifact.
    pub fn read(&self, path: &Path) -> Result<IntegerCount> {
        let buf = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        codec::decode(Bytes::from(buf)).map_err(|reason| PipelineError::corrupt(path, reason))
    }

    /// Every artifact of `kind` currently present, ordered by task index.
    pub fn list(&self, kind: ArtifactKind) -> Result<Vec<(u32, PathBuf)>> {
        if !self.intermediate.is_dir() {
            return Ok(Vec::new());
        }

        let dir = self.intermediate.to_str().ok_or_else(|| {
            PipelineError::Config(format!(
                "work directory {} is not valid UTF-8",
                self.intermediate.display()
            ))
        })?;
        let pattern = format!("{}/{}", Pattern::escape(dir), kind.glob_suffix());
        let entries = glob(&pattern).map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                let source = std::io::Error::new(e.error().kind(), e.error().to_string());
                PipelineError::io(e.path(), source)
            })?;
            let index = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| kind.parse_index(n));
            match index {
                Some(index) if path.is_file() => found.push((index, path)),
                _ => debug!("ignoring {}", path.display()),
            }
        }
        found.sort();
        Ok(found)
    }

    /// Like [`ArtifactStore::list`], but fail when the upstream phase left
    /// nothing behind.
    ///
    /// With `expected = Some(n)` every task index in `[0, n)` must be present
    /// and artifacts with higher indices (left over from a run with more
    /// tasks) are skipped.
    pub fn require(&self, kind: ArtifactKind, expected: Option<u32>) -> Result<Vec<(u32, PathBuf)>> {
        if expected == Some(0) {
            return Err(PipelineError::Config(format!(
                "expected number of {kind} artifacts must be at least 1"
            )));
        }

        let mut found = self.list(kind)?;
        if found.is_empty() {
            return Err(PipelineError::MissingUpstreamArtifacts {
                kind,
                dir: self.intermediate.clone(),
                missing: Vec::new(),
            });
        }

        if let Some(n) = expected {
            let (keep, stale): (Vec<_>, Vec<_>) = found.into_iter().partition(|(i, _)| *i < n);
            for (_, path) in &stale {
                warn!("ignoring stale artifact {}", path.display());
            }
            let missing = (0..n)
                .filter(|i| keep.binary_search_by_key(i, |(j, _)| *j).is_err())
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                return Err(PipelineError::MissingUpstreamArtifacts {
                    kind,
                    dir: self.intermediate.clone(),
                    missing,
                });
            }
            found = keep;
        }
        Ok(found)
    }
}
