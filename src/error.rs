//! Error taxonomy shared by every phase.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::ArtifactKind;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or missing task parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// The input directory is absent or cannot be listed.
    #[error("input unavailable at {}: {reason}", .path.display())]
    InputUnavailable { path: PathBuf, reason: String },

    /// The previous phase left nothing (or not everything) behind.
    #[error("{}", describe_missing(.kind, .dir, .missing))]
    MissingUpstreamArtifacts {
        kind: ArtifactKind,
        dir: PathBuf,
        /// Empty when no artifact of `kind` was found at all.
        missing: Vec<u32>,
    },

    /// A key showed up in two reducer artifacts.
    #[error(
        "partition consistency error: key {key} found in reduce artifacts {first} and {second}"
    )]
    PartitionConsistency { key: i64, first: u32, second: u32 },

    #[error("corrupt artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("count for key {key} overflows u64")]
    CountOverflow { key: i64 },

    /// Reducer output does not account for mapper output.
    #[error("conservation check failed: {0}")]
    ConservationMismatch(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// `1` usage/configuration, `2` missing input or upstream artifacts,
    /// `3` any other fatal failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::InputUnavailable { .. } | Self::MissingUpstreamArtifacts { .. } => 2,
            _ => 3,
        }
    }
}

fn describe_missing(kind: &ArtifactKind, dir: &std::path::Path, missing: &[u32]) -> String {
    if missing.is_empty() {
        format!(
            "no {} artifacts found in {}; was the {} phase run?",
            kind,
            dir.display(),
            kind
        )
    } else {
        let indices = missing
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "missing {} artifacts for task(s) [{}] in {}",
            kind,
            indices,
            dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(PipelineError::Config("x".into()).exit_code(), 1);

        let missing = PipelineError::MissingUpstreamArtifacts {
            kind: ArtifactKind::Map,
            dir: "w/intermediate".into(),
            missing: vec![],
        };
        assert_eq!(missing.exit_code(), 2);
        assert!(missing.to_string().contains("no map artifacts"));

        let clash = PipelineError::PartitionConsistency {
            key: 4,
            first: 0,
            second: 1,
        };
        assert_eq!(clash.exit_code(), 3);
    }

    #[test]
    fn lists_missing_indices() {
        let err = PipelineError::MissingUpstreamArtifacts {
            kind: ArtifactKind::Reduce,
            dir: "w".into(),
            missing: vec![1, 3],
        };
        assert!(err.to_string().contains("[1, 3]"));
    }
}
