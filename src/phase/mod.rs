//! The three pipeline phases plus the consistency checker.
//!
//! Each phase is driven by a [`Task`] (which phase, which index, how many
//! siblings) and an [`ArtifactStore`](crate::store::ArtifactStore), and
//! produces files only through the store.

use std::fmt;

use crate::{PipelineError, Result};

pub mod map;
pub mod reduce;
pub mod report;
pub mod verify;

pub use map::{MapSettings, MapSummary, Mapper};
pub use reduce::{ReduceSettings, ReduceSummary, Reducer};
pub use report::{Report, ReportEntry, ReportSettings, Reporter, DEFAULT_TOP_K};
pub use verify::{verify, Verification};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    Map,
    Reduce,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => f.write_str("map"),
            Phase::Reduce => f.write_str("reduce"),
        }
    }
}

/// Identity of one parallel task within a phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Task {
    phase: Phase,
    index: u32,
    count: u32,
}

impl Task {
    /// Validates `count >= 1` and `index < count`.
    pub fn new(phase: Phase, index: u32, count: u32) -> Result<Self> {
        if count == 0 {
            return Err(PipelineError::Config(format!(
                "{phase} task count must be at least 1"
            )));
        }
        if index >= count {
            return Err(PipelineError::Config(format!(
                "{phase} task index {index} out of range for task count {count}"
            )));
        }
        Ok(Self {
            phase,
            index,
            count,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.phase, self.index, self.count)
    }
}
