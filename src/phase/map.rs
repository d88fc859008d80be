//! Map phase: count the integers in this task's share of the input files.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use log::{debug, info, warn};

use super::{Phase, Task};
use crate::partition;
use crate::store::{ArtifactKind, ArtifactStore};
use crate::{IntegerCount, PipelineError, Result};

/// Where the input comes from and which tokens count.
#[derive(Clone, Debug)]
pub struct MapSettings {
    pub input_dir: PathBuf,
    /// Glob, relative to `input_dir`, selecting the input files.
    pub pattern: String,
    /// Inclusive lower bound; smaller values are skipped.
    pub min_value: Option<i64>,
    /// Inclusive upper bound; larger values are skipped.
    pub max_value: Option<i64>,
}

impl MapSettings {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            pattern: "*".to_owned(),
            min_value: None,
            max_value: None,
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn value_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    fn accepts(&self, value: i64) -> bool {
        self.min_value.map_or(true, |min| value >= min)
            && self.max_value.map_or(true, |max| value <= max)
    }
}

/// What one map task did.
#[derive(Clone, Debug)]
pub struct MapSummary {
    pub task: Task,
    pub files_assigned: usize,
    pub files_read: usize,
    /// Files that could not be read, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
    pub tokens_counted: u64,
    pub tokens_skipped: u64,
    pub distinct_keys: usize,
    pub artifact: PathBuf,
}

#[derive(Debug)]
pub struct Mapper {
    store: ArtifactStore,
    settings: MapSettings,
    task: Task,
}

impl Mapper {
    pub fn new(store: ArtifactStore, settings: MapSettings, task: Task) -> Result<Self> {
        if task.phase() != Phase::Map {
            return Err(PipelineError::Config(format!("mapper given a {task} task")));
        }
        if let (Some(min), Some(max)) = (settings.min_value, settings.max_value) {
            if min > max {
                return Err(PipelineError::Config(format!(
                    "min value {min} is greater than max value {max}"
                )));
            }
        }
        Ok(Self {
            store,
            settings,
            task,
        })
    }

    /// Every input file matching the pattern, in lexicographic order.
    ///
    /// The report files are never input, even when the work directory is
    /// the input directory.
    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.settings.input_dir;
        if !dir.is_dir() {
            return Err(PipelineError::InputUnavailable {
                path: dir.clone(),
                reason: "not a directory or does not exist".to_owned(),
            });
        }

        let dir_str = dir.to_str().ok_or_else(|| {
            PipelineError::Config(format!("input directory {} is not valid UTF-8", dir.display()))
        })?;
        let pattern = format!("{}/{}", Pattern::escape(dir_str), self.settings.pattern);
        let entries = glob(&pattern).map_err(|e| {
            PipelineError::Config(format!("bad input pattern {:?}: {}", self.settings.pattern, e))
        })?;

        let reports = [self.store.report_json_path(), self.store.report_text_path()]
            .iter()
            .filter_map(|p| fs::canonicalize(p).ok())
            .collect::<Vec<_>>();
        let is_report = |path: &Path| {
            !reports.is_empty()
                && fs::canonicalize(path).map_or(false, |p| reports.contains(&p))
        };

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if is_report(&path) => debug!("skipping report {}", path.display()),
                Ok(path) if path.is_file() => files.push(path),
                Ok(path) => debug!("skipping non-file {}", path.display()),
                Err(e) => warn!("cannot inspect {}: {}", e.path().display(), e.error()),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Discover the input files and process this task's share.
    pub fn run(&self) -> Result<MapSummary> {
        let all = self.input_files()?;
        self.run_on(&all)
    }

    /// Process this task's share of `all`, an explicit list of input files.
    pub fn run_on(&self, all: &[PathBuf]) -> Result<MapSummary> {
        info!("starting {}", self.task);
        if all.is_empty() {
            warn!(
                "{}: no input files in {}",
                self.task,
                self.settings.input_dir.display()
            );
        }
        let assigned = partition::assign(
            all,
            self.task.index() as usize,
            self.task.count() as usize,
        );
        info!(
            "{}: assigned {} of {} input files",
            self.task,
            assigned.len(),
            all.len()
        );

        let mut table = IntegerCount::new();
        let mut unreadable = Vec::new();
        let (mut counted, mut skipped) = (0u64, 0u64);
        for path in &assigned {
            match count_file(path, |v| self.settings.accepts(v)) {
                Ok(file) => {
                    debug!(
                        "{}: {} tokens, {} skipped",
                        path.display(),
                        file.counted,
                        file.skipped
                    );
                    table.merge(&file.table)?;
                    counted += file.counted;
                    skipped += file.skipped;
                }
                Err(e) => {
                    warn!("{}: cannot read {}: {}", self.task, path.display(), e);
                    unreadable.push((path.clone(), e.to_string()));
                }
            }
        }

        let artifact = self.store.write(ArtifactKind::Map, self.task.index(), &table)?;
        info!(
            "{} done: {} tokens ({} distinct) -> {}",
            self.task,
            counted,
            table.len(),
            artifact.display()
        );

        Ok(MapSummary {
            task: self.task,
            files_assigned: assigned.len(),
            files_read: assigned.len() - unreadable.len(),
            unreadable,
            tokens_counted: counted,
            tokens_skipped: skipped,
            distinct_keys: table.len(),
            artifact,
        })
    }
}

struct FileCount {
    table: IntegerCount,
    counted: u64,
    skipped: u64,
}

/// Count every whitespace-separated integer token in `path`.
///
/// A failure part-way through discards the whole file.
fn count_file(path: &Path, accept: impl Fn(i64) -> bool) -> io::Result<FileCount> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut out = FileCount {
        table: IntegerCount::new(),
        counted: 0,
        skipped: 0,
    };

    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        for token in line
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty())
        {
            match parse_token(token).filter(|&v| accept(v)) {
                Some(value) => {
                    out.table
                        .increment(value)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                    out.counted += 1;
                }
                None => out.skipped += 1,
            }
        }
    }
    Ok(out)
}

/// A base-10 `i64` with an optional sign, or nothing.
fn parse_token(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}
