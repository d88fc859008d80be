//! Reduce phase: gather the keys this task owns from every map artifact.

use std::path::PathBuf;
use std::thread;

use dashmap::DashMap;
use log::{debug, info};

use super::{Phase, Task};
use crate::partition::owner;
use crate::store::{ArtifactKind, ArtifactStore};
use crate::{IntegerCount, PipelineError, Result};

#[derive(Clone, Debug)]
pub struct ReduceSettings {
    /// Threads used to decode map artifacts.
    pub jobs: usize,
    /// When set, every map task index in `[0, n)` must have an artifact.
    pub expect_mappers: Option<u32>,
}

impl Default for ReduceSettings {
    fn default() -> Self {
        Self {
            jobs: 1,
            expect_mappers: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReduceSummary {
    pub task: Task,
    pub artifacts_read: usize,
    pub keys_owned: usize,
    pub total_count: u64,
    pub artifact: PathBuf,
}

#[derive(Debug)]
pub struct Reducer {
    store: ArtifactStore,
    settings: ReduceSettings,
    task: Task,
}

impl Reducer {
    pub fn new(store: ArtifactStore, settings: ReduceSettings, task: Task) -> Result<Self> {
        if task.phase() != Phase::Reduce {
            return Err(PipelineError::Config(format!("reducer given a {task} task")));
        }
        if settings.jobs == 0 {
            return Err(PipelineError::Config("jobs must be at least 1".to_owned()));
        }
        Ok(Self {
            store,
            settings,
            task,
        })
    }

    pub fn run(&self) -> Result<ReduceSummary> {
        info!("starting {}", self.task);

        let inputs = self
            .store
            .require(ArtifactKind::Map, self.settings.expect_mappers)?;
        let paths = inputs.into_iter().map(|(_, p)| p).collect::<Vec<_>>();
        info!("{}: reading {} map artifacts", self.task, paths.len());

        let owned = self.collect(&paths)?;
        let total = owned.total()?;
        let artifact = self
            .store
            .write(ArtifactKind::Reduce, self.task.index(), &owned)?;
        info!(
            "{} done: {} keys, {} occurrences -> {}",
            self.task,
            owned.len(),
            total,
            artifact.display()
        );

        Ok(ReduceSummary {
            task: self.task,
            artifacts_read: paths.len(),
            keys_owned: owned.len(),
            total_count: total,
            artifact,
        })
    }

    /// Sum the owned keys of every artifact in `paths`.
    ///
    /// Artifacts are striped over `jobs` threads that all fold into one
    /// concurrent table.
    fn collect(&self, paths: &[PathBuf]) -> Result<IntegerCount> {
        let (index, reducers) = (self.task.index(), self.task.count());
        let totals: DashMap<i64, u64> = DashMap::new();
        let jobs = self.settings.jobs.min(paths.len()).max(1);

        let fold = |path: &PathBuf| -> Result<()> {
            let table = self.store.read(path)?;
            let mut kept = 0usize;
            for (key, n) in table.iter().filter(|&(k, _)| owner(k, reducers) == index) {
                let mut slot = totals.entry(key).or_insert(0);
                *slot = (*slot)
                    .checked_add(n)
                    .ok_or(PipelineError::CountOverflow { key })?;
                kept += 1;
            }
            debug!("{}: kept {} of {} keys", path.display(), kept, table.len());
            Ok(())
        };

        thread::scope(|s| {
            let workers = (0..jobs)
                .map(|worker| {
                    let fold = &fold;
                    s.spawn(move || {
                        paths
                            .iter()
                            .skip(worker)
                            .step_by(jobs)
                            .try_for_each(fold)
                    })
                })
                .collect::<Vec<_>>();

            workers.into_iter().try_for_each(|w| match w.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
        })?;

        IntegerCount::from_pairs(totals)
    }
}
