use std::sync::Arc;

use anyhow::{bail, Result};
use log::info;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::Job;
use crate::phase::{
    verify, MapSettings, MapSummary, Mapper, Phase, ReduceSettings, ReduceSummary, Reducer,
    Report, ReportSettings, Reporter, Task, Verification,
};
use crate::store::ArtifactStore;

/// Everything a local run produced.
#[derive(Debug)]
pub struct Outcome {
    pub maps: Vec<MapSummary>,
    pub reduces: Vec<ReduceSummary>,
    pub verification: Option<Verification>,
    pub report: Report,
}

/// Run all map tasks, then all reduce tasks, then the report.
///
/// Each phase only starts once every task of the previous one finished, and
/// at most `job.workers` tasks run at a time.
pub async fn run_job(job: &Job) -> Result<Outcome> {
    if job.workers == 0 {
        bail!(crate::PipelineError::Config("workers must be at least 1".to_owned()));
    }
    let store = ArtifactStore::new(&job.work_dir);

    let settings = MapSettings::new(&job.input_dir).pattern(job.pattern.clone());
    let map_tasks = (0..job.mappers).map(|index| {
        let (store, settings, count) = (store.clone(), settings.clone(), job.mappers);
        move || {
            let task = Task::new(Phase::Map, index, count)?;
            Mapper::new(store, settings, task)?.run()
        }
    });
    let maps = run_phase(job.workers, map_tasks).await?;
    let unreadable = maps.iter().map(|m| m.unreadable.len()).sum::<usize>();
    info!(
        "map phase done: {} tasks, {} tokens, {} unreadable files",
        maps.len(),
        maps.iter().map(|m| m.tokens_counted).sum::<u64>(),
        unreadable
    );

    let reduce_tasks = (0..job.reducers).map(|index| {
        let (store, count) = (store.clone(), job.reducers);
        let settings = ReduceSettings {
            expect_mappers: Some(job.mappers),
            ..Default::default()
        };
        move || {
            let task = Task::new(Phase::Reduce, index, count)?;
            Reducer::new(store, settings, task)?.run()
        }
    });
    let reduces = run_phase(job.workers, reduce_tasks).await?;
    info!("reduce phase done: {} tasks", reduces.len());

    let verification = if job.verify {
        let store = store.clone();
        let reducers = job.reducers;
        Some(tokio::task::spawn_blocking(move || verify(&store, Some(reducers))).await??)
    } else {
        None
    };

    let settings = ReportSettings {
        top_k: job.top,
        expect_reducers: Some(job.reducers),
    };
    let report =
        tokio::task::spawn_blocking(move || Reporter::new(store, settings)?.run()).await??;

    Ok(Outcome {
        maps,
        reduces,
        verification,
        report,
    })
}

/// Run blocking tasks on the tokio blocking pool, `workers` at a time.
///
/// Results come back in task order. The first failure is returned as soon as
/// it is seen.
async fn run_phase<T, F, I>(workers: usize, tasks: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let permits = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    for (i, task) in tasks.into_iter().enumerate() {
        let permits = Arc::clone(&permits);
        set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = tokio::task::spawn_blocking(task).await;
            (i, result)
        });
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let (i, result) = joined?;
        results.push((i, result??));
    }
    results.sort_by_key(|(i, _)| *i);
    Ok(results.into_iter().map(|(_, r)| r).collect())
}
