use std::process::{self, ExitCode};

use anyhow::Result;
use clap::Parser;
use log::{error, warn};
use mrcount::cmd::task::{Args, Commands};
use mrcount::phase::{
    verify, MapSettings, Mapper, Phase, ReduceSettings, Reducer, ReportSettings, Reporter, Task,
};
use mrcount::store::ArtifactStore;
use mrcount::{init_logger, PipelineError};

/// Usage errors exit with 1; `--help` and `--version` with 0.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Map {
            task_index,
            task_count,
            input_dir,
            work_dir,
            pattern,
            min_value,
            max_value,
        } => {
            let task = Task::new(Phase::Map, task_index, task_count)?;
            let settings = MapSettings::new(input_dir)
                .pattern(pattern)
                .value_range(min_value, max_value);
            let summary = Mapper::new(ArtifactStore::new(work_dir), settings, task)?.run()?;
            if !summary.unreadable.is_empty() {
                warn!(
                    "{}: {} of {} assigned files could not be read",
                    task,
                    summary.unreadable.len(),
                    summary.files_assigned
                );
            }
        }
        Commands::Reduce {
            task_index,
            task_count,
            work_dir,
            jobs,
            expect_mappers,
        } => {
            let task = Task::new(Phase::Reduce, task_index, task_count)?;
            let settings = ReduceSettings {
                jobs,
                expect_mappers,
            };
            Reducer::new(ArtifactStore::new(work_dir), settings, task)?.run()?;
        }
        Commands::Report {
            work_dir,
            top,
            expect_reducers,
        } => {
            let settings = ReportSettings {
                top_k: top,
                expect_reducers,
            };
            let report = Reporter::new(ArtifactStore::new(work_dir), settings)?.run()?;
            print!("{}", report.render());
        }
        Commands::Verify { work_dir, reducers } => {
            let v = verify(&ArtifactStore::new(work_dir), reducers)?;
            println!(
                "ok: {} keys, {} occurrences, {} map / {} reduce artifacts ({} reducers)",
                v.distinct_keys, v.total_count, v.map_artifacts, v.reduce_artifacts, v.reducers
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logger();
    let args = parse_args();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let code = err
                .downcast_ref::<PipelineError>()
                .map_or(3, PipelineError::exit_code);
            ExitCode::from(code as u8)
        }
    }
}
