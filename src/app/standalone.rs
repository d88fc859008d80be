use std::process::{self, ExitCode};

use clap::Parser;
use log::{error, info};
use mrcount::standalone::{engine::run_job, Args, Job};
use mrcount::{init_logger, PipelineError};

fn parse_args() -> Job {
    match Args::try_parse() {
        Ok(args) => args.into(),
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    let job = parse_args();

    match run_job(&job).await {
        Ok(outcome) => {
            if let Some(v) = &outcome.verification {
                info!(
                    "verified {} keys across {} reducers",
                    v.distinct_keys, v.reducers
                );
            }
            print!("{}", outcome.report.render());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            let code = err
                .downcast_ref::<PipelineError>()
                .map_or(3, PipelineError::exit_code);
            ExitCode::from(code as u8)
        }
    }
}
