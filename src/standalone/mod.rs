use std::path::PathBuf;

use clap::{value_parser, Parser};

use crate::phase::DEFAULT_TOP_K;

pub mod engine;

/// Run every phase of the pipeline locally.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding the input files
    #[arg(short, long, env = "MRCOUNT_INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Work directory for artifacts and the report
    #[arg(short, long, env = "MRCOUNT_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Glob selecting input files inside the input directory
    #[arg(short, long, default_value = "*")]
    pub pattern: String,

    /// Number of map tasks
    #[arg(short, long, default_value_t = 4, value_parser = value_parser!(u32).range(1..))]
    pub mappers: u32,

    /// Number of reduce tasks
    #[arg(short, long, default_value_t = 4, value_parser = value_parser!(u32).range(1..))]
    pub reducers: u32,

    /// Tasks allowed to run at the same time
    #[arg(short = 'j', long, default_value_t = 4)]
    pub workers: usize,

    /// Number of integers to rank
    #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
    pub top: usize,

    /// Cross-check reduce output against map output before reporting
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input_dir: PathBuf,
    pub work_dir: PathBuf,
    pub pattern: String,
    pub mappers: u32,
    pub reducers: u32,
    pub workers: usize,
    pub top: usize,
    pub verify: bool,
}

impl From<Args> for Job {
    fn from(args: Args) -> Self {
        Self {
            input_dir: args.input_dir,
            work_dir: args.work_dir,
            pattern: args.pattern,
            mappers: args.mappers,
            reducers: args.reducers,
            workers: args.workers,
            top: args.top,
            verify: args.verify,
        }
    }
}
