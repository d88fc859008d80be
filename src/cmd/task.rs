use std::path::PathBuf;

use clap::{value_parser, Parser, Subcommand};

use crate::phase::DEFAULT_TOP_K;

/// Run a single pipeline task against a shared work directory.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count the integers in this task's share of the input files
    Map {
        /// 0-based index of this map task
        #[arg(long)]
        task_index: u32,

        /// Total number of map tasks
        #[arg(long, value_parser = value_parser!(u32).range(1..))]
        task_count: u32,

        /// Directory holding the input files
        #[arg(long, env = "MRCOUNT_INPUT_DIR")]
        input_dir: PathBuf,

        /// Work directory shared by all tasks
        #[arg(long, env = "MRCOUNT_WORK_DIR")]
        work_dir: PathBuf,

        /// Glob selecting input files inside the input directory
        #[arg(long, default_value = "*")]
        pattern: String,

        /// Skip integers below this value
        #[arg(long, allow_negative_numbers = true)]
        min_value: Option<i64>,

        /// Skip integers above this value
        #[arg(long, allow_negative_numbers = true)]
        max_value: Option<i64>,
    },

    /// Sum the counts of the keys this task owns across all map artifacts
    Reduce {
        /// 0-based index of this reduce task
        #[arg(long)]
        task_index: u32,

        /// Total number of reduce tasks
        #[arg(long, value_parser = value_parser!(u32).range(1..))]
        task_count: u32,

        /// Work directory shared by all tasks
        #[arg(long, env = "MRCOUNT_WORK_DIR")]
        work_dir: PathBuf,

        /// Threads used to read map artifacts
        #[arg(long, default_value_t = 1)]
        jobs: usize,

        /// Fail unless map artifacts 0..N are all present
        #[arg(long, value_parser = value_parser!(u32).range(1..))]
        expect_mappers: Option<u32>,
    },

    /// Merge the reduce artifacts and write the top-K report
    Report {
        /// Work directory shared by all tasks
        #[arg(long, env = "MRCOUNT_WORK_DIR")]
        work_dir: PathBuf,

        /// Number of integers to rank
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top: usize,

        /// Fail unless reduce artifacts 0..N are all present
        #[arg(long, value_parser = value_parser!(u32).range(1..))]
        expect_reducers: Option<u32>,
    },

    /// Check that the reduce artifacts account for every map artifact count
    Verify {
        /// Work directory shared by all tasks
        #[arg(long, env = "MRCOUNT_WORK_DIR")]
        work_dir: PathBuf,

        /// Number of reduce tasks (defaults to the highest artifact index + 1)
        #[arg(long, value_parser = value_parser!(u32).range(1..))]
        reducers: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_map() {
        let args = Args::try_parse_from([
            "mrcount",
            "map",
            "--task-index",
            "1",
            "--task-count",
            "2",
            "--input-dir",
            "in",
            "--work-dir",
            "w",
            "--min-value",
            "-5",
        ])
        .unwrap();
        match args.command {
            Commands::Map {
                task_index,
                task_count,
                min_value,
                pattern,
                ..
            } => {
                assert_eq!((task_index, task_count), (1, 2));
                assert_eq!(min_value, Some(-5));
                assert_eq!(pattern, "*");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn report_defaults_to_top_six() {
        let args = Args::try_parse_from(["mrcount", "report", "--work-dir", "w"]).unwrap();
        assert!(matches!(args.command, Commands::Report { top: 6, .. }));
    }

    #[test]
    fn zero_task_count_is_rejected() {
        let result = Args::try_parse_from([
            "mrcount",
            "reduce",
            "--task-index",
            "0",
            "--task-count",
            "0",
            "--work-dir",
            "w",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_expected_counts_are_rejected() {
        for args in [
            &["reduce", "--task-index", "0", "--task-count", "1", "--expect-mappers", "0"][..],
            &["report", "--expect-reducers", "0"][..],
            &["verify", "--reducers", "0"][..],
        ] {
            let argv = ["mrcount"]
                .into_iter()
                .chain(args.iter().copied())
                .chain(["--work-dir", "w"]);
            assert!(Args::try_parse_from(argv).is_err(), "{args:?}");
        }

        let args = Args::try_parse_from([
            "mrcount",
            "report",
            "--expect-reducers",
            "3",
            "--work-dir",
            "w",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Commands::Report {
                expect_reducers: Some(3),
                ..
            }
        ));
    }
}
