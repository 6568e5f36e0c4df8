//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Test suite and pipeline orchestrator
#[derive(Parser, Debug)]
#[command(name = "suite-orchestrator")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Run test suites and pipelines with dependencies, retries and history")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a suite or a pipeline
    Run(RunArgs),

    /// List registered suites and pipelines
    List(ListArgs),

    /// Validate the configuration file
    Validate,

    /// View execution history
    History(HistoryArgs),

    /// Show success rates and suite health
    Stats(StatsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(subcommand)]
    pub target: RunTarget,

    /// Write the run report to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RunTarget {
    /// Run one suite and its dependencies
    Suite {
        /// Suite id
        id: String,

        /// Trigger kind (manual, schedule, webhook, commit, deploy, api)
        #[arg(short, long, default_value = "manual")]
        trigger: String,

        /// Cron expression for schedule triggers
        #[arg(long)]
        cron: Option<String>,

        #[command(flatten)]
        build: BuildArgs,

        /// Output format (table, json, json-pretty, csv, summary)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Run a registered pipeline
    Pipeline {
        /// Pipeline id
        id: String,

        #[command(flatten)]
        build: BuildArgs,

        /// Output format (table, json, json-pretty, csv, summary)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Build metadata attached to every execution of a run
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build identifier
    #[arg(long)]
    pub build_id: Option<String>,

    /// Commit hash
    #[arg(long)]
    pub commit: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only suites of this type
    #[arg(short = 't', long = "type")]
    pub suite_type: Option<String>,

    /// Show pipelines as well
    #[arg(short, long)]
    pub pipelines: bool,
}

/// Arguments for history command
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Filter by suite
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Number of executions to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export to file (.json or .csv)
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}

/// Arguments for stats command
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Success rate for one suite instead of totals
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Number of most recent executions considered
    #[arg(short, long, default_value = "10")]
    pub window: usize,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Show per-suite health
    #[arg(long)]
    pub health: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./suite-orchestrator.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Print the configuration file in use
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_suite() {
        let args = Args::parse_from([
            "suite-orchestrator",
            "run",
            "suite",
            "checkout",
            "--trigger",
            "commit",
            "--commit",
            "abc123",
        ]);

        match args.command {
            Command::Run(RunArgs {
                target:
                    RunTarget::Suite {
                        id, trigger, build, ..
                    },
                ..
            }) => {
                assert_eq!(id, "checkout");
                assert_eq!(trigger, "commit");
                assert_eq!(build.commit.as_deref(), Some("abc123"));
                assert!(build.build_id.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from([
            "suite-orchestrator",
            "stats",
            "--health",
            "-v",
            "--config",
            "ci.yaml",
        ]);

        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("ci.yaml")));
        match args.command {
            Command::Stats(stats) => {
                assert!(stats.health);
                assert_eq!(stats.window, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_config_init_default_path() {
        let args = Args::parse_from(["suite-orchestrator", "config", "init"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { output, force },
            }) => {
                assert_eq!(output, PathBuf::from("./suite-orchestrator.yaml"));
                assert!(!force);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
