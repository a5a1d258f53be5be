//! Command-line interface, built with clap derive.
//!
//! One long-running `watch` command plus two one-shot helpers (`status`,
//! `logs`), with global `--namespace` and `--verbose` flags.

use clap::{Parser, Subcommand, ValueEnum};

/// trainwatch — training-job lifecycle watcher with PR notifications.
#[derive(Debug, Parser)]
#[command(name = "trainwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Kubernetes namespace to observe (overrides the config file).
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Enable debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// How the watcher observes the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Real-time change events from the watch API.
    Watch,
    /// Periodic full re-listing of the scope.
    Poll,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch jobs and deliver lifecycle notifications.
    Watch {
        /// Narrow to a single job; exits once it is terminal and notified.
        #[arg(long)]
        job: Option<String>,

        /// Overall deadline in seconds (defaults to the configured value).
        #[arg(long)]
        timeout: Option<u64>,

        /// Observation mode.
        #[arg(long, value_enum, default_value = "watch")]
        mode: ModeArg,

        /// Interval between listings in poll mode, in seconds (defaults
        /// to the configured value).
        #[arg(long)]
        interval: Option<u64>,

        /// Dump pod logs when a single watched job reaches a terminal state.
        #[arg(long, default_value_t = false)]
        show_logs: bool,
    },

    /// Show the current lifecycle phase of one job.
    Status {
        /// Name of the job.
        job: String,
    },

    /// Print the logs of every pod a job spawned.
    Logs {
        /// Name of the job.
        job: String,
    },
}
