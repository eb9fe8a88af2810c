//! Command-line interface for the policy pack workflow
//!
//! - `run`: redact a draft and run the full pipeline
//! - `rerun`: re-execute a finished run from a chosen step
//! - `show` / `list` / `lineage`: inspect stored runs
//! - `cancel`: mark a run that nothing is executing as canceled
//! - `steps` / `samples`: static metadata
//! - `migrate`: apply or revert the PostgreSQL schema

pub mod inspect;
pub mod migrate;
pub mod output;
pub mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::workflow::{Audience, RunId, Tone};

/// Policy Pack - compliant, tone-adjusted documents from rough drafts
#[derive(Parser)]
#[command(name = "policy-pack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full pipeline on a draft
    Run(RunArgs),

    /// Re-execute a finished run from one of its completed steps
    Rerun(RerunArgs),

    /// Show a run with its steps
    Show {
        run_id: RunId,

        /// Include step input/output snapshots
        #[arg(long)]
        snapshots: bool,
    },

    /// List runs, newest first
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = 20)]
        take: usize,
    },

    /// List every run sharing the origin of a run
    Lineage { run_id: RunId },

    /// Cancel a run
    Cancel { run_id: RunId },

    /// List the pipeline steps
    Steps,

    /// List the built-in sample drafts, or print one
    Samples { id: Option<String> },

    /// Apply or revert database migrations
    Migrate {
        /// Revert the latest applied migration instead
        #[arg(long)]
        revert: bool,
    },
}

#[derive(Args)]
#[group(id = "source", required = true, multiple = false)]
pub struct InputSource {
    /// Draft text
    #[arg(long)]
    pub text: Option<String>,

    /// Read the draft from a file (`-` for stdin)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Use a built-in sample draft
    #[arg(long)]
    pub sample: Option<String>,
}

#[derive(Args)]
pub struct ExecutionArgs {
    /// Stream progress events to stderr
    #[arg(long)]
    pub watch: bool,

    /// Write the final HTML document to this path
    #[arg(long)]
    pub html: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: InputSource,

    #[arg(long, default_value = "customer")]
    pub audience: Audience,

    #[arg(long, default_value = "professional")]
    pub tone: Tone,

    /// Require the audience's disclaimers word for word
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub execution: ExecutionArgs,
}

#[derive(Args)]
pub struct RerunArgs {
    pub run_id: RunId,

    /// Step to resume from; earlier steps are copied from the parent run
    pub from_step: String,

    #[command(flatten)]
    pub execution: ExecutionArgs,
}
