//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// SocSim -- simulate how users review businesses.
#[derive(Parser)]
#[command(
    name = "socsim",
    version,
    about = "SocSim -- LLM agents that simulate user reviews",
    long_about = "Runs review-simulation agents over a prepared dataset: each task asks \
                  an agent to predict the rating and review a user would give a business."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every task in a directory and write one decision per line.
    Run {
        /// Directory containing `task_<n>.json` files.
        #[arg(long)]
        tasks: PathBuf,

        /// Where to write decisions (JSON lines). Stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Only run the first N tasks.
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum tasks in flight.
        #[arg(long)]
        workers: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Run a single user/business pair and print the decision.
    Decide {
        #[arg(long)]
        user: String,

        #[arg(long)]
        item: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Summarize a run journal.
    LogSummary {
        /// Path to a journal written by `run` or `decide`.
        path: PathBuf,
    },
}

/// Options shared by `run` and `decide`.
#[derive(Args)]
pub struct CommonArgs {
    /// Dataset directory with `user.json`, `item.json` and `review.json`.
    #[arg(long)]
    pub data: PathBuf,

    /// TOML configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Reasoning strategy: io, cot, cot-sc, tot, dilu, self-refine, step-back.
    #[arg(long)]
    pub reasoning: Option<String>,

    /// Memory kind: dilu, generative, tp, voyager.
    #[arg(long)]
    pub memory: Option<String>,

    /// Journal path, overriding the config.
    #[arg(long)]
    pub log: Option<PathBuf>,
}
