//! CLI entry point for SocSim.
//!
//! `socsim run` executes a directory of tasks on a bounded worker pool,
//! `socsim decide` runs a single pair, and `socsim log-summary` digests a
//! run journal.

mod cli;
mod helpers;
mod summary;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use socsim_agent::{Task, load_tasks, run_tasks};

use crate::cli::{Cli, Commands, CommonArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    helpers::init_tracing("info");

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            tasks,
            out,
            limit,
            workers,
            common,
        } => cmd_run(&tasks, out.as_deref(), limit, workers, &common).await,
        Commands::Decide { user, item, common } => cmd_decide(user, item, &common).await,
        Commands::LogSummary { path } => cmd_log_summary(&path),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run(
    tasks_dir: &std::path::Path,
    out: Option<&std::path::Path>,
    limit: Option<usize>,
    workers: Option<usize>,
    common: &CommonArgs,
) -> Result<()> {
    let config = helpers::load_config(common, workers)?;
    let journal = helpers::open_journal(&config)?;

    let mut tasks = load_tasks(tasks_dir)
        .with_context(|| format!("failed to load tasks from {}", tasks_dir.display()))?;
    if let Some(limit) = limit {
        tasks.truncate(limit);
    }

    let factory = Arc::new(helpers::build_factory(&config, common, &journal)?);
    let started = Instant::now();
    let outcomes = run_tasks(tasks, factory, config.run.runner_config()).await;

    let mut writer: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    for outcome in &outcomes {
        serde_json::to_writer(&mut writer, &outcome.decision)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    let failed = outcomes.iter().filter(|o| o.decision.is_failure()).count();
    info!(
        tasks = outcomes.len(),
        failed,
        elapsed_s = started.elapsed().as_secs_f64(),
        "run complete"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: decide
// ---------------------------------------------------------------------------

async fn cmd_decide(user: String, item: String, common: &CommonArgs) -> Result<()> {
    let config = helpers::load_config(common, None)?;
    let journal = helpers::open_journal(&config)?;
    let factory = helpers::build_factory(&config, common, &journal)?;

    let task = Task::simulation(user, item);
    let decision = factory.run_task(&task, Some("0")).await;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: log-summary
// ---------------------------------------------------------------------------

fn cmd_log_summary(path: &std::path::Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let summary = summary::summarize(BufReader::new(file))
        .with_context(|| format!("failed to read {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
