//! `log-summary`: aggregate statistics over a run journal.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Default, Serialize)]
pub struct JournalSummary {
    pub entries: usize,
    pub malformed_lines: usize,
    pub by_log_type: BTreeMap<String, usize>,
    pub calls_by_module: BTreeMap<String, usize>,
    pub events_by_type: BTreeMap<String, usize>,
    pub llm_errors: usize,
    pub mean_call_ms: Option<f64>,
    pub failed_tasks: usize,
}

/// Stream `reader` line by line; a bad line is counted and skipped.
pub fn summarize(reader: impl BufRead) -> std::io::Result<JournalSummary> {
    let mut summary = JournalSummary::default();
    let mut total_ms = 0.0;
    let mut timed_calls = 0usize;

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping malformed journal line");
                summary.malformed_lines += 1;
                continue;
            }
        };
        summary.entries += 1;

        let log_type = entry["log_type"].as_str().unwrap_or("unknown");
        *summary.by_log_type.entry(log_type.to_owned()).or_default() += 1;

        match log_type {
            "llm_call" => {
                let module = entry["module"].as_str().unwrap_or("unknown");
                *summary.calls_by_module.entry(module.to_owned()).or_default() += 1;
                let output = &entry["output"];
                if !output["error"].is_null() {
                    summary.llm_errors += 1;
                }
                if let Some(ms) = output["duration_ms"].as_f64() {
                    total_ms += ms;
                    timed_calls += 1;
                }
            }
            "module_diagnostic" | "simulation_event" => {
                let event = entry["event_type"].as_str().unwrap_or("unknown");
                *summary.events_by_type.entry(event.to_owned()).or_default() += 1;
                if event == "workflow_failed" {
                    summary.failed_tasks += 1;
                }
            }
            _ => {}
        }
    }

    if timed_calls > 0 {
        summary.mean_call_ms = Some(total_ms / timed_calls as f64);
    }
    Ok(summary)
}
