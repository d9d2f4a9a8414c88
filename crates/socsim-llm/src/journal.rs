//! Append-only run journal.
//!
//! One journal per run, one JSON object per line, header line first. Every
//! component receives a [`Journal`] handle at construction; there is no
//! global instance. All writers share one mutex that also guards the LLM
//! call counter, so call ids increase in file order.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::{CallSite, Completion, Message};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One line of the journal.
#[derive(Debug, Serialize)]
#[serde(tag = "log_type", rename_all = "snake_case")]
pub enum JournalEntry {
    Header {
        timestamp: String,
        description: &'static str,
        format: &'static str,
    },
    LlmCall {
        timestamp: String,
        call_id: u64,
        module: &'static str,
        function: &'static str,
        input: CallInput,
        output: CallOutput,
    },
    ModuleDiagnostic {
        timestamp: String,
        module: &'static str,
        function: &'static str,
        event_type: String,
        task_id: Option<String>,
        data: Value,
    },
    SimulationEvent {
        timestamp: String,
        event_type: String,
        task_id: Option<String>,
        data: Value,
    },
}

/// Request side of an `llm_call` entry.
#[derive(Debug, Clone, Serialize)]
pub struct CallInput {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop_strs: Option<Vec<String>>,
    pub n: u32,
}

/// Response side of an `llm_call` entry. Exactly one of `response` and
/// `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct CallOutput {
    pub response: Option<Completion>,
    pub error: Option<String>,
    pub duration_ms: f64,
}

fn now() -> String {
    Local::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Sink {
    File(LineWriter<File>),
    Buffer(Vec<String>),
}

#[derive(Debug)]
struct State {
    sink: Sink,
    call_counter: u64,
}

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    state: Mutex<State>,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Shared handle to the run journal. Clones write to the same sink.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Option<Arc<Inner>>,
}

impl Journal {
    /// Open (or create) a journal file in append mode and write the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let journal = Self::with_sink(Some(path.to_path_buf()), Sink::File(LineWriter::new(file)));
        journal.write_header();
        tracing::info!(path = %path.display(), "journal opened");
        Ok(journal)
    }

    /// A journal that keeps lines in memory. Used by tests.
    pub fn in_memory() -> Self {
        let journal = Self::with_sink(None, Sink::Buffer(Vec::new()));
        journal.write_header();
        journal
    }

    /// A journal that drops everything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    fn with_sink(path: Option<PathBuf>, sink: Sink) -> Self {
        Self {
            inner: Some(Arc::new(Inner {
                path,
                state: Mutex::new(State {
                    sink,
                    call_counter: 0,
                }),
            })),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().and_then(|i| i.path.as_deref())
    }

    fn write_header(&self) {
        self.write(&JournalEntry::Header {
            timestamp: now(),
            description: "LLM Call and Module Diagnostic Logs",
            format: "Each log entry is a JSON object on a single line",
        });
    }

    /// Reserve the next call id without writing anything.
    pub fn next_call_id(&self) -> u64 {
        let Some(inner) = &self.inner else {
            return 0;
        };
        match inner.state.lock() {
            Ok(mut state) => {
                state.call_counter += 1;
                state.call_counter
            }
            Err(_) => 0,
        }
    }

    /// Record one model call. The call id is assigned under the write lock.
    pub fn log_llm_call(&self, site: CallSite, input: CallInput, output: CallOutput) {
        let Some(inner) = &self.inner else {
            return;
        };
        let Ok(mut state) = inner.state.lock() else {
            tracing::warn!("journal lock poisoned, dropping llm_call entry");
            return;
        };
        state.call_counter += 1;
        let entry = JournalEntry::LlmCall {
            timestamp: now(),
            call_id: state.call_counter,
            module: site.module,
            function: site.function,
            input,
            output,
        };
        write_locked(&mut state, &entry);
    }

    /// Record a module diagnostic (memory, reasoning, planning, workflow).
    pub fn diagnostic(
        &self,
        site: CallSite,
        event_type: &str,
        task_id: Option<&str>,
        data: Value,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.write(&JournalEntry::ModuleDiagnostic {
            timestamp: now(),
            module: site.module,
            function: site.function,
            event_type: event_type.to_owned(),
            task_id: task_id.map(str::to_owned),
            data,
        });
    }

    /// Record a simulation-level event (task start/complete).
    pub fn simulation_event(&self, event_type: &str, task_id: Option<&str>, data: Value) {
        if !self.is_enabled() {
            return;
        }
        self.write(&JournalEntry::SimulationEvent {
            timestamp: now(),
            event_type: event_type.to_owned(),
            task_id: task_id.map(str::to_owned),
            data,
        });
    }

    fn write(&self, entry: &JournalEntry) {
        let Some(inner) = &self.inner else {
            return;
        };
        match inner.state.lock() {
            Ok(mut state) => write_locked(&mut state, entry),
            Err(_) => tracing::warn!("journal lock poisoned, dropping entry"),
        }
    }

    /// Lines written so far, parsed back into JSON. Only in-memory journals
    /// keep lines; file-backed and disabled journals return an empty list.
    pub fn entries(&self) -> Vec<Value> {
        let Some(inner) = &self.inner else {
            return Vec::new();
        };
        let Ok(state) = inner.state.lock() else {
            return Vec::new();
        };
        match &state.sink {
            Sink::Buffer(lines) => lines
                .iter()
                .filter_map(|l| serde_json::from_str(l).ok())
                .collect(),
            Sink::File(_) => Vec::new(),
        }
    }

    /// Entries whose `event_type` equals `event_type`.
    pub fn events(&self, event_type: &str) -> Vec<Value> {
        self.entries()
            .into_iter()
            .filter(|e| e["event_type"] == event_type)
            .collect()
    }
}

fn write_locked(state: &mut State, entry: &JournalEntry) {
    let line = match serde_json::to_string(entry) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize journal entry");
            return;
        }
    };
    match &mut state.sink {
        Sink::File(writer) => {
            if let Err(e) = writeln!(writer, "{line}") {
                tracing::warn!(error = %e, "failed to write journal entry");
            }
        }
        Sink::Buffer(lines) => lines.push(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SITE: CallSite = CallSite::new("memory", "retrieve");

    fn input() -> CallInput {
        CallInput {
            messages: vec![Message::user("hi")],
            model: "m".into(),
            temperature: 0.1,
            max_tokens: 500,
            stop_strs: None,
            n: 1,
        }
    }

    #[test]
    fn header_comes_first() {
        let journal = Journal::in_memory();
        let entries = journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["log_type"], "header");
    }

    #[test]
    fn call_ids_increase() {
        let journal = Journal::in_memory();
        for _ in 0..3 {
            journal.log_llm_call(
                SITE,
                input(),
                CallOutput {
                    response: Some(Completion::One("ok".into())),
                    error: None,
                    duration_ms: 1.0,
                },
            );
        }
        let ids: Vec<u64> = journal
            .entries()
            .iter()
            .filter(|e| e["log_type"] == "llm_call")
            .map(|e| e["call_id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(journal.next_call_id(), 4);
    }

    #[test]
    fn llm_call_shape() {
        let journal = Journal::in_memory();
        journal.log_llm_call(
            SITE,
            input(),
            CallOutput {
                response: None,
                error: Some("boom".into()),
                duration_ms: 2.5,
            },
        );
        let entry = &journal.entries()[1];
        assert_eq!(entry["module"], "memory");
        assert_eq!(entry["function"], "retrieve");
        assert_eq!(entry["input"]["messages"][0]["role"], "user");
        assert_eq!(entry["input"]["stop_strs"], Value::Null);
        assert_eq!(entry["output"]["response"], Value::Null);
        assert_eq!(entry["output"]["error"], "boom");
    }

    #[test]
    fn diagnostics_and_events() {
        let journal = Journal::in_memory();
        journal.diagnostic(SITE, "memory_retrieval_empty", Some("t1"), json!({ "query": "q" }));
        journal.simulation_event("task_start", Some("t1"), json!({ "index": 0 }));

        let diag = journal.events("memory_retrieval_empty");
        assert_eq!(diag.len(), 1);
        assert_eq!(diag[0]["log_type"], "module_diagnostic");
        assert_eq!(diag[0]["task_id"], "t1");
        assert_eq!(journal.events("task_start")[0]["log_type"], "simulation_event");
    }

    #[test]
    fn disabled_journal_is_silent() {
        let journal = Journal::disabled();
        journal.simulation_event("task_start", None, json!({}));
        assert!(journal.entries().is_empty());
        assert_eq!(journal.next_call_id(), 0);
    }

    #[test]
    fn file_journal_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");

        let journal = Journal::create(&path).unwrap();
        journal.simulation_event("task_complete", Some("0"), json!({ "stars": 4.0 }));
        drop(journal);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["log_type"], "header");
        assert_eq!(lines[1]["data"]["stars"], 4.0);
    }
}
