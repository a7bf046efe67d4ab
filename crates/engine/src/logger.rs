//! Execution logger (C8) — an in-memory ring buffer of log entries per
//! execution, with an optional durable sink.
//!
//! The ring buffer is the source of truth for "give me this execution's
//! logs right now"; a [`LogSink`] is a best-effort durable mirror (the
//! Postgres `log_entries` table via `db::repository::logs`), consistent
//! with how `github_webhook_events` is treated elsewhere — a failure to
//! persist must never fail the execution itself.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    /// Milestone progress within a long-running node (e.g. an AI agent's
    /// multi-step tool loop), between routine `INFO` and a full result.
    Progress,
    Warning,
    Error,
    /// An error severe enough to abort the whole execution, not just the
    /// node that raised it.
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub execution_id: Uuid,
    pub node_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub structured_data: Option<serde_json::Value>,
    pub trace_id: Option<String>,
    pub logged_at: DateTime<Utc>,
}

/// Durable mirror for log entries. Implemented for `db::DbPool` by the
/// `scheduler`/`api` wiring layer; a no-op impl is used in tests.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn persist(&self, entry: &LogEntry);
}

pub struct NullSink;

#[async_trait]
impl LogSink for NullSink {
    async fn persist(&self, _entry: &LogEntry) {}
}

/// Bounded per-execution ring buffer, capped at `max_entries` total
/// entries across all tracked executions (oldest dropped first).
pub struct ExecutionLogger {
    max_entries: usize,
    buffers: Mutex<HashMap<Uuid, VecDeque<LogEntry>>>,
}

impl ExecutionLogger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn log(
        &self,
        execution_id: Uuid,
        node_id: Option<String>,
        level: LogLevel,
        message: impl Into<String>,
        structured_data: Option<serde_json::Value>,
    ) -> LogEntry {
        let entry = LogEntry {
            execution_id,
            node_id,
            level,
            message: message.into(),
            structured_data,
            trace_id: None,
            logged_at: Utc::now(),
        };

        let mut buffers = self.buffers.lock().unwrap();
        let buffer = buffers.entry(execution_id).or_default();
        buffer.push_back(entry.clone());
        while buffer.len() > self.max_entries {
            buffer.pop_front();
        }

        entry
    }

    /// Snapshot all log entries for one execution, oldest first.
    pub fn entries_for(&self, execution_id: Uuid) -> Vec<LogEntry> {
        self.buffers
            .lock()
            .unwrap()
            .get(&execution_id)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, execution_id: Uuid) {
        self.buffers.lock().unwrap().remove(&execution_id);
    }
}

impl Default for ExecutionLogger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_are_returned_in_insertion_order() {
        let logger = ExecutionLogger::new(10);
        let exec_id = Uuid::new_v4();
        logger.log(exec_id, None, LogLevel::Info, "first", None);
        logger.log(exec_id, Some("n1".to_string()), LogLevel::Warning, "second", None);

        let entries = logger.entries_for(exec_id);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
    }

    #[test]
    fn ring_buffer_drops_oldest_entries_past_capacity() {
        let logger = ExecutionLogger::new(2);
        let exec_id = Uuid::new_v4();
        logger.log(exec_id, None, LogLevel::Info, "a", None);
        logger.log(exec_id, None, LogLevel::Info, "b", None);
        logger.log(exec_id, None, LogLevel::Info, "c", None);

        let entries = logger.entries_for(exec_id);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "b");
        assert_eq!(entries[1].message, "c");
    }

    #[test]
    fn log_level_serializes_to_the_spec_vocabulary() {
        assert_eq!(serde_json::to_string(&LogLevel::Progress).unwrap(), "\"PROGRESS\"");
        assert_eq!(serde_json::to_string(&LogLevel::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(serde_json::to_string(&LogLevel::Trace).unwrap(), "\"TRACE\"");
    }

    #[test]
    fn separate_executions_do_not_share_buffers() {
        let logger = ExecutionLogger::new(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        logger.log(a, None, LogLevel::Info, "for a", None);
        assert_eq!(logger.entries_for(a).len(), 1);
        assert_eq!(logger.entries_for(b).len(), 0);
    }
}
