use std::collections::{BTreeSet, VecDeque};

use crate::{JobId, LogEntry, LogLevel};

pub const DEFAULT_MAX_LOGS: usize = 1000;

/// System tag given to lines replayed from a persisted job log blob.
pub const HISTORY_SYSTEM: &str = "HISTORY";

/// Append-only log store that evicts the oldest entries once `capacity` is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_LOGS)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_LOGS)),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Replaces the contents, keeping only the newest `capacity` entries.
    pub fn replace(&mut self, entries: Vec<LogEntry>) {
        self.entries.clear();
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub text: String,
    pub levels: BTreeSet<LogLevel>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            text: String::new(),
            levels: LogLevel::ALL.into_iter().collect(),
        }
    }
}

impl LogFilter {
    pub fn toggle_level(&mut self, level: LogLevel) {
        if !self.levels.remove(&level) {
            self.levels.insert(level);
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.levels.contains(&entry.level) {
            return false;
        }
        let needle = self.text.to_lowercase();
        needle.is_empty()
            || entry.message.to_lowercase().contains(&needle)
            || entry.system.to_lowercase().contains(&needle)
    }
}

/// Order-preserving view of `buffer` through `filter`; never mutates the buffer.
pub fn filter_logs<'a>(buffer: &'a LogBuffer, filter: &LogFilter) -> Vec<&'a LogEntry> {
    buffer.iter().filter(|entry| filter.matches(entry)).collect()
}

/// Splits a job's historical log blob into entries, classifying each line by its
/// bracketed level marker.
pub fn parse_history(blob: &str, job_id: JobId, timestamp: &str) -> Vec<LogEntry> {
    blob.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| LogEntry {
            level: classify_line(line),
            system: HISTORY_SYSTEM.to_string(),
            message: line.to_string(),
            timestamp: timestamp.to_string(),
            job_id: Some(job_id),
        })
        .collect()
}

fn classify_line(line: &str) -> LogLevel {
    if line.contains("[ERROR]") {
        LogLevel::Error
    } else if line.contains("[WARN]") || line.contains("[WARNING]") {
        LogLevel::Warn
    } else if line.contains("[SUCCESS]") {
        LogLevel::Success
    } else {
        LogLevel::Info
    }
}

/// Plain-text export of the whole buffer, one `[timestamp] [LEVEL] [system] message` per line.
pub fn export_logs(buffer: &LogBuffer) -> String {
    buffer
        .iter()
        .map(|entry| {
            format!(
                "[{}] [{}] [{}] {}",
                entry.timestamp, entry.level, entry.system, entry.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
