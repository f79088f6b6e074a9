use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-assigned identifier of one pipeline execution.
pub type JobId = u64;

/// Local sequence number of an execute request, used to discard late responses.
pub type RequestId = u64;

/// Per-system execution status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemStatusKind {
    #[default]
    Idle,
    Running,
    Success,
    Error,
    Cancelled,
}

impl SystemStatusKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Some(Self::Idle),
            "RUNNING" => Some(Self::Running),
            "SUCCESS" => Some(Self::Success),
            "ERROR" => Some(Self::Error),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Merge-patch for one system's status, decoded from a live `status` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: SystemStatusKind,
    pub progress: u8,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Success,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Success,
    ];

    /// Lenient decoding: `WARNING` is accepted for `WARN`, anything unknown is `INFO`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            "SUCCESS" => LogLevel::Success,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Originating system id, or a synthetic tag such as `HISTORY`.
    pub system: String,
    pub message: String,
    /// ISO-8601 timestamp as delivered.
    pub timestamp: String,
    pub job_id: Option<JobId>,
}

/// Status of a whole job as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Progress order used to keep job status monotonic across sources.
    pub(crate) fn rank(self) -> u8 {
        match self {
            JobStatus::Unknown => 0,
            JobStatus::Pending => 1,
            JobStatus::Running => 2,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }
}

/// Payload of a live `job_complete` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    pub job_id: JobId,
    pub status: JobStatus,
    pub duration_secs: u64,
}

/// Result of polling one job over request/response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Newline-delimited historical log blob, when the backend has one.
    pub logs: Option<String>,
    /// Time the snapshot was received, used as the timestamp of replayed lines.
    pub received_at: String,
}

/// Successful answer to an execute request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub job_id: Option<JobId>,
    pub message: Option<String>,
}

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub sistemas: Vec<String>,
    pub limpar: bool,
    pub opcoes: BTreeMap<String, BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_inicial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_final: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Http(u16),
    Network,
    /// The backend answered but refused the request.
    Rejected,
    Decode,
}

/// A failed request, carried as data into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Timeout => write!(f, "server did not respond in time"),
            FailureKind::Http(code) => write!(f, "HTTP {code}: {}", self.message),
            FailureKind::Network => write!(f, "network error: {}", self.message),
            FailureKind::Rejected => f.write_str(&self.message),
            FailureKind::Decode => write!(f, "unexpected response: {}", self.message),
        }
    }
}
