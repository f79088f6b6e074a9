use std::fmt;
use std::time::Duration;

use dashboard_core::{
    EtlConfig, ExecuteRequest, FailureKind, JobCompletion, JobId, JobSnapshot, Launch, LogEntry,
    NotificationId, RequestFailure, RequestId, StatusUpdate,
};
use thiserror::Error;

/// Work the UI thread hands to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    LoadConfig,
    SaveConfig(EtlConfig),
    ToggleSystem {
        system_id: String,
        active: bool,
    },
    UpdateOption {
        system_id: String,
        option: String,
        value: bool,
    },
    Execute {
        request: RequestId,
        body: ExecuteRequest,
    },
    Cancel {
        job_id: JobId,
    },
    StartPolling {
        job_id: JobId,
    },
    StopPolling,
    PollNow {
        job_id: JobId,
    },
    ExpireNotification {
        id: NotificationId,
        after: Duration,
    },
    Connect,
    /// Clear the retry budget, then connect.
    Reconnect,
}

/// Everything the engine reports back, already converted to core types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ConfigLoaded(Result<EtlConfig, RequestFailure>),
    ConfigSaved(Result<(), RequestFailure>),
    ExecuteResponded {
        request: RequestId,
        result: Result<Launch, RequestFailure>,
    },
    CancelResponded {
        job_id: JobId,
        result: Result<(), RequestFailure>,
    },
    JobPolled {
        job_id: JobId,
        result: Result<JobSnapshot, RequestFailure>,
    },
    ConnectionChanged(bool),
    ReconnectExhausted,
    Log(LogEntry),
    Status {
        system_id: String,
        update: StatusUpdate,
    },
    JobComplete(JobCompletion),
    NotificationExpired {
        id: NotificationId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("server did not respond within {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn to_failure(&self) -> RequestFailure {
        match self {
            ApiError::Timeout(after) => {
                RequestFailure::new(FailureKind::Timeout, format!("no response within {after:?}"))
            }
            ApiError::HttpStatus { status, message } => {
                RequestFailure::new(FailureKind::Http(*status), message.clone())
            }
            ApiError::InvalidUrl(message) | ApiError::Network(message) => {
                RequestFailure::new(FailureKind::Network, message.clone())
            }
            ApiError::Decode(message) => RequestFailure::new(FailureKind::Decode, message.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The transport could not be established.
    #[error("could not connect: {0}")]
    Connect(String),
    /// An established transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a live frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unknown event type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: FrameKind, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Log,
    Status,
    JobComplete,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Log => write!(f, "log"),
            FrameKind::Status => write!(f, "status"),
            FrameKind::JobComplete => write!(f, "job_complete"),
        }
    }
}
