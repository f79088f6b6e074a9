//! Dashboard core: pure execution coordinator, config store and log buffer.
mod config;
mod effect;
mod logs;
mod msg;
mod notification;
mod state;
mod types;
mod update;
mod view_model;

pub use config::{EtlConfig, Fund, Period, SystemConfig};
pub use effect::Effect;
pub use logs::{
    export_logs, filter_logs, parse_history, LogBuffer, LogFilter, DEFAULT_MAX_LOGS,
    HISTORY_SYSTEM,
};
pub use msg::Msg;
pub use notification::{
    Notification, NotificationId, NotificationKind, DEFAULT_NOTIFICATION_DURATION,
};
pub use state::{AppState, ExecutionPhase};
pub use types::{
    ExecuteRequest, FailureKind, JobCompletion, JobId, JobSnapshot, JobStatus, Launch, LogEntry,
    LogLevel, RequestFailure, RequestId, StatusUpdate, SystemStatusKind,
};
pub use update::update;
pub use view_model::{AppViewModel, SystemRowView};
