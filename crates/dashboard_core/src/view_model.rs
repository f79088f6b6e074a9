use crate::{
    ExecutionPhase, JobId, JobStatus, LogEntry, Notification, Period, SystemStatusKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewModel {
    pub phase: ExecutionPhase,
    pub executing: bool,
    pub connected: bool,
    pub job_id: Option<JobId>,
    pub job_status: Option<JobStatus>,
    pub systems: Vec<SystemRowView>,
    pub total_systems: usize,
    pub active_systems: usize,
    pub inactive_systems: usize,
    pub period: Option<Period>,
    /// Buffered entries that pass the current filter, in arrival order.
    pub visible_logs: Vec<LogEntry>,
    pub buffered_logs: usize,
    pub logs_paused: bool,
    pub notification: Option<Notification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRowView {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub status: SystemStatusKind,
    pub progress: u8,
    pub message: Option<String>,
    pub options: Vec<(String, bool)>,
}
