use std::time::Duration;

use crate::logs::{export_logs, LogBuffer, LogFilter, DEFAULT_MAX_LOGS};
use crate::notification::DEFAULT_NOTIFICATION_DURATION;
use crate::view_model::{AppViewModel, SystemRowView};
use crate::{
    Effect, EtlConfig, JobId, JobStatus, Notification, NotificationId, NotificationKind,
    RequestId,
};

/// Where the coordinator is in the life of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPhase {
    #[default]
    Idle,
    /// Execute request in flight.
    Launching { request: RequestId, clear_dirs: bool },
    /// Backend accepted the job; waiting for a completion signal.
    Running { job_id: JobId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    config: Option<EtlConfig>,
    phase: ExecutionPhase,
    current_job: Option<JobId>,
    job_status: Option<JobStatus>,
    /// Current job is neither settled nor abandoned; the poller runs while set.
    tracking: bool,
    history_pending: bool,
    poll_failing: bool,
    connected: bool,
    logs: LogBuffer,
    paused: bool,
    filter: LogFilter,
    notification: Option<Notification>,
    notification_duration: Duration,
    next_request: RequestId,
    next_notification: NotificationId,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_LOGS, DEFAULT_NOTIFICATION_DURATION)
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_logs: usize, notification_duration: Duration) -> Self {
        Self {
            config: None,
            phase: ExecutionPhase::Idle,
            current_job: None,
            job_status: None,
            tracking: false,
            history_pending: false,
            poll_failing: false,
            connected: false,
            logs: LogBuffer::with_capacity(max_logs),
            paused: false,
            filter: LogFilter::default(),
            notification: None,
            notification_duration,
            next_request: 0,
            next_notification: 0,
            dirty: false,
        }
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// True from an accepted execute click until the owning job settles.
    pub fn is_executing(&self) -> bool {
        !matches!(self.phase, ExecutionPhase::Idle)
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current_job
    }

    pub fn job_status(&self) -> Option<JobStatus> {
        self.job_status
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> Option<&EtlConfig> {
        self.config.as_ref()
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn export_logs(&self) -> String {
        export_logs(&self.logs)
    }

    pub fn view(&self) -> AppViewModel {
        let systems: Vec<SystemRowView> = self
            .config
            .as_ref()
            .map(|config| {
                config
                    .ordered_systems()
                    .into_iter()
                    .map(|(id, system)| SystemRowView {
                        id: id.clone(),
                        name: system.name.clone(),
                        active: system.active,
                        status: system.status.unwrap_or_default(),
                        progress: system.progress.unwrap_or(0),
                        message: system.message.clone(),
                        options: system
                            .options
                            .as_ref()
                            .map(|opts| opts.iter().map(|(k, v)| (k.clone(), *v)).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let active_systems = systems.iter().filter(|row| row.active).count();

        AppViewModel {
            phase: self.phase,
            executing: self.is_executing(),
            connected: self.connected,
            job_id: self.current_job,
            job_status: self.job_status,
            total_systems: systems.len(),
            active_systems,
            inactive_systems: systems.len() - active_systems,
            systems,
            period: self.config.as_ref().map(|config| config.period.clone()),
            visible_logs: crate::filter_logs(&self.logs, &self.filter)
                .into_iter()
                .cloned()
                .collect(),
            buffered_logs: self.logs.len(),
            logs_paused: self.paused,
            notification: self.notification.clone(),
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn config_mut(&mut self) -> Option<&mut EtlConfig> {
        self.config.as_mut()
    }

    pub(crate) fn set_config(&mut self, config: EtlConfig) {
        self.config = Some(config);
        self.dirty = true;
    }

    pub(crate) fn set_phase(&mut self, phase: ExecutionPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.dirty = true;
        }
    }

    pub(crate) fn next_request(&mut self) -> RequestId {
        self.next_request += 1;
        self.next_request
    }

    /// Installs `job_id` as the current job handle, dropping any previous one.
    pub(crate) fn track_job(&mut self, job_id: JobId, status: Option<JobStatus>) {
        self.current_job = Some(job_id);
        self.job_status = status;
        self.tracking = true;
        self.poll_failing = false;
        self.dirty = true;
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub(crate) fn stop_tracking(&mut self) {
        self.tracking = false;
    }

    pub(crate) fn set_job_status(&mut self, status: JobStatus) {
        self.job_status = Some(status);
        self.dirty = true;
    }

    pub(crate) fn job_is_terminal(&self) -> bool {
        self.job_status.is_some_and(JobStatus::is_terminal)
    }

    pub(crate) fn arm_history_replay(&mut self, armed: bool) {
        self.history_pending = armed;
    }

    pub(crate) fn take_history_replay(&mut self) -> bool {
        std::mem::take(&mut self.history_pending)
    }

    /// Records a poll outcome; returns true when a failure starts a new streak.
    pub(crate) fn record_poll(&mut self, ok: bool) -> bool {
        let starts_streak = !ok && !self.poll_failing;
        self.poll_failing = !ok;
        starts_streak
    }

    pub(crate) fn set_connected(&mut self, connected: bool) -> bool {
        let was = self.connected;
        if was != connected {
            self.connected = connected;
            self.dirty = true;
        }
        was
    }

    pub(crate) fn logs_mut(&mut self) -> &mut LogBuffer {
        self.dirty = true;
        &mut self.logs
    }

    pub(crate) fn filter_mut(&mut self) -> &mut LogFilter {
        self.dirty = true;
        &mut self.filter
    }

    pub(crate) fn toggle_paused(&mut self) {
        self.paused = !self.paused;
        self.dirty = true;
    }

    /// Shows `message` in the single notification slot and schedules its expiry.
    pub(crate) fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) -> Effect {
        self.next_notification += 1;
        let id = self.next_notification;
        self.notification = Some(Notification {
            id,
            kind,
            message: message.into(),
        });
        self.dirty = true;
        Effect::ExpireNotification {
            id,
            after: self.notification_duration,
        }
    }

    pub(crate) fn expire_notification(&mut self, id: NotificationId) {
        if self.notification.as_ref().is_some_and(|n| n.id == id) {
            self.notification = None;
            self.dirty = true;
        }
    }
}
