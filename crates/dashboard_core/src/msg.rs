use crate::{
    EtlConfig, JobCompletion, JobId, JobSnapshot, Launch, LogEntry, LogLevel, NotificationId,
    Period, RequestFailure, RequestId, StatusUpdate,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A job id survived in durable storage from a previous session.
    RestoreJob(JobId),
    /// Response to the initial config fetch.
    ConfigLoaded(Result<EtlConfig, RequestFailure>),
    /// User flipped a system's activation.
    SystemToggled { system_id: String, active: bool },
    /// User flipped one option of a system.
    OptionToggled {
        system_id: String,
        option: String,
        value: bool,
    },
    /// User activated or deactivated every system at once.
    AllSystemsToggled { active: bool },
    /// User edited the execution period.
    PeriodChanged(Period),
    /// User asked to persist the config document.
    SaveConfigClicked,
    /// Response to a config save.
    ConfigSaved(Result<(), RequestFailure>),
    /// User asked to run the pipeline.
    ExecuteClicked { clear_dirs: bool },
    /// Response to an execute request.
    ExecuteResponded {
        request: RequestId,
        result: Result<Launch, RequestFailure>,
    },
    /// User asked to cancel the running job.
    CancelClicked,
    /// Response to a cancel request.
    CancelResponded {
        job_id: JobId,
        result: Result<(), RequestFailure>,
    },
    /// Live channel transport opened or closed.
    ConnectionChanged(bool),
    /// Live channel gave up reconnecting on its own.
    ReconnectExhausted,
    /// User asked for a manual reconnect.
    ReconnectClicked,
    /// Live `status` event.
    StatusReceived {
        system_id: String,
        update: StatusUpdate,
    },
    /// Live `log` event.
    LogReceived(LogEntry),
    /// Live `job_complete` event.
    JobCompleted(JobCompletion),
    /// Poll result for a job.
    JobPolled {
        job_id: JobId,
        result: Result<JobSnapshot, RequestFailure>,
    },
    /// User paused or resumed the log view.
    LogsPauseToggled,
    /// User cleared the log view.
    LogsCleared,
    /// User edited the log filter text.
    FilterTextChanged(String),
    /// User toggled the visibility of one log level.
    LevelToggled(LogLevel),
    /// A notification's display time elapsed.
    NotificationExpired { id: NotificationId },
}
