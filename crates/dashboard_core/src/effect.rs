use std::time::Duration;

use crate::{EtlConfig, ExecuteRequest, JobId, NotificationId, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadConfig,
    SaveConfig(EtlConfig),
    PushSystemToggle {
        system_id: String,
        active: bool,
    },
    PushOptionToggle {
        system_id: String,
        option: String,
        value: bool,
    },
    Execute {
        request: RequestId,
        body: ExecuteRequest,
    },
    CancelJob {
        job_id: JobId,
    },
    /// Store the job id under the durable key.
    PersistJob(JobId),
    /// Remove the durable job key.
    ForgetJob,
    /// Poll now, then every poll interval, until stopped.
    StartPolling {
        job_id: JobId,
    },
    StopPolling,
    /// One immediate poll outside the regular cadence.
    PollNow {
        job_id: JobId,
    },
    Reconnect,
    ExpireNotification {
        id: NotificationId,
        after: Duration,
    },
}
