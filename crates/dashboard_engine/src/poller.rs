use std::sync::Arc;
use std::time::Duration;

use dashboard_core::{JobId, JobSnapshot};
use engine_logging::{engine_debug, engine_info, engine_warn, targets};
use tokio::task::JoinHandle;

use crate::api::DashboardApi;
use crate::engine::EventSink;
use crate::{ApiError, EngineEvent};

/// Periodic fetch of one job's status and history blob.
pub struct JobPoller {
    api: Arc<dyn DashboardApi>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    task: Option<(JobId, JoinHandle<()>)>,
}

impl JobPoller {
    pub fn new(api: Arc<dyn DashboardApi>, sink: Arc<dyn EventSink>, interval: Duration) -> Self {
        Self {
            api,
            sink,
            interval,
            task: None,
        }
    }

    /// Polls `job_id` now and then every interval until a terminal status is seen.
    /// Replaces any job already being polled.
    pub fn start(&mut self, job_id: JobId) {
        self.stop();
        engine_info!(target: targets::POLLER, "Polling job {} every {:?}", job_id, self.interval);
        let api = self.api.clone();
        let sink = self.sink.clone();
        let interval = self.interval;
        let task = tokio::spawn(async move {
            loop {
                let result = poll_once(api.as_ref(), job_id).await;
                let terminal = matches!(&result, Ok(snapshot) if snapshot.status.is_terminal());
                if let Err(err) = &result {
                    engine_warn!(target: targets::POLLER, "Poll of job {} failed: {}", job_id, err);
                }
                sink.emit(EngineEvent::JobPolled {
                    job_id,
                    result: result.map_err(|err| err.to_failure()),
                });
                if terminal {
                    engine_info!(target: targets::POLLER, "Job {} is terminal; polling stops", job_id);
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        self.task = Some((job_id, task));
    }

    pub fn stop(&mut self) {
        if let Some((job_id, task)) = self.task.take() {
            engine_debug!(target: targets::POLLER, "Stopped polling job {}", job_id);
            task.abort();
        }
    }

    /// One out-of-band fetch, independent of the periodic schedule.
    pub fn poll_now(&self, job_id: JobId) {
        let api = self.api.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let result = poll_once(api.as_ref(), job_id).await;
            sink.emit(EngineEvent::JobPolled {
                job_id,
                result: result.map_err(|err| err.to_failure()),
            });
        });
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

pub async fn poll_once(api: &dyn DashboardApi, job_id: JobId) -> Result<JobSnapshot, ApiError> {
    let record = api.job(job_id).await?;
    Ok(record.into_snapshot(chrono::Utc::now().to_rfc3339()))
}
