use engine_logging::{engine_debug, engine_info, targets};

use crate::logs::parse_history;
use crate::{
    AppState, Effect, EtlConfig, ExecutionPhase, FailureKind, JobCompletion, JobId, JobSnapshot,
    JobStatus, Launch, LogEntry, Msg, NotificationKind, RequestFailure, RequestId,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::RestoreJob(job_id) => restore_job(&mut state, job_id),
        Msg::ConfigLoaded(Ok(config)) => {
            state.set_config(config);
            Vec::new()
        }
        Msg::ConfigLoaded(Err(failure)) => {
            state.set_config(EtlConfig::default());
            vec![state.notify(
                NotificationKind::Error,
                format!("Could not reach the server: {failure}"),
            )]
        }
        Msg::SystemToggled { system_id, active } => {
            let changed = state
                .config_mut()
                .is_some_and(|config| config.set_active(&system_id, active));
            if changed {
                state.mark_dirty();
                vec![Effect::PushSystemToggle { system_id, active }]
            } else {
                Vec::new()
            }
        }
        Msg::OptionToggled {
            system_id,
            option,
            value,
        } => {
            let changed = state
                .config_mut()
                .is_some_and(|config| config.set_option(&system_id, &option, value));
            if changed {
                state.mark_dirty();
                vec![Effect::PushOptionToggle {
                    system_id,
                    option,
                    value,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::AllSystemsToggled { active } => toggle_all(&mut state, active),
        Msg::PeriodChanged(period) => {
            if let Some(config) = state.config_mut() {
                config.period = period;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::SaveConfigClicked => match state.config() {
            Some(config) => vec![Effect::SaveConfig(config.clone())],
            None => Vec::new(),
        },
        Msg::ConfigSaved(Ok(())) => {
            vec![state.notify(NotificationKind::Success, "Configuration saved")]
        }
        Msg::ConfigSaved(Err(failure)) => vec![state.notify(
            NotificationKind::Error,
            format!("Could not save configuration: {failure}"),
        )],
        Msg::ExecuteClicked { clear_dirs } => execute(&mut state, clear_dirs),
        Msg::ExecuteResponded { request, result } => launched(&mut state, request, result),
        Msg::CancelClicked => match state.phase() {
            ExecutionPhase::Running { job_id } => vec![Effect::CancelJob { job_id }],
            _ => Vec::new(),
        },
        Msg::CancelResponded { job_id, result } => {
            if state.current_job() != Some(job_id) {
                return (state, Vec::new());
            }
            match result {
                Ok(()) => vec![state.notify(
                    NotificationKind::Info,
                    format!("Cancellation requested for job {job_id}"),
                )],
                Err(failure) => vec![state.notify(
                    NotificationKind::Error,
                    format!("Could not cancel job {job_id}: {failure}"),
                )],
            }
        }
        Msg::ConnectionChanged(connected) => {
            let was = state.set_connected(connected);
            match state.current_job() {
                // A completion may have been missed while the channel was down.
                Some(job_id) if connected && !was && state.is_tracking() => {
                    vec![Effect::PollNow { job_id }]
                }
                _ => Vec::new(),
            }
        }
        Msg::ReconnectExhausted => vec![state.notify(
            NotificationKind::Warning,
            "Live connection lost. Reconnect manually to resume live updates.",
        )],
        Msg::ReconnectClicked => vec![Effect::Reconnect],
        Msg::StatusReceived { system_id, update } => {
            let applied = state
                .config_mut()
                .is_some_and(|config| config.apply_status(&system_id, &update));
            if applied {
                state.mark_dirty();
            } else {
                engine_debug!(target: targets::COORDINATOR, "Ignoring status for unknown system {}", system_id);
            }
            Vec::new()
        }
        Msg::LogReceived(entry) => {
            append_log(&mut state, entry);
            Vec::new()
        }
        Msg::JobCompleted(completion) => job_completed(&mut state, completion),
        Msg::JobPolled { job_id, result } => job_polled(&mut state, job_id, result),
        Msg::LogsPauseToggled => {
            state.toggle_paused();
            Vec::new()
        }
        Msg::LogsCleared => {
            state.logs_mut().clear();
            Vec::new()
        }
        Msg::FilterTextChanged(text) => {
            state.filter_mut().text = text;
            Vec::new()
        }
        Msg::LevelToggled(level) => {
            state.filter_mut().toggle_level(level);
            Vec::new()
        }
        Msg::NotificationExpired { id } => {
            state.expire_notification(id);
            Vec::new()
        }
    };

    (state, effects)
}

fn restore_job(state: &mut AppState, job_id: JobId) -> Vec<Effect> {
    if state.is_executing() {
        return Vec::new();
    }
    engine_info!(target: targets::COORDINATOR, "Resuming tracking of job {}", job_id);
    state.track_job(job_id, None);
    state.arm_history_replay(true);
    vec![Effect::StartPolling { job_id }]
}

fn toggle_all(state: &mut AppState, active: bool) -> Vec<Effect> {
    let Some(config) = state.config_mut() else {
        return Vec::new();
    };
    let ids: Vec<String> = config.systems.keys().cloned().collect();
    let mut effects = Vec::with_capacity(ids.len() + 1);
    for system_id in ids {
        config.set_active(&system_id, active);
        effects.push(Effect::PushSystemToggle { system_id, active });
    }
    let message = if active {
        "All systems activated"
    } else {
        "All systems deactivated"
    };
    effects.push(state.notify(NotificationKind::Success, message));
    effects
}

fn execute(state: &mut AppState, clear_dirs: bool) -> Vec<Effect> {
    if state.is_executing() {
        engine_debug!(target: targets::COORDINATOR, "Execute ignored: an execution is already in progress");
        return Vec::new();
    }
    let body = state
        .config()
        .filter(|config| config.active_count() > 0)
        .map(|config| config.execute_request(clear_dirs));
    let Some(body) = body else {
        return vec![state.notify(NotificationKind::Error, "No active systems to execute")];
    };
    let request = state.next_request();
    state.set_phase(ExecutionPhase::Launching {
        request,
        clear_dirs,
    });
    vec![Effect::Execute { request, body }]
}

fn launched(
    state: &mut AppState,
    request: RequestId,
    result: Result<Launch, RequestFailure>,
) -> Vec<Effect> {
    let clear_dirs = match state.phase() {
        ExecutionPhase::Launching {
            request: pending,
            clear_dirs,
        } if pending == request => clear_dirs,
        _ => {
            engine_debug!(target: targets::COORDINATOR, "Discarding stale execute response {}", request);
            return Vec::new();
        }
    };

    match result {
        Ok(Launch {
            job_id: Some(job_id),
            ..
        }) => {
            engine_info!(target: targets::COORDINATOR, "Job {} accepted by backend", job_id);
            state.set_phase(ExecutionPhase::Running { job_id });
            state.track_job(job_id, Some(JobStatus::Pending));
            state.arm_history_replay(false);
            let message = if clear_dirs {
                "Pipeline started (with cleanup)"
            } else {
                "Pipeline started"
            };
            vec![
                Effect::PersistJob(job_id),
                Effect::StartPolling { job_id },
                state.notify(NotificationKind::Success, message),
            ]
        }
        Ok(Launch { job_id: None, .. }) => {
            state.set_phase(ExecutionPhase::Idle);
            vec![state.notify(
                NotificationKind::Warning,
                "Pipeline started without a job id; completion cannot be tracked",
            )]
        }
        Err(failure) => {
            state.set_phase(ExecutionPhase::Idle);
            let message = match failure.kind {
                FailureKind::Rejected => format!("Execution rejected: {failure}"),
                _ => format!("Execution failed: {failure}"),
            };
            vec![state.notify(NotificationKind::Error, message)]
        }
    }
}

fn append_log(state: &mut AppState, entry: LogEntry) {
    if state.is_paused() {
        return;
    }
    if let Some(job_id) = entry.job_id {
        if state.current_job() != Some(job_id) {
            engine_debug!(target: targets::COORDINATOR, "Dropping log line of job {}", job_id);
            return;
        }
    }
    state.logs_mut().push(entry);
}

fn job_completed(state: &mut AppState, completion: JobCompletion) -> Vec<Effect> {
    if state.current_job() != Some(completion.job_id) {
        engine_debug!(
            target: targets::COORDINATOR,
            "Ignoring completion of foreign job {}",
            completion.job_id
        );
        return Vec::new();
    }
    settle(
        state,
        completion.job_id,
        completion.status,
        Some(completion.duration_secs),
    )
}

fn job_polled(
    state: &mut AppState,
    job_id: JobId,
    result: Result<JobSnapshot, RequestFailure>,
) -> Vec<Effect> {
    if state.current_job() != Some(job_id) {
        return Vec::new();
    }
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(failure) if failure.kind == FailureKind::Http(404) => {
            return job_vanished(state, job_id);
        }
        Err(failure) => {
            if state.record_poll(false) {
                return vec![state.notify(
                    NotificationKind::Error,
                    format!("Could not fetch job status: {failure}"),
                )];
            }
            return Vec::new();
        }
    };
    state.record_poll(true);

    if state.take_history_replay() {
        if let Some(blob) = snapshot.logs.as_deref() {
            let history = parse_history(blob, job_id, &snapshot.received_at);
            state.logs_mut().replace(history);
        }
    }

    // Terminal states are sticky: a late poll never regresses them.
    if state.job_is_terminal() {
        return Vec::new();
    }
    if snapshot.status.is_terminal() {
        return settle(state, job_id, snapshot.status, None);
    }

    let known_rank = state.job_status().map_or(0, JobStatus::rank);
    if snapshot.status.rank() > known_rank {
        state.set_job_status(snapshot.status);
    }
    if state.phase() == ExecutionPhase::Idle && state.is_tracking() && snapshot.status.rank() > 0 {
        state.set_phase(ExecutionPhase::Running { job_id });
    }
    Vec::new()
}

/// The backend no longer knows the job; stop waiting for it and drop the durable key.
fn job_vanished(state: &mut AppState, job_id: JobId) -> Vec<Effect> {
    if state.job_is_terminal() {
        return Vec::new();
    }
    engine_info!(target: targets::COORDINATOR, "Job {} is unknown to the backend", job_id);
    state.set_job_status(JobStatus::Error);
    state.stop_tracking();
    if state.phase() == (ExecutionPhase::Running { job_id }) {
        state.set_phase(ExecutionPhase::Idle);
    }
    vec![
        Effect::ForgetJob,
        Effect::StopPolling,
        state.notify(
            NotificationKind::Warning,
            format!("Job {job_id} is no longer known to the server"),
        ),
    ]
}

/// Marks the current job finished. Idempotent under duplicate delivery.
fn settle(
    state: &mut AppState,
    job_id: JobId,
    status: JobStatus,
    duration_secs: Option<u64>,
) -> Vec<Effect> {
    if state.job_is_terminal() {
        return Vec::new();
    }
    let status = if status.is_terminal() {
        status
    } else {
        JobStatus::Error
    };
    engine_info!(target: targets::COORDINATOR, "Job {} settled as {}", job_id, status.as_str());

    state.set_job_status(status);
    state.stop_tracking();
    if state.phase() == (ExecutionPhase::Running { job_id }) {
        state.set_phase(ExecutionPhase::Idle);
    }

    let took = duration_secs
        .map(|secs| format!(" in {secs}s"))
        .unwrap_or_default();
    let (kind, message) = match status {
        JobStatus::Completed => (
            NotificationKind::Success,
            format!("Job {job_id} completed{took}"),
        ),
        JobStatus::Cancelled => (
            NotificationKind::Warning,
            format!("Job {job_id} was cancelled{took}"),
        ),
        _ => (
            NotificationKind::Error,
            format!("Job {job_id} finished with errors{took}"),
        ),
    };
    vec![
        Effect::ForgetJob,
        Effect::StopPolling,
        state.notify(kind, message),
    ]
}
