use dashboard_core::{
    update, AppState, Effect, EtlConfig, ExecutionPhase, FailureKind, JobCompletion, JobSnapshot,
    JobStatus, Launch, LogLevel, Msg, NotificationKind, RequestFailure, SystemConfig,
    HISTORY_SYSTEM,
};

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn running_job(job_id: u64) -> AppState {
    let config = EtlConfig {
        systems: [(
            "maps".to_string(),
            SystemConfig {
                id: "maps".to_string(),
                active: true,
                ..SystemConfig::default()
            },
        )]
        .into_iter()
        .collect(),
        ..EtlConfig::default()
    };
    let (state, _) = update(AppState::new(), Msg::ConfigLoaded(Ok(config)));
    let (state, _) = update(state, Msg::ConnectionChanged(true));
    let (state, _) = update(state, Msg::ExecuteClicked { clear_dirs: false });
    let (state, _) = update(
        state,
        Msg::ExecuteResponded {
            request: 1,
            result: Ok(Launch {
                job_id: Some(job_id),
                message: Some("queued".to_string()),
            }),
        },
    );
    state
}

fn polled(job_id: u64, status: JobStatus, logs: Option<&str>) -> Msg {
    Msg::JobPolled {
        job_id,
        result: Ok(JobSnapshot {
            status,
            logs: logs.map(str::to_string),
            received_at: "2026-10-17T10:00:00Z".to_string(),
        }),
    }
}

#[test]
fn disconnect_mid_run_keeps_executing_and_poll_settles_after_reconnect() {
    init_logging();
    let state = running_job(42);

    let (state, effects) = update(state, Msg::ConnectionChanged(false));
    assert!(effects.is_empty());
    assert!(state.is_executing());
    assert!(!state.is_connected());

    let (state, effects) = update(state, Msg::ConnectionChanged(true));
    assert_eq!(effects, vec![Effect::PollNow { job_id: 42 }]);

    let (state, effects) = update(state, polled(42, JobStatus::Completed, None));
    assert!(!state.is_executing());
    assert_eq!(state.job_status(), Some(JobStatus::Completed));
    assert!(effects.contains(&Effect::ForgetJob));
    assert!(effects.contains(&Effect::StopPolling));
    assert_eq!(
        state.notification().map(|n| n.kind),
        Some(NotificationKind::Success)
    );
}

#[test]
fn reconnect_without_a_tracked_job_does_not_poll() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::ConnectionChanged(true));
    let (state, _) = update(state, Msg::ConnectionChanged(false));
    let (_, effects) = update(state, Msg::ConnectionChanged(true));
    assert!(effects.is_empty());
}

#[test]
fn terminal_status_is_sticky_against_late_polls() {
    init_logging();
    let state = running_job(42);
    let (state, _) = update(
        state,
        Msg::JobCompleted(JobCompletion {
            job_id: 42,
            status: JobStatus::Completed,
            duration_secs: 3,
        }),
    );

    let (state, effects) = update(state, polled(42, JobStatus::Running, None));

    assert!(effects.is_empty());
    assert!(!state.is_executing());
    assert_eq!(state.job_status(), Some(JobStatus::Completed));
}

#[test]
fn poll_for_another_job_is_discarded() {
    init_logging();
    let state = running_job(42);
    let before = state.clone();

    let (state, effects) = update(state, polled(41, JobStatus::Completed, None));

    assert!(effects.is_empty());
    assert_eq!(state, before);
}

#[test]
fn poll_status_never_regresses() {
    init_logging();
    let state = running_job(42);
    let (state, _) = update(state, polled(42, JobStatus::Running, None));
    assert_eq!(state.job_status(), Some(JobStatus::Running));

    let (state, _) = update(state, polled(42, JobStatus::Pending, None));
    assert_eq!(state.job_status(), Some(JobStatus::Running));
    assert!(state.is_executing());
}

#[test]
fn restored_job_replays_history_and_resumes_running() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::RestoreJob(42));
    assert_eq!(effects, vec![Effect::StartPolling { job_id: 42 }]);
    assert_eq!(state.current_job(), Some(42));
    assert!(!state.is_executing());

    let blob = "[INFO] maps started\n\n[ERROR] fidc login failed\n[SUCCESS] maps done\n";
    let (state, effects) = update(state, polled(42, JobStatus::Running, Some(blob)));

    assert!(effects.is_empty());
    assert_eq!(state.phase(), ExecutionPhase::Running { job_id: 42 });
    let levels: Vec<_> = state.logs().iter().map(|entry| entry.level).collect();
    assert_eq!(levels, vec![LogLevel::Info, LogLevel::Error, LogLevel::Success]);
    assert!(state
        .logs()
        .iter()
        .all(|entry| entry.system == HISTORY_SYSTEM && entry.job_id == Some(42)));

    // History is a one-shot resync; later polls leave the buffer alone.
    let (state, _) = update(state, polled(42, JobStatus::Running, Some("[INFO] other\n")));
    assert_eq!(state.logs().len(), 3);
}

#[test]
fn restored_job_that_already_finished_settles_without_running() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::RestoreJob(9));

    let (state, effects) = update(state, polled(9, JobStatus::Error, Some("[ERROR] boom")));

    assert!(!state.is_executing());
    assert_eq!(state.job_status(), Some(JobStatus::Error));
    assert!(effects.contains(&Effect::ForgetJob));
    assert_eq!(state.logs().len(), 1);
}

#[test]
fn completion_event_settles_a_restored_job() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::RestoreJob(9));
    let (state, _) = update(state, polled(9, JobStatus::Running, None));
    assert!(state.is_executing());

    let (state, effects) = update(
        state,
        Msg::JobCompleted(JobCompletion {
            job_id: 9,
            status: JobStatus::Completed,
            duration_secs: 60,
        }),
    );

    assert!(!state.is_executing());
    assert!(effects.contains(&Effect::StopPolling));
}

#[test]
fn poll_failures_notify_once_per_streak() {
    init_logging();
    let state = running_job(42);
    let failure = || Msg::JobPolled {
        job_id: 42,
        result: Err(RequestFailure::new(FailureKind::Http(502), "Bad Gateway")),
    };

    let (state, first) = update(state, failure());
    let (state, second) = update(state, failure());
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert!(state.is_executing());

    let (state, _) = update(state, polled(42, JobStatus::Running, None));
    let (_, third) = update(state, failure());
    assert_eq!(third.len(), 1);
}

#[test]
fn reconnect_exhaustion_raises_a_warning() {
    init_logging();
    let (state, effects) = update(running_job(42), Msg::ReconnectExhausted);

    assert_eq!(effects.len(), 1);
    assert!(state.is_executing());
    assert_eq!(
        state.notification().map(|n| n.kind),
        Some(NotificationKind::Warning)
    );

    let (_, effects) = update(state, Msg::ReconnectClicked);
    assert_eq!(effects, vec![Effect::Reconnect]);
}

#[test]
fn job_unknown_to_the_backend_is_dropped_while_running() {
    init_logging();
    let missing = || Msg::JobPolled {
        job_id: 42,
        result: Err(RequestFailure::new(
            FailureKind::Http(404),
            "Job 42 nao encontrado",
        )),
    };

    let (state, effects) = update(running_job(42), missing());
    assert!(!state.is_executing());
    assert_eq!(state.phase(), ExecutionPhase::Idle);
    assert_eq!(state.job_status(), Some(JobStatus::Error));
    assert_eq!(effects[..2], [Effect::ForgetJob, Effect::StopPolling]);
    assert_eq!(
        state.notification().map(|n| n.kind),
        Some(NotificationKind::Warning)
    );

    let (state, effects) = update(state, missing());
    assert!(effects.is_empty());

    let (state, effects) = update(state, Msg::ExecuteClicked { clear_dirs: false });
    assert!(state.is_executing());
    assert!(matches!(effects.as_slice(), [Effect::Execute { .. }]));
}

#[test]
fn restored_job_unknown_to_the_backend_forgets_the_durable_key() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::RestoreJob(7));

    let (state, effects) = update(
        state,
        Msg::JobPolled {
            job_id: 7,
            result: Err(RequestFailure::new(FailureKind::Http(404), "Not Found")),
        },
    );

    assert_eq!(effects[..2], [Effect::ForgetJob, Effect::StopPolling]);
    assert!(!state.is_executing());
    assert_eq!(state.current_job(), Some(7));
}
