mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashboard_core::{JobStatus, LogEntry, SystemStatusKind};
use dashboard_engine::{LiveChannel, ReconnectPolicy};
use pretty_assertions::assert_eq;
use support::{init_logging, log_frame, FakeConnector, Remote};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

const WAIT: Duration = Duration::from_secs(600);

fn policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(30),
        max_attempts,
    }
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting")
        .expect("sender dropped")
}

fn connection_events(channel: &LiveChannel) -> mpsc::UnboundedReceiver<bool> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _subscription = channel.on_connection_change(move |connected| {
        let _ = tx.send(connected);
    });
    rx
}

fn log_events(channel: &LiveChannel) -> mpsc::UnboundedReceiver<LogEntry> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _subscription = channel.on_log(move |entry| {
        let _ = tx.send(entry.clone());
    });
    rx
}

async fn connected_channel(
    max_attempts: u32,
) -> (
    LiveChannel,
    Arc<FakeConnector>,
    mpsc::UnboundedReceiver<Remote>,
    Remote,
) {
    init_logging();
    let (connector, mut remotes) = FakeConnector::new();
    let channel = LiveChannel::new("ws://test/ws", connector.clone(), policy(max_attempts));
    channel.connect().await.expect("connect");
    let remote = next(&mut remotes).await;
    (channel, connector, remotes, remote)
}

#[tokio::test(start_paused = true)]
async fn connect_resolves_open_and_publishes_connection() {
    init_logging();
    let (connector, _remotes) = FakeConnector::new();
    let channel = LiveChannel::new("ws://test/ws", connector.clone(), policy(5));
    let mut connection = connection_events(&channel);

    assert!(!channel.is_connected());
    channel.connect().await.expect("connect");

    assert!(channel.is_connected());
    assert_eq!(next(&mut connection).await, true);
    assert_eq!(connector.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_while_connected_does_not_open_a_second_transport() {
    let (channel, connector, _remotes, _remote) = connected_channel(5).await;

    channel.connect().await.expect("second connect");
    let (first, second) = tokio::join!(channel.connect(), channel.connect());

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(connector.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_during_pending_retry_replaces_the_timer() {
    let (channel, connector, mut remotes, remote) = connected_channel(5).await;
    let mut connection = connection_events(&channel);

    drop(remote);
    assert_eq!(next(&mut connection).await, false);

    channel.connect().await.expect("manual connect");
    let _fresh = next(&mut remotes).await;
    assert_eq!(connector.opens(), 2);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.opens(), 2);
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_keep_only_the_newest_attempt() {
    init_logging();
    let (connector, mut remotes) = FakeConnector::new();
    connector.delay_opens(Duration::from_millis(500));
    let channel = LiveChannel::new("ws://test/ws", connector.clone(), policy(5));

    let (first, second) = tokio::join!(channel.connect(), channel.connect());

    let outcomes = [first, second];
    let superseded: Vec<_> = outcomes.iter().filter_map(|outcome| outcome.as_ref().err()).collect();
    assert_eq!(superseded.len(), 1);
    assert!(superseded[0].to_string().contains("superseded"));
    assert!(channel.is_connected());
    assert_eq!(connector.opens(), 2);

    let a = next(&mut remotes).await;
    let b = next(&mut remotes).await;
    let mut logs = log_events(&channel);
    let delivered = [&a, &b]
        .iter()
        .filter(|remote| remote.send(&log_frame("from the newest link", None)))
        .count();
    assert_eq!(delivered, 1);
    assert_eq!(next(&mut logs).await.message, "from the newest link");

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn handlers_run_in_registration_order() {
    let (channel, _connector, _remotes, remote) = connected_channel(5).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done) = mpsc::unbounded_channel();

    let first = seen.clone();
    let _a = channel.on_log(move |entry| first.lock().unwrap().push(format!("a:{}", entry.message)));
    let second = seen.clone();
    let _b = channel.on_log(move |entry| {
        second.lock().unwrap().push(format!("b:{}", entry.message));
        let _ = done_tx.send(());
    });

    remote.send(&log_frame("one", None));
    remote.send(&log_frame("two", None));
    next(&mut done).await;
    next(&mut done).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["a:one", "b:one", "a:two", "b:two"]
    );
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_removes_only_that_registration() {
    let (channel, _connector, _remotes, remote) = connected_channel(5).await;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let handler = |tag: &'static str, calls: Arc<Mutex<Vec<&'static str>>>| {
        move |_: &LogEntry| calls.lock().unwrap().push(tag)
    };
    let first = channel.on_log(handler("same", calls.clone()));
    let _second = channel.on_log(handler("same", calls.clone()));
    let mut witness = log_events(&channel);

    assert!(first.unsubscribe());
    remote.send(&log_frame("hello", None));
    next(&mut witness).await;

    assert_eq!(*calls.lock().unwrap(), vec!["same"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_and_unknown_frames_are_dropped() {
    let (channel, _connector, _remotes, remote) = connected_channel(5).await;
    let mut logs = log_events(&channel);

    remote.send("not json at all");
    remote.send(r#"{"type":"heartbeat","payload":{}}"#);
    remote.send(r#"{"type":"status","payload":{"sistema_id":"maps","status":"BOGUS"}}"#);
    remote.send(&log_frame("still flowing", Some(7)));

    let entry = next(&mut logs).await;
    assert_eq!(entry.message, "still flowing");
    assert_eq!(entry.job_id, Some(7));
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn status_and_completion_events_reach_their_handlers() {
    let (channel, _connector, _remotes, remote) = connected_channel(5).await;
    let (status_tx, mut statuses) = mpsc::unbounded_channel();
    let _status = channel.on_status_update(move |system_id, update| {
        let _ = status_tx.send((system_id.to_string(), update.clone()));
    });
    let (done_tx, mut completions) = mpsc::unbounded_channel();
    let _done = channel.on_job_complete(move |completion| {
        let _ = done_tx.send(completion.clone());
    });

    remote.send(
        r#"{"type":"status","payload":{"sistema_id":"fidc","status":"RUNNING","progresso":40,"mensagem":"downloading"}}"#,
    );
    remote.send(
        r#"{"type":"job_complete","payload":{"job_id":42,"status":"completed","duracao_segundos":12.4}}"#,
    );

    let (system_id, update) = next(&mut statuses).await;
    assert_eq!(system_id, "fidc");
    assert_eq!(update.status, SystemStatusKind::Running);
    assert_eq!(update.progress, 40);

    let completion = next(&mut completions).await;
    assert_eq!(completion.job_id, 42);
    assert_eq!(completion.status, JobStatus::Completed);
    assert_eq!(completion.duration_secs, 12);
}

#[tokio::test(start_paused = true)]
async fn transport_close_reconnects_after_base_delay() {
    let (channel, _connector, mut remotes, remote) = connected_channel(5).await;
    let mut connection = connection_events(&channel);

    let started = Instant::now();
    drop(remote);
    assert_eq!(next(&mut connection).await, false);

    let _remote = next(&mut remotes).await;
    assert_eq!(next(&mut connection).await, true);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    assert_eq!(channel.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_error_is_handled_once_through_the_close_path() {
    let (channel, connector, mut remotes, remote) = connected_channel(5).await;
    let mut connection = connection_events(&channel);

    remote.fail("socket reset");
    assert_eq!(next(&mut connection).await, false);
    let _remote = next(&mut remotes).await;
    assert_eq!(next(&mut connection).await, true);

    assert_eq!(connector.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn delays_grow_per_attempt_and_reset_after_open() {
    let (channel, connector, mut remotes, remote) = connected_channel(5).await;

    connector.refuse_next(2);
    let started = Instant::now();
    drop(remote);
    let remote = next(&mut remotes).await;
    let waited = started.elapsed();
    // 2s + 4s + 6s
    assert!(waited >= Duration::from_secs(12) && waited < Duration::from_secs(13));
    assert_eq!(channel.reconnect_attempts(), 0);

    let started = Instant::now();
    drop(remote);
    let _remote = next(&mut remotes).await;
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts_until_reset() {
    init_logging();
    let (connector, mut remotes) = FakeConnector::new();
    let channel = LiveChannel::new("ws://test/ws", connector.clone(), policy(3));
    let (exhausted_tx, mut exhausted) = mpsc::unbounded_channel();
    let _exhausted = channel.on_retries_exhausted(move || {
        let _ = exhausted_tx.send(());
    });

    // The first open plus three retries.
    connector.refuse_next(4);
    assert!(channel.connect().await.is_err());
    next(&mut exhausted).await;

    assert_eq!(connector.opens(), 4);
    assert_eq!(channel.reconnect_attempts(), 3);
    assert!(!channel.is_connected());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.opens(), 4);

    channel.reset_reconnect();
    assert_eq!(channel.reconnect_attempts(), 0);
    channel.connect().await.expect("manual reconnect");
    assert!(channel.is_connected());
    let _remote = next(&mut remotes).await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_disables_auto_reconnect() {
    let (channel, connector, _remotes, _remote) = connected_channel(5).await;
    let mut connection = connection_events(&channel);

    channel.disconnect();
    assert_eq!(next(&mut connection).await, false);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.opens(), 1);
    assert!(!channel.is_connected());

    channel.connect().await.expect("connect after disconnect");
    assert_eq!(connector.opens(), 2);
}
