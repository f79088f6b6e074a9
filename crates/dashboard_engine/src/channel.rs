use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dashboard_core::{JobCompletion, LogEntry, StatusUpdate};
use engine_logging::{engine_debug, engine_info, engine_warn, targets};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use tokio::task::JoinHandle;

use crate::backoff::ReconnectPolicy;
use crate::transport::{Connector, FrameStream};
use crate::wire::{decode_frame, ChannelEvent};
use crate::ChannelError;

type LogHandler = dyn Fn(&LogEntry) + Send + Sync;
type StatusHandler = dyn Fn(&str, &StatusUpdate) + Send + Sync;
type ConnectionHandler = dyn Fn(bool) + Send + Sync;
type JobCompleteHandler = dyn Fn(&JobCompletion) + Send + Sync;
type ExhaustedHandler = dyn Fn() + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerKind {
    Log,
    Status,
    Connection,
    JobComplete,
    RetriesExhausted,
}

/// Listener lists keyed by subscription token, kept in registration order.
#[derive(Default)]
struct Handlers {
    next_token: u64,
    log: Vec<(u64, Arc<LogHandler>)>,
    status: Vec<(u64, Arc<StatusHandler>)>,
    connection: Vec<(u64, Arc<ConnectionHandler>)>,
    job_complete: Vec<(u64, Arc<JobCompleteHandler>)>,
    exhausted: Vec<(u64, Arc<ExhaustedHandler>)>,
}

impl Handlers {
    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn remove(&mut self, kind: HandlerKind, token: u64) -> bool {
        fn take<T: ?Sized>(list: &mut Vec<(u64, Arc<T>)>, token: u64) -> bool {
            let before = list.len();
            list.retain(|(id, _)| *id != token);
            list.len() != before
        }
        match kind {
            HandlerKind::Log => take(&mut self.log, token),
            HandlerKind::Status => take(&mut self.status, token),
            HandlerKind::Connection => take(&mut self.connection, token),
            HandlerKind::JobComplete => take(&mut self.job_complete, token),
            HandlerKind::RetriesExhausted => take(&mut self.exhausted, token),
        }
    }
}

#[derive(Default)]
struct Link {
    /// Bumped by every `connect`/`disconnect`; tasks from an older generation stand down.
    generation: u64,
    attempts: u32,
    auto_reconnect: bool,
    reader: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl Link {
    fn abort_tasks(&mut self) {
        if let Some(task) = self.reader.take() {
            task.abort();
        }
        if let Some(task) = self.retry.take() {
            task.abort();
        }
    }
}

struct Inner {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    handlers: Mutex<Handlers>,
    link: Mutex<Link>,
    connected: AtomicBool,
}

impl Inner {
    fn handlers(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_connected(&self, connected: bool) {
        if self.connected.swap(connected, Ordering::SeqCst) == connected {
            return;
        }
        let listeners: Vec<_> = self.handlers().connection.iter().map(|(_, h)| h.clone()).collect();
        for handler in listeners {
            handler(connected);
        }
    }

    fn dispatch(&self, event: ChannelEvent) {
        // Handlers run outside the lock so they may unsubscribe themselves.
        match event {
            ChannelEvent::Log(entry) => {
                let listeners: Vec<_> = self.handlers().log.iter().map(|(_, h)| h.clone()).collect();
                for handler in listeners {
                    handler(&entry);
                }
            }
            ChannelEvent::Status { system_id, update } => {
                let listeners: Vec<_> =
                    self.handlers().status.iter().map(|(_, h)| h.clone()).collect();
                for handler in listeners {
                    handler(&system_id, &update);
                }
            }
            ChannelEvent::JobComplete(completion) => {
                let listeners: Vec<_> =
                    self.handlers().job_complete.iter().map(|(_, h)| h.clone()).collect();
                for handler in listeners {
                    handler(&completion);
                }
            }
        }
    }

    fn retries_exhausted(&self) {
        let listeners: Vec<_> = self.handlers().exhausted.iter().map(|(_, h)| h.clone()).collect();
        for handler in listeners {
            handler();
        }
    }
}

/// Handle returned by every `on_*` registration.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    inner: Weak<Inner>,
    kind: HandlerKind,
    token: u64,
}

impl Subscription {
    /// Removes exactly this registration. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.handlers().remove(self.kind, self.token),
            None => false,
        }
    }
}

/// Auto-reconnecting push connection delivering typed live events.
///
/// Cloning yields another handle to the same connection. Must be used from
/// within a tokio runtime.
#[derive(Clone)]
pub struct LiveChannel {
    inner: Arc<Inner>,
}

impl LiveChannel {
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                connector,
                policy,
                handlers: Mutex::new(Handlers::default()),
                link: Mutex::new(Link::default()),
                connected: AtomicBool::new(false),
            }),
        }
    }

    pub fn on_log(&self, handler: impl Fn(&LogEntry) + Send + Sync + 'static) -> Subscription {
        let mut handlers = self.inner.handlers();
        let token = handlers.token();
        handlers.log.push((token, Arc::new(handler)));
        self.subscription(HandlerKind::Log, token)
    }

    pub fn on_status_update(
        &self,
        handler: impl Fn(&str, &StatusUpdate) + Send + Sync + 'static,
    ) -> Subscription {
        let mut handlers = self.inner.handlers();
        let token = handlers.token();
        handlers.status.push((token, Arc::new(handler)));
        self.subscription(HandlerKind::Status, token)
    }

    pub fn on_connection_change(&self, handler: impl Fn(bool) + Send + Sync + 'static) -> Subscription {
        let mut handlers = self.inner.handlers();
        let token = handlers.token();
        handlers.connection.push((token, Arc::new(handler)));
        self.subscription(HandlerKind::Connection, token)
    }

    pub fn on_job_complete(
        &self,
        handler: impl Fn(&JobCompletion) + Send + Sync + 'static,
    ) -> Subscription {
        let mut handlers = self.inner.handlers();
        let token = handlers.token();
        handlers.job_complete.push((token, Arc::new(handler)));
        self.subscription(HandlerKind::JobComplete, token)
    }

    /// Fired once each time the automatic reconnect budget runs out.
    pub fn on_retries_exhausted(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut handlers = self.inner.handlers();
        let token = handlers.token();
        handlers.exhausted.push((token, Arc::new(handler)));
        self.subscription(HandlerKind::RetriesExhausted, token)
    }

    fn subscription(&self, kind: HandlerKind, token: u64) -> Subscription {
        Subscription {
            inner: Arc::downgrade(&self.inner),
            kind,
            token,
        }
    }

    /// Opens the transport and resolves once it is open.
    ///
    /// Supersedes any pending reconnect timer or in-flight attempt, so at most
    /// one live connection exists. A no-op while already connected. On failure
    /// the automatic retry schedule is armed before the error is returned.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        if self.is_connected() {
            return Ok(());
        }
        let generation = {
            let mut link = self.inner.link();
            link.abort_tasks();
            link.generation += 1;
            link.auto_reconnect = true;
            link.generation
        };
        open(self.inner.clone(), generation).await
    }

    /// Closes the transport and disables auto-reconnect.
    pub fn disconnect(&self) {
        {
            let mut link = self.inner.link();
            link.abort_tasks();
            link.generation += 1;
            link.auto_reconnect = false;
        }
        engine_info!(target: targets::CHANNEL, "Live channel disconnected by request");
        self.inner.set_connected(false);
    }

    /// Clears the attempt counter and re-enables auto-reconnect.
    pub fn reset_reconnect(&self) {
        let mut link = self.inner.link();
        link.attempts = 0;
        link.auto_reconnect = true;
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.link().attempts
    }
}

fn open(inner: Arc<Inner>, generation: u64) -> BoxFuture<'static, Result<(), ChannelError>> {
    async move {
        let stream = match inner.connector.open(&inner.url).await {
            Ok(stream) => stream,
            Err(err) => {
                engine_warn!(target: targets::CHANNEL, "Live channel open failed: {}", err);
                schedule_retry(&inner, generation);
                return Err(err);
            }
        };

        {
            let mut link = inner.link();
            if link.generation != generation {
                engine_debug!(target: targets::CHANNEL, "Dropping superseded connection attempt");
                return Err(ChannelError::Connect(
                    "superseded by a newer connection attempt".to_string(),
                ));
            }
            link.attempts = 0;
            let reader_inner = inner.clone();
            link.reader = Some(tokio::spawn(read_frames(reader_inner, stream, generation)));
        }
        engine_info!(target: targets::CHANNEL, "Live channel open: {}", inner.url);
        inner.set_connected(true);
        Ok(())
    }
    .boxed()
}

async fn read_frames(inner: Arc<Inner>, mut stream: FrameStream, generation: u64) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(text) => match decode_frame(&text) {
                Ok(event) => inner.dispatch(event),
                Err(err) => engine_warn!(target: targets::CHANNEL, "Dropping frame: {}", err),
            },
            Err(err) => {
                // The close path below drives recovery; nothing else reacts to the error.
                engine_info!(target: targets::CHANNEL, "Live channel transport failed: {}", err);
                break;
            }
        }
    }
    closed(&inner, generation);
}

fn closed(inner: &Arc<Inner>, generation: u64) {
    {
        let mut link = inner.link();
        if link.generation != generation {
            return;
        }
        link.reader = None;
    }
    engine_info!(target: targets::CHANNEL, "Live channel closed");
    inner.set_connected(false);
    schedule_retry(inner, generation);
}

fn schedule_retry(inner: &Arc<Inner>, generation: u64) {
    let mut link = inner.link();
    if !link.auto_reconnect || link.generation != generation {
        return;
    }
    if !inner.policy.allows(link.attempts + 1) {
        let attempts = link.attempts;
        drop(link);
        engine_warn!(
            target: targets::CHANNEL,
            "Giving up on the live channel after {} reconnect attempts",
            attempts
        );
        inner.retries_exhausted();
        return;
    }
    link.attempts += 1;

    let delay = inner.policy.delay(link.attempts);
    engine_info!(
        target: targets::CHANNEL,
        "Reconnecting in {:?} (attempt {}/{})",
        delay,
        link.attempts,
        inner.policy.max_attempts
    );
    let retry_inner = inner.clone();
    link.retry = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let current = retry_inner.link().generation;
        if current != generation {
            return;
        }
        let _ = open(retry_inner, generation).await;
    }));
}
