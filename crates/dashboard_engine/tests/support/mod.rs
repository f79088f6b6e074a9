#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use dashboard_engine::{ChannelError, Connector, FrameStream};
use futures_util::stream;
use tokio::sync::mpsc;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Server side of one fake connection. Dropping it closes the connection.
pub struct Remote {
    tx: mpsc::UnboundedSender<Result<String, ChannelError>>,
}

impl Remote {
    pub fn send(&self, frame: &str) -> bool {
        self.tx.send(Ok(frame.to_string())).is_ok()
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.tx
            .send(Err(ChannelError::Transport(reason.to_string())))
            .is_ok()
    }
}

/// In-memory transport. Every accepted open hands its [`Remote`] to the test.
pub struct FakeConnector {
    refusals: AtomicUsize,
    opens: AtomicUsize,
    open_delay_ms: AtomicU64,
    remotes: mpsc::UnboundedSender<Remote>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
        let (remotes, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            refusals: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            open_delay_ms: AtomicU64::new(0),
            remotes,
        });
        (connector, rx)
    }

    /// The next `count` opens fail.
    pub fn refuse_next(&self, count: usize) {
        self.refusals.fetch_add(count, Ordering::SeqCst);
    }

    /// Every later open waits `delay` before answering.
    pub fn delay_opens(&self, delay: Duration) {
        self.open_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn open(&self, _url: &str) -> Result<FrameStream, ChannelError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let delay = self.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChannelError::Connect("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.remotes.send(Remote { tx });
        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        Ok(Box::pin(frames))
    }
}

pub fn log_frame(message: &str, job_id: Option<u64>) -> String {
    let mut payload = serde_json::json!({
        "level": "INFO",
        "sistema": "maps",
        "mensagem": message,
        "timestamp": "2024-05-01T10:00:00Z",
    });
    if let Some(job_id) = job_id {
        payload["job_id"] = serde_json::json!(job_id);
    }
    serde_json::json!({ "type": "log", "payload": payload }).to_string()
}
