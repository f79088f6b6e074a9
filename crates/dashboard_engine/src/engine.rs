use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_warn, targets};
use tokio::sync::mpsc as async_mpsc;

use crate::api::{ApiSettings, DashboardApi, HttpApi};
use crate::backoff::ReconnectPolicy;
use crate::channel::{LiveChannel, Subscription};
use crate::poller::JobPoller;
use crate::transport::{Connector, WsConnector};
use crate::{ApiError, EngineCommand, EngineEvent};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub api: ApiSettings,
    pub ws_url: String,
    pub poll_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            ws_url: "ws://localhost:4001/ws".to_string(),
            poll_interval: Duration::from_secs(2),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

enum Control {
    Run(EngineCommand),
    Shutdown,
}

/// Owns the background IO thread. Commands go in, [`EngineEvent`]s come out.
pub struct EngineHandle {
    cmd_tx: async_mpsc::UnboundedSender<Control>,
    event_rx: mpsc::Receiver<EngineEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, ApiError> {
        let api = Arc::new(HttpApi::new(settings.api.clone())?);
        let connector = Arc::new(WsConnector::new(settings.api.connect_timeout));
        Ok(Self::with_parts(settings, api, connector))
    }

    /// Builds an engine over caller-supplied collaborators.
    pub fn with_parts(
        settings: EngineSettings,
        api: Arc<dyn DashboardApi>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = async_mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("Could not start the engine runtime: {}", err);
                    return;
                }
            };
            let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
            runtime.block_on(run(settings, api, connector, sink, cmd_rx));
        });

        Self {
            cmd_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(Control::Run(command)).is_err() {
            engine_warn!("Engine is not running; command dropped");
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Disconnects the live channel, stops polling and joins the IO thread.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(Control::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                engine_error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    settings: EngineSettings,
    api: Arc<dyn DashboardApi>,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn EventSink>,
    mut cmd_rx: async_mpsc::UnboundedReceiver<Control>,
) {
    let channel = LiveChannel::new(settings.ws_url.clone(), connector, settings.reconnect);
    let subscriptions = subscribe(&channel, &sink);
    let mut poller = JobPoller::new(api.clone(), sink.clone(), settings.poll_interval);

    while let Some(control) = cmd_rx.recv().await {
        let command = match control {
            Control::Run(command) => command,
            Control::Shutdown => break,
        };
        engine_debug!("Engine command: {:?}", command);
        handle_command(command, &api, &sink, &channel, &mut poller);
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    channel.disconnect();
    poller.stop();
}

fn subscribe(channel: &LiveChannel, sink: &Arc<dyn EventSink>) -> Vec<Subscription> {
    let log_sink = sink.clone();
    let status_sink = sink.clone();
    let connection_sink = sink.clone();
    let complete_sink = sink.clone();
    let exhausted_sink = sink.clone();
    vec![
        channel.on_log(move |entry| log_sink.emit(EngineEvent::Log(entry.clone()))),
        channel.on_status_update(move |system_id, update| {
            status_sink.emit(EngineEvent::Status {
                system_id: system_id.to_string(),
                update: update.clone(),
            })
        }),
        channel.on_connection_change(move |connected| {
            connection_sink.emit(EngineEvent::ConnectionChanged(connected))
        }),
        channel.on_job_complete(move |completion| {
            complete_sink.emit(EngineEvent::JobComplete(completion.clone()))
        }),
        channel.on_retries_exhausted(move || exhausted_sink.emit(EngineEvent::ReconnectExhausted)),
    ]
}

fn handle_command(
    command: EngineCommand,
    api: &Arc<dyn DashboardApi>,
    sink: &Arc<dyn EventSink>,
    channel: &LiveChannel,
    poller: &mut JobPoller,
) {
    let api = api.clone();
    let sink = sink.clone();
    match command {
        EngineCommand::LoadConfig => {
            tokio::spawn(async move {
                let result = api.load_config().await.map_err(|err| err.to_failure());
                sink.emit(EngineEvent::ConfigLoaded(result));
            });
        }
        EngineCommand::SaveConfig(config) => {
            tokio::spawn(async move {
                let result = api
                    .save_config(&config)
                    .await
                    .map(|_| ())
                    .map_err(|err| err.to_failure());
                sink.emit(EngineEvent::ConfigSaved(result));
            });
        }
        EngineCommand::ToggleSystem { system_id, active } => {
            tokio::spawn(async move {
                if let Err(err) = api.toggle_system(&system_id, active).await {
                    engine_warn!(target: targets::API, "Toggle of {} not acknowledged: {}", system_id, err);
                }
            });
        }
        EngineCommand::UpdateOption {
            system_id,
            option,
            value,
        } => {
            tokio::spawn(async move {
                if let Err(err) = api.update_option(&system_id, &option, value).await {
                    engine_warn!(
                        target: targets::API,
                        "Option {}.{} not acknowledged: {}",
                        system_id,
                        option,
                        err
                    );
                }
            });
        }
        EngineCommand::Execute { request, body } => {
            tokio::spawn(async move {
                let result = match api.execute(&body).await {
                    Ok(response) => response.into_launch(),
                    Err(err) => Err(err.to_failure()),
                };
                sink.emit(EngineEvent::ExecuteResponded { request, result });
            });
        }
        EngineCommand::Cancel { job_id } => {
            tokio::spawn(async move {
                let result = api
                    .cancel(job_id)
                    .await
                    .map(|_| ())
                    .map_err(|err| err.to_failure());
                sink.emit(EngineEvent::CancelResponded { job_id, result });
            });
        }
        EngineCommand::StartPolling { job_id } => poller.start(job_id),
        EngineCommand::StopPolling => poller.stop(),
        EngineCommand::PollNow { job_id } => poller.poll_now(job_id),
        EngineCommand::ExpireNotification { id, after } => {
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                sink.emit(EngineEvent::NotificationExpired { id });
            });
        }
        EngineCommand::Connect => spawn_connect(channel.clone()),
        EngineCommand::Reconnect => {
            channel.reset_reconnect();
            spawn_connect(channel.clone());
        }
    }
}

fn spawn_connect(channel: LiveChannel) {
    tokio::spawn(async move {
        if let Err(err) = channel.connect().await {
            engine_warn!(target: targets::CHANNEL, "Live channel connect failed: {}", err);
        }
    });
}
