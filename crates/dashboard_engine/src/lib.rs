//! Dashboard engine: REST client, live channel, poller and effect execution.
mod api;
mod backoff;
mod channel;
mod engine;
mod persist;
mod poller;
mod transport;
mod types;
mod wire;

pub use api::{ApiAck, ApiSettings, DashboardApi, ExecuteResponse, HealthStatus, HttpApi, JobRecord};
pub use backoff::ReconnectPolicy;
pub use channel::{LiveChannel, Subscription};
pub use engine::{ChannelEventSink, EngineHandle, EngineSettings, EventSink};
pub use persist::{
    ensure_output_dir, AtomicFileWriter, FileJobStore, JobStore, PersistError, CURRENT_JOB_KEY,
};
pub use poller::{poll_once, JobPoller};
pub use transport::{Connector, FrameStream, WsConnector};
pub use types::{
    ApiError, ChannelError, EngineCommand, EngineEvent, FrameError, FrameKind,
};
pub use wire::{decode_frame, ChannelEvent};
