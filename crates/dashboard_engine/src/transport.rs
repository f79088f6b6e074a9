use std::pin::Pin;
use std::time::Duration;

use engine_logging::{engine_warn, targets};
use futures_util::{future, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::ChannelError;

/// Inbound text frames of one open connection. The stream ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

/// Opens the transport under the live channel.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<FrameStream, ChannelError>;
}

/// WebSocket transport.
#[derive(Debug, Clone)]
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<FrameStream, ChannelError> {
        let (socket, _response) =
            tokio::time::timeout(self.handshake_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| ChannelError::Connect("handshake timed out".to_string()))?
                .map_err(|err| ChannelError::Connect(err.to_string()))?;

        let frames = socket.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        engine_warn!(target: targets::CHANNEL, "Dropping non UTF-8 binary frame");
                        None
                    }
                },
                Ok(_) => None,
                Err(err) => Some(Err(ChannelError::Transport(err.to_string()))),
            })
        });
        Ok(Box::pin(frames))
    }
}
