//! WebSocket transport for the hosted realtime endpoint.
//!
//! Each watched channel gets its own WebSocket connection; inbound text
//! frames are decoded as [`ChangeEvent`] JSON and forwarded to the sink.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::event::ChangeEvent;
use crate::transport::{EventSink, RealtimeTransport, TransportConnection};
use crate::RealtimeError;

pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// `url` is the realtime endpoint, e.g. `wss://realtime.example.com/v1`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn open(
        &self,
        channel: &str,
        sink: EventSink,
    ) -> Result<TransportConnection, RealtimeError> {
        let url = format!("{}?channel={}", self.url, channel);
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;
        let (mut write, mut read) = stream.split();
        let (close_tx, mut close_rx) = oneshot::channel::<()>();
        let channel_name = channel.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ChangeEvent>(&text) {
                                Ok(event) => sink(event),
                                Err(err) => tracing::warn!(
                                    channel = %channel_name,
                                    error = %err,
                                    "dropping malformed realtime frame"
                                ),
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!(channel = %channel_name, "realtime connection closed");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::warn!(
                                channel = %channel_name,
                                error = %err,
                                "realtime connection error"
                            );
                            break;
                        }
                    }
                }
            }
        });

        Ok(TransportConnection::new(Box::new(move || {
            let _ = close_tx.send(());
        })))
    }
}
