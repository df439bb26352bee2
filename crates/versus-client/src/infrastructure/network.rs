//! Network infrastructure for the game client.
//!
//! Handles the WebSocket connection to the session server and turns inbound
//! frames into [`NetworkEvent`]s for the application layer.
//!
//! Architecture:
//! - `ServerConnection::connect` performs the upgrade and spawns two tasks.
//! - The reader task decodes each text frame and forwards it on an `mpsc`
//!   channel; undecodable frames are logged and skipped.
//! - The writer task drains the outbox, encoding one envelope per frame.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, info, warn};

use versus_core::{decode, encode, Envelope};

/// Capacity of the outbox feeding the writer task.
pub const OUTBOX_CAPACITY: usize = 256;

/// Capacity of the event channel feeding the application.
const EVENT_CAPACITY: usize = 128;

/// Errors that can occur while connecting to the server.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// The server answered the upgrade with an HTTP error, e.g. `503` when
    /// both seats are taken.
    #[error("server refused the connection with HTTP {status}")]
    Rejected { status: u16 },

    /// The connection could not be established.
    #[error("failed to connect to {url}: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: WsError,
    },
}

/// Events emitted by the network layer to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A message was received from the server.
    MessageReceived(Envelope),
    /// The connection ended.  No further events follow.
    Disconnected,
}

/// An established connection to the session server.
pub struct ServerConnection {
    outbox: mpsc::Sender<Envelope>,
    events: mpsc::Receiver<NetworkEvent>,
}

impl ServerConnection {
    /// Connects to `url` (e.g. `ws://127.0.0.1:8080/ws`) and starts the
    /// reader and writer tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ClientNetworkError::Rejected`] if the server refuses the
    /// upgrade and [`ClientNetworkError::ConnectFailed`] for anything else.
    pub async fn connect(url: &str) -> Result<Self, ClientNetworkError> {
        let ws_stream = match connect_async(url).await {
            Ok((ws, _response)) => ws,
            Err(WsError::Http(response)) => {
                return Err(ClientNetworkError::Rejected {
                    status: response.status().as_u16(),
                });
            }
            Err(source) => {
                return Err(ClientNetworkError::ConnectFailed {
                    url: url.to_string(),
                    source,
                });
            }
        };
        info!("connected to session server at {url}");

        let (mut sink, mut stream) = ws_stream.split();
        let (outbox, mut outbox_rx) = mpsc::channel::<Envelope>(OUTBOX_CAPACITY);
        let (events_tx, events) = mpsc::channel(EVENT_CAPACITY);

        tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                let frame = match next {
                    Ok(WsMessage::Text(text)) => text.into_bytes(),
                    Ok(WsMessage::Binary(bytes)) => bytes,
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("read error: {e}");
                        break;
                    }
                };

                match decode(&frame) {
                    Ok(Envelope::NoOp) => {}
                    Ok(envelope) => {
                        if events_tx
                            .send(NetworkEvent::MessageReceived(envelope))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => warn!("dropping undecodable frame from server: {e}"),
                }
            }
            info!("disconnected from session server");
            let _ = events_tx.send(NetworkEvent::Disconnected).await;
        });

        tokio::spawn(async move {
            while let Some(envelope) = outbox_rx.recv().await {
                let text = match encode(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("dropping {} message: {e}", envelope.type_name());
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    debug!("write failed: {e}");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        Ok(Self { outbox, events })
    }

    /// A producer for the writer task's queue.
    pub fn outbox(&self) -> mpsc::Sender<Envelope> {
        self.outbox.clone()
    }

    /// Waits for the next event.  Returns `None` once the connection is gone
    /// and every event has been consumed.
    pub async fn next_event(&mut self) -> Option<NetworkEvent> {
        self.events.recv().await
    }

    /// Splits into the outbox and the event receiver.
    pub fn into_parts(self) -> (mpsc::Sender<Envelope>, mpsc::Receiver<NetworkEvent>) {
        (self.outbox, self.events)
    }
}
