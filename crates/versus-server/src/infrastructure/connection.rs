//! The two loops that drive one WebSocket connection.
//!
//! - [`run_inbound`] reads frames from the socket and hands each one to the
//!   participant's [`SessionClient`].
//! - [`run_outbound`] drains the participant's outbound queue into the
//!   socket, one text frame per queued message, in queue order.
//!
//! Both are generic over `Stream`/`Sink` so they can be exercised without a
//! socket.

use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, warn};

use crate::application::client::SessionClient;
use crate::domain::identity::ClientId;

/// Reads frames until the peer goes away or the hub stops.
///
/// Text frames are handled as-is; binary frames are accepted if they are
/// valid UTF-8.  Control frames are left to tungstenite.
pub async fn run_inbound<S>(client: &SessionClient, mut stream: S)
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let id = client.id();
    let seat = client.seat();

    while let Some(next) = stream.next().await {
        let frame = match next {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!(client = %id, %seat, "dropping binary frame that is not UTF-8");
                    continue;
                }
            },
            Ok(WsMessage::Close(_)) => {
                debug!(client = %id, %seat, "close frame received");
                break;
            }
            Ok(_) => continue,
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                debug!(client = %id, %seat, "connection closed");
                break;
            }
            Err(e) => {
                warn!(client = %id, %seat, "read error: {e}");
                break;
            }
        };

        if let Err(e) = client.handle_frame(frame).await {
            warn!(client = %id, %seat, "stopping read loop: {e}");
            break;
        }
    }
}

/// Writes queued frames until the queue closes, then closes the sink.
///
/// The queue closes when the hub drops the participant (departure or
/// eviction), so anything the hub queued before that is still written.
pub async fn run_outbound<S>(mut sink: S, mut queue: mpsc::Receiver<String>, client: ClientId)
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = queue.recv().await {
        if let Err(e) = sink.send(WsMessage::Text(frame)).await {
            debug!(%client, "write failed, peer is gone: {e}");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(%client, "close failed: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
