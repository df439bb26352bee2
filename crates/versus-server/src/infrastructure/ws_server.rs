//! WebSocket server: accept loop and per-connection lifecycle.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Reading the upgrade request, bounded by a handshake timeout, and
//!    reserving a seat only once it has arrived on the configured path.
//! 3. Completing the WebSocket upgrade, or refusing it with `404 Not Found`
//!    (wrong path) or `503 Service Unavailable` (both seats taken).
//! 4. Registering the participant with the hub and running its read and
//!    write loops until either side ends.
//! 5. Unregistering the participant on every exit path.
//!
//! # Shutdown
//!
//! The accept loop polls a shared `AtomicBool` every 200 ms, set to `false`
//! by the Ctrl+C handler in `main.rs`.  Connections already running are left
//! to finish on their own.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use std::fmt::Display;

use anyhow::Context;
use futures_util::{Sink, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::client::SessionClient;
use crate::application::hub::{Admission, Hub, HubError, HubHandle};
use crate::domain::config::ServerConfig;
use crate::domain::events::TracingObserver;
use crate::infrastructure::connection::{run_inbound, run_outbound};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long a new connection may take to send its upgrade request.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a departing connection may spend flushing its queue.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound listener plus the hub it feeds.
pub struct WsServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    hub: HubHandle,
}

impl WsServer {
    /// Binds the listener.  Pass port `0` to let the OS pick one.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: ServerConfig, hub: HubHandle) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

        Ok(Self {
            listener,
            config: Arc::new(config),
            hub,
        })
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the socket address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Accepts connections until `running` is set to `false`.
    ///
    /// Each connection runs in its own Tokio task.
    pub async fn serve(self, running: Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("new connection from {peer_addr}");
                    let hub = self.hub.clone();
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, hub, config).await;
                    });
                }
                Ok(Err(e)) => {
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // No connection within the poll interval; re-check the flag.
                }
            }
        }
    }
}

/// Starts a hub, binds the configured address, and serves until `running`
/// is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let hub = Hub::spawn(config.command_capacity, Arc::new(TracingObserver));
    let server = WsServer::bind(config, hub).await?;

    info!(
        "Versus session server listening on ws://{}{}",
        server.local_addr()?,
        server.config.path
    );

    server.serve(running).await;
    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Which side of a connection finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    Inbound,
    Outbound,
    Evicted,
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: HubHandle,
    config: Arc<ServerConfig>,
) {
    match run_connection(stream, peer_addr, hub, config).await {
        Ok(()) => debug!("connection {peer_addr} closed"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one connection.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails for a reason other than
/// a deliberate refusal, or if the hub has stopped.
async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: HubHandle,
    config: Arc<ServerConfig>,
) -> anyhow::Result<()> {
    // ── Step 1: upgrade, reserving a seat once the request is in ──────────────
    //
    // A peer that never sends its upgrade request holds nothing, and is cut
    // off after HANDSHAKE_TIMEOUT.
    let mut admission: Option<Admission> = None;

    let callback = |request: &Request, response: Response| {
        if request.uri().path() != config.path {
            return Err(refusal(StatusCode::NOT_FOUND, "not found"));
        }
        match hub.try_admit() {
            Ok(reserved) => {
                admission = Some(reserved);
                Ok(response)
            }
            Err(_) => Err(refusal(
                StatusCode::SERVICE_UNAVAILABLE,
                "session is full: both seats are taken",
            )),
        }
    };

    let ws_stream = match timeout(HANDSHAKE_TIMEOUT, accept_hdr_async(stream, callback)).await {
        Err(_) => {
            info!("no upgrade from {peer_addr} within {HANDSHAKE_TIMEOUT:?}; dropping it");
            return Ok(());
        }
        Ok(Ok(ws)) => ws,
        Ok(Err(WsError::Http(response))) => {
            info!("refused upgrade from {peer_addr}: {}", response.status());
            return Ok(());
        }
        Ok(Err(e)) => {
            return Err(e).with_context(|| format!("WebSocket handshake failed with {peer_addr}"));
        }
    };

    let admission = admission.context("upgrade accepted without a reserved seat")?;

    // ── Step 2: take the seat ─────────────────────────────────────────────────
    let (client, queue) = match SessionClient::join(hub, admission, config.outbound_capacity).await
    {
        Ok(joined) => joined,
        Err(HubError::Capacity(e)) => {
            let mut ws_stream = ws_stream;
            let close = CloseFrame {
                code: CloseCode::Again,
                reason: e.to_string().into(),
            };
            if let Err(e) = ws_stream.close(Some(close)).await {
                debug!("close after late refusal failed for {peer_addr}: {e}");
            }
            return Ok(());
        }
        Err(e) => return Err(e).context("hub unavailable"),
    };

    let id = client.id();
    let seat = client.seat();
    info!(client = %id, %seat, "session established with {peer_addr}");

    // ── Step 3: run both loops until one side ends, then tear down ────────────
    let (sink, stream) = ws_stream.split();
    let ended = drive_session(Arc::new(client), queue, sink, stream, DRAIN_TIMEOUT).await;

    if ended == Ended::Evicted {
        warn!(client = %id, %seat, "connection {peer_addr} closed after eviction");
    }

    Ok(())
}

/// Runs the read and write loops of a seated client until one of them ends
/// or the hub evicts the client, then unregisters it and releases both
/// halves of the connection.
///
/// On return the sink and stream have been dropped, so the underlying socket
/// is closed.
async fn drive_session<Si, St>(
    client: Arc<SessionClient>,
    queue: mpsc::Receiver<String>,
    sink: Si,
    stream: St,
    drain: Duration,
) -> Ended
where
    Si: Sink<WsMessage> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<WsMessage, WsError>> + Unpin + Send + 'static,
{
    let id = client.id();
    let seat = client.seat();

    let mut writer = tokio::spawn(run_outbound(sink, queue, id));
    let mut reader = tokio::spawn({
        let client = Arc::clone(&client);
        async move { run_inbound(&client, stream).await }
    });

    let mut reader_done = false;
    let mut writer_done = false;
    let ended = tokio::select! {
        _ = &mut reader => {
            reader_done = true;
            Ended::Inbound
        }
        _ = &mut writer => {
            writer_done = true;
            Ended::Outbound
        }
        () = client.evicted() => Ended::Evicted,
    };

    // Leaving closes the outbound queue, which lets the writer flush what the
    // hub already queued and send a close frame.
    client.leave();

    if !writer_done {
        if timeout(drain, &mut writer).await.is_ok() {
            writer_done = true;
        } else {
            debug!(client = %id, %seat, "writer did not drain in time");
            writer.abort();
        }
    }
    if !reader_done {
        reader.abort();
    }

    // Wait for both tasks to drop their half of the connection.
    if !writer_done {
        let _ = writer.await;
    }
    if !reader_done {
        let _ = reader.await;
    }

    ended
}

fn refusal(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use futures_util::stream;
    use versus_core::Seat;

    use super::*;

    /// A sink that never accepts a frame, like a peer that stopped reading.
    struct StalledSink {
        dropped: Arc<AtomicBool>,
    }

    impl Sink<WsMessage> for StalledSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: WsMessage) -> Result<(), WsError> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }
    }

    impl Drop for StalledSink {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_saturated_client_is_evicted_and_its_connection_released() {
        // Arrange: seat 1 has a one-frame queue and a peer that never reads
        let hub = Hub::spawn(64, Arc::new(TracingObserver));
        let (stalled, stalled_queue) =
            SessionClient::join(hub.clone(), hub.try_admit().unwrap(), 1)
                .await
                .unwrap();
        let dropped = Arc::new(AtomicBool::new(false));
        let sink = StalledSink {
            dropped: Arc::clone(&dropped),
        };
        let session = tokio::spawn(drive_session(
            Arc::new(stalled),
            stalled_queue,
            sink,
            stream::pending::<Result<WsMessage, WsError>>(),
            Duration::from_millis(50),
        ));
        let (_peer, mut peer_queue) =
            SessionClient::join(hub.clone(), hub.try_admit().unwrap(), 16)
                .await
                .unwrap();

        // Act: broadcast until seat 1 overflows
        for n in 0..8 {
            if hub.snapshot().await.unwrap().seats.len() == 1 {
                break;
            }
            hub.broadcast(None, format!("frame {n}")).await.unwrap();
        }
        let ended = timeout(Duration::from_secs(5), session)
            .await
            .expect("session did not end after eviction")
            .unwrap();

        // Assert: seat 1 is gone and its sink was dropped
        assert_eq!(ended, Ended::Evicted);
        assert!(dropped.load(Ordering::SeqCst));
        let seats: Vec<Seat> = hub
            .snapshot()
            .await
            .unwrap()
            .seats
            .iter()
            .map(|state| state.seat)
            .collect();
        assert_eq!(seats, vec![Seat::Two]);

        // Assert: seat 2 still receives broadcasts
        hub.broadcast(None, "after eviction".to_string()).await.unwrap();
        let found = timeout(Duration::from_secs(5), async {
            while let Some(frame) = peer_queue.recv().await {
                if frame == "after eviction" {
                    return true;
                }
            }
            false
        })
        .await
        .expect("seat 2 received nothing after the eviction");
        assert!(found);
    }

    #[tokio::test]
    async fn test_peer_close_ends_the_session_as_inbound() {
        // Arrange: the peer's stream ends at once
        let hub = Hub::spawn(64, Arc::new(TracingObserver));
        let (client, queue) = SessionClient::join(hub.clone(), hub.try_admit().unwrap(), 8)
            .await
            .unwrap();

        // Act
        let ended = drive_session(
            Arc::new(client),
            queue,
            Vec::<WsMessage>::new(),
            stream::empty::<Result<WsMessage, WsError>>(),
            Duration::from_millis(50),
        )
        .await;

        // Assert: the seat is freed
        assert_eq!(ended, Ended::Inbound);
        assert!(hub.snapshot().await.unwrap().seats.is_empty());
    }
}
