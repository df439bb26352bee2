//! End-to-end tests: a real server on a loopback port and real WebSocket
//! clients.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{http::StatusCode, Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};

use versus_server::application::{Hub, HubHandle, SessionPhase};
use versus_server::domain::{ServerConfig, TracingObserver};
use versus_server::infrastructure::WsServer;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INIT_1: &str = r#"{"type":"init","player":1}"#;
const INIT_2: &str = r#"{"type":"init","player":2}"#;
const START: &str = r#"{"type":"start"}"#;
const RESTART: &str = r#"{"type":"restart"}"#;
const WIN: &str = r#"{"type":"game_over","status":"win"}"#;
const LOSE: &str = r#"{"type":"game_over","status":"lose"}"#;

struct TestServer {
    addr: SocketAddr,
    hub: HubHandle,
    running: Arc<AtomicBool>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    /// Starts a server with `config` on an ephemeral loopback port.
    async fn start_with(config: ServerConfig) -> Self {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..config
        };
        let hub = Hub::spawn(config.command_capacity, Arc::new(TracingObserver));
        let server = WsServer::bind(config, hub.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(server.serve(Arc::clone(&running)));
        Self { addr, hub, running }
    }

    fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    async fn connect(&self) -> Ws {
        let (ws, _response) = connect_async(self.url("/ws")).await.unwrap();
        ws
    }

    /// Polls the hub until exactly `count` seats are occupied.
    async fn wait_for_seats(&self, count: usize) {
        for _ in 0..100 {
            if self.hub.snapshot().await.unwrap().seats.len() == count {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("hub never reached {count} seated players");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn next_text(ws: &mut Ws) -> String {
    let read = async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => return text,
                Some(Ok(WsMessage::Close(_))) | None => panic!("connection closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("read error: {e}"),
            }
        }
    };
    timeout(Duration::from_secs(5), read)
        .await
        .expect("timed out waiting for a frame")
}

async fn assert_silent(ws: &mut Ws) {
    let result = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "expected no frame, got {result:?}");
}

async fn send(ws: &mut Ws, text: &str) {
    ws.send(WsMessage::Text(text.to_string())).await.unwrap();
}

/// Connects both players and consumes their init/start frames.
async fn seated_pair(server: &TestServer) -> (Ws, Ws) {
    let mut a = server.connect().await;
    assert_eq!(next_text(&mut a).await, INIT_1);
    let mut b = server.connect().await;
    assert_eq!(next_text(&mut b).await, INIT_2);
    assert_eq!(next_text(&mut b).await, START);
    assert_eq!(next_text(&mut a).await, START);
    (a, b)
}

#[tokio::test]
async fn test_players_receive_init_then_start() {
    // Arrange
    let server = TestServer::start().await;

    // Act: A alone
    let mut a = server.connect().await;

    // Assert: A hears only its seat
    assert_eq!(next_text(&mut a).await, INIT_1);
    assert_silent(&mut a).await;

    // Act: B arrives
    let mut b = server.connect().await;

    // Assert: init precedes start for both
    assert_eq!(next_text(&mut b).await, INIT_2);
    assert_eq!(next_text(&mut b).await, START);
    assert_eq!(next_text(&mut a).await, START);
    assert_eq!(server.hub.snapshot().await.unwrap().phase, SessionPhase::Active);
}

#[tokio::test]
async fn test_third_connection_is_refused_with_503() {
    let server = TestServer::start().await;
    let (_a, _b) = seated_pair(&server).await;

    let result = connect_async(server.url("/ws")).await;

    match result {
        Err(WsError::Http(response)) => {
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
        other => panic!("expected HTTP refusal, got {other:?}"),
    }
    assert_eq!(server.hub.snapshot().await.unwrap().seats.len(), 2);
}

#[tokio::test]
async fn test_wrong_path_is_refused_with_404() {
    let server = TestServer::start().await;

    let result = connect_async(server.url("/lobby")).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
        other => panic!("expected HTTP refusal, got {other:?}"),
    }
    // The reservation taken for the refused connection was released.
    let mut a = server.connect().await;
    assert_eq!(next_text(&mut a).await, INIT_1);
}

#[tokio::test]
async fn test_move_is_relayed_verbatim_to_opponent_only() {
    let server = TestServer::start().await;
    let (mut a, mut b) = seated_pair(&server).await;
    let frame = r#"{"type":"move","player":1,"data":{"direction":"rotate"}}"#;

    send(&mut a, frame).await;

    assert_eq!(next_text(&mut b).await, frame);
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_game_specific_move_payload_is_relayed_verbatim() {
    // Arrange
    let server = TestServer::start().await;
    let (mut a, mut b) = seated_pair(&server).await;
    let frame = r#"{"type":"move","player":2,"data":{"lines":3,"hole":7}}"#;

    // Act
    send(&mut b, frame).await;

    // Assert
    assert_eq!(next_text(&mut a).await, frame);
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_moves_arrive_in_send_order() {
    let server = TestServer::start().await;
    let (mut a, mut b) = seated_pair(&server).await;
    let directions = ["left", "right", "down", "rotate"];
    let frames: Vec<String> = (0..40)
        .map(|i| {
            format!(
                r#"{{"type":"move","player":2,"data":{{"direction":"{}"}}}}"#,
                directions[i % directions.len()]
            )
        })
        .collect();

    for frame in &frames {
        send(&mut b, frame).await;
    }

    for frame in &frames {
        assert_eq!(&next_text(&mut a).await, frame);
    }
}

#[tokio::test]
async fn test_garbage_frames_do_not_end_the_session() {
    let server = TestServer::start().await;
    let (mut a, mut b) = seated_pair(&server).await;

    send(&mut a, "definitely not json").await;
    send(&mut a, r#"{"type":"emote","id":7}"#).await;
    let frame = r#"{"type":"move","player":1,"data":{"direction":"left"}}"#;
    send(&mut a, frame).await;

    assert_eq!(next_text(&mut b).await, frame);
}

#[tokio::test]
async fn test_game_over_then_restart() {
    // Arrange
    let server = TestServer::start().await;
    let (mut a, mut b) = seated_pair(&server).await;

    // Act: seat 1's board overflowed; its engine names seat 2 the winner
    send(&mut a, r#"{"type":"game_over","winner":2}"#).await;

    // Assert
    assert_eq!(next_text(&mut a).await, LOSE);
    assert_eq!(next_text(&mut b).await, WIN);

    // Act: moves after the game ended are withheld
    send(&mut a, r#"{"type":"move","player":1,"data":{"direction":"down"}}"#).await;
    assert_silent(&mut b).await;

    // Act: B asks for a rematch
    send(&mut b, r#"{"type":"restart","player":2}"#).await;

    // Assert: both are told, and relay resumes
    assert_eq!(next_text(&mut a).await, RESTART);
    assert_eq!(next_text(&mut b).await, RESTART);
    let frame = r#"{"type":"move","player":1,"data":{"direction":"right"}}"#;
    send(&mut a, frame).await;
    assert_eq!(next_text(&mut b).await, frame);
}

#[tokio::test]
async fn test_departed_seat_is_reassigned() {
    let server = TestServer::start().await;
    let (mut a, mut b) = seated_pair(&server).await;

    // Act: A leaves
    a.close(None).await.unwrap();
    server.wait_for_seats(1).await;

    // Assert: the newcomer takes seat 1 and a fresh start goes to both
    let mut c = server.connect().await;
    assert_eq!(next_text(&mut c).await, INIT_1);
    assert_eq!(next_text(&mut c).await, START);
    assert_eq!(next_text(&mut b).await, START);
}

#[tokio::test]
async fn test_dropped_socket_frees_its_seat() {
    let server = TestServer::start().await;
    let (a, _b) = seated_pair(&server).await;

    // Act: no close handshake at all
    drop(a);

    // Assert
    server.wait_for_seats(1).await;
    let snapshot = server.hub.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::WaitingForSecond);
}

#[tokio::test]
async fn test_idle_tcp_connection_does_not_hold_a_seat() {
    // Arrange: a peer that connects and never sends an upgrade request
    let server = TestServer::start().await;
    let _idle = TcpStream::connect(server.addr).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    // Act: two real players arrive
    let (_a, _b) = seated_pair(&server).await;

    // Assert: both are seated and the session is running
    let snapshot = server.hub.snapshot().await.unwrap();
    assert_eq!(snapshot.seats.len(), 2);
    assert_eq!(snapshot.phase, SessionPhase::Active);
}

#[tokio::test]
async fn test_partial_upgrade_request_does_not_hold_a_seat() {
    // Arrange: a peer that stalls halfway through its request line
    let server = TestServer::start().await;
    let mut stalled = TcpStream::connect(server.addr).await.unwrap();
    stalled.write_all(b"GET /ws HTTP/1.1\r\n").await.unwrap();
    sleep(Duration::from_millis(50)).await;

    // Act + Assert: both seats are still available
    let (_a, _b) = seated_pair(&server).await;
    assert_eq!(server.hub.snapshot().await.unwrap().seats.len(), 2);
}

#[tokio::test]
async fn test_player_that_stops_reading_is_evicted_and_disconnected() {
    // Arrange: short queues, A never reads, B is drained by a task
    let server = TestServer::start_with(ServerConfig {
        outbound_capacity: 4,
        ..ServerConfig::default()
    })
    .await;
    let (mut a, mut b) = seated_pair(&server).await;
    let (b_frames, mut b_received) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(Ok(message)) = b.next().await {
            if let WsMessage::Text(text) = message {
                if b_frames.send(text).is_err() {
                    break;
                }
            }
        }
    });

    // Act: broadcast large frames until A's socket and queue are full.  B
    // confirms each frame before the next one goes out.
    let payload = "x".repeat(64 * 1024);
    let mut evicted = false;
    for n in 0..2_000 {
        let frame = format!("{n}:{payload}");
        server.hub.broadcast(None, frame.clone()).await.unwrap();
        let echoed = timeout(Duration::from_secs(5), b_received.recv())
            .await
            .expect("B stopped receiving")
            .unwrap();
        assert_eq!(echoed, frame);

        if server.hub.snapshot().await.unwrap().seats.len() == 1 {
            evicted = true;
            break;
        }
    }
    assert!(evicted, "A was never evicted");

    // Assert: A's connection is closed by the server
    let closed = timeout(Duration::from_secs(15), async {
        loop {
            match a.next().await {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "A's connection stayed open after eviction");

    // Assert: B is still seated and still receives broadcasts
    server.wait_for_seats(1).await;
    server
        .hub
        .broadcast(None, "after eviction".to_string())
        .await
        .unwrap();
    let next = timeout(Duration::from_secs(5), b_received.recv())
        .await
        .expect("B received nothing after the eviction")
        .unwrap();
    assert_eq!(next, "after eviction");
}
