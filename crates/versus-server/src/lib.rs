//! versus-server library crate.
//!
//! A session coordinator for two-player competitive games.  Two remote game
//! clients connect over WebSocket; the server assigns each a seat, tells
//! both when to start, relays moves to the opponent, and announces the
//! result when a game ends.  The server never runs the game itself.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Game client A ─┐                          ┌─ Game client B
//!  (JSON / WS)   │                          │   (JSON / WS)
//!                ▼                          ▼
//! [versus-server]
//!   ├── domain/           Pure types: ServerConfig, ClientId, SessionEvent
//!   ├── application/
//!   │     ├── hub/        Single-owner event loop: seats, start, relay, conclude
//!   │     └── client/     Per-participant routing and status flags
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop and WebSocket upgrade (tokio-tungstenite)
//!         └── connection/ Read and write loops for one socket
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no dependency on sockets or the async runtime.
//! - `application` depends on `domain`, `versus-core` and Tokio channels only.
//! - `infrastructure` depends on all other layers plus `tokio-tungstenite`.

/// Domain layer: configuration, identities, session events.
pub mod domain;

/// Application layer: the session hub and its participants.
pub mod application;

/// Infrastructure layer: WebSocket server and per-connection loops.
pub mod infrastructure;
