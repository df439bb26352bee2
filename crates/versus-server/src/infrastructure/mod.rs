//! Infrastructure layer for versus-server.
//!
//! The infrastructure layer handles all I/O: accepting TCP connections,
//! performing the WebSocket upgrade, and moving frames between sockets and
//! the hub.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener for player connections
//! - Refusing upgrades on the wrong path (404) or when full (503)
//! - Spawning the per-connection read and write tasks
//! - Guaranteeing the participant is unregistered on every exit path
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Seat assignment, relay and game-over rules (that is the application layer)
//! - Message type definitions (those live in `versus-core`)

pub mod connection;
pub mod ws_server;

pub use ws_server::{run_server, WsServer};
