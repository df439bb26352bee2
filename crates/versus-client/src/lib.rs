//! versus-client library crate.
//!
//! Connects a game engine to the Versus session server.
//!
//! ```text
//! [versus-client]
//!   ├── application/
//!   │     └── engine/     GameEngine trait + SessionDriver (seat, start, result)
//!   └── infrastructure/
//!         └── network/    ServerConnection (tokio-tungstenite)
//! ```
//!
//! The engine never sees JSON: it receives typed callbacks from the driver
//! and calls the driver to move, report its loss, or ask for a restart.

/// Application layer: session driver and the engine boundary.
pub mod application;

/// Infrastructure layer: WebSocket connection to the server.
pub mod infrastructure;
