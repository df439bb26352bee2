//! Domain layer for versus-server.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - Client identity
//! - Session events and the observer interface they are emitted through
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - The hub event loop (that is the application layer)

pub mod config;
pub mod events;
pub mod identity;

pub use config::{ConfigError, ServerConfig};
pub use events::{SessionEvent, SessionObserver, TracingObserver};
pub use identity::ClientId;
