//! Infrastructure layer for versus-client: the WebSocket connection to the
//! session server.

pub mod network;

pub use network::{ClientNetworkError, NetworkEvent, ServerConnection};
