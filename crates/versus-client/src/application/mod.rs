//! Application layer for versus-client.
//!
//! Holds the session rules as seen from one seat and the trait the game
//! engine implements.  Nothing here touches a socket.

pub mod engine;

pub use engine::{DriverError, GameEngine, SessionDriver, SessionState};
