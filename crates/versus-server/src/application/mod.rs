//! Application layer for versus-server.
//!
//! The application layer owns the session rules: who holds which seat, when
//! the game starts, who hears a move, and how a game ends and restarts.  It
//! knows nothing about sockets; frames arrive and leave as plain strings.
//!
//! # Responsibilities
//!
//! - Running the hub's single-owner event loop ([`hub`])
//! - Admitting at most two participants and assigning seats
//! - Routing each inbound envelope to relay, conclude, or restart ([`client`])
//! - Non-blocking delivery and eviction of stalled participants
//!
//! # What does NOT belong here?
//!
//! - Accepting TCP connections or the WebSocket upgrade (that is infrastructure)
//! - Reading the config file (that is done in `main.rs`)

pub mod client;
pub mod hub;

pub use client::{ClientStatus, InboundAction, SessionClient};
pub use hub::{
    Admission, CapacityError, Hub, HubError, HubHandle, SeatState, SessionPhase, SessionSnapshot,
};
