//! # versus-core
//!
//! Shared library for the Versus two-player session coordinator containing
//! the wire envelope, the JSON codec, and the seat/outcome domain types.
//!
//! This crate is used by both the session server and the game clients.
//! It has zero dependencies on sockets, async runtimes, or rendering.
//!
//! # Architecture overview
//!
//! Versus synchronizes exactly two remote game clients through one server.
//! Each client owns a seat (1 or 2); the server tells every client which seat
//! it holds, signals the start once both seats are filled, relays in-game
//! moves to the opponent, and announces the winner when a board overflows.
//!
//! - **`protocol`** – How messages travel over the wire.  Every frame is a
//!   JSON object with a `"type"` discriminator; [`protocol::codec`] decodes
//!   it tolerantly so unknown types from newer peers are ignored, not fatal.
//!
//! - **`domain`** – Pure value types with no I/O: [`Seat`], [`Outcome`], and
//!   [`Direction`].

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `versus_core::Seat` instead of `versus_core::domain::seat::Seat`.
pub use domain::seat::{Direction, InvalidSeat, Outcome, Seat, SEATS};
pub use protocol::codec::{decode, encode, peek_kind, DecodeError, EncodeError};
pub use protocol::messages::{Envelope, MessageKind, MoveData};
