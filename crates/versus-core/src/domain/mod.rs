//! Domain types: seats, outcomes, and move directions.

pub mod seat;

pub use seat::{Direction, InvalidSeat, Outcome, Seat, SEATS};
