//! Seat, outcome, and direction value types.
//!
//! A session has exactly two seats.  Every participant is identified on the
//! wire by its seat number, and the winner of a game is always the seat that
//! did not lose (the "complement" rule).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of seats in a session.  A third participant is never admitted.
pub const SEATS: usize = 2;

/// Error returned when an integer does not name a seat.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid seat number: {0} (expected 1 or 2)")]
pub struct InvalidSeat(pub u8);

/// One of the two fixed slots in a session.
///
/// Serialised as the bare integer `1` or `2`, matching the `player` field of
/// the `init` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Seat {
    One = 1,
    Two = 2,
}

impl Seat {
    /// Both seats in assignment order.
    pub const ALL: [Seat; SEATS] = [Seat::One, Seat::Two];

    /// Returns the opposing seat.
    ///
    /// ```rust
    /// use versus_core::Seat;
    ///
    /// assert_eq!(Seat::One.complement(), Seat::Two);
    /// assert_eq!(Seat::Two.complement(), Seat::One);
    /// ```
    pub fn complement(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    /// Returns the seat number as used on the wire.
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Seat {
    type Error = InvalidSeat;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Seat::One),
            2 => Ok(Seat::Two),
            other => Err(InvalidSeat(other)),
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> Self {
        seat.number()
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// The result of a concluded game from one seat's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Lose,
}

impl Outcome {
    /// Computes the outcome for `seat` when `losing_seat` has lost.
    pub fn for_seat(seat: Seat, losing_seat: Seat) -> Outcome {
        if seat == losing_seat {
            Outcome::Lose
        } else {
            Outcome::Win
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Lose => "lose",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a piece movement carried by a `move` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Down,
    Rotate,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Rotate => "rotate",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "down" => Ok(Direction::Down),
            "rotate" => Ok(Direction::Rotate),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
