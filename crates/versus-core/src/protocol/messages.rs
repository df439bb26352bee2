//! The wire envelope exchanged between the session server and game clients.
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant.  All other fields sit beside it in the same object:
//!
//! ```json
//! {"type":"init","player":1}
//! {"type":"start"}
//! {"type":"move","player":2,"data":{"direction":"left"}}
//! {"type":"game_over","status":"win"}
//! {"type":"game_over","winner":1}
//! {"type":"restart"}
//! ```
//!
//! Serde's `#[serde(tag = "type")]` attribute handles this automatically.

use serde::{Deserialize, Serialize};

use crate::domain::seat::{Direction, Outcome, Seat};

/// The known values of the `"type"` discriminator.
///
/// Used by the codec to tell an unrecognised type (tolerated) apart from a
/// recognised type with a broken payload (rejected), and by log statements
/// that must name a message without dumping its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Init,
    Start,
    Move,
    GameOver,
    Restart,
}

impl MessageKind {
    /// Looks up a kind by its wire name.  Returns `None` for unknown types.
    pub fn from_type(name: &str) -> Option<MessageKind> {
        match name {
            "init" => Some(MessageKind::Init),
            "start" => Some(MessageKind::Start),
            "move" => Some(MessageKind::Move),
            "game_over" => Some(MessageKind::GameOver),
            "restart" => Some(MessageKind::Restart),
            _ => None,
        }
    }

    /// Returns the wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Init => "init",
            MessageKind::Start => "start",
            MessageKind::Move => "move",
            MessageKind::GameOver => "game_over",
            MessageKind::Restart => "restart",
        }
    }
}

/// Payload of a `move` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveData {
    pub direction: Direction,
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Server → client: assigns the recipient its seat.
    ///
    /// Always the first message a client receives.
    Init { player: Seat },

    /// Server → client: both seats are filled; the game engine may begin.
    Start,

    /// Client → server → opponent: a piece movement.
    ///
    /// Relayed verbatim by the server, so the opponent sees exactly the bytes
    /// the sender produced.
    Move {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<Seat>,
        data: MoveData,
    },

    /// Ends the current game for both seats.
    ///
    /// Clients report `{"winner": n}` (or `{"status": ...}` from their own
    /// perspective); the server answers every seat with its own `status`.
    GameOver {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<Seat>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<Outcome>,
    },

    /// Client → server: request a new game.  Server → client: the game-over
    /// flags were cleared and play resumes.
    Restart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<Seat>,
    },

    /// A structurally valid message whose `type` this build does not know.
    ///
    /// Never produced on the wire; decoding yields it so that newer peers can
    /// add message types without breaking older ones mid-session.
    #[serde(skip)]
    NoOp,
}

impl Envelope {
    pub fn init(player: Seat) -> Self {
        Envelope::Init { player }
    }

    pub fn start() -> Self {
        Envelope::Start
    }

    /// A `move` sent by `player`.
    pub fn movement(player: Seat, direction: Direction) -> Self {
        Envelope::Move {
            player: Some(player),
            data: MoveData { direction },
        }
    }

    /// The server's per-seat game-over notice.
    pub fn outcome(status: Outcome) -> Self {
        Envelope::GameOver {
            winner: None,
            status: Some(status),
        }
    }

    /// A client's game-over report naming the winning seat.
    pub fn winner(winner: Seat) -> Self {
        Envelope::GameOver {
            winner: Some(winner),
            status: None,
        }
    }

    pub fn restart() -> Self {
        Envelope::Restart { player: None }
    }

    /// Returns the kind of this message, or `None` for [`Envelope::NoOp`].
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Envelope::Init { .. } => Some(MessageKind::Init),
            Envelope::Start => Some(MessageKind::Start),
            Envelope::Move { .. } => Some(MessageKind::Move),
            Envelope::GameOver { .. } => Some(MessageKind::GameOver),
            Envelope::Restart { .. } => Some(MessageKind::Restart),
            Envelope::NoOp => None,
        }
    }

    /// Short name for log lines.
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("no_op", MessageKind::as_str)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
