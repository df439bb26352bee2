//! Session events and the observer they are emitted through.
//!
//! The hub and the session clients never call a logger directly.  They emit
//! [`SessionEvent`]s into a [`SessionObserver`] handed to them at
//! construction.  The production binary plugs in [`TracingObserver`]; tests
//! plug in a recorder and assert on the exact event sequence.
//!
//! Observers are called from inside the hub's event loop, so an
//! implementation must return quickly and must not block.

use versus_core::Seat;

use crate::domain::identity::ClientId;

/// Something that happened to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A client was admitted and given a seat.
    Registered { client: ClientId, seat: Seat },
    /// The hub refused a registration because both seats were taken.
    RegistrationRefused { client: ClientId },
    /// Both seats are filled and `start` was sent to both.
    Started,
    /// A client left the session.
    Unregistered { client: ClientId, seat: Seat },
    /// A client's outbound queue was full; it was removed from the session.
    Evicted { client: ClientId, seat: Seat },
    /// A game ended.
    Concluded { losing: Seat, winning: Seat },
    /// A second game-over report arrived for a game that already ended.
    ConclusionIgnored { losing: Seat },
    /// The game-over flags were cleared and `restart` was sent.
    Restarted,
    /// A restart request arrived while no game had concluded.
    RestartIgnored,
    /// A client sent a frame that could not be decoded.
    FrameRejected {
        client: ClientId,
        seat: Seat,
        reason: String,
    },
}

/// Sink for [`SessionEvent`]s.
pub trait SessionObserver: Send + Sync {
    fn observe(&self, event: &SessionEvent);
}

/// Forwards session events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn observe(&self, event: &SessionEvent) {
        use tracing::{debug, info, warn};

        match event {
            SessionEvent::Registered { client, seat } => {
                info!(%client, %seat, "player connected");
            }
            SessionEvent::RegistrationRefused { client } => {
                warn!(%client, "registration refused: session is full");
            }
            SessionEvent::Started => info!("both players connected, game starting"),
            SessionEvent::Unregistered { client, seat } => {
                info!(%client, %seat, "player disconnected");
            }
            SessionEvent::Evicted { client, seat } => {
                warn!(%client, %seat, "outbound queue full, dropping stalled player");
            }
            SessionEvent::Concluded { losing, winning } => {
                info!(%losing, %winning, "game over");
            }
            SessionEvent::ConclusionIgnored { losing } => {
                debug!(%losing, "game already concluded, ignoring report");
            }
            SessionEvent::Restarted => info!("game restarted for all players"),
            SessionEvent::RestartIgnored => debug!("restart requested mid-game, ignoring"),
            SessionEvent::FrameRejected {
                client,
                seat,
                reason,
            } => {
                warn!(%client, %seat, "dropping undecodable frame: {reason}");
            }
        }
    }
}
