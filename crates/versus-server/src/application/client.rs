//! Session clients: one per connected participant.
//!
//! A participant is represented by two halves that live on different sides
//! of the hub's event loop:
//!
//! - [`ClientHandle`] is owned by the hub.  It holds the producer end of the
//!   participant's outbound queue and the writable end of its status flags.
//!   Only the hub's event loop touches it, so no flag is ever written from
//!   two places.
//! - [`SessionClient`] is owned by the connection.  It knows its id and seat,
//!   decides what to do with each inbound frame, and reads the status flags
//!   as a snapshot.
//!
//! ```text
//! connection ──read──► SessionClient::handle_frame ──► HubHandle ──► Hub
//!                                                                     │
//! connection ◄─write── outbound queue ◄──────── ClientHandle::send ◄──┘
//! ```

use tokio::sync::{mpsc, watch};
use tracing::debug;

use versus_core::{decode, peek_kind, DecodeError, Envelope, MessageKind, Outcome, Seat};

use crate::application::hub::{Admission, HubError, HubHandle, RegisterRequest};
use crate::domain::events::SessionEvent;
use crate::domain::identity::ClientId;

/// Per-client flags, written by the hub and read by the client's loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStatus {
    /// This participant's game has ended; live-game traffic is withheld.
    pub game_over: bool,
    /// The hub removed this participant because its queue was full.
    pub evicted: bool,
}

/// Result of a non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue is full.  The frame was dropped.
    Saturated,
    /// The write loop has gone away.  The frame was dropped.
    Closed,
}

// ── Hub side ──────────────────────────────────────────────────────────────────

/// The hub's view of a registered participant.
pub struct ClientHandle {
    seat: Seat,
    outbound: mpsc::Sender<String>,
    status: watch::Sender<ClientStatus>,
    // Released when the hub drops this handle, which frees the seat for the
    // transport's next admission.
    _admission: Admission,
}

impl ClientHandle {
    pub(crate) fn new(
        seat: Seat,
        outbound: mpsc::Sender<String>,
        admission: Admission,
    ) -> (Self, watch::Receiver<ClientStatus>) {
        let (status, status_rx) = watch::channel(ClientStatus::default());
        let handle = Self {
            seat,
            outbound,
            status,
            _admission: admission,
        };
        (handle, status_rx)
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    /// Enqueues a frame for this participant without waiting.
    ///
    /// Never blocks: a full queue drops the frame and reports
    /// [`Delivery::Saturated`] so the caller can remove the participant.
    pub fn send(&self, frame: String) -> Delivery {
        match self.outbound.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Saturated,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.status.borrow().game_over
    }

    pub(crate) fn set_game_over(&self, game_over: bool) {
        self.status.send_modify(|status| status.game_over = game_over);
    }

    pub(crate) fn mark_evicted(&self) {
        self.status.send_modify(|status| status.evicted = true);
    }
}

// ── Connection side ───────────────────────────────────────────────────────────

/// What to do with one decoded inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundAction {
    /// Forward the frame verbatim to the other eligible participants.
    Relay,
    /// End the game with `losing` as the loser.
    Conclude { losing: Seat },
    /// Ask the hub to restart a concluded game.
    Restart,
    /// Drop the frame.
    Ignore(&'static str),
}

/// The connection's view of a registered participant.
pub struct SessionClient {
    id: ClientId,
    seat: Seat,
    hub: HubHandle,
    status: watch::Receiver<ClientStatus>,
}

impl SessionClient {
    /// Registers a new participant with the hub.
    ///
    /// Creates the outbound queue with room for `outbound_capacity` frames
    /// and returns its consumer end for the write loop.  By the time this
    /// returns the hub has already queued the `init` message carrying the
    /// assigned seat, ahead of any other traffic.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Capacity`] if both seats are taken and
    /// [`HubError::Closed`] if the hub has stopped.
    pub async fn join(
        hub: HubHandle,
        admission: Admission,
        outbound_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<String>), HubError> {
        let id = ClientId::new();
        let (outbound, queue) = mpsc::channel(outbound_capacity);

        let registration = hub
            .register(RegisterRequest {
                client: id,
                outbound,
                admission,
            })
            .await?;

        let client = Self {
            id,
            seat: registration.seat,
            hub,
            status: registration.status,
        };
        Ok((client, queue))
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    /// Current flags as last written by the hub.
    pub fn status(&self) -> ClientStatus {
        *self.status.borrow()
    }

    /// Decides what an inbound envelope means for the session.
    ///
    /// `game_over` reports are resolved to a losing seat from this client's
    /// perspective: `status: "lose"` means this seat lost, `status: "win"`
    /// means the opponent lost, and `winner: n` means the other seat lost.
    pub fn route(&self, envelope: &Envelope) -> InboundAction {
        match envelope {
            Envelope::Move { .. } => InboundAction::Relay,
            Envelope::GameOver {
                status: Some(Outcome::Lose),
                ..
            } => InboundAction::Conclude { losing: self.seat },
            Envelope::GameOver {
                status: Some(Outcome::Win),
                ..
            } => InboundAction::Conclude {
                losing: self.seat.complement(),
            },
            Envelope::GameOver {
                winner: Some(winner),
                status: None,
            } => InboundAction::Conclude {
                losing: winner.complement(),
            },
            Envelope::GameOver { .. } => InboundAction::Ignore("game_over without winner or status"),
            Envelope::Restart { .. } => InboundAction::Restart,
            Envelope::Init { .. } | Envelope::Start => InboundAction::Ignore("server-only message"),
            Envelope::NoOp => InboundAction::Ignore("unrecognised message type"),
        }
    }

    /// Handles one inbound text frame.
    ///
    /// A `move` is relayed as soon as its type is known, whatever its
    /// `data` holds.  Other frames are decoded in full.  Undecodable frames
    /// are reported to the observer and dropped; the connection stays open.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped, which ends the
    /// inbound loop.
    pub async fn handle_frame(&self, frame: String) -> Result<(), HubError> {
        let decoded = match peek_kind(frame.as_bytes()) {
            Ok(Some(MessageKind::Move)) => return self.hub.broadcast(Some(self.id), frame).await,
            Ok(_) => decode(frame.as_bytes()),
            Err(e) => Err(e),
        };
        let envelope = match decoded {
            Ok(envelope) => envelope,
            Err(e) => {
                self.reject(&e);
                return Ok(());
            }
        };

        match self.route(&envelope) {
            InboundAction::Relay => self.hub.broadcast(Some(self.id), frame).await,
            InboundAction::Conclude { losing } => self.hub.conclude(losing).await,
            InboundAction::Restart => self.hub.restart().await,
            InboundAction::Ignore(reason) => {
                debug!(
                    client = %self.id,
                    seat = %self.seat,
                    message_type = envelope.type_name(),
                    "ignoring inbound frame: {reason}"
                );
                Ok(())
            }
        }
    }

    fn reject(&self, error: &DecodeError) {
        self.hub.observer().observe(&SessionEvent::FrameRejected {
            client: self.id,
            seat: self.seat,
            reason: error.to_string(),
        });
    }

    /// Resolves once the hub has evicted this client for a full queue.
    ///
    /// Never resolves for a client that leaves any other way.
    pub async fn evicted(&self) {
        let mut status = self.status.clone();
        if status.wait_for(|s| s.evicted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Removes this client from the hub.  Safe to call more than once.
    pub fn leave(&self) {
        self.hub.unregister(self.id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
