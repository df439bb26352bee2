//! The boundary between the session protocol and a game engine.
//!
//! The engine (board, pieces, rendering) lives behind [`GameEngine`].  The
//! [`SessionDriver`] sits between it and the server connection:
//!
//! ```text
//!  ServerConnection ──Envelope──► SessionDriver::apply ──callbacks──► GameEngine
//!         ▲                                                               │
//!         └──────── outbox ◄── request_move / declare_game_over ◄─────────┘
//! ```
//!
//! The driver owns the local view of the session (seat, started, game over)
//! so that every engine sees the same rules: no moves before `start`, no
//! moves after the game ended, a restart clears the result.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use versus_core::{Direction, Envelope, Outcome, Seat};

/// Callbacks the driver makes into the game engine.
#[cfg_attr(test, mockall::automock)]
pub trait GameEngine: Send {
    /// The server assigned this client its seat.
    fn on_seat_assigned(&mut self, seat: Seat);

    /// Both seats are filled; play begins.
    fn on_start(&mut self);

    /// The opponent moved.
    fn on_opponent_move(&mut self, player: Option<Seat>, direction: Direction);

    /// The server announced the result for this seat.
    fn on_game_concluded(&mut self, outcome: Outcome);

    /// The game-over state was cleared; play resumes.
    fn on_restart(&mut self);
}

/// Errors returned when the driver cannot queue an outbound message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The connection's writer has stopped.
    #[error("connection to the server is closed")]
    Disconnected,

    /// The connection's outbound queue is full.
    #[error("outbound queue is full")]
    QueueFull,

    /// The action needs a seat and the server has not assigned one yet.
    #[error("no seat assigned yet")]
    NoSeat,
}

/// The local view of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub seat: Option<Seat>,
    pub started: bool,
    pub game_over: bool,
    pub outcome: Option<Outcome>,
}

impl SessionState {
    /// Moves are only meaningful in a running game.
    pub fn accepts_moves(&self) -> bool {
        self.seat.is_some() && self.started && !self.game_over
    }
}

/// Drives a [`GameEngine`] from server envelopes and queues its requests.
pub struct SessionDriver<E> {
    engine: E,
    state: SessionState,
    outbox: mpsc::Sender<Envelope>,
}

impl<E: GameEngine> SessionDriver<E> {
    pub fn new(engine: E, outbox: mpsc::Sender<Envelope>) -> Self {
        Self {
            engine,
            state: SessionState::default(),
            outbox,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Applies one envelope received from the server.
    pub fn apply(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Init { player } => {
                info!(seat = %player, "seat assigned");
                self.state.seat = Some(player);
                self.engine.on_seat_assigned(player);
            }
            Envelope::Start => {
                info!("game started");
                self.state.started = true;
                self.state.game_over = false;
                self.state.outcome = None;
                self.engine.on_start();
            }
            Envelope::Move { player, data } => {
                if self.state.game_over {
                    debug!("ignoring opponent move after game over");
                    return;
                }
                self.engine.on_opponent_move(player, data.direction);
            }
            Envelope::GameOver { winner, status } => {
                let outcome = match (status, winner, self.state.seat) {
                    (Some(status), _, _) => status,
                    (None, Some(winner), Some(seat)) => {
                        if winner == seat {
                            Outcome::Win
                        } else {
                            Outcome::Lose
                        }
                    }
                    _ => {
                        warn!("game_over without a status this client can resolve");
                        return;
                    }
                };
                info!(%outcome, "game over");
                self.state.game_over = true;
                self.state.outcome = Some(outcome);
                self.engine.on_game_concluded(outcome);
            }
            Envelope::Restart { .. } => {
                info!("game restarted");
                self.state.game_over = false;
                self.state.outcome = None;
                self.engine.on_restart();
            }
            Envelope::NoOp => {}
        }
    }

    /// Sends a move for this seat.
    ///
    /// Returns `Ok(false)` without sending anything when the game is not
    /// running (before `start`, or after it ended).
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the move could not be queued.
    pub fn request_move(&mut self, direction: Direction) -> Result<bool, DriverError> {
        let Some(seat) = self.state.seat.filter(|_| self.state.accepts_moves()) else {
            debug!(direction = direction.as_str(), "move suppressed: game not running");
            return Ok(false);
        };
        self.queue(Envelope::movement(seat, direction))?;
        Ok(true)
    }

    /// Reports that `losing` has lost, naming the other seat the winner.
    ///
    /// Local moves stop immediately; the engine hears the result when the
    /// server announces it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the report could not be queued.
    pub fn declare_game_over(&mut self, losing: Seat) -> Result<(), DriverError> {
        self.queue(Envelope::winner(losing.complement()))?;
        self.state.game_over = true;
        Ok(())
    }

    /// Reports that this client's own board overflowed.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NoSeat`] before the server assigned a seat.
    pub fn declare_own_loss(&mut self) -> Result<(), DriverError> {
        let seat = self.state.seat.ok_or(DriverError::NoSeat)?;
        self.declare_game_over(seat)
    }

    /// Asks the server to restart a concluded game.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the request could not be queued.
    pub fn request_restart(&mut self) -> Result<(), DriverError> {
        self.queue(Envelope::Restart {
            player: self.state.seat,
        })
    }

    fn queue(&self, envelope: Envelope) -> Result<(), DriverError> {
        self.outbox.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DriverError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DriverError::Disconnected,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
