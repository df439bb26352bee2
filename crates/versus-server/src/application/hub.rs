//! The session hub: single owner of the membership map.
//!
//! The hub runs as one Tokio task that consumes three channels:
//!
//! | channel    | kind               | carries                                       |
//! |------------|--------------------|-----------------------------------------------|
//! | unregister | unbounded          | client ids whose connection ended              |
//! | register   | bounded + oneshot  | new clients waiting for a seat                 |
//! | commands   | bounded            | broadcast, conclude, restart, snapshot queries |
//!
//! Every mutation of the membership map and of the per-client flags happens
//! inside that task, one event at a time.  No caller ever locks anything.
//! Deliveries to clients use `try_send`, so the loop never suspends on a
//! client: a full queue gets its client evicted instead.
//!
//! # Session phases
//!
//! ```text
//!           register            register (start sent)
//!   Empty ───────────► Waiting ───────────────────────► Active
//!     ▲                 │  ▲                             │
//!     └──unregister─────┘  └────────unregister───────────┤ conclude
//!                                                        ▼
//!                              restart (2 seats) ◄── Concluded
//! ```
//!
//! # Admission
//!
//! Capacity is enforced twice.  The transport takes an [`Admission`] from a
//! two-permit semaphore once the upgrade request has arrived but before it
//! answers it, so a third connection is refused without ever reaching this
//! loop.  The permit
//! travels into the hub with the registration and is released only when the
//! hub drops the client, so a freed seat is never visible to the transport
//! before the hub has processed the departure.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error};

use versus_core::{encode, Envelope, Outcome, Seat, SEATS};

use crate::application::client::{ClientHandle, ClientStatus, Delivery};
use crate::domain::events::{SessionEvent, SessionObserver};
use crate::domain::identity::ClientId;

/// Capacity of the register channel.  Admission caps in-flight
/// registrations at [`SEATS`], so this never fills.
const REGISTER_CHANNEL_CAPACITY: usize = SEATS * 2;

/// Both seats are taken.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("session is full: both seats are taken")]
pub struct CapacityError;

/// Errors returned by [`HubHandle`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// The hub's event loop is no longer running.
    #[error("hub event loop has stopped")]
    Closed,
}

/// A reserved seat for a connection that is being admitted.
///
/// Dropping it (directly, or via the hub dropping the client that owns it)
/// releases the seat.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    pub(crate) fn from_semaphore(seats: &Arc<Semaphore>) -> Result<Self, CapacityError> {
        Arc::clone(seats)
            .try_acquire_owned()
            .map(|permit| Self { _permit: permit })
            .map_err(|_| CapacityError)
    }
}

/// Everything the hub needs to seat a new client.
pub struct RegisterRequest {
    pub client: ClientId,
    /// Producer end of the client's outbound queue.
    pub outbound: mpsc::Sender<String>,
    pub admission: Admission,
}

/// The hub's answer to a successful registration.
#[derive(Debug)]
pub struct Registration {
    pub seat: Seat,
    pub status: watch::Receiver<ClientStatus>,
}

/// Coarse session state, derived from membership and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Empty,
    WaitingForSecond,
    Active,
    Concluded,
}

/// One occupied seat in a [`SessionSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatState {
    pub seat: Seat,
    pub game_over: bool,
}

/// A point-in-time view of the session, ordered by seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub seats: Vec<SeatState>,
}

struct RegisterMsg {
    request: RegisterRequest,
    reply: oneshot::Sender<Result<Registration, CapacityError>>,
}

enum Command {
    Broadcast {
        origin: Option<ClientId>,
        frame: String,
    },
    Conclude {
        losing: Seat,
    },
    Restart,
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cloneable handle for talking to a running hub.
///
/// The hub's event loop stops once every handle has been dropped.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<RegisterMsg>,
    unregister_tx: mpsc::UnboundedSender<ClientId>,
    command_tx: mpsc::Sender<Command>,
    seats: Arc<Semaphore>,
    observer: Arc<dyn SessionObserver>,
}

impl HubHandle {
    /// Reserves a seat without involving the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if both seats are taken.
    pub fn try_admit(&self) -> Result<Admission, CapacityError> {
        Admission::from_semaphore(&self.seats)
    }

    /// Seats a new client and queues its `init` message.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Capacity`] if the session is full and
    /// [`HubError::Closed`] if the hub has stopped.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, HubError> {
        let (reply, response) = oneshot::channel();
        self.register_tx
            .send(RegisterMsg { request, reply })
            .await
            .map_err(|_| HubError::Closed)?;
        let registration = response.await.map_err(|_| HubError::Closed)??;
        Ok(registration)
    }

    /// Removes a client.  Unknown or already-removed ids are ignored.
    ///
    /// Never waits, so it is safe to call from any teardown path.
    pub fn unregister(&self, client: ClientId) {
        // A stopped hub has no members left to remove.
        let _ = self.unregister_tx.send(client);
    }

    /// Delivers `frame` to every registered client except `origin` and
    /// except clients whose game is over.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn broadcast(&self, origin: Option<ClientId>, frame: String) -> Result<(), HubError> {
        self.command(Command::Broadcast { origin, frame }).await
    }

    /// Ends the game with `losing` as the loser.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn conclude(&self, losing: Seat) -> Result<(), HubError> {
        self.command(Command::Conclude { losing }).await
    }

    /// Clears the game-over flags of a concluded game and notifies everyone.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn restart(&self) -> Result<(), HubError> {
        self.command(Command::Restart).await
    }

    /// Returns the session state after every command sent before this call.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, HubError> {
        let (reply, response) = oneshot::channel();
        self.command(Command::Snapshot { reply }).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    pub fn observer(&self) -> &Arc<dyn SessionObserver> {
        &self.observer
    }

    async fn command(&self, command: Command) -> Result<(), HubError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| HubError::Closed)
    }
}

// ── Event loop ────────────────────────────────────────────────────────────────

/// The hub's state.  Lives inside the event-loop task.
pub struct Hub {
    members: HashMap<ClientId, ClientHandle>,
    observer: Arc<dyn SessionObserver>,
}

impl Hub {
    /// Starts a hub on the current Tokio runtime and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if `command_capacity` is zero.
    pub fn spawn(command_capacity: usize, observer: Arc<dyn SessionObserver>) -> HubHandle {
        let (register_tx, register_rx) = mpsc::channel(REGISTER_CHANNEL_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(command_capacity);

        let hub = Hub {
            members: HashMap::with_capacity(SEATS),
            observer: Arc::clone(&observer),
        };
        tokio::spawn(hub.run(register_rx, unregister_rx, command_rx));

        HubHandle {
            register_tx,
            unregister_tx,
            command_tx,
            seats: Arc::new(Semaphore::new(SEATS)),
            observer,
        }
    }

    async fn run(
        mut self,
        mut register_rx: mpsc::Receiver<RegisterMsg>,
        mut unregister_rx: mpsc::UnboundedReceiver<ClientId>,
        mut command_rx: mpsc::Receiver<Command>,
    ) {
        loop {
            // Departures first so a freed seat is settled before the next
            // registration looks for one.
            tokio::select! {
                biased;
                Some(client) = unregister_rx.recv() => self.unregister(client),
                Some(msg) = register_rx.recv() => {
                    let client = msg.request.client;
                    let result = self.register(msg.request);
                    if let Err(Ok(_)) = msg.reply.send(result) {
                        // The connection gave up while waiting; nobody will
                        // ever drive this seat.
                        self.unregister(client);
                    }
                }
                Some(command) = command_rx.recv() => self.handle_command(command),
                else => break,
            }
        }
        debug!("hub event loop stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Broadcast { origin, frame } => self.broadcast(origin, frame),
            Command::Conclude { losing } => self.conclude(losing),
            Command::Restart => self.restart(),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn register(&mut self, request: RegisterRequest) -> Result<Registration, CapacityError> {
        let Some(seat) = self.free_seat() else {
            self.observer.observe(&SessionEvent::RegistrationRefused {
                client: request.client,
            });
            return Err(CapacityError);
        };

        let client = request.client;
        let (handle, status) = ClientHandle::new(seat, request.outbound, request.admission);
        self.members.insert(client, handle);
        self.observer
            .observe(&SessionEvent::Registered { client, seat });

        // `init` goes in before the seat-count check below, so it always
        // precedes `start` in this client's queue.
        self.send_to(client, &Envelope::init(seat));

        if self.members.len() == SEATS {
            self.start();
        }

        Ok(Registration { seat, status })
    }

    fn start(&mut self) {
        for member in self.members.values() {
            member.set_game_over(false);
        }
        self.observer.observe(&SessionEvent::Started);
        for client in self.member_ids() {
            self.send_to(client, &Envelope::start());
        }
    }

    fn unregister(&mut self, client: ClientId) {
        if let Some(member) = self.members.remove(&client) {
            self.observer.observe(&SessionEvent::Unregistered {
                client,
                seat: member.seat(),
            });
        }
    }

    fn evict(&mut self, client: ClientId) {
        if let Some(member) = self.members.remove(&client) {
            member.mark_evicted();
            self.observer.observe(&SessionEvent::Evicted {
                client,
                seat: member.seat(),
            });
        }
    }

    fn broadcast(&mut self, origin: Option<ClientId>, frame: String) {
        let recipients: Vec<ClientId> = self
            .members
            .iter()
            .filter(|(id, member)| Some(**id) != origin && !member.is_game_over())
            .map(|(id, _)| *id)
            .collect();

        for client in recipients {
            self.deliver(client, frame.clone());
        }
    }

    fn conclude(&mut self, losing: Seat) {
        if self.is_concluded() {
            // The first report to arrive decides the game.
            self.observer
                .observe(&SessionEvent::ConclusionIgnored { losing });
            return;
        }

        let winning = losing.complement();
        for member in self.members.values() {
            member.set_game_over(true);
        }
        self.observer
            .observe(&SessionEvent::Concluded { losing, winning });

        // Point-to-point: each seat gets its own status.
        let targets: Vec<(ClientId, Seat)> = self
            .members
            .iter()
            .map(|(id, member)| (*id, member.seat()))
            .collect();
        for (client, seat) in targets {
            self.send_to(client, &Envelope::outcome(Outcome::for_seat(seat, losing)));
        }
    }

    fn restart(&mut self) {
        if !self.is_concluded() {
            self.observer.observe(&SessionEvent::RestartIgnored);
            return;
        }

        for member in self.members.values() {
            member.set_game_over(false);
        }
        self.observer.observe(&SessionEvent::Restarted);
        for client in self.member_ids() {
            self.send_to(client, &Envelope::restart());
        }
    }

    fn send_to(&mut self, client: ClientId, envelope: &Envelope) {
        match encode(envelope) {
            Ok(frame) => self.deliver(client, frame),
            Err(e) => error!(
                message_type = envelope.type_name(),
                "failed to encode server message: {e}"
            ),
        }
    }

    /// Hands a frame to one client's queue.  A full queue evicts the client;
    /// a closed queue means its connection is already tearing down.
    fn deliver(&mut self, client: ClientId, frame: String) {
        let delivery = match self.members.get(&client) {
            Some(member) => member.send(frame),
            None => return,
        };

        match delivery {
            Delivery::Queued => {}
            Delivery::Saturated => self.evict(client),
            Delivery::Closed => self.unregister(client),
        }
    }

    fn free_seat(&self) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| !self.members.values().any(|member| member.seat() == *seat))
    }

    fn member_ids(&self) -> Vec<ClientId> {
        self.members.keys().copied().collect()
    }

    fn is_concluded(&self) -> bool {
        self.members.values().any(ClientHandle::is_game_over)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut seats: Vec<SeatState> = self
            .members
            .values()
            .map(|member| SeatState {
                seat: member.seat(),
                game_over: member.is_game_over(),
            })
            .collect();
        seats.sort_by_key(|state| state.seat);

        let phase = match seats.len() {
            0 => SessionPhase::Empty,
            _ if seats.iter().any(|state| state.game_over) => SessionPhase::Concluded,
            n if n < SEATS => SessionPhase::WaitingForSecond,
            _ => SessionPhase::Active,
        };

        SessionSnapshot { phase, seats }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
