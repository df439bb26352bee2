//! Versus headless client: entry point.
//!
//! Joins a session and plays it from the terminal.  One command per line on
//! stdin:
//!
//! | Command                            | Effect                               |
//! |------------------------------------|--------------------------------------|
//! | `left`, `right`, `down`, `rotate`  | send a move                          |
//! | `lose`                             | report that this board overflowed    |
//! | `restart`                          | ask for a new game after game over   |
//! | `quit`                             | leave the session                    |
//!
//! Server events are written to the log.

use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use versus_client::application::{GameEngine, SessionDriver};
use versus_client::infrastructure::{NetworkEvent, ServerConnection};
use versus_core::{Direction, Outcome, Seat};

/// Versus headless client.
#[derive(Debug, Parser)]
#[command(
    name = "versus-client",
    about = "Headless Versus client driven from stdin",
    version
)]
struct Cli {
    /// WebSocket URL of the session server.
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws", env = "VERSUS_URL")]
    url: String,
}

/// One line of console input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Move(Direction),
    Lose,
    Restart,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lose" => Ok(Command::Lose),
            "restart" => Ok(Command::Restart),
            "quit" => Ok(Command::Quit),
            other => other
                .parse::<Direction>()
                .map(Command::Move)
                .map_err(|_| format!("unknown command: {other:?}")),
        }
    }
}

/// Engine with no board: it only reports what the session tells it.
struct ConsoleEngine;

impl GameEngine for ConsoleEngine {
    fn on_seat_assigned(&mut self, seat: Seat) {
        info!("you are player {seat}; waiting for an opponent");
    }

    fn on_start(&mut self) {
        info!("both players connected, go!");
    }

    fn on_opponent_move(&mut self, player: Option<Seat>, direction: Direction) {
        match player {
            Some(player) => info!("player {player} moved {}", direction.as_str()),
            None => info!("opponent moved {}", direction.as_str()),
        }
    }

    fn on_game_concluded(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => info!("you won! type `restart` for a rematch"),
            Outcome::Lose => info!("you lost. type `restart` for a rematch"),
        }
    }

    fn on_restart(&mut self) {
        info!("new game");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let connection = ServerConnection::connect(&cli.url)
        .await
        .with_context(|| format!("could not join session at {}", cli.url))?;
    let (outbox, mut events) = connection.into_parts();
    let mut driver = SessionDriver::new(ConsoleEngine, outbox);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(NetworkEvent::MessageReceived(envelope)) => driver.apply(envelope),
                Some(NetworkEvent::Disconnected) | None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                let result = match command {
                    Command::Move(direction) => driver.request_move(direction).map(|_| ()),
                    Command::Lose => driver.declare_own_loss(),
                    Command::Restart => driver.request_restart(),
                    Command::Quit => break,
                };
                if let Err(e) = result {
                    warn!("{e}");
                }
            }
        }
    }

    info!("leaving session");
    Ok(())
}
