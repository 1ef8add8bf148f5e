//! # Quiz Server Library
//!
//! Authoritative server for the multiplayer quiz game. Players connect over
//! TCP, announce a name, and are enrolled in rounds of randomly chosen
//! questions. Each question is answered under a deadline; correct answers
//! score a point and the player(s) with the most points at the end of the
//! round are announced to everyone.
//!
//! ## Architecture
//!
//! ### One orchestrator, many listeners
//! A single `RoundOrchestrator` task drives the whole game: it waits for
//! players, broadcasts questions, collects answers one session at a time and
//! announces the winner. Every accepted connection gets its own
//! `ConnectionListener` task that performs the name handshake and then only
//! watches for the connection closing.
//!
//! ### Shared registry
//! `GameState` is the only shared mutable state. It holds the connected
//! sessions together with their scores behind one async mutex. Network I/O
//! is never performed while the lock is held; the orchestrator works from
//! snapshots and re-checks membership before applying results.
//!
//! ### Failures are departures
//! A read or write that fails on a player's connection removes that player
//! and the round carries on for everyone else. Timeouts are not failures:
//! they are a normal answer outcome.
//!
//! ## Module Organization
//!
//! - `config`: timing settings (`GameSettings`)
//! - `error`: `ConnectionError` and `ServerError`
//! - `events`: game event log and its file writer task
//! - `session`: a player's connection and identity
//! - `registry`: connected sessions and scores
//! - `collector`: timed answer collection
//! - `round`: the round state machine and winner rules
//! - `network`: accept loop and per-connection listeners
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameSettings;
//! use server::events::EventLog;
//! use server::network::Server;
//! use shared::QuestionBank;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let questions = QuestionBank::load("preguntas.json")?;
//!     let server = Server::new(
//!         "0.0.0.0:8888",
//!         questions,
//!         5, // questions per round
//!         GameSettings::default(),
//!         EventLog::disabled(),
//!     )
//!     .await?;
//!
//!     server.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod network;
pub mod registry;
pub mod round;
pub mod session;

pub use error::{ConnectionError, ServerError};
