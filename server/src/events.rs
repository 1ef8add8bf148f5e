//! Game event log
//!
//! The round engine reports what happens in a game (connects, questions,
//! outcomes, winners) as `GameEvent`s. Recording an event only enqueues it on
//! an unbounded channel, so a slow disk can never stall a round; a separate
//! writer task stamps each event with local time and appends it to a file.

use crate::error::ServerError;
use chrono::Local;
use log::{error, info};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Where in the game a player's departure was noticed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeparturePhase {
    Idle,
    WaitingNotice,
    Question,
    Answer,
    Result,
    Announcement,
}

impl fmt::Display for DeparturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            DeparturePhase::Idle => "while idle",
            DeparturePhase::WaitingNotice => "during the waiting notice",
            DeparturePhase::Question => "during the question",
            DeparturePhase::Answer => "while answering",
            DeparturePhase::Result => "during the result",
            DeparturePhase::Announcement => "during the announcement",
        };
        f.write_str(phase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerConnected {
        name: String,
        addr: SocketAddr,
    },
    PlayerDisconnected {
        name: String,
        addr: SocketAddr,
        phase: DeparturePhase,
    },
    RoundStarted {
        players: usize,
    },
    QuestionSent {
        number: u32,
        prompt: String,
    },
    AnswerCorrect {
        name: String,
        addr: SocketAddr,
    },
    AnswerIncorrect {
        name: String,
        addr: SocketAddr,
    },
    AnswerTimedOut {
        name: String,
        addr: SocketAddr,
    },
    RoundCancelled,
    NoPlayersToAnnounce,
    Winner {
        announcement: String,
    },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::PlayerConnected { name, addr } => {
                write!(f, "Player {} ({}) connected", name, addr)
            }
            GameEvent::PlayerDisconnected { name, addr, phase } => {
                write!(f, "Player {} ({}) disconnected {}", name, addr, phase)
            }
            GameEvent::RoundStarted { players } => {
                write!(f, "Round started with {} players", players)
            }
            GameEvent::QuestionSent { number, prompt } => {
                write!(f, "Sent question {}: {}", number, prompt)
            }
            GameEvent::AnswerCorrect { name, addr } => {
                write!(f, "Player {} ({}) answered correctly", name, addr)
            }
            GameEvent::AnswerIncorrect { name, addr } => {
                write!(f, "Player {} ({}) answered incorrectly", name, addr)
            }
            GameEvent::AnswerTimedOut { name, addr } => {
                write!(f, "Player {} ({}) did not answer in time", name, addr)
            }
            GameEvent::RoundCancelled => {
                write!(f, "Round cancelled: every player disconnected")
            }
            GameEvent::NoPlayersToAnnounce => write!(f, "No players left to announce a winner"),
            GameEvent::Winner { announcement } => f.write_str(announcement),
        }
    }
}

/// Cloneable handle for recording game events
#[derive(Debug, Clone)]
pub struct EventLog {
    sender: Option<mpsc::UnboundedSender<GameEvent>>,
}

impl EventLog {
    /// Creates a log handle plus the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GameEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A handle that only mirrors events to the diagnostic log
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Enqueues an event; never waits on the writer
    pub fn record(&self, event: GameEvent) {
        info!("{}", event);
        if let Some(sender) = &self.sender {
            // A closed queue means the writer is gone; the diagnostic log above still has it
            let _ = sender.send(event);
        }
    }
}

/// Opens (creating if needed) the event file and spawns the appending task.
///
/// The task finishes once every `EventLog` handle has been dropped and the
/// queue has been drained.
pub async fn spawn_event_writer(
    path: impl AsRef<Path>,
    mut receiver: mpsc::UnboundedReceiver<GameEvent>,
) -> Result<JoinHandle<()>, ServerError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let display = path.display().to_string();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ServerError::EventLog {
                path: display.clone(),
                source,
            })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|source| ServerError::EventLog {
            path: display.clone(),
            source,
        })?;

    Ok(tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            let line = format!("{} {}\n", Local::now().format("[%Y-%m-%d %H:%M:%S]"), event);
            if let Err(e) = file.write_all(line.as_bytes()).await {
                error!("Failed to write event log {}: {}", display, e);
                break;
            }
            if let Err(e) = file.flush().await {
                error!("Failed to flush event log {}: {}", display, e);
                break;
            }
        }
    }))
}
