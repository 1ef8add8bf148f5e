//! Timed collection of answers for one question
//!
//! Sessions are read one after another, each with its own deadline, in the
//! order of the snapshot taken when the question was broadcast. Answers sent
//! early simply wait in the socket buffer until their session's turn.

use crate::error::ConnectionError;
use crate::events::{DeparturePhase, EventLog, GameEvent};
use crate::registry::GameState;
use crate::session::Session;
use log::{debug, warn};
use shared::Question;
use std::time::Duration;

/// How one session responded to one question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    TimedOut,
    Disconnected,
}

impl AnswerOutcome {
    pub fn is_correct(self) -> bool {
        self == AnswerOutcome::Correct
    }
}

pub struct AnswerCollector<'a> {
    state: &'a GameState,
    events: &'a EventLog,
    answer_timeout: Duration,
    drain_window: Duration,
}

impl<'a> AnswerCollector<'a> {
    pub fn new(
        state: &'a GameState,
        events: &'a EventLog,
        answer_timeout: Duration,
        drain_window: Duration,
    ) -> Self {
        Self {
            state,
            events,
            answer_timeout,
            drain_window,
        }
    }

    /// Reads one answer from every session in `snapshot` that is still registered.
    ///
    /// Sessions whose connection fails are removed from the registry here and
    /// reported as `Disconnected`. The result follows snapshot order.
    pub async fn collect(
        &self,
        question: &Question,
        snapshot: &[Session],
    ) -> Vec<(Session, AnswerOutcome)> {
        let mut outcomes = Vec::with_capacity(snapshot.len());

        for session in snapshot {
            if !self.state.contains(&session.addr()).await {
                debug!("Skipping {}: left before answering", session);
                continue;
            }

            let outcome = self.collect_one(question, session).await;
            outcomes.push((session.clone(), outcome));
        }

        outcomes
    }

    async fn collect_one(&self, question: &Question, session: &Session) -> AnswerOutcome {
        let connection = session.connection();

        match connection.read_line(self.answer_timeout).await {
            Ok(answer) => {
                debug!("{} answered '{}'", session, answer.trim());
                if question.is_correct(&answer) {
                    AnswerOutcome::Correct
                } else {
                    AnswerOutcome::Incorrect
                }
            }
            Err(ConnectionError::Timeout) => {
                match connection.drain_for(self.drain_window).await {
                    Ok(0) => {}
                    Ok(n) => debug!("Discarded {} late bytes from {}", n, session),
                    Err(_) => {
                        // Went away right at the deadline; the listener or the
                        // result phase will remove it.
                        debug!("{} closed while draining", session);
                    }
                }
                AnswerOutcome::TimedOut
            }
            Err(ConnectionError::Disconnected) => {
                warn!("{} disconnected while answering", session);
                if self.state.remove_exact(session).await {
                    self.events.record(GameEvent::PlayerDisconnected {
                        name: session.name().to_string(),
                        addr: session.addr(),
                        phase: DeparturePhase::Answer,
                    });
                }
                AnswerOutcome::Disconnected
            }
        }
    }
}
