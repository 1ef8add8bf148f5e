//! Round orchestration: the question / answer / score cycle
//!
//! A single `RoundOrchestrator` task drives every round:
//!
//! ```text
//! WaitingForPlayers -> AnnouncingWait -> BroadcastingQuestion -> CollectingAnswers
//!        ^                                      ^                       |
//!        |                                      +------- Scoring <------+
//!        +------------ AnnouncingWinner <---------------- (target reached)
//! ```
//!
//! The orchestrator never holds the registry lock across network I/O; it
//! works from snapshots and re-checks membership before applying results.
//! Any send failure is treated as that player leaving: the session is
//! removed and the phase carries on for everyone else. Nothing is retried.

use crate::collector::{AnswerCollector, AnswerOutcome};
use crate::config::GameSettings;
use crate::events::{DeparturePhase, EventLog, GameEvent};
use crate::registry::{GameState, Standing};
use crate::session::Session;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use shared::protocol::QuestionText;
use shared::{Question, QuestionBank, ServerMessage, WAITING_NOTICE};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    WaitingForPlayers,
    AnnouncingWait,
    BroadcastingQuestion,
    CollectingAnswers,
    Scoring,
    AnnouncingWinner,
}

/// Progress of the round in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    pub questions_asked: u32,
    pub target: u32,
}

impl RoundState {
    pub fn new(target: u32) -> Self {
        Self {
            questions_asked: 0,
            target,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.questions_asked >= self.target
    }
}

/// Who won a completed round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Everybody finished on zero points
    NoWinner,
    Winner(Standing),
    /// Several players share a non-zero top score, in registry order
    Tie { score: u32, players: Vec<Standing> },
}

impl RoundOutcome {
    /// Decides the outcome from final standings; `None` when nobody is left
    pub fn decide(standings: &[Standing]) -> Option<Self> {
        let top = standings.iter().map(|s| s.score).max()?;
        if top == 0 {
            return Some(RoundOutcome::NoWinner);
        }

        let leaders: Vec<Standing> = standings
            .iter()
            .filter(|s| s.score == top)
            .cloned()
            .collect();

        match leaders.as_slice() {
            [only] => Some(RoundOutcome::Winner(only.clone())),
            _ => Some(RoundOutcome::Tie {
                score: top,
                players: leaders,
            }),
        }
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::NoWinner => {
                write!(f, "¡Nadie ganó! Todos los jugadores tienen 0 puntos.")
            }
            RoundOutcome::Winner(winner) => write!(
                f,
                "¡Ganador: {} ({}) con {} puntos!",
                winner.name, winner.addr, winner.score
            ),
            RoundOutcome::Tie { score, players } => {
                let names: Vec<String> = players
                    .iter()
                    .map(|p| format!("{} ({})", p.name, p.addr))
                    .collect();
                write!(f, "¡Empate con {} puntos entre: {}!", score, names.join(", "))
            }
        }
    }
}

/// How a round ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundReport {
    Completed(RoundOutcome),
    /// Every player left before the round could finish
    Cancelled,
    /// The target question count was zero, so there is nothing to announce
    NoQuestions,
}

pub struct RoundOrchestrator {
    state: Arc<GameState>,
    questions: Arc<QuestionBank>,
    target: u32,
    settings: GameSettings,
    events: EventLog,
}

impl RoundOrchestrator {
    pub fn new(
        state: Arc<GameState>,
        questions: Arc<QuestionBank>,
        target: u32,
        settings: GameSettings,
        events: EventLog,
    ) -> Self {
        Self {
            state,
            questions,
            target,
            settings,
            events,
        }
    }

    /// Plays rounds back to back until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Round orchestrator started ({} questions per round)", self.target);

        loop {
            self.enter(RoundPhase::WaitingForPlayers);
            loop {
                tokio::select! {
                    ready = self.state.wait_for_players(self.settings.player_poll_interval) => {
                        if ready {
                            break;
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("Round orchestrator stopping");
                        return;
                    }
                }
            }

            tokio::select! {
                report = self.play_round() => {
                    info!("Round finished: {:?}", report);
                }
                _ = shutdown.cancelled() => {
                    info!("Round interrupted by shutdown");
                    return;
                }
            }
        }
    }

    /// Plays one full round against whoever is registered
    pub async fn play_round(&self) -> RoundReport {
        let mut round = RoundState::new(self.target);

        self.enter(RoundPhase::AnnouncingWait);
        self.announce_wait().await;

        let players = self.state.reset_scores().await;
        if players == 0 {
            self.events.record(GameEvent::RoundCancelled);
            return RoundReport::Cancelled;
        }
        self.events.record(GameEvent::RoundStarted { players });

        while !round.is_complete() {
            self.enter(RoundPhase::BroadcastingQuestion);
            if self.state.is_empty().await {
                self.events.record(GameEvent::RoundCancelled);
                return RoundReport::Cancelled;
            }
            let Some(question) = self.pick_question() else {
                warn!("Question bank is empty; ending round");
                return RoundReport::NoQuestions;
            };
            let recipients = self
                .broadcast_question(&question, round.questions_asked + 1)
                .await;

            self.enter(RoundPhase::CollectingAnswers);
            let outcomes = AnswerCollector::new(
                &self.state,
                &self.events,
                self.settings.answer_timeout,
                self.settings.drain_window,
            )
            .collect(&question, &recipients)
            .await;

            self.enter(RoundPhase::Scoring);
            self.apply_outcomes(outcomes).await;
            round.questions_asked += 1;

            if self.state.is_empty().await {
                self.events.record(GameEvent::RoundCancelled);
                return RoundReport::Cancelled;
            }
            if !round.is_complete() {
                tokio::time::sleep(self.settings.question_pause).await;
            }
        }

        if round.questions_asked == 0 {
            return RoundReport::NoQuestions;
        }

        self.enter(RoundPhase::AnnouncingWinner);
        let standings = self.state.standings().await;
        match RoundOutcome::decide(&standings) {
            Some(outcome) => {
                self.announce_outcome(&outcome).await;
                RoundReport::Completed(outcome)
            }
            None => {
                self.events.record(GameEvent::NoPlayersToAnnounce);
                RoundReport::Cancelled
            }
        }
    }

    fn enter(&self, phase: RoundPhase) {
        debug!("Round phase: {:?}", phase);
    }

    /// Uniform pick; repeats across questions are allowed
    fn pick_question(&self) -> Option<Question> {
        let mut rng = rand::thread_rng();
        self.questions.questions().choose(&mut rng).cloned()
    }

    async fn announce_wait(&self) {
        let notice = ServerMessage::Notice(WAITING_NOTICE.to_string()).encode();
        debug!(
            "Giving late joiners {:?} before the round starts",
            self.settings.join_window()
        );

        for _ in 0..self.settings.wait_notices {
            for session in self.state.snapshot().await {
                if session.send(&notice).await.is_err() {
                    self.depart(&session, DeparturePhase::WaitingNotice).await;
                }
            }
            tokio::time::sleep(self.settings.wait_notice_interval).await;
        }
    }

    /// Sends the question to everyone registered; returns who received it
    async fn broadcast_question(&self, question: &Question, number: u32) -> Vec<Session> {
        let message = ServerMessage::Question(QuestionText::from(question)).encode();
        let mut recipients = Vec::new();

        for session in self.state.snapshot().await {
            let connection = session.connection();
            let delivered = match connection.discard_pending().await {
                Ok(0) => connection.send(&message).await,
                Ok(stale) => {
                    debug!("Discarded {} stale bytes from {}", stale, session);
                    connection.send(&message).await
                }
                Err(e) => Err(e),
            };

            match delivered {
                Ok(()) => recipients.push(session),
                Err(e) => {
                    warn!("Could not send question to {}: {}", session, e);
                    self.depart(&session, DeparturePhase::Question).await;
                }
            }
        }

        self.events.record(GameEvent::QuestionSent {
            number,
            prompt: question.prompt.clone(),
        });
        recipients
    }

    /// Scores every outcome and tells each player how they did
    async fn apply_outcomes(&self, outcomes: Vec<(Session, AnswerOutcome)>) {
        for (session, outcome) in outcomes {
            if outcome == AnswerOutcome::Disconnected {
                continue;
            }
            if !self.state.contains(&session.addr()).await {
                debug!("{} left before scoring", session);
                continue;
            }

            let name = session.name().to_string();
            let addr = session.addr();
            match outcome {
                AnswerOutcome::Correct => {
                    self.state.award_point(&addr).await;
                    self.events.record(GameEvent::AnswerCorrect { name, addr });
                }
                AnswerOutcome::Incorrect => {
                    self.events.record(GameEvent::AnswerIncorrect { name, addr });
                }
                AnswerOutcome::TimedOut => {
                    self.events.record(GameEvent::AnswerTimedOut { name, addr });
                }
                AnswerOutcome::Disconnected => {}
            }

            let result = ServerMessage::Result {
                correct: outcome.is_correct(),
            }
            .encode();
            if session.send(&result).await.is_err() {
                self.depart(&session, DeparturePhase::Result).await;
            }
        }
    }

    async fn announce_outcome(&self, outcome: &RoundOutcome) {
        let announcement = outcome.to_string();
        self.events.record(GameEvent::Winner {
            announcement: announcement.clone(),
        });

        let message = ServerMessage::RoundOver(announcement).encode();
        for session in self.state.snapshot().await {
            if session.send(&message).await.is_err() {
                self.depart(&session, DeparturePhase::Announcement).await;
            }
        }
    }

    async fn depart(&self, session: &Session, phase: DeparturePhase) {
        if self.state.remove_exact(session).await {
            self.events.record(GameEvent::PlayerDisconnected {
                name: session.name().to_string(),
                addr: session.addr(),
                phase,
            });
        }
    }
}
