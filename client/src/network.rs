//! Client network loop: connect, play, reconnect

use crate::console::Console;
use crate::error::ClientError;
use log::{debug, info, warn};
use shared::{
    AnswerLetter, ClientConfig, ClientMessage, MessageDecoder, ServerMessage, ANSWER_TIMEOUT,
    WAITING_NOTICE,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Fixed-delay reconnection with a cap on how long failures may last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub retry_delay: Duration,
    pub give_up_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            give_up_after: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp { elapsed: Duration },
}

/// Tracks consecutive failed connection attempts.
///
/// The clock starts at the first failure after a success and is cleared by
/// the next successful connection.
#[derive(Debug)]
pub struct ConnectionRetry {
    policy: ReconnectPolicy,
    failing_since: Option<Instant>,
}

impl ConnectionRetry {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failing_since: None,
        }
    }

    pub fn record_failure(&mut self, now: Instant) -> RetryDecision {
        match self.failing_since {
            None => {
                self.failing_since = Some(now);
                RetryDecision::Retry(self.policy.retry_delay)
            }
            Some(start) => {
                let elapsed = now.saturating_duration_since(start);
                if elapsed > self.policy.give_up_after {
                    RetryDecision::GiveUp { elapsed }
                } else {
                    RetryDecision::Retry(self.policy.retry_delay)
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failing_since = None;
    }

    pub fn is_failing(&self) -> bool {
        self.failing_since.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    /// How long the player has to type an answer
    pub answer_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            answer_timeout: ANSWER_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

pub struct Client {
    config: ClientConfig,
    name: String,
    settings: ClientSettings,
    console: Arc<dyn Console>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        name: impl Into<String>,
        settings: ClientSettings,
        console: Arc<dyn Console>,
    ) -> Self {
        Self {
            config,
            name: name.into(),
            settings,
            console,
        }
    }

    /// Connects and plays until `shutdown` fires or reconnection gives up.
    ///
    /// Answers are taken from `answers`, which is fed by the input reader.
    pub async fn run(
        &self,
        answers: &mut mpsc::UnboundedReceiver<String>,
        shutdown: &CancellationToken,
    ) -> Result<(), ClientError> {
        let address = self.config.address();
        let delay_secs = self.settings.reconnect.retry_delay.as_secs();
        let mut retry = ConnectionRetry::new(self.settings.reconnect);

        loop {
            let attempt = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                attempt = TcpStream::connect(&address) => attempt,
            };

            match attempt {
                Ok(stream) => {
                    retry.record_success();
                    info!("Connected to {}", address);
                    self.console.show(&format!(
                        "Conectado al servidor {}. Esperando preguntas...",
                        address
                    ));

                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        ended = self.play_connection(stream, answers) => match ended {
                            Ok(()) => info!("Server closed the connection"),
                            Err(e) => warn!("Connection to {} failed: {}", address, e),
                        },
                    }

                    self.console.show(&format!(
                        "Desconectado del servidor. Intentando reconectar en {} segundos...",
                        delay_secs
                    ));
                    if !wait_or_cancel(self.settings.reconnect.retry_delay, shutdown).await {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", address, e);
                    match retry.record_failure(Instant::now()) {
                        RetryDecision::GiveUp { elapsed } => {
                            self.console.show("Se perdió la conexión con el servidor.");
                            return Err(ClientError::ConnectionLost { elapsed });
                        }
                        RetryDecision::Retry(delay) => {
                            self.console.show(&format!(
                                "No se pudo conectar a {}. Intentando reconectar en {} segundos...",
                                address, delay_secs
                            ));
                            if !wait_or_cancel(delay, shutdown).await {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }

    /// Handshake, then handle server messages until the connection closes
    async fn play_connection(
        &self,
        stream: TcpStream,
        answers: &mut mpsc::UnboundedReceiver<String>,
    ) -> Result<(), ClientError> {
        let (read_half, mut writer) = stream.into_split();
        let hello = ClientMessage::Hello {
            name: self.name.clone(),
        };
        send(&mut writer, &hello).await?;

        let mut lines = BufReader::new(read_half).lines();
        let mut decoder = MessageDecoder::new();

        while let Some(line) = lines.next_line().await? {
            debug!("<- {}", line);
            let Some(message) = decoder.push_line(&line) else {
                continue;
            };

            match message {
                ServerMessage::Question(question) => {
                    self.console
                        .show(&format!("Pregunta recibida: {}", question.prompt));
                    for (letter, option) in AnswerLetter::ALL.iter().zip(&question.options) {
                        self.console.show(&format!("{}) {}", letter, option));
                    }
                    self.console.prompt("Ingresa tu respuesta (A/B/C/D): ");

                    let answer = self.await_answer(answers).await;
                    send(&mut writer, &ClientMessage::Answer(answer)).await?;
                }
                ServerMessage::Result { correct } => {
                    self.console
                        .show(if correct { "Correcto" } else { "Incorrecto" });
                }
                ServerMessage::RoundOver(announcement) => {
                    self.console.show(&announcement);
                    self.console.show(WAITING_NOTICE);
                }
                ServerMessage::Notice(text) => self.console.show(&text),
            }
        }

        Ok(())
    }

    /// Next queued line, or an empty answer once the deadline passes
    async fn await_answer(&self, answers: &mut mpsc::UnboundedReceiver<String>) -> String {
        match timeout(self.settings.answer_timeout, answers.recv()).await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Input closed; sending an empty answer");
                String::new()
            }
            Err(_) => {
                // Anything typed from now on belongs to no question
                while answers.try_recv().is_ok() {}
                self.console.show("No respondiste a tiempo.");
                String::new()
            }
        }
    }
}

async fn send(writer: &mut OwnedWriteHalf, message: &ClientMessage) -> Result<(), ClientError> {
    writer.write_all(message.encode().as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Sleeps for `delay`; returns false if `shutdown` fired first
async fn wait_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
