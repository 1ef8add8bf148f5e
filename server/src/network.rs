//! Server network layer: TCP accept loop and per-connection listeners

use crate::config::GameSettings;
use crate::error::{ConnectionError, ServerError};
use crate::events::{DeparturePhase, EventLog, GameEvent};
use crate::registry::GameState;
use crate::round::RoundOrchestrator;
use crate::session::{Connection, Session};
use log::{debug, error, info, warn};
use shared::{ClientMessage, QuestionBank, PLACEHOLDER_NAME};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Owns one accepted connection for its whole life.
///
/// After the handshake the listener does no protocol work of its own: the
/// round orchestrator talks to the player through the registry. The listener
/// only watches for the connection closing (or shutdown) and then removes
/// the session, so a dead player never surfaces as an error anywhere else.
pub struct ConnectionListener {
    state: Arc<GameState>,
    events: EventLog,
    settings: GameSettings,
}

impl ConnectionListener {
    pub fn new(state: Arc<GameState>, events: EventLog, settings: GameSettings) -> Self {
        Self {
            state,
            events,
            settings,
        }
    }

    pub async fn run(self, stream: TcpStream, addr: SocketAddr, shutdown: CancellationToken) {
        let connection = Arc::new(Connection::new(stream));

        let name = match self.handshake(&connection).await {
            Ok(name) => name,
            Err(_) => {
                debug!("{} closed before sending a name", addr);
                return;
            }
        };

        let session = Session::new(addr, name, Arc::clone(&connection));
        self.state.add(session.clone()).await;
        self.events.record(GameEvent::PlayerConnected {
            name: session.name().to_string(),
            addr,
        });

        let mut idle_check = interval(self.settings.idle_check_interval);
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = connection.closed() => break,
                _ = shutdown.cancelled() => {
                    debug!("Listener for {} stopping", session);
                    break;
                }
                _ = idle_check.tick() => {
                    if connection.check_alive().await.is_err() {
                        break;
                    }
                }
            }
        }

        if self.state.remove_exact(&session).await {
            self.events.record(GameEvent::PlayerDisconnected {
                name: session.name().to_string(),
                addr,
                phase: DeparturePhase::Idle,
            });
        }
    }

    /// Reads the `NAME:` line; a missing or malformed name becomes the placeholder
    async fn handshake(&self, connection: &Connection) -> Result<String, ConnectionError> {
        match connection.read_line(self.settings.handshake_timeout).await {
            Ok(line) => {
                // Undecodable bytes show up as replacement characters
                let name = Some(line.as_str())
                    .filter(|l| !l.contains(char::REPLACEMENT_CHARACTER))
                    .and_then(ClientMessage::parse_hello);
                Ok(name.unwrap_or_else(|| {
                    warn!("Malformed handshake '{}', using placeholder name", line.trim());
                    PLACEHOLDER_NAME.to_string()
                }))
            }
            Err(ConnectionError::Timeout) => {
                warn!("No handshake before deadline, using placeholder name");
                Ok(PLACEHOLDER_NAME.to_string())
            }
            Err(ConnectionError::Disconnected) => Err(ConnectionError::Disconnected),
        }
    }
}

/// Quiz server: accepts players and runs rounds until shut down
pub struct Server {
    listener: TcpListener,
    state: Arc<GameState>,
    questions: Arc<QuestionBank>,
    questions_per_round: u32,
    settings: GameSettings,
    events: EventLog,
}

impl Server {
    pub async fn new(
        addr: &str,
        questions: QuestionBank,
        questions_per_round: u32,
        settings: GameSettings,
        events: EventLog,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", addr);

        Ok(Server {
            listener,
            state: Arc::new(GameState::new()),
            questions: Arc::new(questions),
            questions_per_round,
            settings,
            events,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Shared registry, for inspection by callers
    pub fn state(&self) -> Arc<GameState> {
        Arc::clone(&self.state)
    }

    /// Runs the accept loop and the round orchestrator until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let orchestrator = RoundOrchestrator::new(
            Arc::clone(&self.state),
            Arc::clone(&self.questions),
            self.questions_per_round,
            self.settings.clone(),
            self.events.clone(),
        );
        let round_task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { orchestrator.run(shutdown).await })
        };

        let listeners = TaskTracker::new();
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("Accepted connection from {}", addr);
                        let listener = ConnectionListener::new(
                            Arc::clone(&self.state),
                            self.events.clone(),
                            self.settings.clone(),
                        );
                        listeners.spawn(listener.run(stream, addr, shutdown.child_token()));
                    }
                    Err(e) => {
                        error!("{}", ServerError::Accept(e));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        listeners.close();
        listeners.wait().await;
        if let Err(e) = round_task.await {
            error!("Round orchestrator task panicked: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{AnswerLetter, Options, Question};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![Question {
            prompt: "¿Qué tipo es Pikachu?".to_string(),
            options: Options {
                a: "Agua".to_string(),
                b: "Eléctrico".to_string(),
                c: "Fuego".to_string(),
                d: "Planta".to_string(),
            },
            correct: AnswerLetter::B,
        }])
        .unwrap()
    }

    fn slow_round_settings() -> GameSettings {
        // Long notices keep the orchestrator from touching the sockets under test
        GameSettings {
            wait_notices: 1,
            wait_notice_interval: Duration::from_secs(30),
            handshake_timeout: Duration::from_millis(100),
            idle_check_interval: Duration::from_millis(20),
            ..GameSettings::default()
        }
    }

    async fn wait_for_len(state: &GameState, len: usize) {
        for _ in 0..100 {
            if state.len().await == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {} sessions", len);
    }

    async fn start(settings: GameSettings) -> (SocketAddr, Arc<GameState>, CancellationToken) {
        let server = Server::new("127.0.0.1:0", bank(), 1, settings, EventLog::disabled())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let state = server.state();
        let shutdown = CancellationToken::new();
        tokio::spawn(server.run(shutdown.clone()));
        (addr, state, shutdown)
    }

    #[tokio::test]
    async fn test_handshake_registers_named_session() {
        let (addr, state, shutdown) = start(slow_round_settings()).await;

        let mut player = TcpStream::connect(addr).await.unwrap();
        player.write_all(b"NAME:Ash\n").await.unwrap();
        wait_for_len(&state, 1).await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot[0].name(), "Ash");
        assert_eq!(snapshot[0].addr(), player.local_addr().unwrap());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_malformed_handshake_gets_placeholder() {
        let (addr, state, shutdown) = start(slow_round_settings()).await;

        let mut player = TcpStream::connect(addr).await.unwrap();
        player.write_all(b"hello there\n").await.unwrap();
        wait_for_len(&state, 1).await;
        assert_eq!(state.snapshot().await[0].name(), PLACEHOLDER_NAME);

        let _silent = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&state, 2).await;
        assert_eq!(state.snapshot().await[1].name(), PLACEHOLDER_NAME);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_undecodable_handshake_gets_placeholder() {
        let (addr, state, shutdown) = start(slow_round_settings()).await;

        let mut player = TcpStream::connect(addr).await.unwrap();
        player.write_all(b"NAME:\xc3\n").await.unwrap();
        wait_for_len(&state, 1).await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot[0].name(), PLACEHOLDER_NAME);
        assert_eq!(snapshot[0].addr(), player.local_addr().unwrap());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_idle_disconnect_is_removed() {
        let (addr, state, shutdown) = start(slow_round_settings()).await;

        let mut player = TcpStream::connect(addr).await.unwrap();
        player.write_all(b"NAME:Ash\n").await.unwrap();
        wait_for_len(&state, 1).await;

        drop(player);
        wait_for_len(&state, 0).await;

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_listener_emits_single_disconnect_event() {
        let state = Arc::new(GameState::new());
        let (events, mut receiver) = EventLog::channel();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut player = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        player.write_all(b"NAME:Misty\n").await.unwrap();

        let task = tokio::spawn(
            ConnectionListener::new(Arc::clone(&state), events, slow_round_settings()).run(
                stream,
                peer,
                CancellationToken::new(),
            ),
        );
        wait_for_len(&state, 1).await;
        drop(player);
        task.await.unwrap();

        assert!(state.is_empty().await);
        assert!(matches!(
            receiver.try_recv(),
            Ok(GameEvent::PlayerConnected { ref name, .. }) if name == "Misty"
        ));
        assert!(matches!(
            receiver.try_recv(),
            Ok(GameEvent::PlayerDisconnected {
                phase: DeparturePhase::Idle,
                ..
            })
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() {
        let server = Server::new(
            "127.0.0.1:0",
            bank(),
            1,
            slow_round_settings(),
            EventLog::disabled(),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let state = server.state();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        let mut player = BufReader::new(TcpStream::connect(addr).await.unwrap());
        player.get_mut().write_all(b"NAME:Ash\n").await.unwrap();
        wait_for_len(&state, 1).await;

        // The round starts with a waiting notice, then sleeps
        let mut line = String::new();
        player.read_line(&mut line).await.unwrap();
        assert_eq!(line, "Esperando nueva ronda...\n");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(state.is_empty().await);
    }
}
