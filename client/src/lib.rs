//! # Quiz Client Library
//!
//! Console client for the multiplayer quiz server. The client connects,
//! introduces itself by name, and then answers each question it receives
//! within a deadline, showing results and round announcements as they
//! arrive.
//!
//! ## Architecture Overview
//!
//! Two concerns run side by side:
//!
//! ### Input reader (`input`)
//! A background task reads the console line by line and queues every line
//! immediately, whether or not a question is pending. A line typed after an
//! answer deadline is discarded instead of answering the next question.
//!
//! ### Network loop (`network`)
//! Connects, performs the handshake and handles server messages. When the
//! connection fails or the server closes it, the loop waits and reconnects;
//! if connection attempts keep failing for too long it gives up.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::console::StdoutConsole;
//! use client::network::ClientSettings;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = client::load_config("config.json")?;
//!     client::play(
//!         config,
//!         "Ash".to_string(),
//!         ClientSettings::default(),
//!         Arc::new(StdoutConsole),
//!         tokio::io::stdin(),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod console;
pub mod error;
pub mod input;
pub mod network;

pub use error::ClientError;

use console::Console;
use log::warn;
use network::{Client, ClientSettings};
use shared::ClientConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Reads the server address file
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig, ClientError> {
    Ok(ClientConfig::load(path)?)
}

/// Runs a full client session: input reader, network loop and farewell.
///
/// Returns once `shutdown` fires or reconnection gives up. The input task is
/// cancelled and awaited before the farewell is shown, and the farewell is
/// shown exactly once whichever way the session ended.
pub async fn play<R>(
    config: ClientConfig,
    name: String,
    settings: ClientSettings,
    console: Arc<dyn Console>,
    input: R,
    shutdown: CancellationToken,
) -> Result<(), ClientError>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (queue, mut answers) = mpsc::unbounded_channel();
    let input_cancel = CancellationToken::new();
    let reader = input::spawn_input_reader(input, queue, input_cancel.clone());

    let client = Client::new(config, name.as_str(), settings, Arc::clone(&console));
    let result = client.run(&mut answers, &shutdown).await;

    input_cancel.cancel();
    if let Err(e) = reader.await {
        warn!("Input reader task failed: {}", e);
    }

    console.show(&format!("Adiós {}, gracias por jugar.", name));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;
    use crate::network::ReconnectPolicy;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_missing_config_is_a_config_error() {
        let result = load_config("/nonexistent/quiz-client.json");

        match result {
            Err(ClientError::Config(shared::LoadError::Io { path, .. })) => {
                assert!(path.contains("quiz-client.json"));
            }
            other => panic!("expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_config_is_a_config_error() {
        let path = std::env::temp_dir().join(format!("quiz-client-{}.json", std::process::id()));
        std::fs::write(&path, "{\"servidor\": ").unwrap();

        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            result,
            Err(ClientError::Config(shared::LoadError::Json { .. }))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_shows_farewell_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server: "127.0.0.1".to_string(),
            port: listener.local_addr().unwrap().port(),
        };
        let console = MemoryConsole::new();
        let shutdown = CancellationToken::new();

        // Console input that never produces anything
        let input = tokio_test::io::Builder::new()
            .wait(Duration::from_secs(60))
            .build();

        let stopper = shutdown.clone();
        tokio::spawn(async move {
            let _accepted = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            play(
                config,
                "Ash".to_string(),
                ClientSettings::default(),
                Arc::new(console.clone()),
                input,
                shutdown,
            ),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        assert_eq!(console.count("Adiós Ash, gracias por jugar."), 1);
    }

    #[tokio::test]
    async fn test_shutdown_during_question_shows_farewell_once() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server: "127.0.0.1".to_string(),
            port: listener.local_addr().unwrap().port(),
        };
        let console = MemoryConsole::new();
        let shutdown = CancellationToken::new();
        let input = tokio_test::io::Builder::new()
            .wait(Duration::from_secs(60))
            .build();

        let server = {
            let stopper = shutdown.clone();
            let console = console.clone();
            tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                let mut reader = BufReader::new(stream);
                let mut hello = String::new();
                reader.read_line(&mut hello).await.unwrap();
                reader
                    .get_mut()
                    .write_all(b"PREGUNTA: Hola\nA) 1\nB) 2\nC) 3\nD) 4\n")
                    .await
                    .unwrap();
                while !console.contains("Ingresa tu respuesta") {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                stopper.cancel();

                let mut rest = String::new();
                reader.read_line(&mut rest).await.unwrap();
                rest
            })
        };

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            play(
                config,
                "Ash".to_string(),
                ClientSettings::default(),
                Arc::new(console.clone()),
                input,
                shutdown,
            ),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        assert!(started.elapsed() < ClientSettings::default().answer_timeout);
        assert_eq!(server.await.unwrap(), "");
        assert_eq!(console.count("Adiós Ash, gracias por jugar."), 1);
    }

    #[tokio::test]
    async fn test_give_up_still_shows_farewell() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ClientConfig {
            server: "127.0.0.1".to_string(),
            port,
        };
        let settings = ClientSettings {
            answer_timeout: Duration::from_millis(100),
            reconnect: ReconnectPolicy {
                retry_delay: Duration::from_millis(10),
                give_up_after: Duration::from_millis(30),
            },
        };
        let console = MemoryConsole::new();
        let input = tokio_test::io::Builder::new().build();

        let result = play(
            config,
            "Misty".to_string(),
            settings,
            Arc::new(console.clone()),
            input,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ClientError::ConnectionLost { .. })));
        let lines = console.lines();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Adiós Misty, gracias por jugar.")
        );
        assert_eq!(console.count("Adiós Misty, gracias por jugar."), 1);
    }
}
