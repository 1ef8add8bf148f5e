//! Types and wire protocol shared by the quiz server and client.
//!
//! Both sides speak a newline-terminated text protocol over TCP. The
//! `protocol` module owns encoding and decoding of every message so the two
//! binaries can never drift apart on framing or markers.

pub mod config;
pub mod error;
pub mod protocol;
pub mod question;

pub use config::ClientConfig;
pub use error::LoadError;
pub use protocol::{ClientMessage, MessageDecoder, ServerMessage};
pub use question::{AnswerLetter, Options, Question, QuestionBank};

use std::time::Duration;

/// How long a player has to answer a single question
pub const ANSWER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default TCP port the server listens on
pub const DEFAULT_PORT: u16 = 8888;

/// Name given to players whose handshake carried no usable name
pub const PLACEHOLDER_NAME: &str = "JugadorDesconocido";

/// Notice broadcast while the server waits for the next round to start
pub const WAITING_NOTICE: &str = "Esperando nueva ronda...";
