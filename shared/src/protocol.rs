//! Newline-terminated text protocol between server and client
//!
//! Server to client:
//! - question: `PREGUNTA: <text>` followed by `A) ..`, `B) ..`, `C) ..`, `D) ..`
//! - result: `RESULTADO: Correcto` / `RESULTADO: Incorrecto`
//! - end of round: `<announcement> FIN` (a line ending in the marker)
//! - anything else is a plain notice shown to the player
//!
//! Client to server:
//! - handshake: `NAME:<name>`, sent once right after connecting
//! - answer: a single letter, or an empty line when the player ran out of time

use crate::question::{AnswerLetter, Question};
use log::warn;

pub const QUESTION_PREFIX: &str = "PREGUNTA:";
pub const RESULT_PREFIX: &str = "RESULTADO:";
pub const END_OF_ROUND_MARKER: &str = "FIN";
pub const NAME_TAG: &str = "NAME:";

const RESULT_CORRECT: &str = "Correcto";
const RESULT_INCORRECT: &str = "Incorrecto";

/// A question as seen on the wire: prompt plus the four option texts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionText {
    pub prompt: String,
    pub options: [String; 4],
}

impl From<&Question> for QuestionText {
    fn from(question: &Question) -> Self {
        Self {
            prompt: question.prompt.clone(),
            options: AnswerLetter::ALL.map(|letter| question.options.get(letter).to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Question(QuestionText),
    Result { correct: bool },
    Notice(String),
    RoundOver(String),
}

impl ServerMessage {
    /// Encodes the message as one write, newline-terminated
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::Question(question) => {
                let mut text = format!("{} {}\n", QUESTION_PREFIX, question.prompt);
                for (letter, option) in AnswerLetter::ALL.iter().zip(&question.options) {
                    text.push_str(&format!("{}) {}\n", letter, option));
                }
                text
            }
            ServerMessage::Result { correct } => {
                let verdict = if *correct {
                    RESULT_CORRECT
                } else {
                    RESULT_INCORRECT
                };
                format!("{} {}\n", RESULT_PREFIX, verdict)
            }
            ServerMessage::Notice(text) => format!("{}\n", text),
            ServerMessage::RoundOver(text) => format!("{} {}\n", text, END_OF_ROUND_MARKER),
        }
    }
}

/// Reassembles server messages from individual lines.
///
/// Questions span five lines; the decoder holds a partial question until all
/// four options have arrived.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    pending: Option<(String, Vec<String>)>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a question has been started but not all options arrived
    pub fn is_mid_question(&self) -> bool {
        self.pending.is_some()
    }

    /// Feeds one line (without its terminator) and returns a message when one is complete
    pub fn push_line(&mut self, line: &str) -> Option<ServerMessage> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some((prompt, mut options)) = self.pending.take() {
            let expected = AnswerLetter::ALL[options.len()];
            match parse_option_line(line, expected) {
                Some(option) => {
                    options.push(option);
                    if options.len() < AnswerLetter::ALL.len() {
                        self.pending = Some((prompt, options));
                        return None;
                    }
                    let options: [String; 4] = match options.try_into() {
                        Ok(options) => options,
                        Err(_) => return None,
                    };
                    return Some(ServerMessage::Question(QuestionText { prompt, options }));
                }
                None => {
                    warn!(
                        "Question '{}' interrupted before option {}; dropping it",
                        prompt, expected
                    );
                }
            }
        }

        if let Some(prompt) = line.strip_prefix(QUESTION_PREFIX) {
            self.pending = Some((prompt.trim().to_string(), Vec::with_capacity(4)));
            return None;
        }

        if let Some(verdict) = line.strip_prefix(RESULT_PREFIX) {
            return Some(ServerMessage::Result {
                correct: verdict.trim() == RESULT_CORRECT,
            });
        }

        if let Some(text) = line.trim_end().strip_suffix(END_OF_ROUND_MARKER) {
            return Some(ServerMessage::RoundOver(text.trim().to_string()));
        }

        if line.trim().is_empty() {
            return None;
        }

        Some(ServerMessage::Notice(line.to_string()))
    }
}

fn parse_option_line(line: &str, letter: AnswerLetter) -> Option<String> {
    let rest = line.strip_prefix(letter.as_char())?;
    let text = rest.strip_prefix(')')?;
    Some(text.trim().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Hello { name: String },
    Answer(String),
}

impl ClientMessage {
    pub fn encode(&self) -> String {
        match self {
            ClientMessage::Hello { name } => format!("{}{}\n", NAME_TAG, name),
            ClientMessage::Answer(answer) => format!("{}\n", answer.trim().to_uppercase()),
        }
    }

    /// Extracts the player name from a handshake line.
    ///
    /// Returns `None` when the tag is missing or the name is blank; the
    /// server then falls back to a placeholder instead of rejecting the player.
    pub fn parse_hello(line: &str) -> Option<String> {
        let (_, name) = line.split_once(NAME_TAG)?;
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}
