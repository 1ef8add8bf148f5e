//! Question bank model and loader
//!
//! Questions are read once at server startup from a JSON array:
//!
//! ```json
//! [{
//!     "pregunta": "¿Qué tipo es Pikachu?",
//!     "opciones": { "A": "Agua", "B": "Eléctrico", "C": "Fuego", "D": "Planta" },
//!     "respuesta_correcta": "B"
//! }]
//! ```

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One of the four fixed option letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerLetter {
    A,
    B,
    C,
    D,
}

impl AnswerLetter {
    pub const ALL: [AnswerLetter; 4] = [
        AnswerLetter::A,
        AnswerLetter::B,
        AnswerLetter::C,
        AnswerLetter::D,
    ];

    pub fn as_char(self) -> char {
        match self {
            AnswerLetter::A => 'A',
            AnswerLetter::B => 'B',
            AnswerLetter::C => 'C',
            AnswerLetter::D => 'D',
        }
    }

    /// Parses a player's raw answer, ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(AnswerLetter::A),
            "B" => Some(AnswerLetter::B),
            "C" => Some(AnswerLetter::C),
            "D" => Some(AnswerLetter::D),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Option texts keyed by letter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl Options {
    pub fn get(&self, letter: AnswerLetter) -> &str {
        match letter {
            AnswerLetter::A => &self.a,
            AnswerLetter::B => &self.b,
            AnswerLetter::C => &self.c,
            AnswerLetter::D => &self.d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "pregunta")]
    pub prompt: String,
    #[serde(rename = "opciones")]
    pub options: Options,
    #[serde(rename = "respuesta_correcta")]
    pub correct: AnswerLetter,
}

impl Question {
    /// True when `answer` names the correct letter (case-insensitive, trimmed)
    pub fn is_correct(&self, answer: &str) -> bool {
        AnswerLetter::parse(answer) == Some(self.correct)
    }
}

/// The immutable set of questions a server draws from
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self, LoadError> {
        if questions.is_empty() {
            return Err(LoadError::EmptyQuestionBank("<inline>".to_string()));
        }
        Ok(Self { questions })
    }

    pub fn from_json(path: &str, text: &str) -> Result<Self, LoadError> {
        let questions: Vec<Question> =
            serde_json::from_str(text).map_err(|source| LoadError::Json {
                path: path.to_string(),
                source,
            })?;

        if questions.is_empty() {
            return Err(LoadError::EmptyQuestionBank(path.to_string()));
        }

        Ok(Self { questions })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&display, &text)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false; an empty bank is rejected at construction
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
