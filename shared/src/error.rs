use thiserror::Error;

/// Failures while loading the question bank or the client configuration.
///
/// All of these are fatal at startup: nothing has connected yet, so the
/// binaries report the error and exit.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("question bank {0} contains no questions")]
    EmptyQuestionBank(String),
}
