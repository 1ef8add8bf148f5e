use thiserror::Error;

/// Result of a single read or write on a player's connection.
///
/// Neither variant is a crash: callers turn them into registry mutations
/// (`Disconnected`) or a defined answer outcome (`Timeout`).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection closed by peer")]
    Disconnected,

    #[error("no data before the deadline")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to resolve local address: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error("event log {path} unavailable: {source}")]
    EventLog {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
