use shared::LoadError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection attempts kept failing for longer than the reconnect policy allows
    #[error("connection to the server lost after {elapsed:?} of failed attempts")]
    ConnectionLost { elapsed: Duration },

    #[error("invalid configuration: {0}")]
    Config(#[from] LoadError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
