//! Player sessions and their TCP connections
//!
//! A `Connection` wraps the two halves of a player's socket behind their own
//! async mutexes, so the answer collector can read while another task
//! writes. Every read and write reports failure as a `ConnectionError`
//! instead of an I/O error, and any failure latches the connection as closed
//! so the per-connection listener notices it without touching the socket.

use crate::error::ConnectionError;
use log::debug;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Longest line accepted from a player; anything beyond is cut off
pub const MAX_LINE_BYTES: u64 = 256;

/// One player's socket
#[derive(Debug)]
pub struct Connection {
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: CancellationToken,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed: CancellationToken::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once any operation has observed the connection closing
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    fn mark_closed(&self) -> ConnectionError {
        self.closed.cancel();
        ConnectionError::Disconnected
    }

    /// Writes `text` and flushes it
    pub async fn send(&self, text: &str) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Disconnected);
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            debug!("Write failed: {}", e);
            return Err(self.mark_closed());
        }
        if let Err(e) = writer.flush().await {
            debug!("Flush failed: {}", e);
            return Err(self.mark_closed());
        }
        Ok(())
    }

    /// Reads one line within `deadline`, without its terminator.
    ///
    /// EOF counts as a disconnect. A timeout is reported as such; the caller
    /// decides whether late data must be drained. Bytes that are not valid
    /// UTF-8 are replaced rather than rejected, so garbage is still a line.
    pub async fn read_line(&self, deadline: Duration) -> Result<String, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Disconnected);
        }

        let mut reader = self.reader.lock().await;
        let mut bytes = Vec::new();
        let mut limited = (&mut *reader).take(MAX_LINE_BYTES);

        match timeout(deadline, limited.read_until(b'\n', &mut bytes)).await {
            Ok(Ok(0)) => Err(self.mark_closed()),
            Ok(Ok(_)) => {
                let line = String::from_utf8_lossy(&bytes);
                Ok(line.trim_end_matches(['\r', '\n']).to_string())
            }
            Ok(Err(e)) => {
                debug!("Read failed: {}", e);
                Err(self.mark_closed())
            }
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Reads and throws away whatever arrives within `window`.
    ///
    /// Used right after an answer deadline so a late answer cannot be taken
    /// as the answer to the next question. Returns the number of bytes
    /// discarded.
    pub async fn drain_for(&self, window: Duration) -> Result<usize, ConnectionError> {
        let mut reader = self.reader.lock().await;
        let mut discarded = take_buffered(&mut reader);
        let mut buf = [0u8; 512];

        loop {
            match timeout(window, reader.get_mut().read(&mut buf)).await {
                Ok(Ok(0)) => return Err(self.mark_closed()),
                Ok(Ok(n)) => discarded += n,
                Ok(Err(_)) => return Err(self.mark_closed()),
                Err(_) => return Ok(discarded),
            }
        }
    }

    /// Throws away every byte already received but not yet read, without waiting
    pub async fn discard_pending(&self) -> Result<usize, ConnectionError> {
        let mut reader = self.reader.lock().await;
        let mut discarded = take_buffered(&mut reader);
        let mut buf = [0u8; 512];

        loop {
            match reader.get_ref().try_read(&mut buf) {
                Ok(0) => return Err(self.mark_closed()),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(discarded),
                Err(_) => return Err(self.mark_closed()),
            }
        }
    }

    /// Checks whether the peer has gone away without consuming any data.
    ///
    /// Skips the check while another task holds the reader (an answer is
    /// being collected); that task will see the closure itself.
    pub async fn check_alive(&self) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Disconnected);
        }

        let mut reader = match self.reader.try_lock() {
            Ok(reader) => reader,
            Err(_) => return Ok(()),
        };
        if !reader.buffer().is_empty() {
            return Ok(());
        }

        let mut buf = [0u8; 1];
        match timeout(Duration::from_millis(1), reader.get_mut().peek(&mut buf)).await {
            Ok(Ok(0)) => Err(self.mark_closed()),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(self.mark_closed()),
            Err(_) => Ok(()),
        }
    }
}

fn take_buffered(reader: &mut BufReader<OwnedReadHalf>) -> usize {
    let buffered = reader.buffer().len();
    reader.consume(buffered);
    buffered
}

/// A registered player: identity, connection and display name.
///
/// Cheap to clone; clones share the same connection. Equality is by address,
/// the session's identity while it is connected.
#[derive(Debug, Clone)]
pub struct Session {
    addr: SocketAddr,
    name: String,
    connection: Arc<Connection>,
}

impl Session {
    pub fn new(addr: SocketAddr, name: impl Into<String>, connection: Arc<Connection>) -> Self {
        Self {
            addr,
            name: name.into(),
            connection,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// True when both handles refer to the very same socket
    pub fn same_connection(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }

    pub async fn send(&self, text: &str) -> Result<(), ConnectionError> {
        self.connection.send(text).await
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Session {}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.addr)
    }
}
