//! Background console input reader
//!
//! Lines typed by the player are queued as soon as they arrive, whether or
//! not a question is pending. The network loop takes them off the queue when
//! it needs an answer.

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns a task that forwards each line of `reader` to `queue`.
///
/// The task ends when `cancel` fires, the input reaches EOF or the queue's
/// receiver is dropped.
pub fn spawn_input_reader<R>(
    reader: R,
    queue: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Input reader cancelled");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if queue.send(line).is_err() {
                            debug!("Input queue closed");
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Console input reached EOF");
                        break;
                    }
                    Err(e) => {
                        warn!("Error reading console input: {}", e);
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_lines_are_queued_in_order() {
        let input = Builder::new().read(b"b\n").read(b"  c \nD\n").build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = spawn_input_reader(input, tx, CancellationToken::new());
        task.await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(rx.recv().await.as_deref(), Some("  c "));
        assert_eq!(rx.recv().await.as_deref(), Some("D"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancel_stops_blocked_reader() {
        let input = Builder::new()
            .read(b"A\n")
            .wait(Duration::from_secs(60))
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = spawn_input_reader(input, tx, cancel.clone());
        assert_eq!(rx.recv().await.as_deref(), Some("A"));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_stops_when_queue_dropped() {
        let input = Builder::new().read(b"A\nB\n").build();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let task = spawn_input_reader(input, tx, CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
