//! Line-framed connection plumbing.
//!
//! Every connection in the system has exactly one writer task that owns
//! the socket's write half and drains an unbounded channel of protocol
//! lines, appending the LF terminator. All other parties hold a cloneable
//! [`LineSender`]: the controller's membership table fans out `REMOVE`
//! commands through it, pending operations keep one as the client reply
//! channel, and a store node's client handlers push `STORE_ACK`s onto the
//! control channel without interleaving partial lines.
//!
//! Sends never block and never fail loudly; once the peer is gone the
//! channel is closed and `send` reports `false`, which callers treat the
//! same as any other transport loss on that connection.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cloneable handle for queueing protocol lines onto a connection.
#[derive(Debug, Clone)]
pub struct LineSender {
    tx: mpsc::UnboundedSender<String>,
}

impl LineSender {
    /// Queue one line (without terminator). Returns `false` when the
    /// writer task has exited.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.tx.send(line.into()).is_ok()
    }

    /// A sender whose lines land in a plain receiver instead of a socket.
    /// Used by tests and fakes standing in for a connection.
    pub fn channel() -> (LineSender, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LineSender { tx }, rx)
    }
}

/// Spawn the writer task for a connection's write half.
///
/// The task exits when every sender clone is dropped or the peer stops
/// accepting bytes; aborting the handle tears the writer down early.
pub fn spawn_line_writer<W>(writer: W) -> (LineSender, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });
    (LineSender { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn writer_task_appends_terminators() {
        let (local, remote) = duplex(256);
        let (sender, task) = spawn_line_writer(local);

        assert!(sender.send("STORE_ACK f"));
        assert!(sender.send("LIST"));
        drop(sender);

        let mut lines = BufReader::new(remote).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "STORE_ACK f");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "LIST");
        assert_eq!(lines.next_line().await.unwrap(), None);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn send_reports_closed_channel() {
        let (sender, rx) = LineSender::channel();
        drop(rx);
        assert!(!sender.send("LIST"));
    }
}
