//! Store node runtime.
//!
//! `StoreNode::start` wires up the three halves of a node: the freshly
//! reset file folder, the control channel to the controller (JOIN plus
//! the command loop), and the client-facing listener for bulk transfers.
//! All outbound control lines - the initial `JOIN`, command replies, and
//! the `STORE_ACK`s raised by client handlers - go through one writer
//! task so lines never interleave.

use crate::error::{NodeError, Result};
use crate::storage::FileFolder;
use filestore_protocol::{spawn_line_writer, token, wire, ClientCommand, LineSender, NodeCommand, ProtocolError};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Store node startup parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Client-facing port. 0 binds an ephemeral port; the advertised
    /// `JOIN` port is always the one actually bound.
    pub port: u16,
    /// Controller address, e.g. `127.0.0.1:7000`.
    pub controller_addr: String,
    /// Polling interval for the control channel read.
    pub timeout: Duration,
    /// Directory holding the stored files.
    pub folder: PathBuf,
}

/// A running store node.
#[derive(Debug)]
pub struct StoreNode {
    port: u16,
    control_task: JoinHandle<()>,
    control_writer: JoinHandle<()>,
    accept_task: JoinHandle<()>,
}

impl StoreNode {
    /// Reset the folder, join the controller, and start serving.
    pub async fn start(config: StoreConfig) -> Result<StoreNode> {
        let folder = FileFolder::new(&config.folder);
        folder.reset().await.map_err(NodeError::Folder)?;
        info!(folder = %config.folder.display(), "file folder ready");

        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(NodeError::Bind)?;
        let port = listener
            .local_addr()
            .map_err(NodeError::Bind)?
            .port();

        let control_sock = TcpStream::connect(&config.controller_addr)
            .await
            .map_err(NodeError::Controller)?;
        let (control_read, control_write) = control_sock.into_split();
        let (control, control_writer) = spawn_line_writer(control_write);
        control.send(wire::join(port));
        info!(port, controller = %config.controller_addr, "joined controller");

        let control_task = tokio::spawn(control_loop(
            control_read,
            control.clone(),
            folder.clone(),
            config.timeout,
        ));
        let accept_task = tokio::spawn(accept_clients(listener, control, folder));

        Ok(StoreNode {
            port,
            control_task,
            control_writer,
            accept_task,
        })
    }

    /// The port clients connect to; also the node's membership key.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop serving and close the control channel, which makes the
    /// controller drop this node from its membership table.
    pub fn shutdown(self) {
        self.accept_task.abort();
        self.control_task.abort();
        self.control_writer.abort();
    }
}

/// Read controller commands until the channel closes. The read is
/// bounded by `poll` purely as a periodic wakeup; an elapsed interval
/// carries no command.
async fn control_loop<R>(reader: R, control: LineSender, folder: FileFolder, poll: Duration)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match tokio::time::timeout(poll, lines.next_line()).await {
            Err(_) => continue,
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                info!("controller closed the control channel");
                break;
            }
            Ok(Err(err)) => {
                warn!(%err, "control channel read failed");
                break;
            }
        };

        match NodeCommand::parse(&line) {
            Ok(NodeCommand::List) => {
                let names = folder.list().await.unwrap_or_else(|err| {
                    warn!(%err, "listing folder failed");
                    Vec::new()
                });
                control.send(wire::list(&names));
            }
            Ok(NodeCommand::Remove { name }) => match folder.remove(&name).await {
                Ok(true) => {
                    info!(file = %name, "removed");
                    control.send(wire::remove_ack(&name));
                }
                Ok(false) => {
                    warn!(file = %name, "remove for a file not held");
                    control.send(wire::file_missing(&name));
                }
                Err(err) => warn!(file = %name, %err, "remove failed"),
            },
            Ok(NodeCommand::Rebalance) => {
                // Rebalancing is not implemented; answer the stub so the
                // controller is not left waiting.
                control.send(token::REBALANCE_COMPLETE);
            }
            Err(ProtocolError::UnknownCommand(command)) => {
                debug!(%command, "ignoring unknown controller command")
            }
            Err(err) => warn!(%err, line, "ignoring malformed controller command"),
        }
    }
}

async fn accept_clients(listener: TcpListener, control: LineSender, folder: FileFolder) {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                debug!(%peer_addr, "client connected");
                let control = control.clone();
                let folder = folder.clone();
                tokio::spawn(handle_client(socket, control, folder));
            }
            Err(err) => warn!(%err, "accept failed"),
        }
    }
}

/// Serve one client connection, which carries exactly one request.
async fn handle_client<S>(stream: S, control: LineSender, folder: FileFolder)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read, write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => return,
        Ok(_) => {}
        Err(err) => {
            debug!(%err, "client read failed");
            return;
        }
    }
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

    match ClientCommand::parse(line) {
        Ok(ClientCommand::Store { name, size }) => {
            receive_store(reader, write, control, folder, name, size).await
        }
        Ok(ClientCommand::LoadData { name }) => serve_load(write, folder, name).await,
        Err(err) => warn!(%err, line, "ignoring malformed client request"),
    }
}

/// `STORE` leg on the data port: ack, receive exactly `size` raw bytes,
/// persist, then notify the controller. A short read or write failure
/// aborts without an ack - the controller's operation timeout handles
/// the rest.
async fn receive_store<R, W>(
    mut reader: R,
    mut write: W,
    control: LineSender,
    folder: FileFolder,
    name: String,
    size: u64,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Ok(size) = usize::try_from(size) else {
        warn!(file = %name, size, "declared size not addressable");
        return;
    };

    let ack = format!("{}\n", token::ACK);
    if write.write_all(ack.as_bytes()).await.is_err() {
        return;
    }

    let mut bytes = vec![0u8; size];
    if let Err(err) = reader.read_exact(&mut bytes).await {
        warn!(file = %name, %err, "bulk read failed; no ack sent");
        return;
    }
    if let Err(err) = folder.write(&name, &bytes).await {
        error!(file = %name, %err, "persisting file failed; no ack sent");
        return;
    }

    info!(file = %name, size, "stored");
    control.send(wire::store_ack(&name));
}

/// `LOAD_DATA` leg: stream the file and close. A missing file closes
/// the connection without a single reply byte; the client treats that
/// as its cue to `RELOAD`.
async fn serve_load<W>(mut write: W, folder: FileFolder, name: String)
where
    W: AsyncWrite + Unpin,
{
    let mut file = match folder.open(&name).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(file = %name, "load for a file not held");
            return;
        }
        Err(err) => {
            warn!(file = %name, %err, "opening file failed");
            return;
        }
    };

    match tokio::io::copy(&mut file, &mut write).await {
        Ok(sent) => debug!(file = %name, sent, "served load"),
        Err(err) => debug!(file = %name, %err, "client went away during load"),
    }
    let _ = write.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn folder() -> (FileFolder, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileFolder::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn store_request_acks_then_persists_then_notifies() {
        let (folder, _dir) = folder();
        let (control, mut control_rx) = LineSender::channel();
        let (client, server) = duplex(1024);

        let handler = tokio::spawn(handle_client(server, control, folder.clone()));

        let (read, mut write) = tokio::io::split(client);
        let mut reader = BufReader::new(read);

        write.write_all(b"STORE hello.txt 5\n").await.unwrap();
        let mut ack = String::new();
        reader.read_line(&mut ack).await.unwrap();
        assert_eq!(ack, "ACK\n");

        write.write_all(b"hello").await.unwrap();
        handler.await.unwrap();

        assert_eq!(control_rx.recv().await.unwrap(), "STORE_ACK hello.txt");
        let stored = tokio::fs::read(folder.root().join("hello.txt")).await.unwrap();
        assert_eq!(stored, b"hello");
    }

    #[tokio::test]
    async fn short_bulk_read_sends_no_ack() {
        let (folder, _dir) = folder();
        let (control, mut control_rx) = LineSender::channel();
        let (client, server) = duplex(1024);

        let handler = tokio::spawn(handle_client(server, control, folder.clone()));

        let (read, mut write) = tokio::io::split(client);
        let mut reader = BufReader::new(read);

        write.write_all(b"STORE partial 10\n").await.unwrap();
        let mut ack = String::new();
        reader.read_line(&mut ack).await.unwrap();
        assert_eq!(ack, "ACK\n");

        // Deliver three of the declared ten bytes, then hang up.
        write.write_all(b"abc").await.unwrap();
        drop(write);
        drop(reader);
        handler.await.unwrap();

        assert!(control_rx.try_recv().is_err());
        assert!(folder.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_data_streams_the_file_then_closes() {
        let (folder, _dir) = folder();
        folder.write("f", b"file content").await.unwrap();
        let (control, _control_rx) = LineSender::channel();
        let (client, server) = duplex(1024);

        let handler = tokio::spawn(handle_client(server, control, folder));

        let (read, mut write) = tokio::io::split(client);
        write.write_all(b"LOAD_DATA f\n").await.unwrap();

        let mut bytes = Vec::new();
        let mut read = read;
        read.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, b"file content");
        handler.await.unwrap();
    }

    #[tokio::test]
    async fn load_data_for_a_missing_file_closes_without_bytes() {
        let (folder, _dir) = folder();
        let (control, _control_rx) = LineSender::channel();
        let (client, server) = duplex(1024);

        let handler = tokio::spawn(handle_client(server, control, folder));

        let (read, mut write) = tokio::io::split(client);
        write.write_all(b"LOAD_DATA ghost\n").await.unwrap();

        let mut bytes = Vec::new();
        let mut read = read;
        read.read_to_end(&mut bytes).await.unwrap();
        assert!(bytes.is_empty());
        handler.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_request_closes_the_connection() {
        let (folder, _dir) = folder();
        let (control, mut control_rx) = LineSender::channel();
        let (client, server) = duplex(1024);

        let handler = tokio::spawn(handle_client(server, control, folder));

        let (read, mut write) = tokio::io::split(client);
        write.write_all(b"NONSENSE\n").await.unwrap();

        let mut bytes = Vec::new();
        let mut read = read;
        read.read_to_end(&mut bytes).await.unwrap();
        assert!(bytes.is_empty());
        handler.await.unwrap();
        assert!(control_rx.try_recv().is_err());
    }
}
