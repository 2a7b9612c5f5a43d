//! Store node integration tests.
//!
//! Each test boots a real node on an ephemeral port against a fake
//! controller socket, then drives both sides of the protocol: the
//! control channel the node joined with, and raw client connections on
//! its data port.

use filestore_node::{StoreConfig, StoreNode};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

/// The controller end of a node's control channel.
struct Control {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Control {
    async fn recv(&mut self) -> String {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a control line")
            .unwrap()
            .expect("control channel closed")
    }

    async fn send(&mut self, line: &str) {
        self.write
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }
}

/// Boot a node against a fake controller and consume its JOIN.
async fn start_node(dir: &tempfile::TempDir) -> (StoreNode, Control) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let controller_addr = listener.local_addr().unwrap().to_string();

    let node = StoreNode::start(StoreConfig {
        port: 0,
        controller_addr,
        timeout: Duration::from_millis(100),
        folder: dir.path().to_path_buf(),
    })
    .await
    .unwrap();

    let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let (read, write) = socket.into_split();
    let mut control = Control {
        lines: BufReader::new(read).lines(),
        write,
    };
    assert_eq!(control.recv().await, format!("JOIN {}", node.port()));
    (node, control)
}

async fn connect(port: u16) -> TcpStream {
    TcpStream::connect(("127.0.0.1", port)).await.unwrap()
}

/// Run the client side of one STORE request against the node.
async fn store_file(port: u16, name: &str, bytes: &[u8]) {
    let socket = connect(port).await;
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    write
        .write_all(format!("STORE {} {}\n", name, bytes.len()).as_bytes())
        .await
        .unwrap();
    let mut ack = String::new();
    timeout(WAIT, reader.read_line(&mut ack)).await.unwrap().unwrap();
    assert_eq!(ack, "ACK\n");

    write.write_all(bytes).await.unwrap();
}

#[tokio::test]
async fn store_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (node, mut control) = start_node(&dir).await;

    store_file(node.port(), "hello.txt", b"hello").await;
    assert_eq!(control.recv().await, "STORE_ACK hello.txt");

    let mut socket = connect(node.port()).await;
    socket.write_all(b"LOAD_DATA hello.txt\n").await.unwrap();
    let mut bytes = Vec::new();
    timeout(WAIT, socket.read_to_end(&mut bytes))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bytes, b"hello");

    node.shutdown();
}

#[tokio::test]
async fn load_data_for_a_missing_file_closes_without_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _control) = start_node(&dir).await;

    let mut socket = connect(node.port()).await;
    socket.write_all(b"LOAD_DATA ghost\n").await.unwrap();
    let mut bytes = Vec::new();
    timeout(WAIT, socket.read_to_end(&mut bytes))
        .await
        .unwrap()
        .unwrap();
    assert!(bytes.is_empty());

    node.shutdown();
}

#[tokio::test]
async fn control_list_reflects_the_folder() {
    let dir = tempfile::tempdir().unwrap();
    let (node, mut control) = start_node(&dir).await;

    control.send("LIST").await;
    assert_eq!(control.recv().await, "LIST");

    store_file(node.port(), "a", b"1").await;
    assert_eq!(control.recv().await, "STORE_ACK a");

    control.send("LIST").await;
    assert_eq!(control.recv().await, "LIST a");

    node.shutdown();
}

#[tokio::test]
async fn control_remove_acks_and_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let (node, mut control) = start_node(&dir).await;

    store_file(node.port(), "doomed", b"bytes").await;
    assert_eq!(control.recv().await, "STORE_ACK doomed");

    control.send("REMOVE doomed").await;
    assert_eq!(control.recv().await, "REMOVE_ACK doomed");
    assert!(!dir.path().join("doomed").exists());

    // A second remove finds nothing.
    control.send("REMOVE doomed").await;
    assert_eq!(control.recv().await, "ERROR_FILE_DOES_NOT_EXIST doomed");

    node.shutdown();
}

#[tokio::test]
async fn rebalance_gets_the_stub_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (node, mut control) = start_node(&dir).await;

    control.send("REBALANCE").await;
    assert_eq!(control.recv().await, "REBALANCE_COMPLETE");

    node.shutdown();
}

#[tokio::test]
async fn startup_wipes_leftover_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stale-1"), b"old").unwrap();
    std::fs::write(dir.path().join("stale-2"), b"older").unwrap();

    let (node, mut control) = start_node(&dir).await;

    control.send("LIST").await;
    assert_eq!(control.recv().await, "LIST");

    node.shutdown();
}

#[tokio::test]
async fn malformed_control_lines_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (node, mut control) = start_node(&dir).await;

    control.send("GIBBERISH one two").await;
    control.send("REMOVE").await; // missing the name

    // The loop is still alive and answering.
    control.send("LIST").await;
    assert_eq!(control.recv().await, "LIST");

    node.shutdown();
}
