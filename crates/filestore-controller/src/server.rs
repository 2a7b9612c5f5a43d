//! Connection acceptor and operation coordinator.
//!
//! One task accepts connections; each connection gets a reader loop plus
//! a dedicated writer task (see `filestore_protocol::framed`). All
//! mutable state - membership, file index, pending operations - sits
//! behind a single `Mutex` that is only ever held across synchronous
//! sections, never across an await. Replies and fan-out commands are
//! unbounded-channel sends, so holding the lock while queueing them
//! cannot block.
//!
//! ## Completion vs. timeout
//!
//! Every pending operation owns a one-shot timer task. Completion and
//! expiry both funnel through the state lock, and removing the operation
//! from its table is the linearization point: whichever side removes it
//! first wins, the other finds nothing to do. Timers additionally check
//! the operation id so that a timer surviving an abort cannot touch a
//! newer operation reusing the same filename.

use crate::error::{ControllerError, Result};
use crate::index::{FileIndex, FileState};
use crate::membership::{MembershipTable, StoreHandle};
use crate::ops::PendingOp;
use filestore_protocol::{spawn_line_writer, token, wire, LineSender, ProtocolError, Request};
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Controller startup parameters.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// R: the number of stores every file is replicated to.
    pub replication_factor: usize,
    /// Deadline for in-flight store and remove operations.
    pub timeout: Duration,
    /// Retained for interface compatibility; the core never rebalances.
    pub rebalance_period: Duration,
}

/// Everything the coordinator mutates, behind one lock.
#[derive(Debug, Default)]
struct State {
    membership: MembershipTable,
    index: FileIndex,
    store_ops: HashMap<String, PendingOp>,
    remove_ops: HashMap<String, PendingOp>,
}

/// The coordinator. Shared across connection tasks via `Arc`.
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    state: Mutex<State>,
    next_conn_id: AtomicU64,
    next_op_id: AtomicU64,
}

/// Handle to a running controller, as returned by [`Controller::start`].
#[derive(Debug)]
pub struct ControllerHandle {
    local_addr: SocketAddr,
    controller: Arc<Controller>,
    accept_task: JoinHandle<()>,
}

impl ControllerHandle {
    /// The bound listening address (useful with port 0 in tests).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of stores currently in the membership table.
    pub fn member_count(&self) -> usize {
        self.controller.state.lock().unwrap().membership.len()
    }

    /// Stop accepting connections. Already-open connections run until
    /// their peers disconnect.
    pub fn shutdown(self) {
        self.accept_task.abort();
    }
}

/// Per-connection role, fixed by the first message and sticky for the
/// connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Unknown,
    Client,
    Store(u16),
}

/// Per-connection record: identity, sticky role, and the line writer.
#[derive(Debug)]
pub(crate) struct Peer {
    pub(crate) conn_id: u64,
    pub(crate) role: Role,
    pub(crate) sender: LineSender,
}

impl Peer {
    fn send(&self, line: impl Into<String>) {
        // A failed send means the connection is gone; its reader loop
        // will observe that and clean up.
        let _ = self.sender.send(line);
    }
}

enum LoadKind {
    Load,
    Reload,
}

impl Controller {
    fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
            next_conn_id: AtomicU64::new(0),
            next_op_id: AtomicU64::new(0),
        }
    }

    /// Bind `addr` and start serving. Returns once the listener is bound.
    pub async fn start(config: ControllerConfig, addr: impl ToSocketAddrs) -> Result<ControllerHandle> {
        let listener = TcpListener::bind(addr).await.map_err(ControllerError::Bind)?;
        let local_addr = listener.local_addr()?;
        let controller = Arc::new(Controller::new(config));
        info!(
            %local_addr,
            r = controller.config.replication_factor,
            timeout_ms = controller.config.timeout.as_millis() as u64,
            "controller listening"
        );
        let accept_task = tokio::spawn(accept_loop(Arc::clone(&controller), listener));
        Ok(ControllerHandle {
            local_addr,
            controller,
            accept_task,
        })
    }

    /// Route one parsed line from a connection.
    pub(crate) fn handle_request(self: &Arc<Self>, peer: &mut Peer, request: Request) {
        // Store events first: they are attributed from the connection
        // role and never admission-gated.
        match request {
            Request::Join { port } => return self.handle_join(peer, port),
            Request::StoreAck { name } => return self.handle_store_ack(peer, &name),
            Request::RemoveAck { name } => return self.handle_remove_ack(peer, &name),
            Request::RemoveMissing { name } => return self.handle_remove_missing(peer, &name),
            _ => {}
        }

        // Everything else is a client command; the role becomes sticky.
        debug_assert!(request.is_client_command());
        if let Role::Store(port) = peer.role {
            warn!(port, "ignoring client command on a store control channel");
            return;
        }
        peer.role = Role::Client;

        match request {
            Request::Store { name, size } => self.client_store(peer, name, size),
            Request::List => self.client_list(peer),
            Request::Load { name } => self.client_load(peer, &name, LoadKind::Load),
            Request::Reload { name } => self.client_load(peer, &name, LoadKind::Reload),
            Request::Remove { name } => self.client_remove(peer, &name),
            Request::Join { .. }
            | Request::StoreAck { .. }
            | Request::RemoveAck { .. }
            | Request::RemoveMissing { .. } => {}
        }
    }

    fn handle_join(&self, peer: &mut Peer, port: u16) {
        match peer.role {
            Role::Unknown => {}
            Role::Client => {
                warn!(conn = peer.conn_id, "ignoring JOIN on a client connection");
                return;
            }
            Role::Store(existing) => {
                warn!(existing, port, "ignoring repeated JOIN on a store connection");
                return;
            }
        }
        peer.role = Role::Store(port);

        let mut state = self.state.lock().unwrap();
        let replaced = state.membership.join(
            port,
            StoreHandle {
                conn_id: peer.conn_id,
                sender: peer.sender.clone(),
            },
        );
        let members = state.membership.len();
        drop(state);

        if replaced.is_some() {
            info!(port, "store rejoined; replaced stale control channel");
        }
        info!(port, members, "store joined");
        if members == self.config.replication_factor {
            info!(
                r = self.config.replication_factor,
                "replication factor reached; serving client requests"
            );
        }
    }

    fn client_store(self: &Arc<Self>, peer: &Peer, name: String, size: u64) {
        let mut state = self.state.lock().unwrap();
        let Some(targets) = state.membership.select_targets(self.config.replication_factor) else {
            drop(state);
            peer.send(token::ERROR_NOT_ENOUGH_DSTORES);
            return;
        };
        if !state.index.begin_store(&name, size) {
            drop(state);
            debug!(file = %name, "store rejected: name already indexed");
            peer.send(token::ERROR_FILE_ALREADY_EXISTS);
            return;
        }

        let op_id = self.next_op_id.fetch_add(1, Ordering::Relaxed);
        let timer = tokio::spawn(Self::store_timeout(
            Arc::clone(self),
            name.clone(),
            op_id,
            self.config.timeout,
        ))
        .abort_handle();
        state.store_ops.insert(
            name.clone(),
            PendingOp::new(op_id, targets.clone(), peer.sender.clone(), timer),
        );
        drop(state);

        let ports: Vec<u16> = targets.into_iter().collect();
        info!(file = %name, size, ?ports, "store accepted");
        peer.send(wire::store_to(&ports));
    }

    async fn store_timeout(controller: Arc<Self>, name: String, op_id: u64, timeout: Duration) {
        tokio::time::sleep(timeout).await;
        let mut state = controller.state.lock().unwrap();
        if state.store_ops.get(&name).map(|op| op.id) == Some(op_id) {
            state.store_ops.remove(&name);
            state.index.drop_entry(&name);
            drop(state);
            // The client hears nothing; it applies its own timeout.
            warn!(file = %name, "store timed out before all acks; index entry dropped");
        }
    }

    fn handle_store_ack(&self, peer: &Peer, name: &str) {
        let Role::Store(port) = peer.role else {
            debug!(conn = peer.conn_id, file = %name, "ignoring STORE_ACK from a non-store connection");
            return;
        };

        let mut state = self.state.lock().unwrap();
        let complete = match state.store_ops.get_mut(name) {
            None => {
                debug!(port, file = %name, "STORE_ACK without an active store operation");
                return;
            }
            Some(op) => {
                if !op.record_ack(port) {
                    debug!(port, file = %name, "STORE_ACK from outside the target set");
                    return;
                }
                debug!(port, file = %name, acked = op.acked.len(), targets = op.targets.len(), "store ack recorded");
                op.is_complete()
            }
        };
        if !complete {
            return;
        }
        if let Some(op) = state.store_ops.remove(name) {
            op.timer.abort();
            state.index.complete_store(name, op.targets);
            drop(state);
            op.client.send(token::STORE_COMPLETE);
            info!(file = %name, "store complete");
        }
    }

    fn client_list(&self, peer: &Peer) {
        let state = self.state.lock().unwrap();
        if state.membership.len() < self.config.replication_factor {
            drop(state);
            peer.send(token::ERROR_NOT_ENOUGH_DSTORES);
            return;
        }
        let line = wire::list(state.index.completed());
        drop(state);
        peer.send(line);
    }

    fn client_load(&self, peer: &Peer, name: &str, kind: LoadKind) {
        let state = self.state.lock().unwrap();
        if state.membership.len() < self.config.replication_factor {
            drop(state);
            peer.send(token::ERROR_NOT_ENOUGH_DSTORES);
            return;
        }
        let (size, candidates) = match state.index.get(name) {
            Some(entry) if entry.state == FileState::StoreComplete => {
                (entry.size, state.membership.active(&entry.replicas))
            }
            _ => {
                drop(state);
                peer.send(token::ERROR_FILE_DOES_NOT_EXIST);
                return;
            }
        };
        drop(state);

        match candidates.iter().copied().choose(&mut rand::thread_rng()) {
            Some(port) => {
                debug!(file = %name, port, "directing load");
                peer.send(wire::load_from(port, size));
            }
            None => {
                // Every replica holder is gone; only a rebalance can
                // bring the file back.
                warn!(file = %name, "no connected replica for load");
                peer.send(match kind {
                    LoadKind::Load => token::ERROR_FILE_DOES_NOT_EXIST,
                    LoadKind::Reload => token::ERROR_LOAD,
                });
            }
        }
    }

    fn client_remove(self: &Arc<Self>, peer: &Peer, name: &str) {
        let mut state = self.state.lock().unwrap();
        if state.membership.len() < self.config.replication_factor {
            drop(state);
            peer.send(token::ERROR_NOT_ENOUGH_DSTORES);
            return;
        }
        let replicas = match state.index.begin_remove(name) {
            Some(entry) => entry.replicas.clone(),
            None => {
                drop(state);
                peer.send(token::ERROR_FILE_DOES_NOT_EXIST);
                return;
            }
        };
        let active = state.membership.active(&replicas);
        if active.is_empty() {
            // The entry stays remove-in-progress; there is nobody left
            // to confirm a deletion.
            drop(state);
            warn!(file = %name, "remove with no connected replica holders");
            peer.send(token::ERROR_FILE_DOES_NOT_EXIST);
            return;
        }

        let op_id = self.next_op_id.fetch_add(1, Ordering::Relaxed);
        let timer = tokio::spawn(Self::remove_timeout(
            Arc::clone(self),
            name.to_string(),
            op_id,
            self.config.timeout,
        ))
        .abort_handle();
        state.remove_ops.insert(
            name.to_string(),
            PendingOp::new(op_id, active.clone(), peer.sender.clone(), timer),
        );
        for port in &active {
            if !state.membership.send(*port, wire::remove(name)) {
                warn!(port, file = %name, "failed to queue REMOVE to store");
            }
        }
        drop(state);
        info!(file = %name, targets = ?active, "remove started");
    }

    async fn remove_timeout(controller: Arc<Self>, name: String, op_id: u64, timeout: Duration) {
        tokio::time::sleep(timeout).await;
        let mut state = controller.state.lock().unwrap();
        if state.remove_ops.get(&name).map(|op| op.id) == Some(op_id) {
            state.remove_ops.remove(&name);
            drop(state);
            // The index entry stays remove-in-progress until a
            // rebalance converges it.
            warn!(file = %name, "remove timed out before all acks");
        }
    }

    fn handle_remove_ack(&self, peer: &Peer, name: &str) {
        let Role::Store(port) = peer.role else {
            debug!(conn = peer.conn_id, file = %name, "ignoring REMOVE_ACK from a non-store connection");
            return;
        };

        let mut state = self.state.lock().unwrap();
        let complete = match state.remove_ops.get_mut(name) {
            None => {
                debug!(port, file = %name, "REMOVE_ACK without an active remove operation");
                return;
            }
            Some(op) => {
                if !op.record_ack(port) {
                    debug!(port, file = %name, "REMOVE_ACK from outside the target set");
                    return;
                }
                debug!(port, file = %name, acked = op.acked.len(), targets = op.targets.len(), "remove ack recorded");
                op.is_complete()
            }
        };
        if !complete {
            return;
        }
        if let Some(op) = state.remove_ops.remove(name) {
            op.timer.abort();
            state.index.drop_entry(name);
            drop(state);
            op.client.send(token::REMOVE_COMPLETE);
            info!(file = %name, "remove complete");
        }
    }

    fn handle_remove_missing(&self, peer: &Peer, name: &str) {
        match peer.role {
            // Not counted toward completion: a store that lost the file
            // would otherwise fake a successful deletion. The operation
            // runs into its timeout instead.
            Role::Store(port) => {
                warn!(port, file = %name, "store reported missing file during remove")
            }
            _ => debug!(conn = peer.conn_id, file = %name, "ignoring stray remove-missing report"),
        }
    }

    /// Called by a connection task when a store's control channel closes.
    pub(crate) fn store_disconnected(&self, port: u16, conn_id: u64) {
        let mut state = self.state.lock().unwrap();
        if state.membership.remove_if_conn(port, conn_id) {
            let members = state.membership.len();
            drop(state);
            // Pending operations are left to their timers: a departed
            // store cannot ack, so incomplete ones expire naturally.
            info!(port, members, "store disconnected");
        }
    }
}

async fn accept_loop(controller: Arc<Controller>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                debug!(%peer_addr, "accepted connection");
                let controller = Arc::clone(&controller);
                tokio::spawn(handle_connection(controller, socket));
            }
            Err(err) => warn!(%err, "accept failed"),
        }
    }
}

async fn handle_connection(controller: Arc<Controller>, socket: TcpStream) {
    let conn_id = controller.next_conn_id.fetch_add(1, Ordering::Relaxed);
    let (read_half, write_half) = socket.into_split();
    let (sender, writer_task) = spawn_line_writer(write_half);
    let mut peer = Peer {
        conn_id,
        role: Role::Unknown,
        sender,
    };

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match Request::parse(&line) {
                Ok(request) => controller.handle_request(&mut peer, request),
                Err(ProtocolError::UnknownCommand(command)) => {
                    debug!(conn_id, %command, "ignoring unknown command")
                }
                Err(err) => warn!(conn_id, %err, "ignoring malformed message"),
            },
            Ok(None) => break,
            Err(err) => {
                debug!(conn_id, %err, "connection read failed");
                break;
            }
        }
    }

    if let Role::Store(port) = peer.role {
        controller.store_disconnected(port, conn_id);
    }
    writer_task.abort();
}
