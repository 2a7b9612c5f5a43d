//! Store membership table.
//!
//! The controller's live view of connected store nodes, keyed by the
//! client-facing port each store advertised in its `JOIN`. The ordered
//! map makes the placement policy deterministic: selecting targets for a
//! new file takes the first R ports in ascending order, which tests can
//! predict without caring about hash seeding.
//!
//! Each entry carries the [`LineSender`] of the store's control channel,
//! so any task holding the state lock can fan commands out to replicas
//! without touching the per-connection tasks. Entries also record the id
//! of the connection that created them: a store that reconnects on the
//! same port replaces its entry, and the stale connection's exit must not
//! evict the replacement.

use filestore_protocol::LineSender;
use std::collections::{BTreeMap, BTreeSet};

/// Handle to one connected store's control channel.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    /// Id of the controller connection this handle belongs to.
    pub conn_id: u64,
    /// Writer for framed lines to the store.
    pub sender: LineSender,
}

#[derive(Debug, Default)]
pub struct MembershipTable {
    stores: BTreeMap<u16, StoreHandle>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.stores.contains_key(&port)
    }

    /// Register a store, replacing any previous registration on the same
    /// port. Returns the replaced handle, if any.
    pub fn join(&mut self, port: u16, handle: StoreHandle) -> Option<StoreHandle> {
        self.stores.insert(port, handle)
    }

    /// Remove the entry for `port` only if it still belongs to the
    /// connection identified by `conn_id`. Returns whether an entry was
    /// removed.
    pub fn remove_if_conn(&mut self, port: u16, conn_id: u64) -> bool {
        match self.stores.get(&port) {
            Some(handle) if handle.conn_id == conn_id => {
                self.stores.remove(&port);
                true
            }
            _ => false,
        }
    }

    /// Placement policy: the first `r` ports in ascending order, or
    /// `None` when fewer than `r` stores are connected.
    pub fn select_targets(&self, r: usize) -> Option<BTreeSet<u16>> {
        if self.stores.len() < r {
            return None;
        }
        Some(self.stores.keys().take(r).copied().collect())
    }

    /// The subset of `ports` that is currently connected.
    pub fn active(&self, ports: &BTreeSet<u16>) -> BTreeSet<u16> {
        ports
            .iter()
            .filter(|port| self.stores.contains_key(port))
            .copied()
            .collect()
    }

    /// Queue a line on a store's control channel. Returns `false` when
    /// the port is unknown or its writer has exited.
    pub fn send(&self, port: u16, line: impl Into<String>) -> bool {
        match self.stores.get(&port) {
            Some(handle) => handle.sender.send(line),
            None => false,
        }
    }
}
