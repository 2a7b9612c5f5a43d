//! Filestore Controller
//!
//! The single coordinator of the replicated file store. It owns three
//! pieces of mutable state - the membership table of connected store
//! nodes, the global file index, and the pending-operation tables for
//! in-flight stores and removes - and serializes every composite
//! check-then-mutate step through one coarse lock.
//!
//! ## How a write flows
//!
//! 1. A client sends `STORE <name> <size>`; the controller inserts the
//!    index entry in `StoreInProgress`, picks R target stores, arms a
//!    one-shot timer, and replies `STORE_TO <ports...>`.
//! 2. The client streams the bytes to each target store directly; every
//!    store acknowledges on its control channel with `STORE_ACK <name>`.
//! 3. When the ack set equals the target set the controller marks the
//!    entry `StoreComplete`, disarms the timer, and replies
//!    `STORE_COMPLETE` to the client. If the timer fires first, the index
//!    entry is dropped and the client hears nothing - it applies its own
//!    timeout.
//!
//! ## Connection roles
//!
//! Connections are anonymous until their first message: `JOIN` fixes the
//! connection as a store's control channel, any client command fixes it
//! as a client. The role is sticky for the connection's lifetime, and
//! acks are attributed from it rather than by searching the membership
//! table for the originating socket.

pub mod error;
pub mod index;
pub mod membership;
pub mod ops;
pub mod server;

pub use error::{ControllerError, Result};
pub use index::{FileEntry, FileIndex, FileState};
pub use membership::{MembershipTable, StoreHandle};
pub use server::{Controller, ControllerConfig, ControllerHandle};
