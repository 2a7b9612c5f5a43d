//! Filestore Store Node
//!
//! A store node owns a flat directory of files and plays two roles at
//! once:
//!
//! - **Bulk server for clients.** Each client connection carries exactly
//!   one request: `STORE` (ack, then receive the declared number of raw
//!   bytes) or `LOAD_DATA` (stream the file's bytes back, or close the
//!   connection silently when the file is missing).
//! - **Command executor for the controller.** A single control channel
//!   carries `JOIN` at startup, then receives `LIST`/`REMOVE` commands
//!   and carries back `STORE_ACK`/`REMOVE_ACK` notifications.
//!
//! The node is deliberately dumb: it never talks to other stores and
//! holds no metadata beyond the directory contents. The directory is
//! wiped at startup - the controller's index is volatile, so surviving
//! files from an earlier run would be unreachable anyway.

pub mod error;
pub mod node;
pub mod storage;

pub use error::{NodeError, Result};
pub use node::{StoreConfig, StoreNode};
pub use storage::FileFolder;
