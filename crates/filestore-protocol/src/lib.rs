//! Filestore Wire Protocol
//!
//! This crate defines the control protocol shared by the controller, the
//! store nodes, and clients. All control traffic is ASCII lines terminated
//! by LF, with tokens separated by single spaces; bulk file bytes travel
//! unframed on a store's client-facing port, with the length declared by
//! the preceding `STORE` message.
//!
//! ## Message Directions
//!
//! The same listening socket can receive messages from different kinds of
//! peers, so the crate exposes one parse enum per inbound direction:
//!
//! - [`Request`]: everything a controller connection may carry - client
//!   commands (`STORE`, `LIST`, `LOAD`, `RELOAD`, `REMOVE`) and store
//!   events (`JOIN`, `STORE_ACK`, `REMOVE_ACK`, remove failures)
//! - [`NodeCommand`]: controller-issued commands on a store's control
//!   channel (`LIST`, `REMOVE`, the reserved `REBALANCE`)
//! - [`ClientCommand`]: client requests on a store's data port
//!   (`STORE`, `LOAD_DATA`)
//!
//! Outbound lines are built with the encoder functions in [`wire`], which
//! never append the trailing newline - the transport layer owns framing.
//!
//! ## Example
//!
//! ```
//! use filestore_protocol::{Request, wire};
//!
//! let req = Request::parse("STORE report.pdf 4096").unwrap();
//! assert!(matches!(req, Request::Store { .. }));
//!
//! assert_eq!(wire::store_to(&[8001, 8002]), "STORE_TO 8001 8002");
//! ```

pub mod error;
pub mod framed;
pub mod message;
pub mod token;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use framed::{spawn_line_writer, LineSender};
pub use message::{ClientCommand, NodeCommand, Request};
