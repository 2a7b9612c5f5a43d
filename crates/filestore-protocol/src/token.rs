//! Exact protocol token literals.
//!
//! Tokens are case-sensitive and compared verbatim. The rebalance tokens
//! are reserved: store nodes answer `REBALANCE` with a stub
//! `REBALANCE_COMPLETE` and the controller core neither sends nor expects
//! any of them.

pub const JOIN: &str = "JOIN";

pub const STORE: &str = "STORE";
pub const STORE_TO: &str = "STORE_TO";
pub const ACK: &str = "ACK";
pub const STORE_ACK: &str = "STORE_ACK";
pub const STORE_COMPLETE: &str = "STORE_COMPLETE";

pub const LIST: &str = "LIST";

pub const LOAD: &str = "LOAD";
pub const RELOAD: &str = "RELOAD";
pub const LOAD_FROM: &str = "LOAD_FROM";
pub const LOAD_DATA: &str = "LOAD_DATA";

pub const REMOVE: &str = "REMOVE";
pub const REMOVE_ACK: &str = "REMOVE_ACK";
pub const REMOVE_COMPLETE: &str = "REMOVE_COMPLETE";

pub const ERROR_NOT_ENOUGH_DSTORES: &str = "ERROR_NOT_ENOUGH_DSTORES";
pub const ERROR_FILE_ALREADY_EXISTS: &str = "ERROR_FILE_ALREADY_EXISTS";
pub const ERROR_FILE_DOES_NOT_EXIST: &str = "ERROR_FILE_DOES_NOT_EXIST";
pub const ERROR_LOAD: &str = "ERROR_LOAD";

// Reserved for the rebalancer.
pub const REBALANCE: &str = "REBALANCE";
pub const REBALANCE_STORE: &str = "REBALANCE_STORE";
pub const REBALANCE_COMPLETE: &str = "REBALANCE_COMPLETE";
