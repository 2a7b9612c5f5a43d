//! Protocol parse errors.
//!
//! A parse failure never tears down a connection by itself: handlers log
//! the offending line and keep reading. `UnknownCommand` is distinguished
//! from the malformed variants because an unknown token on a shared
//! channel is expected traffic (e.g. reserved rebalance messages) while a
//! malformed known command usually indicates a buggy peer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed {command} message: {line}")]
    Malformed { command: &'static str, line: String },

    #[error("invalid port in {command} message: {value}")]
    InvalidPort { command: &'static str, value: String },

    #[error("invalid size in {command} message: {value}")]
    InvalidSize { command: &'static str, value: String },

    #[error("trailing tokens in message: {line}")]
    TrailingTokens { line: String },

    #[error("empty message")]
    Empty,
}
