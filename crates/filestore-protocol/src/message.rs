//! Typed inbound messages.
//!
//! One enum per inbound direction, each with a `parse` that takes a single
//! line (without its terminator) and returns the typed message or a
//! [`ProtocolError`]. Parsing is strict: tokens are separated by exactly
//! one space, names are opaque non-empty tokens, ports are non-zero `u16`,
//! sizes are `u64`.

use crate::error::{ProtocolError, Result};
use crate::token;

/// Everything a controller-side connection may receive.
///
/// The controller decides what is admissible from the connection's sticky
/// role; the parser only cares about shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `JOIN <port>` - a store advertising its client-facing port.
    Join { port: u16 },
    /// `STORE <name> <size>` - client asks for placement.
    Store { name: String, size: u64 },
    /// `LIST` - client asks for the completed-file listing.
    List,
    /// `LOAD <name>`
    Load { name: String },
    /// `RELOAD <name>` - retry after a failed `LOAD_DATA`.
    Reload { name: String },
    /// `REMOVE <name>`
    Remove { name: String },
    /// `STORE_ACK <name>` - a store persisted the file bytes.
    StoreAck { name: String },
    /// `REMOVE_ACK <name>` - a store deleted the file.
    RemoveAck { name: String },
    /// `ERROR_FILE_DOES_NOT_EXIST <name>` - a store could not delete a
    /// file it never had. Observed during removes; never counted as an
    /// ack.
    RemoveMissing { name: String },
}

impl Request {
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = Tokens::of(line)?;
        let request = match tokens.command() {
            token::JOIN => Request::Join {
                port: tokens.port(token::JOIN)?,
            },
            token::STORE => Request::Store {
                name: tokens.name(token::STORE)?,
                size: tokens.size(token::STORE)?,
            },
            token::LIST => Request::List,
            token::LOAD => Request::Load {
                name: tokens.name(token::LOAD)?,
            },
            token::RELOAD => Request::Reload {
                name: tokens.name(token::RELOAD)?,
            },
            token::REMOVE => Request::Remove {
                name: tokens.name(token::REMOVE)?,
            },
            token::STORE_ACK => Request::StoreAck {
                name: tokens.name(token::STORE_ACK)?,
            },
            token::REMOVE_ACK => Request::RemoveAck {
                name: tokens.name(token::REMOVE_ACK)?,
            },
            token::ERROR_FILE_DOES_NOT_EXIST => Request::RemoveMissing {
                name: tokens.name(token::ERROR_FILE_DOES_NOT_EXIST)?,
            },
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        tokens.finish()?;
        Ok(request)
    }

    /// True for the client-originated commands that sit behind the
    /// controller's capacity gate. Store events are never gated.
    pub fn is_client_command(&self) -> bool {
        matches!(
            self,
            Request::Store { .. }
                | Request::List
                | Request::Load { .. }
                | Request::Reload { .. }
                | Request::Remove { .. }
        )
    }
}

/// Controller-issued commands on a store's control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// `LIST` - report every regular file in the folder.
    List,
    /// `REMOVE <name>`
    Remove { name: String },
    /// `REBALANCE ...` - reserved; the payload is ignored and the node
    /// answers with a stub `REBALANCE_COMPLETE`.
    Rebalance,
}

impl NodeCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = Tokens::of(line)?;
        let command = match tokens.command() {
            token::LIST => NodeCommand::List,
            token::REMOVE => NodeCommand::Remove {
                name: tokens.name(token::REMOVE)?,
            },
            token::REBALANCE => return Ok(NodeCommand::Rebalance),
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        tokens.finish()?;
        Ok(command)
    }
}

/// Client requests on a store's data port. Each connection carries exactly
/// one of these; the bulk bytes of a `STORE` follow on the same socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `STORE <name> <size>`
    Store { name: String, size: u64 },
    /// `LOAD_DATA <name>`
    LoadData { name: String },
}

impl ClientCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = Tokens::of(line)?;
        let command = match tokens.command() {
            token::STORE => ClientCommand::Store {
                name: tokens.name(token::STORE)?,
                size: tokens.size(token::STORE)?,
            },
            token::LOAD_DATA => ClientCommand::LoadData {
                name: tokens.name(token::LOAD_DATA)?,
            },
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        tokens.finish()?;
        Ok(command)
    }
}

/// Single-space tokenizer over one protocol line.
///
/// `split(' ')` rather than `split_whitespace` so that doubled separators
/// surface as empty tokens and get rejected instead of silently collapsed.
struct Tokens<'a> {
    line: &'a str,
    command: &'a str,
    rest: std::str::Split<'a, char>,
}

impl<'a> Tokens<'a> {
    fn of(line: &'a str) -> Result<Self> {
        let mut rest = line.split(' ');
        let command = rest.next().filter(|t| !t.is_empty()).ok_or(ProtocolError::Empty)?;
        Ok(Tokens { line, command, rest })
    }

    fn command(&self) -> &'a str {
        self.command
    }

    fn next(&mut self, command: &'static str) -> Result<&'a str> {
        self.rest
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProtocolError::Malformed {
                command,
                line: self.line.to_string(),
            })
    }

    fn name(&mut self, command: &'static str) -> Result<String> {
        self.next(command).map(str::to_string)
    }

    fn port(&mut self, command: &'static str) -> Result<u16> {
        let value = self.next(command)?;
        match value.parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ProtocolError::InvalidPort {
                command,
                value: value.to_string(),
            }),
        }
    }

    fn size(&mut self, command: &'static str) -> Result<u64> {
        let value = self.next(command)?;
        value.parse::<u64>().map_err(|_| ProtocolError::InvalidSize {
            command,
            value: value.to_string(),
        })
    }

    /// Reject trailing tokens so `LIST garbage` is malformed rather than
    /// a bare listing request.
    fn finish(mut self) -> Result<()> {
        match self.rest.next() {
            None => Ok(()),
            Some(_) => Err(ProtocolError::TrailingTokens {
                line: self.line.to_string(),
            }),
        }
    }
}
