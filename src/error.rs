//! Error types for imap-engine

use crate::proto::types::ResponseCode;
use thiserror::Error;

/// All failure modes of the engine.
///
/// Transport-level failures (`Io`, `Tls`, `Timeout`, `Closed`) and
/// protocol violations (`Protocol`) are fatal to the connection: the
/// actor transitions to the disconnected state and every subsequent
/// call fails until a fresh connection is made. `CommandFailed` and
/// `Auth` are command-level and leave the connection usable.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered the tagged command with NO.
    #[error("command failed: {text}")]
    CommandFailed {
        text: String,
        code: Option<ResponseCode>,
    },

    /// A single response could not be parsed. The offending response
    /// is discarded and the connection survives.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The command is not legal in the connection's current state.
    /// Nothing was written to the wire.
    #[error("invalid state: {0}")]
    BadState(String),

    /// Caller-side misuse detected before any bytes were sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
