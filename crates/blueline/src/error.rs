//! Error types for the blueline library
//!
//! Every fallible operation returns [`Result`]. Only the transport variants
//! tear a session down; everything else leaves it usable.

use crate::att::AttErrorCode;
use crate::uuid::UuidParseError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("worker transport failed: {0}")]
    Transport(String),

    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("no reply from worker within {0:?}")]
    Timeout(Duration),

    #[error("GATT error: {code}")]
    Gatt { code: AttErrorCode, raw: u8 },

    #[error("{operation} is not valid while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("another command is already in flight")]
    Busy,

    #[error("failed to connect: {0}")]
    Connection(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("management command failed: {0}")]
    Management(String),

    #[error("worker reported error {code}: {}", .message.as_deref().unwrap_or("no details"))]
    Peer {
        code: String,
        message: Option<String>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid UUID: {0}")]
    UuidParse(#[from] UuidParseError),
}

impl Error {
    pub(crate) fn gatt(raw: u8) -> Self {
        Error::Gatt {
            code: AttErrorCode::from(raw),
            raw,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// True for failures that collapse the session to `Disconnected`.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Io(_) | Error::ConnectionLost(_)
        )
    }

    /// The raw ATT code of a GATT error.
    pub fn att_code(&self) -> Option<u8> {
        match self {
            Error::Gatt { raw, .. } => Some(*raw),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
