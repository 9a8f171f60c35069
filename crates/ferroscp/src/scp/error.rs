//! SCP error types.
//!
//! [`TransportError`] is what an [`ScpSession`](crate::scp::ScpSession)
//! implementation reports; [`TransferError`] is what callers of
//! [`ScpClient`](crate::scp::ScpClient) see. The mapper in
//! [`crate::scp::mapper`] turns the former into the latter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric transport error codes, using libssh2's numbering.
pub mod codes {
    pub const SOCKET_TIMEOUT: i32 = -30;
    pub const CHANNEL_FAILURE: i32 = -21;
    pub const CHANNEL_REQUEST_DENIED: i32 = -22;
    pub const CHANNEL_UNKNOWN: i32 = -23;
    pub const CHANNEL_CLOSED: i32 = -26;
    pub const SCP_PROTOCOL: i32 = -28;
}

// ── Transfer error (caller-facing) ───────────────────────────────────────────

/// Categorised SCP transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferErrorKind {
    /// The remote path is missing or could not be stat'ed. Raised before
    /// any bytes move.
    RemoteStatFailed,
    /// The remote side refused to open the SCP channel.
    RemoteOpenFailed,
    /// Local filesystem or transport I/O failed mid-transfer.
    IoFailure,
    /// The SCP stream did not follow the protocol.
    ProtocolViolation,
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferErrorKind::RemoteStatFailed => "remote stat failed",
            TransferErrorKind::RemoteOpenFailed => "remote open failed",
            TransferErrorKind::IoFailure => "I/O failure",
            TransferErrorKind::ProtocolViolation => "protocol violation",
        };
        f.write_str(name)
    }
}

/// A failed `get`/`put`.
///
/// `Display` prints the diagnostic message alone, so callers can match on
/// the documented prefixes (see [`crate::scp::mapper`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TransferError {
    kind: TransferErrorKind,
    message: String,
}

pub type TransferResult<T> = Result<T, TransferError>;

impl TransferError {
    pub fn new(kind: TransferErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> TransferErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn remote_stat_failed(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::RemoteStatFailed, msg)
    }

    pub fn remote_open_failed(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::RemoteOpenFailed, msg)
    }

    pub fn io_failure(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::IoFailure, msg)
    }

    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::ProtocolViolation, msg)
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        Self::io_failure(e.to_string())
    }
}

impl From<TransferError> for String {
    fn from(e: TransferError) -> String {
        e.message
    }
}

// ── Transport error (collaborator-facing) ────────────────────────────────────

/// Raw failure reported by a session or channel handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    code: Option<i32>,
    message: String,
}

impl TransportError {
    pub fn new(code: Option<i32>, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
        }
    }

    pub fn with_code(code: i32, msg: impl Into<String>) -> Self {
        Self::new(Some(code), msg)
    }

    /// Malformed or unexpected SCP traffic.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::with_code(codes::SCP_PROTOCOL, msg)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_protocol(&self) -> bool {
        self.code == Some(codes::SCP_PROTOCOL)
    }

    /// Whether the code says the channel itself could not be opened.
    pub fn is_channel_refusal(&self) -> bool {
        matches!(
            self.code,
            Some(codes::CHANNEL_FAILURE)
                | Some(codes::CHANNEL_REQUEST_DENIED)
                | Some(codes::CHANNEL_UNKNOWN)
                | Some(codes::CHANNEL_CLOSED)
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::with_code(codes::SOCKET_TIMEOUT, e.to_string())
        } else {
            Self::new(None, e.to_string())
        }
    }
}
