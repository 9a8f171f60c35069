// ── ErrorMapper – transport failures → TransferError ─────────────────────────
//
// Every message starts with a fixed lead-in for its stage and then carries the
// transport's own text verbatim, so callers can match on the lead-in without
// depending on the wording that follows it.

use crate::scp::error::{TransferError, TransportError};
use crate::scp::types::TransferDirection;
use std::path::Path;

/// Lead-in of every `RemoteStatFailed` message.
pub const STAT_FAILED_PREFIX: &str = "Error receiving information about file:";
/// Lead-in when a download channel is refused.
pub const DOWNLOAD_OPEN_FAILED_PREFIX: &str = "Error initializing SCP session:";
/// Lead-in when an upload channel is refused.
pub const UPLOAD_OPEN_FAILED_PREFIX: &str = "Error opening remote file for writing:";
pub const READ_FAILED_PREFIX: &str = "Error reading from SCP channel:";
pub const WRITE_FAILED_PREFIX: &str = "Error writing to SCP channel:";
pub const CLOSE_FAILED_PREFIX: &str = "Error closing SCP channel:";

/// Point of the transfer at which a transport error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Open,
    Stat,
    Read,
    Write,
    Close,
}

/// What the copy loop was doing with the local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Stat,
    Open,
    Create,
    Read,
    Write,
    Flush,
}

impl LocalAction {
    fn verb(self) -> &'static str {
        match self {
            LocalAction::Stat => "reading metadata of",
            LocalAction::Open => "opening",
            LocalAction::Create => "creating",
            LocalAction::Read => "reading",
            LocalAction::Write => "writing",
            LocalAction::Flush => "flushing",
        }
    }
}

/// Classify a transport error raised during `stage` of a transfer in
/// `direction`.
pub fn map_transport_error(
    direction: TransferDirection,
    stage: TransferStage,
    err: &TransportError,
) -> TransferError {
    match (direction, stage) {
        (TransferDirection::Download, TransferStage::Open | TransferStage::Stat) => {
            if err.is_channel_refusal() {
                TransferError::remote_open_failed(lead_in(DOWNLOAD_OPEN_FAILED_PREFIX, err))
            } else {
                TransferError::remote_stat_failed(lead_in(STAT_FAILED_PREFIX, err))
            }
        }
        // Uploads never stat, so only the open can fail before data moves.
        (TransferDirection::Upload, TransferStage::Open | TransferStage::Stat) => {
            TransferError::remote_open_failed(lead_in(UPLOAD_OPEN_FAILED_PREFIX, err))
        }
        (_, TransferStage::Read) => mid_transfer(READ_FAILED_PREFIX, err),
        (_, TransferStage::Write) => mid_transfer(WRITE_FAILED_PREFIX, err),
        (_, TransferStage::Close) => mid_transfer(CLOSE_FAILED_PREFIX, err),
    }
}

/// Wrap a local filesystem error.
pub fn map_local_error(action: LocalAction, path: &Path, err: &std::io::Error) -> TransferError {
    TransferError::io_failure(format!(
        "Error {} local file '{}': {}",
        action.verb(),
        path.display(),
        err
    ))
}

fn mid_transfer(prefix: &str, err: &TransportError) -> TransferError {
    if err.is_protocol() {
        TransferError::protocol_violation(lead_in(prefix, err))
    } else {
        TransferError::io_failure(lead_in(prefix, err))
    }
}

fn lead_in(prefix: &str, err: &TransportError) -> String {
    format!("{} {}", prefix, err.message())
}
