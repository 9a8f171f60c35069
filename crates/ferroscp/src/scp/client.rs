// ── ScpClient – user-facing get/put bound to one session ─────────────────────

use crate::scp::channel::ScpChannel;
use crate::scp::error::TransferResult;
use crate::scp::transport::ScpSession;
use crate::scp::types::*;
use log::{info, warn};
use std::path::Path;

/// Single-file SCP transfers over one borrowed session.
///
/// Each call opens a fresh [`ScpChannel`] and releases it before returning,
/// on success and on failure alike. Calls take `&mut self`, so one client
/// never runs two transfers at once.
pub struct ScpClient<'s, S: ScpSession> {
    session: &'s S,
    config: ScpClientConfig,
}

impl<'s, S: ScpSession> ScpClient<'s, S> {
    pub fn new(session: &'s S) -> Self {
        Self::with_config(session, ScpClientConfig::default())
    }

    pub fn with_config(session: &'s S, config: ScpClientConfig) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &ScpClientConfig {
        &self.config
    }

    /// Copy the local file at `local_path` to `remote_path`, creating or
    /// replacing the remote file.
    pub fn put(
        &mut self,
        local_path: impl AsRef<Path>,
        remote_path: impl AsRef<Path>,
    ) -> TransferResult<()> {
        let local_path = local_path.as_ref();
        let remote_path = remote_path.as_ref();

        let summary = ScpChannel::<S::Channel>::open_upload(
            self.session,
            local_path,
            remote_path,
            &self.config,
        )
        .and_then(ScpChannel::run)
        .map_err(|e| {
            warn!("SCP upload of {} failed: {}", local_path.display(), e);
            e
        })?;

        log_summary(&summary);
        Ok(())
    }

    /// Copy `remote_path` into `local_path`. An existing local file is
    /// truncated and overwritten; nothing is created if the remote file
    /// cannot be stat'ed.
    pub fn get(
        &mut self,
        remote_path: impl AsRef<Path>,
        local_path: impl AsRef<Path>,
    ) -> TransferResult<()> {
        let remote_path = remote_path.as_ref();
        let local_path = local_path.as_ref();

        let summary = ScpChannel::<S::Channel>::open_download(
            self.session,
            remote_path,
            local_path,
            &self.config,
        )
        .and_then(ScpChannel::run)
        .map_err(|e| {
            warn!("SCP download of {} failed: {}", remote_path.display(), e);
            e
        })?;

        log_summary(&summary);
        Ok(())
    }
}

fn log_summary(summary: &TransferSummary) {
    match summary.direction {
        TransferDirection::Upload => info!(
            "SCP uploaded {} bytes to {} ({:.0} B/s)",
            summary.bytes_transferred,
            summary.remote_path.display(),
            summary.bytes_per_sec()
        ),
        TransferDirection::Download => info!(
            "SCP downloaded {} bytes from {} ({:.0} B/s)",
            summary.bytes_transferred,
            summary.remote_path.display(),
            summary.bytes_per_sec()
        ),
    }
}
