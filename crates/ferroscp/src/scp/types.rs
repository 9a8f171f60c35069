// ── Types ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest payload a single SCP channel read hands back (64 KiB).
pub const MAX_CHUNK_SIZE: usize = 65_536;

/// Mode used for files created on the remote side by `put`.
pub const DEFAULT_FILE_MODE: i32 = 0o644;

// ── Serde default helpers ────────────────────────────────────────────────────

fn default_chunk_size() -> usize {
    MAX_CHUNK_SIZE
}
fn default_file_mode() -> i32 {
    DEFAULT_FILE_MODE
}
fn default_scp_port() -> u16 {
    22
}
fn default_false() -> bool {
    false
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_keepalive_secs() -> u64 {
    60
}

// ── Direction ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDirection::Upload => f.write_str("upload"),
            TransferDirection::Download => f.write_str("download"),
        }
    }
}

/// What a session is asked to open an SCP sub-channel for.
///
/// Uploads declare the byte count and creation mode up front, as the SCP
/// `C` record requires; downloads learn the size from the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest<'a> {
    Download { path: &'a Path },
    Upload { path: &'a Path, size: u64, mode: i32 },
}

impl<'a> ChannelRequest<'a> {
    pub fn direction(&self) -> TransferDirection {
        match self {
            ChannelRequest::Download { .. } => TransferDirection::Download,
            ChannelRequest::Upload { .. } => TransferDirection::Upload,
        }
    }

    pub fn path(&self) -> &'a Path {
        match self {
            ChannelRequest::Download { path } | ChannelRequest::Upload { path, .. } => path,
        }
    }
}

// ── Client configuration ─────────────────────────────────────────────────────

/// Tunables for an [`ScpClient`](crate::scp::ScpClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScpClientConfig {
    /// Upper bound on bytes moved per read/write call.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Mode declared for files created by `put`.
    #[serde(default = "default_file_mode")]
    pub file_mode: i32,
}

impl Default for ScpClientConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            file_mode: default_file_mode(),
        }
    }
}

impl ScpClientConfig {
    /// Chunk size actually used by the copy loop, within `1..=MAX_CHUNK_SIZE`.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }
}

// ── Connection & Authentication ──────────────────────────────────────────────

/// Configuration for establishing the SSH session SCP runs over.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScpConnectionConfig {
    pub host: String,
    #[serde(default = "default_scp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    #[serde(default = "default_false")]
    pub use_agent: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
}

impl std::fmt::Debug for ScpConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(secret: &Option<String>) -> Option<&'static str> {
            secret.as_ref().map(|_| "***")
        }
        f.debug_struct("ScpConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("private_key_path", &self.private_key_path)
            .field("private_key_passphrase", &redact(&self.private_key_passphrase))
            .field("use_agent", &self.use_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("keepalive_interval_secs", &self.keepalive_interval_secs)
            .finish()
    }
}

// ── Transfer summary ─────────────────────────────────────────────────────────

/// Outcome of one completed channel run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub direction: TransferDirection,
    pub local_path: PathBuf,
    pub remote_path: PathBuf,
    pub bytes_transferred: u64,
    pub elapsed: Duration,
}

impl TransferSummary {
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64().max(0.001);
        self.bytes_transferred as f64 / secs
    }
}
