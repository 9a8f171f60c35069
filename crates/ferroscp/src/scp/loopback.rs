// ── Loopback session – the "remote" side is the local filesystem ─────────────
//
// Behaves like an SSH server on localhost whose SCP sink/source run against
// the same filesystem as the client. Useful for exercising the engine
// without a server, and for simulating a transport that hands data over in
// small pieces.

use crate::scp::error::TransportError;
use crate::scp::transport::{ScpChannelHandle, ScpSession};
use crate::scp::types::{ChannelRequest, MAX_CHUNK_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Session whose remote paths resolve on the local filesystem.
#[derive(Debug, Clone)]
pub struct LoopbackSession {
    max_io: usize,
}

impl Default for LoopbackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackSession {
    pub fn new() -> Self {
        Self {
            max_io: MAX_CHUNK_SIZE,
        }
    }

    /// Cap every read and write at `max_io` bytes, like a transport with a
    /// small window.
    pub fn with_max_io(max_io: usize) -> Self {
        Self {
            max_io: max_io.max(1),
        }
    }

    pub fn max_io(&self) -> usize {
        self.max_io
    }
}

impl ScpSession for LoopbackSession {
    type Channel = LoopbackChannel;

    fn open_scp_channel(&self, request: ChannelRequest<'_>) -> Result<LoopbackChannel, TransportError> {
        let state = match request {
            ChannelRequest::Download { path } => LoopbackState::PendingDownload(path.to_path_buf()),
            ChannelRequest::Upload { path, size, mode } => {
                let file = create_sink(path, mode).map_err(|e| scp_error(path, &e))?;
                LoopbackState::Upload {
                    file,
                    path: path.to_path_buf(),
                    declared: size,
                    received: 0,
                }
            }
        };
        Ok(LoopbackChannel {
            state,
            max_io: self.max_io,
        })
    }
}

enum LoopbackState {
    PendingDownload(PathBuf),
    Download(File),
    Upload {
        file: File,
        path: PathBuf,
        declared: u64,
        received: u64,
    },
    Closed,
}

pub struct LoopbackChannel {
    state: LoopbackState,
    max_io: usize,
}

impl ScpChannelHandle for LoopbackChannel {
    fn stat(&mut self) -> Result<u64, TransportError> {
        let path = match &self.state {
            LoopbackState::PendingDownload(path) => path.clone(),
            _ => {
                return Err(TransportError::protocol(
                    "SCP stat is only valid once, on a download channel",
                ))
            }
        };

        let file = File::open(&path).map_err(|e| scp_error(&path, &e))?;
        let metadata = file.metadata().map_err(|e| scp_error(&path, &e))?;
        if !metadata.is_file() {
            return Err(TransportError::protocol(format!(
                "scp: {}: not a regular file",
                path.display()
            )));
        }
        self.state = LoopbackState::Download(file);
        Ok(metadata.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match &mut self.state {
            LoopbackState::Download(file) => {
                let len = buf.len().min(self.max_io);
                Ok(file.read(&mut buf[..len])?)
            }
            _ => Err(TransportError::protocol(
                "SCP read on a channel that is not receiving a file",
            )),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        match &mut self.state {
            LoopbackState::Upload {
                file,
                declared,
                received,
                ..
            } => {
                let room = declared.saturating_sub(*received);
                if room == 0 && !buf.is_empty() {
                    return Err(TransportError::protocol(
                        "SCP upload wrote past the declared file size",
                    ));
                }
                let len = (buf.len() as u64).min(room).min(self.max_io as u64) as usize;
                let n = file.write(&buf[..len])?;
                *received += n as u64;
                Ok(n)
            }
            _ => Err(TransportError::protocol(
                "SCP write on a channel that is not sending a file",
            )),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, LoopbackState::Closed) {
            LoopbackState::Upload {
                mut file,
                path,
                declared,
                received,
            } => {
                if received != declared {
                    return Err(TransportError::protocol(format!(
                        "scp: {}: expected {} bytes, received {}",
                        path.display(),
                        declared,
                        received
                    )));
                }
                file.flush()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Open the sink the way an SCP server does: create or truncate.
fn create_sink(path: &Path, mode: i32) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode as u32);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

fn scp_error(path: &Path, e: &std::io::Error) -> TransportError {
    let reason = match e.kind() {
        ErrorKind::NotFound => "No such file or directory".to_string(),
        ErrorKind::PermissionDenied => "Permission denied".to_string(),
        _ => e.to_string(),
    };
    TransportError::protocol(format!("scp: {}: {}", path.display(), reason))
}
