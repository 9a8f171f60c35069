// ── libssh2 adapter – ssh2::Session as an SCP session ────────────────────────

use crate::scp::error::TransportError;
use crate::scp::transport::{ScpChannelHandle, ScpSession};
use crate::scp::types::ChannelRequest;
use ssh2::{Channel, ErrorCode, Session};
use std::io::{Read, Write};
use std::path::PathBuf;

impl From<ssh2::Error> for TransportError {
    fn from(e: ssh2::Error) -> Self {
        let code = match e.code() {
            ErrorCode::Session(code) => Some(code),
            ErrorCode::SFTP(_) => None,
        };
        TransportError::new(code, e.message())
    }
}

enum ChannelState {
    /// `scp_recv` both opens the channel and reads the file record, so it
    /// runs on `stat` rather than on open.
    PendingDownload { session: Session, path: PathBuf },
    Download(Channel),
    Upload(Channel),
    Closed,
}

/// SCP sub-channel backed by libssh2.
pub struct Ssh2ScpChannel {
    state: ChannelState,
}

impl ScpSession for Session {
    type Channel = Ssh2ScpChannel;

    fn open_scp_channel(&self, request: ChannelRequest<'_>) -> Result<Ssh2ScpChannel, TransportError> {
        let state = match request {
            ChannelRequest::Download { path } => ChannelState::PendingDownload {
                session: self.clone(),
                path: path.to_path_buf(),
            },
            ChannelRequest::Upload { path, size, mode } => {
                ChannelState::Upload(self.scp_send(path, mode, size, None)?)
            }
        };
        Ok(Ssh2ScpChannel { state })
    }
}

impl ScpChannelHandle for Ssh2ScpChannel {
    fn stat(&mut self) -> Result<u64, TransportError> {
        match &self.state {
            ChannelState::PendingDownload { session, path } => {
                let (channel, stat) = session.scp_recv(path)?;
                self.state = ChannelState::Download(channel);
                Ok(stat.size())
            }
            _ => Err(TransportError::protocol(
                "SCP stat is only valid once, on a download channel",
            )),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match &mut self.state {
            ChannelState::Download(channel) => Ok(channel.read(buf)?),
            _ => Err(TransportError::protocol(
                "SCP read on a channel that is not receiving a file",
            )),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        match &mut self.state {
            ChannelState::Upload(channel) => Ok(channel.write(buf)?),
            _ => Err(TransportError::protocol(
                "SCP write on a channel that is not sending a file",
            )),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, ChannelState::Closed) {
            ChannelState::Upload(mut channel) => {
                // The remote only commits the file once it has seen EOF.
                channel.send_eof()?;
                channel.wait_eof()?;
                channel.close()?;
                channel.wait_close()?;
                Ok(())
            }
            ChannelState::Download(mut channel) => {
                channel.send_eof().ok();
                channel.wait_eof().ok();
                channel.close().ok();
                channel.wait_close().ok();
                Ok(())
            }
            ChannelState::PendingDownload { .. } | ChannelState::Closed => Ok(()),
        }
    }
}
