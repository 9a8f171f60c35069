// ── Transport seam – what the engine needs from an SSH session ───────────────

use crate::scp::client::ScpClient;
use crate::scp::error::TransportError;
use crate::scp::types::ChannelRequest;

/// An authenticated SSH session able to spawn SCP sub-channels.
pub trait ScpSession {
    type Channel: ScpChannelHandle;

    /// Open an SCP sub-channel for one file in one direction.
    fn open_scp_channel(&self, request: ChannelRequest<'_>) -> Result<Self::Channel, TransportError>;

    /// SCP client bound to this session with default settings.
    fn scp(&self) -> ScpClient<'_, Self>
    where
        Self: Sized,
    {
        ScpClient::new(self)
    }
}

/// One open SCP sub-channel.
///
/// Handles are driven by [`ScpChannel`](crate::scp::ScpChannel), which calls
/// `close` exactly once whether the transfer succeeds or fails.
pub trait ScpChannelHandle {
    /// Size of the remote file. Only meaningful on download channels.
    fn stat(&mut self) -> Result<u64, TransportError>;

    /// Read up to `buf.len()` bytes of file data. May return fewer.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write some prefix of `buf`, returning how much was accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Finish the channel. For uploads this is what commits the remote file.
    fn close(&mut self) -> Result<(), TransportError>;
}
