// ── ScpChannel – one file, one direction, chunked copy loop ─────────────────

use crate::scp::error::{TransferError, TransferResult, TransportError};
use crate::scp::mapper::{map_local_error, map_transport_error, LocalAction, TransferStage};
use crate::scp::transport::{ScpChannelHandle, ScpSession};
use crate::scp::types::*;
use log::{debug, warn};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

// ── Close guard ──────────────────────────────────────────────────────────────

/// Owns the transport handle and closes it exactly once. An explicit
/// `finish` reports close errors; dropping the guard on an error path closes
/// quietly and only logs.
struct HandleGuard<H: ScpChannelHandle> {
    handle: H,
    closed: bool,
    direction: TransferDirection,
    remote_path: PathBuf,
}

impl<H: ScpChannelHandle> HandleGuard<H> {
    fn new(handle: H, direction: TransferDirection, remote_path: &Path) -> Self {
        Self {
            handle,
            closed: false,
            direction,
            remote_path: remote_path.to_path_buf(),
        }
    }

    fn finish(mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.handle.close()
    }
}

impl<H: ScpChannelHandle> Drop for HandleGuard<H> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(
            "SCP {} channel for {} released on error path",
            self.direction,
            self.remote_path.display()
        );
        if let Err(e) = self.handle.close() {
            warn!(
                "SCP {} channel for {} failed to close: {}",
                self.direction,
                self.remote_path.display(),
                e
            );
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────────────────

/// Direction-specific state. Both legs share the copy-loop skeleton; only a
/// download stats the remote file before the loop.
enum Leg {
    Upload { source: File, size: u64 },
    Download,
}

/// A single SCP transfer. Consumed by [`ScpChannel::run`], so a channel
/// can never be reused for a second file.
pub struct ScpChannel<H: ScpChannelHandle> {
    leg: Leg,
    handle: HandleGuard<H>,
    local_path: PathBuf,
    remote_path: PathBuf,
    chunk_size: usize,
}

impl<H: ScpChannelHandle> ScpChannel<H> {
    /// Open a pull-mode channel for `remote_path`. The local file is not
    /// touched until the remote side has been stat'ed.
    pub fn open_download<S>(
        session: &S,
        remote_path: &Path,
        local_path: &Path,
        config: &ScpClientConfig,
    ) -> TransferResult<Self>
    where
        S: ScpSession<Channel = H>,
    {
        debug!("SCP opening download channel for {}", remote_path.display());
        let handle = session
            .open_scp_channel(ChannelRequest::Download { path: remote_path })
            .map_err(|e| {
                map_transport_error(TransferDirection::Download, TransferStage::Open, &e)
            })?;

        Ok(Self {
            leg: Leg::Download,
            handle: HandleGuard::new(handle, TransferDirection::Download, remote_path),
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.to_path_buf(),
            chunk_size: config.effective_chunk_size(),
        })
    }

    /// Open `local_path` for reading, then a push-mode channel declaring its
    /// size to the remote side.
    pub fn open_upload<S>(
        session: &S,
        local_path: &Path,
        remote_path: &Path,
        config: &ScpClientConfig,
    ) -> TransferResult<Self>
    where
        S: ScpSession<Channel = H>,
    {
        let source = File::open(local_path)
            .map_err(|e| map_local_error(LocalAction::Open, local_path, &e))?;
        let metadata = source
            .metadata()
            .map_err(|e| map_local_error(LocalAction::Stat, local_path, &e))?;
        // Must fail before the remote sink exists; opening it truncates.
        if !metadata.is_file() {
            return Err(TransferError::io_failure(format!(
                "Local file '{}' is not a regular file",
                local_path.display()
            )));
        }
        let size = metadata.len();

        debug!(
            "SCP opening upload channel for {} ({} bytes)",
            remote_path.display(),
            size
        );
        let handle = session
            .open_scp_channel(ChannelRequest::Upload {
                path: remote_path,
                size,
                mode: config.file_mode,
            })
            .map_err(|e| map_transport_error(TransferDirection::Upload, TransferStage::Open, &e))?;

        Ok(Self {
            leg: Leg::Upload { source, size },
            handle: HandleGuard::new(handle, TransferDirection::Upload, remote_path),
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.to_path_buf(),
            chunk_size: config.effective_chunk_size(),
        })
    }

    pub fn direction(&self) -> TransferDirection {
        match self.leg {
            Leg::Upload { .. } => TransferDirection::Upload,
            Leg::Download => TransferDirection::Download,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_path(&self) -> &Path {
        &self.remote_path
    }

    /// Size declared to the remote side. Downloads only learn theirs in `run`.
    pub fn declared_size(&self) -> Option<u64> {
        match self.leg {
            Leg::Upload { size, .. } => Some(size),
            Leg::Download => None,
        }
    }

    /// Move the whole file and close the channel.
    pub fn run(self) -> TransferResult<TransferSummary> {
        let started = Instant::now();
        let direction = self.direction();
        let ScpChannel {
            leg,
            mut handle,
            local_path,
            remote_path,
            chunk_size,
        } = self;

        let mut copy = CopyLoop {
            handle: &mut handle.handle,
            local_path: &local_path,
            remote_path: &remote_path,
            buffer: vec![0u8; chunk_size],
            transferred: 0,
        };
        match leg {
            Leg::Download => copy.pull()?,
            Leg::Upload { source, size } => copy.push(source, size)?,
        }
        let bytes_transferred = copy.transferred;

        handle
            .finish()
            .map_err(|e| map_transport_error(direction, TransferStage::Close, &e))?;

        Ok(TransferSummary {
            direction,
            local_path,
            remote_path,
            bytes_transferred,
            elapsed: started.elapsed(),
        })
    }
}

// ── Copy loop ────────────────────────────────────────────────────────────────

struct CopyLoop<'a, H: ScpChannelHandle> {
    handle: &'a mut H,
    local_path: &'a Path,
    remote_path: &'a Path,
    buffer: Vec<u8>,
    transferred: u64,
}

impl<'a, H: ScpChannelHandle> CopyLoop<'a, H> {
    fn next_len(&self, size: u64) -> usize {
        (size - self.transferred).min(self.buffer.len() as u64) as usize
    }

    fn pull(&mut self) -> TransferResult<()> {
        let size = self
            .handle
            .stat()
            .map_err(|e| map_transport_error(TransferDirection::Download, TransferStage::Stat, &e))?;
        debug!("SCP {} is {} bytes", self.remote_path.display(), size);

        let mut local_file = File::create(self.local_path)
            .map_err(|e| map_local_error(LocalAction::Create, self.local_path, &e))?;

        while self.transferred < size {
            let want = self.next_len(size);
            let n = self
                .handle
                .read(&mut self.buffer[..want])
                .map_err(|e| {
                    map_transport_error(TransferDirection::Download, TransferStage::Read, &e)
                })?;
            if n == 0 {
                return Err(TransferError::protocol_violation(format!(
                    "SCP stream for '{}' ended after {} of {} bytes",
                    self.remote_path.display(),
                    self.transferred,
                    size
                )));
            }
            if n > want {
                return Err(TransferError::protocol_violation(format!(
                    "SCP channel returned {} bytes for a {} byte read",
                    n, want
                )));
            }
            local_file
                .write_all(&self.buffer[..n])
                .map_err(|e| map_local_error(LocalAction::Write, self.local_path, &e))?;
            self.transferred += n as u64;
        }

        local_file
            .flush()
            .map_err(|e| map_local_error(LocalAction::Flush, self.local_path, &e))
    }

    fn push(&mut self, mut source: File, size: u64) -> TransferResult<()> {
        while self.transferred < size {
            let want = self.next_len(size);
            let n = source
                .read(&mut self.buffer[..want])
                .map_err(|e| map_local_error(LocalAction::Read, self.local_path, &e))?;
            if n == 0 {
                return Err(TransferError::io_failure(format!(
                    "Local file '{}' ended after {} of {} declared bytes",
                    self.local_path.display(),
                    self.transferred,
                    size
                )));
            }
            self.write_chunk(n)?;
            self.transferred += n as u64;
        }
        Ok(())
    }

    /// Push the first `len` buffered bytes, retrying until the channel has
    /// accepted all of them.
    fn write_chunk(&mut self, len: usize) -> TransferResult<()> {
        let mut offset = 0;
        while offset < len {
            let written = self.handle.write(&self.buffer[offset..len]).map_err(|e| {
                map_transport_error(TransferDirection::Upload, TransferStage::Write, &e)
            })?;
            if written == 0 {
                return Err(TransferError::protocol_violation(format!(
                    "SCP channel for '{}' accepted no data after {} bytes",
                    self.remote_path.display(),
                    self.transferred + offset as u64
                )));
            }
            offset += written.min(len - offset);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scp::error::{codes, TransferErrorKind};
    use crate::scp::mapper::{CLOSE_FAILED_PREFIX, STAT_FAILED_PREFIX};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    // ── Scripted transport ───────────────────────────────────────────────────

    #[derive(Clone)]
    struct Script {
        open_error: Option<TransportError>,
        stat: Option<Result<u64, TransportError>>,
        data: Vec<u8>,
        max_read: usize,
        read_error_at: Option<(usize, TransportError)>,
        max_write: usize,
        write_error: Option<TransportError>,
        close_error: Option<TransportError>,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                open_error: None,
                stat: None,
                data: Vec::new(),
                max_read: MAX_CHUNK_SIZE,
                read_error_at: None,
                max_write: usize::MAX,
                write_error: None,
                close_error: None,
            }
        }
    }

    #[derive(Default)]
    struct Events {
        opens: Vec<TransferDirection>,
        declared: Option<u64>,
        reads: Vec<usize>,
        uploaded: Vec<u8>,
        closes: usize,
    }

    struct MockSession {
        script: Script,
        events: Rc<RefCell<Events>>,
    }

    impl MockSession {
        fn new(script: Script) -> Self {
            Self {
                script,
                events: Rc::new(RefCell::new(Events::default())),
            }
        }
    }

    struct MockChannel {
        script: Script,
        pos: usize,
        events: Rc<RefCell<Events>>,
    }

    impl ScpSession for MockSession {
        type Channel = MockChannel;

        fn open_scp_channel(&self, request: ChannelRequest<'_>) -> Result<MockChannel, TransportError> {
            if let Some(err) = &self.script.open_error {
                return Err(err.clone());
            }
            let mut events = self.events.borrow_mut();
            events.opens.push(request.direction());
            if let ChannelRequest::Upload { size, .. } = request {
                events.declared = Some(size);
            }
            Ok(MockChannel {
                script: self.script.clone(),
                pos: 0,
                events: Rc::clone(&self.events),
            })
        }
    }

    impl ScpChannelHandle for MockChannel {
        fn stat(&mut self) -> Result<u64, TransportError> {
            match &self.script.stat {
                Some(result) => result.clone(),
                None => Ok(self.script.data.len() as u64),
            }
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            if let Some((at, err)) = &self.script.read_error_at {
                if self.pos >= *at {
                    return Err(err.clone());
                }
            }
            let rest = &self.script.data[self.pos.min(self.script.data.len())..];
            let n = rest.len().min(buf.len()).min(self.script.max_read);
            buf[..n].copy_from_slice(&rest[..n]);
            self.pos += n;
            self.events.borrow_mut().reads.push(n);
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            if let Some(err) = &self.script.write_error {
                return Err(err.clone());
            }
            let n = buf.len().min(self.script.max_write);
            self.events.borrow_mut().uploaded.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn close(&mut self) -> Result<(), TransportError> {
            self.events.borrow_mut().closes += 1;
            match &self.script.close_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn download(session: &MockSession, local: &Path) -> TransferResult<TransferSummary> {
        ScpChannel::<MockChannel>::open_download(
            session,
            Path::new("/remote/src.bin"),
            local,
            &ScpClientConfig::default(),
        )
        .and_then(ScpChannel::run)
    }

    fn upload(session: &MockSession, local: &Path) -> TransferResult<TransferSummary> {
        ScpChannel::<MockChannel>::open_upload(
            session,
            local,
            Path::new("/remote/dst.bin"),
            &ScpClientConfig::default(),
        )
        .and_then(ScpChannel::run)
    }

    // ── Download ─────────────────────────────────────────────────────────────

    #[test]
    fn test_download_reassembles_past_chunk_boundary() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let data = payload(MAX_CHUNK_SIZE + 1);
        let session = MockSession::new(Script {
            data: data.clone(),
            ..Default::default()
        });

        let summary = download(&session, &local).unwrap();

        assert_eq!(summary.bytes_transferred, data.len() as u64);
        assert_eq!(summary.direction, TransferDirection::Download);
        assert_eq!(std::fs::read(&local).unwrap(), data);
        let events = session.events.borrow();
        assert_eq!(events.reads, vec![MAX_CHUNK_SIZE, 1]);
        assert_eq!(events.closes, 1);
    }

    #[test]
    fn test_download_tolerates_short_reads() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let data = payload(1000);
        let session = MockSession::new(Script {
            data: data.clone(),
            max_read: 7,
            ..Default::default()
        });

        download(&session, &local).unwrap();

        assert_eq!(std::fs::read(&local).unwrap(), data);
        assert_eq!(session.events.borrow().reads.len(), 143);
    }

    #[test]
    fn test_download_never_reads_past_declared_size() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let mut data = payload(10);
        data.push(0); // trailing status byte the source sends after the file
        let session = MockSession::new(Script {
            data,
            stat: Some(Ok(10)),
            ..Default::default()
        });

        download(&session, &local).unwrap();

        assert_eq!(std::fs::read(&local).unwrap(), payload(10));
    }

    #[test]
    fn test_download_empty_file() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        std::fs::write(&local, b"whatever").unwrap();
        let session = MockSession::new(Script::default());

        let summary = download(&session, &local).unwrap();

        assert_eq!(summary.bytes_transferred, 0);
        assert!(std::fs::read(&local).unwrap().is_empty());
        assert!(session.events.borrow().reads.is_empty());
    }

    #[test]
    fn test_download_stat_failure_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let session = MockSession::new(Script {
            stat: Some(Err(TransportError::protocol(
                "scp: /remote/src.bin: No such file or directory",
            ))),
            ..Default::default()
        });

        let err = download(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::RemoteStatFailed);
        assert!(err.to_string().starts_with(STAT_FAILED_PREFIX));
        assert!(!local.exists());
        assert_eq!(session.events.borrow().closes, 1);
    }

    #[test]
    fn test_download_open_refused() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let session = MockSession::new(Script {
            open_error: Some(TransportError::with_code(
                codes::CHANNEL_FAILURE,
                "Unable to startup channel",
            )),
            ..Default::default()
        });

        let err = download(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::RemoteOpenFailed);
        assert!(!local.exists());
        assert_eq!(session.events.borrow().closes, 0);
    }

    #[test]
    fn test_download_premature_eof_is_protocol_violation() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let session = MockSession::new(Script {
            data: payload(50),
            stat: Some(Ok(100)),
            ..Default::default()
        });

        let err = download(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::ProtocolViolation);
        assert!(err.message().contains("ended after 50 of 100 bytes"));
        assert_eq!(session.events.borrow().closes, 1);
    }

    #[test]
    fn test_download_read_error_closes_channel() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let session = MockSession::new(Script {
            data: payload(200),
            max_read: 64,
            read_error_at: Some((128, TransportError::new(None, "connection reset"))),
            ..Default::default()
        });

        let err = download(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::IoFailure);
        assert!(err.message().ends_with("connection reset"));
        assert_eq!(session.events.borrow().closes, 1);
        // Partial content stays behind; no atomic replace.
        assert_eq!(std::fs::read(&local).unwrap().len(), 128);
    }

    #[test]
    fn test_download_into_missing_directory() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("missing").join("dst.bin");
        let session = MockSession::new(Script {
            data: payload(10),
            ..Default::default()
        });

        let err = download(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::IoFailure);
        assert!(err.message().starts_with("Error creating local file"));
        assert_eq!(session.events.borrow().closes, 1);
    }

    #[test]
    fn test_download_close_error_is_reported_once() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("dst.bin");
        let session = MockSession::new(Script {
            data: payload(10),
            close_error: Some(TransportError::new(None, "channel gone")),
            ..Default::default()
        });

        let err = download(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::IoFailure);
        assert!(err.message().starts_with(CLOSE_FAILED_PREFIX));
        assert_eq!(session.events.borrow().closes, 1);
    }

    // ── Upload ───────────────────────────────────────────────────────────────

    #[test]
    fn test_upload_declares_size_and_streams() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("src.bin");
        let data = payload(MAX_CHUNK_SIZE * 2 + 3);
        std::fs::write(&local, &data).unwrap();
        let session = MockSession::new(Script::default());

        let summary = upload(&session, &local).unwrap();

        assert_eq!(summary.bytes_transferred, data.len() as u64);
        let events = session.events.borrow();
        assert_eq!(events.opens, vec![TransferDirection::Upload]);
        assert_eq!(events.declared, Some(data.len() as u64));
        assert_eq!(events.uploaded, data);
        assert_eq!(events.closes, 1);
    }

    #[test]
    fn test_upload_retries_partial_writes() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("src.bin");
        let data = payload(100);
        std::fs::write(&local, &data).unwrap();
        let session = MockSession::new(Script {
            max_write: 3,
            ..Default::default()
        });

        upload(&session, &local).unwrap();

        assert_eq!(session.events.borrow().uploaded, data);
    }

    #[test]
    fn test_upload_zero_write_is_protocol_violation() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("src.bin");
        std::fs::write(&local, b"payload").unwrap();
        let session = MockSession::new(Script {
            max_write: 0,
            ..Default::default()
        });

        let err = upload(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::ProtocolViolation);
        assert_eq!(session.events.borrow().closes, 1);
    }

    #[test]
    fn test_upload_write_error_maps_to_io_failure() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("src.bin");
        std::fs::write(&local, b"payload").unwrap();
        let session = MockSession::new(Script {
            write_error: Some(TransportError::new(None, "broken pipe")),
            ..Default::default()
        });

        let err = upload(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::IoFailure);
        assert_eq!(err.message(), "Error writing to SCP channel: broken pipe");
        assert_eq!(session.events.borrow().closes, 1);
    }

    #[test]
    fn test_upload_missing_source_never_opens_channel() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("absent.bin");
        let session = MockSession::new(Script::default());

        let err = upload(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::IoFailure);
        assert!(session.events.borrow().opens.is_empty());
    }

    #[test]
    fn test_upload_directory_source_never_opens_channel() {
        let dir = TempDir::new().unwrap();
        let session = MockSession::new(Script::default());

        let err = upload(&session, dir.path()).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::IoFailure);
        assert!(err.message().ends_with("is not a regular file"));
        assert!(session.events.borrow().opens.is_empty());
    }

    #[test]
    fn test_upload_open_refused() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("src.bin");
        std::fs::write(&local, b"payload").unwrap();
        let session = MockSession::new(Script {
            open_error: Some(TransportError::protocol("scp: /remote/dst.bin: Permission denied")),
            ..Default::default()
        });

        let err = upload(&session, &local).unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::RemoteOpenFailed);
        assert!(err.message().ends_with("Permission denied"));
    }

    #[test]
    fn test_channel_accessors() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("src.bin");
        std::fs::write(&local, b"12345").unwrap();
        let session = MockSession::new(Script::default());

        let channel = ScpChannel::<MockChannel>::open_upload(
            &session,
            &local,
            Path::new("/remote/dst.bin"),
            &ScpClientConfig::default(),
        )
        .unwrap();
        assert_eq!(channel.direction(), TransferDirection::Upload);
        assert_eq!(channel.declared_size(), Some(5));
        assert_eq!(channel.local_path(), local.as_path());
        assert_eq!(channel.remote_path(), Path::new("/remote/dst.bin"));

        // Dropping an unfinished channel still releases the transport.
        drop(channel);
        assert_eq!(session.events.borrow().closes, 1);
    }
}
