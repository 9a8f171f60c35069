// ── ferroscp / scp module ─────────────────────────────────────────────────────
//
// Blocking single-file SCP engine:
//   • `transport` – the session/channel traits the engine drives
//   • `channel` – one transfer, one direction, chunked copy loop
//   • `client` – `get` / `put` bound to a session
//   • `error` / `mapper` – typed failures with stable message prefixes
//   • `ssh2_transport` – libssh2 implementation of the transport traits
//   • `loopback` – local-filesystem implementation of the transport traits
//   • `session` – connecting and authenticating an ssh2 session

pub mod types;
pub mod error;
pub mod mapper;
pub mod transport;
pub mod channel;
pub mod client;
pub mod ssh2_transport;
pub mod loopback;
pub mod session;

pub use types::*;
pub use error::{TransferError, TransferErrorKind, TransferResult, TransportError};
pub use mapper::STAT_FAILED_PREFIX;
pub use transport::{ScpChannelHandle, ScpSession};
pub use channel::ScpChannel;
pub use client::ScpClient;
pub use ssh2_transport::Ssh2ScpChannel;
pub use loopback::{LoopbackChannel, LoopbackSession};
pub use session::{connect, ConnectError};
