//! # ferroscp
//!
//! Secure Copy (SCP) client engine layered on an authenticated SSH session:
//!   • Single-file upload (`put`) and download (`get`)
//!   • Chunked I/O bounded by the 64 KiB transport read size
//!   • Typed errors whose messages carry stable, matchable prefixes
//!   • Guaranteed channel teardown on every exit path
//!   • libssh2 (`ssh2`) and local-loopback transports
//!
//! ```no_run
//! use ferroscp::scp::{connect, ScpConnectionConfig, ScpSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config: ScpConnectionConfig =
//!     serde_json::from_str(r#"{"host": "example.org", "username": "deploy", "useAgent": true}"#)?;
//! let session = connect(&config)?;
//! let mut scp = session.scp();
//! scp.put("build/app.tar.gz", "/srv/releases/app.tar.gz")?;
//! scp.get("/srv/releases/app.tar.gz", "/tmp/app.tar.gz")?;
//! # Ok(())
//! # }
//! ```

pub mod scp;
