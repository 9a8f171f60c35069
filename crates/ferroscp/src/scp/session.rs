// ── Session establishment – an authenticated ssh2::Session for SCP ──────────

use crate::scp::types::ScpConnectionConfig;
use log::{info, warn};
use ssh2::Session;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

const DEFAULT_KEY_NAMES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("TCP connection to {addr} failed: {source}")]
    Tcp {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("SSH handshake failed: {0}")]
    Handshake(#[source] ssh2::Error),
    #[error("All authentication methods exhausted for user '{0}'")]
    AuthExhausted(String),
}

/// Open a TCP connection, run the SSH handshake and authenticate.
///
/// Methods are tried in order: agent (if enabled), explicit key file,
/// default keys under `~/.ssh`, password. Host keys are not verified here.
pub fn connect(config: &ScpConnectionConfig) -> Result<Session, ConnectError> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("SCP connecting to {}", addr);

    let socket_addr = resolve(&addr)?;
    let tcp = TcpStream::connect_timeout(&socket_addr, Duration::from_secs(config.timeout_secs))
        .map_err(|source| ConnectError::Tcp {
            addr: addr.clone(),
            source,
        })?;

    let mut session = Session::new().map_err(ConnectError::Handshake)?;
    session.set_timeout((config.timeout_secs * 1000).min(u32::MAX as u64) as u32);
    session.set_tcp_stream(tcp);
    session.handshake().map_err(ConnectError::Handshake)?;

    let method = authenticate(&session, config)?;
    info!("SCP authenticated to {} via {}", addr, method);

    // Transfers block for as long as they need; only the handshake is timed.
    session.set_timeout(0);
    let keepalive = config.keepalive_interval_secs;
    session.set_keepalive(keepalive > 0, keepalive.min(u32::MAX as u64) as u32);

    Ok(session)
}

fn resolve(addr: &str) -> Result<SocketAddr, ConnectError> {
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConnectError::InvalidAddress(addr.to_string()))
}

/// Run one auth attempt; success means libssh2 now reports the session
/// as authenticated.
fn attempt(session: &Session, result: Result<(), ssh2::Error>) -> bool {
    result.is_ok() && session.authenticated()
}

fn authenticate(session: &Session, config: &ScpConnectionConfig) -> Result<String, ConnectError> {
    let user = config.username.as_str();
    let passphrase = config.private_key_passphrase.as_deref();

    if config.use_agent {
        if attempt(session, session.userauth_agent(user)) {
            return Ok("agent".into());
        }
        warn!("SCP agent auth failed for {}, trying other methods", user);
    }

    if let Some(key_path) = config.private_key_path.as_deref() {
        let result = session.userauth_pubkey_file(user, None, Path::new(key_path), passphrase);
        if attempt(session, result) {
            return Ok("publickey-file".into());
        }
        warn!("SCP publickey-file auth failed for {}", user);
    }

    let default_keys = dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .into_iter()
        .flat_map(|ssh_dir| DEFAULT_KEY_NAMES.iter().map(move |name| (*name, ssh_dir.join(name))))
        .filter(|(_, path)| path.exists());
    for (key_name, key_path) in default_keys {
        if attempt(session, session.userauth_pubkey_file(user, None, &key_path, passphrase)) {
            return Ok(format!("publickey-default({})", key_name));
        }
    }

    if let Some(password) = config.password.as_deref() {
        if attempt(session, session.userauth_password(user, password)) {
            return Ok("password".into());
        }
        warn!("SCP password auth failed for {}", user);
    }

    Err(ConnectError::AuthExhausted(config.username.clone()))
}
