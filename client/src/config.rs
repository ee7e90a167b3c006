//! Client configuration and server address resolution

use crate::error::{ClientError, ClientResult};
use protocol::DEFAULT_PORT;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::timeout;

/// Receives every chat message the server sends us.
pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Clone)]
pub struct ClientConfig {
    /// Server address as `host[:port]`
    pub server: String,
    pub username: String,
    /// Only kept for private servers; no authentication mechanism is implemented
    pub password: String,
    /// `None` waits for the server indefinitely
    pub handshake_timeout: Option<Duration>,
    /// Log every wire field through the codec trace hook
    pub trace: bool,
    pub on_message: Option<MessageCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("localhost:{}", DEFAULT_PORT),
            username: "user".to_string(),
            password: String::new(),
            handshake_timeout: None,
            trace: false,
            on_message: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("trace", &self.trace)
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

impl ClientConfig {
    pub fn new(server: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_handshake_timeout(mut self, limit: Option<Duration>) -> Self {
        self.handshake_timeout = limit;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(callback));
        self
    }
}

/// Splits `host[:port]` into its parts, defaulting the port.
///
/// IPv6 literals must be bracketed when a port is given (`[::1]:30000`);
/// a bare literal such as `::1` is taken as a host without port.
pub fn split_host_port(server: &str) -> ClientResult<(String, u16)> {
    let invalid = || ClientError::InvalidAddress(server.to_string());

    if let Some(rest) = server.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => DEFAULT_PORT,
            _ => tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok((host.to_string(), port));
    }

    match server.split_once(':') {
        Some((host, port)) if !port.contains(':') => {
            let port = port.parse().map_err(|_| invalid())?;
            if host.is_empty() {
                return Err(invalid());
            }
            Ok((host.to_string(), port))
        }
        Some(_) => Ok((server.to_string(), DEFAULT_PORT)),
        None if server.is_empty() => Err(invalid()),
        None => Ok((server.to_string(), DEFAULT_PORT)),
    }
}

pub async fn resolve(server: &str) -> ClientResult<SocketAddr> {
    let (host, port) = split_host_port(server)?;
    let addr = lookup_host((host.as_str(), port))
        .await?
        .next()
        .ok_or_else(|| ClientError::InvalidAddress(server.to_string()));
    addr
}

/// Awaits `fut`, giving up after `limit` when one is set.
pub(crate) async fn bounded<F: Future>(limit: Option<Duration>, fut: F) -> ClientResult<F::Output> {
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| ClientError::HandshakeTimeout),
        None => Ok(fut.await),
    }
}
