//! Gateway configuration.
//!
//! [`GatewayConfig`] carries defaults for every knob and can be adjusted
//! with fluent setters or overridden from the environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `MEDIAGATE_MEDIA_SERVER_URL` | WebSocket URL of the media server |
//! | `MEDIAGATE_LISTEN_ADDR` | address for accepted client sockets |
//! | `MEDIAGATE_REQUEST_TIMEOUT_SECS` | pending request expiry, `0` disables |
//! | `MEDIAGATE_CREATE_FAILURE` | `raise` or `log` |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mediagate::config::{CreateFailure, GatewayConfig};
//!
//! let config = GatewayConfig::default()
//!     .with_request_timeout(Some(Duration::from_secs(5)))
//!     .with_create_failure(CreateFailure::Log);
//! assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Default media server endpoint.
pub const DEFAULT_MEDIA_SERVER_URL: &str = "ws://127.0.0.1:8888/kurento";

/// Default address for client-facing sockets.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default expiry for requests that never receive a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

const ENV_MEDIA_SERVER_URL: &str = "MEDIAGATE_MEDIA_SERVER_URL";
const ENV_LISTEN_ADDR: &str = "MEDIAGATE_LISTEN_ADDR";
const ENV_REQUEST_TIMEOUT: &str = "MEDIAGATE_REQUEST_TIMEOUT_SECS";
const ENV_CREATE_FAILURE: &str = "MEDIAGATE_CREATE_FAILURE";

/// What `create()` on a remote object does when the server refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateFailure {
    /// Return the error to the caller.
    #[default]
    Raise,
    /// Log the error and leave the object uninitialized.
    Log,
}

impl CreateFailure {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "raise" => Ok(CreateFailure::Raise),
            "log" => Ok(CreateFailure::Log),
            other => Err(GatewayError::Config(format!(
                "{}: expected 'raise' or 'log', got '{}'",
                ENV_CREATE_FAILURE, other
            ))),
        }
    }
}

/// Configuration shared by the transport, session and media layers.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// WebSocket URL of the remote media-control server.
    pub media_server_url: String,
    /// Address the client-facing listener binds to.
    pub listen_addr: SocketAddr,
    /// Pending requests older than this are evicted. `None` keeps them forever.
    pub request_timeout: Option<Duration>,
    /// How often the session sweeps for expired requests.
    pub sweep_interval: Duration,
    /// Behavior of `create()` on remote failure.
    pub create_failure: CreateFailure,
    /// Fail every pending request once the inbound side closes.
    pub abandon_on_close: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            media_server_url: DEFAULT_MEDIA_SERVER_URL.to_string(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            create_failure: CreateFailure::Raise,
            abandon_on_close: true,
        }
    }
}

impl GatewayConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_MEDIA_SERVER_URL) {
            self.media_server_url = url;
        }

        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            self.listen_addr = addr.parse().map_err(|e| {
                GatewayError::Config(format!("{}: {} ({})", ENV_LISTEN_ADDR, addr, e))
            })?;
        }

        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                GatewayError::Config(format!("{}: {} ({})", ENV_REQUEST_TIMEOUT, secs, e))
            })?;
            self.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(mode) = lookup(ENV_CREATE_FAILURE) {
            self.create_failure = CreateFailure::parse(&mode)?;
        }

        Ok(self)
    }

    /// Set the media server URL.
    pub fn with_media_server_url(mut self, url: impl Into<String>) -> Self {
        self.media_server_url = url.into();
        self
    }

    /// Set the listen address.
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set the pending request expiry.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the expiry sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the `create()` failure behavior.
    pub fn with_create_failure(mut self, mode: CreateFailure) -> Self {
        self.create_failure = mode;
        self
    }

    /// Choose whether pending requests fail when the connection closes.
    pub fn with_abandon_on_close(mut self, abandon: bool) -> Self {
        self.abandon_on_close = abandon;
        self
    }
}
