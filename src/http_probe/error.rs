use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target {url}: {reason}")]
    InvalidTarget { url: String, reason: &'static str },

    #[error("failed to resolve {host}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no addresses found for {0}")]
    NoAddress(String),

    #[error("failed to connect to {addr}")]
    Connect {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        addr: std::net::SocketAddr,
        timeout: Duration,
    },

    #[error("TLS handshake with {host} failed")]
    Tls {
        host: String,
        #[source]
        source: native_tls::Error,
    },

    #[error("proxy refused to open a tunnel (status {0})")]
    ProxyRefused(u16),

    #[error("proxy tunnel failed")]
    ProxyTunnel(#[source] hyper::Error),

    #[error("failed to build request")]
    Request(#[from] http::Error),

    #[error("HTTP exchange failed")]
    Exchange(#[source] hyper::Error),

    #[error("failed to read response body")]
    Body(#[source] hyper::Error),

    #[error("redirect to invalid location {0:?}")]
    BadRedirect(String),

    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

impl ProbeError {
    /// Short stable label for the failure phase, used in log lines.
    pub fn phase(&self) -> &'static str {
        match self {
            ProbeError::InvalidTarget { .. }
            | ProbeError::Request(_)
            | ProbeError::BadRedirect(_)
            | ProbeError::TooManyRedirects(_) => "request",
            ProbeError::Resolve { .. } | ProbeError::NoAddress(_) => "resolve",
            ProbeError::Connect { .. } | ProbeError::ConnectTimeout { .. } => "connect",
            ProbeError::ProxyRefused(_) | ProbeError::ProxyTunnel(_) => "proxy",
            ProbeError::Tls { .. } => "tls",
            ProbeError::Exchange(_) => "exchange",
            ProbeError::Body(_) => "body",
            ProbeError::Timeout(_) => "timeout",
        }
    }
}
