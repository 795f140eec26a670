use serde::Deserialize;

/// Optional YAML configuration file for the monitor.
/// Every key may be omitted; command line flags and environment variables
/// take precedence over the values found here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// The URL of the website to be monitored.
    pub url: Option<String>,

    /// Seconds between two probes.
    pub interval_seconds: Option<u64>,

    /// Port of the metrics/health HTTP server.
    pub port: Option<u16>,

    /// Upper bound in seconds for one whole probe.
    pub timeout_seconds: Option<u64>,

    /// Upper bound in seconds for establishing the TCP connection.
    /// Defaults to the request timeout when not specified.
    pub connect_timeout_seconds: Option<u64>,

    /// Seconds to wait for open connections to drain on shutdown.
    pub shutdown_grace_seconds: Option<u64>,
}
