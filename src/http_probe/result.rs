use std::time::Duration;

/// Timings and response facts gathered by one successful probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// The URL that produced the final response, after redirects.
    pub url: String,
    pub dns_time: Duration,
    pub tcp_handshake: Duration,
    pub ttfb: Duration,
    pub load_time: Duration,
    pub content_length: u64,
    pub http_status: u16,
    pub http_version: String,
    pub redirects: usize,
}
