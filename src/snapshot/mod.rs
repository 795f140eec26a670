//! In-memory record of the latest measurement and the running counters.
//!
//! The [`SnapshotStore`] is written by the monitor loop only and read by the
//! HTTP handlers, which always receive a full copy taken under one lock.

pub mod store;

use chrono::{DateTime, Utc};

pub use store::SnapshotStore;

/// Point-in-time copy of everything the exporter and the health check need.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub last_tcp_handshake_seconds: f64,
    pub last_ttfb_seconds: f64,
    pub last_load_time_seconds: f64,
    pub last_content_length_bytes: u64,
    pub last_status_code: u16,
    /// `None` until the first probe has completed.
    pub last_check_time: Option<DateTime<Utc>>,
    pub program_start_time: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(program_start_time: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            failed_requests: 0,
            last_tcp_handshake_seconds: 0.0,
            last_ttfb_seconds: 0.0,
            last_load_time_seconds: 0.0,
            last_content_length_bytes: 0,
            last_status_code: 0,
            last_check_time: None,
            program_start_time,
        }
    }

    /// Fraction of probes that failed, `0.0` before the first probe.
    pub fn failure_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }

    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now - self.program_start_time;
        (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
    }
}
