use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::Snapshot;
use crate::http_probe::result::ProbeResult;

/// Serializes every read and write of the process-wide [`Snapshot`].
///
/// Each write is a single critical section, so readers either see all fields
/// of a probe or none of them.
#[derive(Debug)]
pub struct SnapshotStore {
    inner: RwLock<Snapshot>,
}

impl SnapshotStore {
    pub fn new(program_start_time: DateTime<Utc>) -> Self {
        Self {
            inner: RwLock::new(Snapshot::new(program_start_time)),
        }
    }

    pub fn record_success(&self, result: &ProbeResult) {
        self.record_success_at(result, Utc::now());
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Utc::now());
    }

    pub fn read(&self) -> Snapshot {
        self.read_guard().clone()
    }

    pub(crate) fn record_success_at(&self, result: &ProbeResult, now: DateTime<Utc>) {
        let mut snapshot = self.write_guard();
        snapshot.total_requests += 1;
        snapshot.last_tcp_handshake_seconds = result.tcp_handshake.as_secs_f64();
        snapshot.last_ttfb_seconds = result.ttfb.as_secs_f64();
        snapshot.last_load_time_seconds = result.load_time.as_secs_f64();
        snapshot.last_content_length_bytes = result.content_length;
        snapshot.last_status_code = result.http_status;
        advance_check_time(&mut snapshot, now);
    }

    pub(crate) fn record_failure_at(&self, now: DateTime<Utc>) {
        let mut snapshot = self.write_guard();
        snapshot.total_requests += 1;
        snapshot.failed_requests += 1;
        advance_check_time(&mut snapshot, now);
    }

    // A panic can't leave the snapshot half written: no write section has a
    // fallible step, so a poisoned lock still guards consistent data.
    fn read_guard(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps `last_check_time` monotonic even if the wall clock steps backwards.
fn advance_check_time(snapshot: &mut Snapshot, now: DateTime<Utc>) {
    snapshot.last_check_time = Some(match snapshot.last_check_time {
        Some(previous) if previous > now => previous,
        _ => now,
    });
}
