//! Liveness policy derived from a [`Snapshot`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::snapshot::Snapshot;

/// Below this many probes the failure ratio is not trusted yet.
const MIN_REQUESTS_FOR_RATIO: u64 = 10;
const MAX_FAILURE_RATIO: f64 = 0.5;
/// A check older than this many intervals counts as stale.
const STALE_INTERVALS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhealthyReason {
    NoRecentChecks,
    HighFailureRate,
}

impl fmt::Display for UnhealthyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnhealthyReason::NoRecentChecks => f.write_str("No recent checks"),
            UnhealthyReason::HighFailureRate => f.write_str("High failure rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy(UnhealthyReason),
}

/// Evaluate the snapshot against the health policy. First matching rule wins:
/// stale data, then a failure ratio above one half once more than ten probes
/// have run.
pub fn evaluate(snapshot: &Snapshot, check_interval: Duration, now: DateTime<Utc>) -> Health {
    let stale_after = check_interval
        .checked_mul(STALE_INTERVALS)
        .and_then(|window| TimeDelta::from_std(window).ok())
        .unwrap_or(TimeDelta::MAX);
    let stale = match snapshot.last_check_time {
        Some(checked) => now - checked > stale_after,
        None => true,
    };
    if stale {
        return Health::Unhealthy(UnhealthyReason::NoRecentChecks);
    }

    if snapshot.total_requests > MIN_REQUESTS_FOR_RATIO
        && snapshot.failure_ratio() > MAX_FAILURE_RATIO
    {
        return Health::Unhealthy(UnhealthyReason::HighFailureRate);
    }

    Health::Healthy
}
