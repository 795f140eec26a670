//! Timer-driven probe loop feeding the [`SnapshotStore`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::http_probe::prelude::*;
use crate::http_probe::report;
use crate::snapshot::SnapshotStore;

/// Probe once and record the outcome. Errors end up in the store and the log,
/// never in the caller.
pub async fn run_check(prober: &Prober, store: &SnapshotStore) {
    match prober.probe().await {
        Ok(result) => {
            store.record_success(&result);
            log::info!(
                "Website check completed - URL: {}, Status: {}, DNS: {:.3}s, TCP: {:.3}s, TTFB: {:.3}s, Total: {:.3}s, Size: {} bytes, {}, redirects: {}",
                result.url,
                result.http_status,
                result.dns_time.as_secs_f64(),
                result.tcp_handshake.as_secs_f64(),
                result.ttfb.as_secs_f64(),
                result.load_time.as_secs_f64(),
                result.content_length,
                result.http_version,
                result.redirects,
            );
        }
        Err(e) => {
            store.record_failure();
            log::warn!(
                "Website check failed ({}) for {}: {}",
                e.phase(),
                prober.settings().target,
                report(&e)
            );
        }
    }
}

/// Probe immediately, then once per `every` until `shutdown` is cancelled.
///
/// Probes run one after another on this task, so at most one is in flight.
/// Cancellation is only observed between probes; a running probe finishes
/// (bounded by its request timeout) first. Ticks missed while a probe ran
/// long are skipped, not queued.
pub async fn run(
    prober: Prober,
    store: Arc<SnapshotStore>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        run_check(&prober, &store).await;
    }

    log::info!("Stopping website monitoring");
}
