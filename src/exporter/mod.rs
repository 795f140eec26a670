use std::fmt::{Display, Write};

use chrono::{DateTime, Utc};

use crate::snapshot::Snapshot;

pub mod home;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const REQUESTS_TOTAL_METRIC: &str = "website_requests_total";
const FAILED_REQUESTS_TOTAL_METRIC: &str = "website_failed_requests_total";
const LOAD_TIME_METRIC: &str = "website_load_time_seconds";
const TCP_HANDSHAKE_METRIC: &str = "website_tcp_handshake_seconds";
const TTFB_METRIC: &str = "website_ttfb_seconds";
const CONTENT_LENGTH_METRIC: &str = "website_content_length_bytes";
const LAST_STATUS_CODE_METRIC: &str = "website_last_status_code";
const LAST_CHECK_TIME_METRIC: &str = "website_last_check_time_seconds";
const UPTIME_METRIC: &str = "program_uptime_seconds";

#[derive(Debug, Clone, Copy)]
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

fn write_metric(out: &mut String, name: &str, help: &str, kind: MetricType, value: impl Display) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {}", kind.as_str());
    let _ = writeln!(out, "{name} {value}");
}

/// Renders the snapshot in the Prometheus text exposition format.
///
/// Durations are written with millisecond precision, the last check time as
/// whole Unix seconds (`0` before the first probe) and the uptime as whole
/// seconds.
pub fn render_metrics(snapshot: &Snapshot, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(1536);

    write_metric(
        &mut out,
        REQUESTS_TOTAL_METRIC,
        "Total number of requests",
        MetricType::Counter,
        snapshot.total_requests,
    );
    write_metric(
        &mut out,
        FAILED_REQUESTS_TOTAL_METRIC,
        "Total number of failed requests",
        MetricType::Counter,
        snapshot.failed_requests,
    );
    write_metric(
        &mut out,
        LOAD_TIME_METRIC,
        "Time taken to fully load the website",
        MetricType::Gauge,
        format_args!("{:.3}", snapshot.last_load_time_seconds),
    );
    write_metric(
        &mut out,
        TCP_HANDSHAKE_METRIC,
        "Time taken for TCP handshake",
        MetricType::Gauge,
        format_args!("{:.3}", snapshot.last_tcp_handshake_seconds),
    );
    write_metric(
        &mut out,
        TTFB_METRIC,
        "Time to first byte (TTFB)",
        MetricType::Gauge,
        format_args!("{:.3}", snapshot.last_ttfb_seconds),
    );
    write_metric(
        &mut out,
        CONTENT_LENGTH_METRIC,
        "Size of the webpage content in bytes",
        MetricType::Gauge,
        snapshot.last_content_length_bytes,
    );
    write_metric(
        &mut out,
        LAST_STATUS_CODE_METRIC,
        "Last HTTP status code received",
        MetricType::Gauge,
        snapshot.last_status_code,
    );
    write_metric(
        &mut out,
        LAST_CHECK_TIME_METRIC,
        "Timestamp of last check",
        MetricType::Gauge,
        snapshot.last_check_time.map_or(0, |t| t.timestamp()),
    );
    write_metric(
        &mut out,
        UPTIME_METRIC,
        "Program uptime in seconds",
        MetricType::Gauge,
        format_args!("{:.0}", snapshot.uptime_seconds(now)),
    );

    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeDelta;

    use super::*;

    /// Checks the exposition rules the output relies on and returns the samples.
    fn parse_exposition(text: &str) -> HashMap<String, f64> {
        let mut helped = None;
        let mut typed = None;
        let mut samples = HashMap::new();

        for line in text.lines().filter(|l| !l.is_empty()) {
            if let Some(rest) = line.strip_prefix("# HELP ") {
                let (name, help) = rest.split_once(' ').expect("HELP has text");
                assert!(!help.is_empty());
                helped = Some(name.to_string());
            } else if let Some(rest) = line.strip_prefix("# TYPE ") {
                let (name, kind) = rest.split_once(' ').expect("TYPE has kind");
                assert!(matches!(kind, "counter" | "gauge"), "unexpected type {kind}");
                assert_eq!(helped.as_deref(), Some(name), "TYPE without HELP");
                typed = Some(name.to_string());
            } else {
                let (name, value) = line.split_once(' ').expect("sample has value");
                assert!(
                    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                    "bad metric name {name}"
                );
                assert_eq!(typed.as_deref(), Some(name), "sample without TYPE");
                let value: f64 = value.parse().expect("numeric sample");
                assert!(samples.insert(name.to_string(), value).is_none(), "duplicate {name}");
            }
        }
        samples
    }

    #[test]
    fn test_render_before_first_probe() {
        let start = Utc::now();
        let snapshot = Snapshot::new(start);

        let samples = parse_exposition(&render_metrics(&snapshot, start));

        assert_eq!(samples.len(), 9);
        assert_eq!(samples["website_requests_total"], 0.0);
        assert_eq!(samples["website_last_check_time_seconds"], 0.0);
        assert_eq!(samples["program_uptime_seconds"], 0.0);
    }

    #[test]
    fn test_render_after_probes() {
        let start = Utc::now();
        let checked = start + TimeDelta::seconds(42);
        let snapshot = Snapshot {
            total_requests: 12,
            failed_requests: 3,
            last_tcp_handshake_seconds: 0.0123,
            last_ttfb_seconds: 0.2,
            last_load_time_seconds: 1.23456,
            last_content_length_bytes: 65_536,
            last_status_code: 200,
            last_check_time: Some(checked),
            program_start_time: start,
        };

        let text = render_metrics(&snapshot, start + TimeDelta::seconds(120));
        let samples = parse_exposition(&text);

        assert_eq!(samples["website_requests_total"], 12.0);
        assert_eq!(samples["website_failed_requests_total"], 3.0);
        assert_eq!(samples["website_content_length_bytes"], 65_536.0);
        assert_eq!(samples["website_last_status_code"], 200.0);
        assert_eq!(samples["website_last_check_time_seconds"], checked.timestamp() as f64);
        assert_eq!(samples["program_uptime_seconds"], 120.0);
        assert!(text.contains("website_load_time_seconds 1.235\n"));
        assert!(text.contains("website_tcp_handshake_seconds 0.012\n"));
        assert!(text.contains("# TYPE website_requests_total counter\n"));
        assert!(text.contains("# TYPE website_ttfb_seconds gauge\n"));
    }
}
