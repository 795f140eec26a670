use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::snapshot::Snapshot;

pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Escape the five HTML-significant characters for text and attribute values.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Informational landing page with links to the metrics and health endpoints.
pub fn render_home(
    target_url: &str,
    check_interval: Duration,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> String {
    format!(
        r#"<html>
<head><title>Website Speed Monitor</title></head>
<body>
	<h1>Website Speed Monitor</h1>
	<p>Monitoring: {}</p>
	<p>Check interval: {}s</p>
	<ul>
		<li><a href="/metrics">Metrics</a> (Prometheus format)</li>
		<li><a href="/health">Health Check</a></li>
	</ul>
	<footer>Uptime: {:.1} minutes</footer>
</body>
</html>"#,
        escape_html(target_url),
        check_interval.as_secs(),
        snapshot.uptime_seconds(now) / 60.0,
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_home_lists_target_and_uptime() {
        let start = Utc::now();
        let snapshot = Snapshot::new(start);
        let page = render_home(
            "https://example.com/?a=1&b=<2>",
            Duration::from_secs(30),
            &snapshot,
            start + TimeDelta::seconds(90),
        );

        assert!(page.contains("Monitoring: https://example.com/?a=1&amp;b=&lt;2&gt;"));
        assert!(page.contains("Check interval: 30s"));
        assert!(page.contains("Uptime: 1.5 minutes"));
        assert!(page.contains(r#"href="/metrics""#));
        assert!(page.contains(r#"href="/health""#));
    }
}
