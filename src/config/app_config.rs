use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use url::Url;

use super::error::ConfigError;
use super::model::FileConfig;
use crate::http_probe::probe::ProbeSettings;
use crate::http_probe::proxy::ProxyConfig;

pub const DEFAULT_URL: &str = "https://cloud.ru";
pub const DEFAULT_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;
/// One week; keeps every derived deadline far away from `Duration`/`Instant` overflow.
pub const MAX_DURATION_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Website speed monitor exposing probe timings as Prometheus metrics.
#[derive(Debug, Default, Parser)]
#[command(name = "speedmon", version, about)]
pub struct Cli {
    /// URL of the website to monitor [default: https://cloud.ru]
    #[arg(long, env = "SPEEDMON_URL")]
    pub url: Option<String>,

    /// Seconds between probes [default: 30]
    #[arg(long, env = "SPEEDMON_INTERVAL", value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Port of the HTTP server [default: 8080]
    #[arg(long, env = "SPEEDMON_PORT")]
    pub port: Option<u16>,

    /// Request timeout in seconds [default: 10]
    #[arg(long, env = "SPEEDMON_TIMEOUT", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// TCP connect timeout in seconds [default: same as --timeout]
    #[arg(long, env = "SPEEDMON_CONNECT_TIMEOUT", value_name = "SECONDS")]
    pub connect_timeout: Option<u64>,

    /// Seconds to let open connections drain on shutdown [default: 5]
    #[arg(long, env = "SPEEDMON_SHUTDOWN_GRACE", value_name = "SECONDS")]
    pub shutdown_grace: Option<u64>,

    /// Optional YAML configuration file
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

/// Fully resolved and validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub target_url: Url,
    pub check_interval: Duration,
    pub port: u16,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub shutdown_grace: Duration,
    pub proxy: ProxyConfig,
}

impl AppConfig {
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            target: self.target_url.clone(),
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            proxy: self.proxy.clone(),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Load the application configuration from the command line, the environment
/// and, when `--config`/`CONFIG_FILE` is given, a YAML file.
/// Flags and environment variables win over the file, the file wins over the
/// built-in defaults. Outbound proxies come from `HTTP_PROXY`, `HTTPS_PROXY`
/// and `NO_PROXY`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let cli = Cli::parse();
    let file = cli.config.as_deref().map(read_file_config).transpose()?;
    let proxy = ProxyConfig::from_env()?;
    resolve(cli, file.unwrap_or_default(), proxy)
}

pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn resolve(cli: Cli, file: FileConfig, proxy: ProxyConfig) -> Result<AppConfig, ConfigError> {
    let url = cli
        .url
        .or(file.url)
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    let target_url = parse_target(&url)?;

    let check_interval = seconds(
        "interval",
        cli.interval
            .or(file.interval_seconds)
            .unwrap_or(DEFAULT_INTERVAL_SECONDS),
    )?;
    let request_timeout = seconds(
        "timeout",
        cli.timeout
            .or(file.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    )?;
    let connect_timeout = match cli.connect_timeout.or(file.connect_timeout_seconds) {
        Some(value) => seconds("connect timeout", value)?,
        None => request_timeout,
    };
    let shutdown_grace = seconds(
        "shutdown grace",
        cli.shutdown_grace
            .or(file.shutdown_grace_seconds)
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECONDS),
    )?;

    Ok(AppConfig {
        target_url,
        check_interval,
        port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
        request_timeout,
        connect_timeout,
        shutdown_grace,
        proxy,
    })
}

fn parse_target(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::UnsupportedUrl {
            url: raw.to_string(),
        });
    }
    Ok(url)
}

fn seconds(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroDuration { name });
    }
    if value > MAX_DURATION_SECONDS {
        return Err(ConfigError::DurationTooLong {
            name,
            value,
            max: MAX_DURATION_SECONDS,
        });
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = resolve(Cli::default(), FileConfig::default(), ProxyConfig::default()).expect("valid config");

        assert_eq!(config.target_url.as_str(), "https://cloud.ru/");
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.listen_addr(), "0.0.0.0:8080".parse().expect("addr"));
    }

    #[test]
    fn test_cli_flags_parse() {
        let cli = Cli::try_parse_from([
            "speedmon",
            "--url",
            "http://example.com/ping",
            "--interval",
            "5",
            "--port",
            "9000",
            "--timeout",
            "3",
        ])
        .expect("flags parse");
        let config = resolve(cli, FileConfig::default(), ProxyConfig::default()).expect("valid config");

        assert_eq!(config.target_url.as_str(), "http://example.com/ping");
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_cli_wins_over_file() {
        let cli = Cli {
            interval: Some(7),
            ..Cli::default()
        };
        let file = FileConfig {
            url: Some("https://example.org".to_string()),
            interval_seconds: Some(60),
            connect_timeout_seconds: Some(2),
            ..FileConfig::default()
        };
        let config = resolve(cli, file, ProxyConfig::default()).expect("valid config");

        assert_eq!(config.target_url.as_str(), "https://example.org/");
        assert_eq!(config.check_interval, Duration::from_secs(7));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_invalid_urls() {
        for url in ["not a url", "ftp://example.com", "mailto:ops@example.com"] {
            let cli = Cli {
                url: Some(url.to_string()),
                ..Cli::default()
            };
            assert!(resolve(cli, FileConfig::default(), ProxyConfig::default()).is_err(), "{url}");
        }
    }

    #[test]
    fn test_rejects_zero_durations() {
        let cli = Cli {
            interval: Some(0),
            ..Cli::default()
        };
        let err = resolve(cli, FileConfig::default(), ProxyConfig::default()).expect_err("zero interval");
        assert!(matches!(err, ConfigError::ZeroDuration { name: "interval" }));

        let file = FileConfig {
            timeout_seconds: Some(0),
            ..FileConfig::default()
        };
        assert!(resolve(Cli::default(), file, ProxyConfig::default()).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let cli = Cli::try_parse_from(["speedmon", "--interval", "18446744073709551615"])
            .expect("flags parse");
        let err = resolve(cli, FileConfig::default(), ProxyConfig::default()).expect_err("huge interval");
        assert!(matches!(err, ConfigError::DurationTooLong { name: "interval", .. }));

        let cli = Cli {
            interval: Some(MAX_DURATION_SECONDS),
            ..Cli::default()
        };
        assert!(resolve(cli, FileConfig::default(), ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_read_file_config_reports_missing_file() {
        let err = read_file_config(Path::new("/nonexistent/speedmon.yml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
