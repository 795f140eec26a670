use std::path::PathBuf;

use thiserror::Error;

use crate::http_probe::proxy::InvalidProxy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid target URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target URL {url:?} must be absolute http or https with a host")]
    UnsupportedUrl { url: String },

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("{name} of {value}s exceeds the maximum of {max}s")]
    DurationTooLong {
        name: &'static str,
        value: u64,
        max: u64,
    },

    #[error(transparent)]
    Proxy(#[from] InvalidProxy),
}
