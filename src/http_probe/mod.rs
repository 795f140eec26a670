pub mod error;
pub mod probe;
pub mod proxy;
pub mod result;

use std::fmt::Write;

pub mod prelude {
    pub use super::error::ProbeError;
    pub use super::probe::{ProbeSettings, Prober};
    pub use super::proxy::ProxyConfig;
    pub use super::result::ProbeResult;
}

/// Flatten an error and its sources into one printable string.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::*;

    #[test]
    fn test_report_includes_sources() {
        let err = ProbeError::Resolve {
            host: "example.invalid".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such host"),
        };
        assert_eq!(
            report(&err),
            "failed to resolve example.invalid: no such host"
        );
    }

    #[test]
    fn test_report_without_source() {
        let err = ProbeError::TooManyRedirects(10);
        assert_eq!(report(&err), "stopped after 10 redirects");
    }
}
