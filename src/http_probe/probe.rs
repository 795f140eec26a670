use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HOST, LOCATION, PROXY_AUTHORIZATION, USER_AGENT};
use http::{HeaderValue, Method, Request, StatusCode, Version};
use http_body_util::{BodyExt, Empty};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tokio::task::JoinHandle;
use tokio_native_tls::{TlsConnector as TokioTlsConnector, TlsStream};
use url::{Host, Position, Url};

use super::prelude::*;
use super::proxy::proxy_authorization;

/// Redirect hops followed before the probe is counted as failed.
const MAX_REDIRECTS: usize = 10;
const PROBE_USER_AGENT: &str = concat!("speedmon/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub target: Url,
    /// Upper bound for the whole probe, redirects and body read included.
    pub request_timeout: Duration,
    /// Upper bound for a single TCP connect.
    pub connect_timeout: Duration,
    pub proxy: ProxyConfig,
}

/// Performs timed GET requests against one target.
///
/// Every probe opens fresh connections so the handshake time is measured on
/// each run instead of being hidden behind a pooled connection.
#[derive(Clone)]
pub struct Prober {
    settings: ProbeSettings,
    connector: TokioTlsConnector,
}

enum Hop {
    Redirect(String),
    Final(ProbeResult),
}

struct HopTiming {
    start: Instant,
    dns_time: Duration,
    tcp_handshake: Duration,
}

/// Aborts the spawned connection driver when the probe is dropped, e.g. on timeout.
struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Prober {
    pub fn new(settings: ProbeSettings) -> Result<Self, native_tls::Error> {
        let connector = native_tls::TlsConnector::new()?;
        Ok(Self {
            settings,
            connector: TokioTlsConnector::from(connector),
        })
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Run one probe: resolve, connect, GET, read the full body.
    pub async fn probe(&self) -> Result<ProbeResult, ProbeError> {
        let timeout = self.settings.request_timeout;
        let start = Instant::now();
        match tokio::time::timeout(timeout, self.follow(start)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }

    async fn follow(&self, start: Instant) -> Result<ProbeResult, ProbeError> {
        let mut url = self.settings.target.clone();
        let mut redirects = 0;

        loop {
            match self.fetch(&url, start).await? {
                Hop::Final(mut result) => {
                    result.redirects = redirects;
                    return Ok(result);
                }
                Hop::Redirect(location) => {
                    if redirects == MAX_REDIRECTS {
                        return Err(ProbeError::TooManyRedirects(redirects));
                    }
                    redirects += 1;
                    let next = url
                        .join(&location)
                        .map_err(|_| ProbeError::BadRedirect(location.clone()))?;
                    if !matches!(next.scheme(), "http" | "https") {
                        return Err(ProbeError::BadRedirect(location));
                    }
                    log::debug!("Following redirect {} -> {}", url, next);
                    url = next;
                }
            }
        }
    }

    async fn fetch(&self, url: &Url, start: Instant) -> Result<Hop, ProbeError> {
        let invalid = |reason| ProbeError::InvalidTarget {
            url: url.to_string(),
            reason,
        };

        let https = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(invalid("unsupported scheme")),
        };
        let host = dial_host(url).ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let proxy = self.settings.proxy.proxy_for(url);
        let (connect_host, connect_port) = match proxy {
            Some(proxy) => (
                dial_host(proxy).ok_or_else(|| invalid("proxy without host"))?,
                proxy
                    .port_or_known_default()
                    .ok_or_else(|| invalid("proxy without port"))?,
            ),
            None => (host.clone(), port),
        };
        // plain http goes to the proxy as an absolute-form request
        let request = build_request(url, proxy.filter(|_| !https))?;

        let dns_start = Instant::now();
        let addrs: Vec<SocketAddr> = lookup_host((connect_host.as_str(), connect_port))
            .await
            .map_err(|source| ProbeError::Resolve {
                host: connect_host.clone(),
                source,
            })?
            .collect();
        let dns_time = dns_start.elapsed();

        let (stream, tcp_handshake) = self.connect_any(&connect_host, &addrs).await?;
        let timing = HopTiming {
            start,
            dns_time,
            tcp_handshake,
        };

        match (https, proxy) {
            (false, _) => exchange(stream, request, timing, url).await,
            (true, None) => {
                let tls = self.tls(&host, stream).await?;
                exchange(tls, request, timing, url).await
            }
            (true, Some(proxy)) => {
                let authority = format!("{}:{port}", url.host_str().unwrap_or_default());
                let tunnel = tunnel(stream, &authority, proxy_authorization(proxy)).await?;
                let tls = self.tls(&host, tunnel).await?;
                exchange(tls, request, timing, url).await
            }
        }
    }

    /// Try each resolved address in order. The handshake time is that of the
    /// attempt that succeeded; when all fail the last error is returned.
    async fn connect_any(
        &self,
        host: &str,
        addrs: &[SocketAddr],
    ) -> Result<(TcpStream, Duration), ProbeError> {
        let mut last_error = None;
        for &addr in addrs {
            let attempt = Instant::now();
            match self.connect(addr).await {
                Ok(stream) => return Ok((stream, attempt.elapsed())),
                Err(e) => {
                    log::debug!("Connect attempt for {host} failed: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ProbeError::NoAddress(host.to_string())))
    }

    async fn connect(&self, addr: SocketAddr) -> Result<TcpStream, ProbeError> {
        let timeout = self.settings.connect_timeout;
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ProbeError::Connect { addr, source }),
            Err(_) => Err(ProbeError::ConnectTimeout { addr, timeout }),
        }
    }

    async fn tls<S>(&self, host: &str, stream: S) -> Result<TlsStream<S>, ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.connector
            .connect(host, stream)
            .await
            .map_err(|source| ProbeError::Tls {
                host: host.to_string(),
                source,
            })
    }
}

/// Host name or bare IP literal suitable for resolving.
fn dial_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

/// GET for `url`. With `forward_proxy` set the request line carries the
/// absolute URI and the proxy credentials are attached.
fn build_request(
    url: &Url,
    forward_proxy: Option<&Url>,
) -> Result<Request<Empty<Bytes>>, ProbeError> {
    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let target = match forward_proxy {
        Some(_) => &url[..Position::AfterQuery],
        None => &url[Position::BeforePath..Position::AfterQuery],
    };

    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(target)
        .header(HOST, authority)
        .header(USER_AGENT, PROBE_USER_AGENT);
    if let Some(credentials) = forward_proxy.and_then(proxy_authorization) {
        builder = builder.header(PROXY_AUTHORIZATION, credentials);
    }
    Ok(builder.body(Empty::new())?)
}

/// Ask an http proxy to `CONNECT` to `authority` and hand back the raw tunnel.
async fn tunnel(
    stream: TcpStream,
    authority: &str,
    credentials: Option<HeaderValue>,
) -> Result<TokioIo<Upgraded>, ProbeError> {
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(ProbeError::ProxyTunnel)?;
    let _conn = ConnectionTask(tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            log::debug!("Proxy connection closed with error: {e}");
        }
    }));

    let mut builder = Request::builder()
        .method(Method::CONNECT)
        .uri(authority)
        .header(HOST, authority)
        .header(USER_AGENT, PROBE_USER_AGENT);
    if let Some(credentials) = credentials {
        builder = builder.header(PROXY_AUTHORIZATION, credentials);
    }
    let response = sender
        .send_request(builder.body(Empty::<Bytes>::new())?)
        .await
        .map_err(ProbeError::ProxyTunnel)?;
    if response.status() != StatusCode::OK {
        return Err(ProbeError::ProxyRefused(response.status().as_u16()));
    }

    let upgraded = hyper::upgrade::on(response)
        .await
        .map_err(ProbeError::ProxyTunnel)?;
    Ok(TokioIo::new(upgraded))
}

async fn exchange<S>(
    io: S,
    request: Request<Empty<Bytes>>,
    timing: HopTiming,
    url: &Url,
) -> Result<Hop, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(ProbeError::Exchange)?;
    let _conn = ConnectionTask(tokio::spawn(async move {
        if let Err(e) = conn.await {
            log::debug!("Probe connection closed with error: {e}");
        }
    }));

    let response = sender
        .send_request(request)
        .await
        .map_err(ProbeError::Exchange)?;
    let ttfb = timing.start.elapsed();

    let status = response.status();
    if is_followed_redirect(status) {
        if let Some(location) = response.headers().get(LOCATION) {
            let location = location
                .to_str()
                .map_err(|_| {
                    ProbeError::BadRedirect(String::from_utf8_lossy(location.as_bytes()).into_owned())
                })?
                .to_string();
            return Ok(Hop::Redirect(location));
        }
    }

    let http_version = format_version(response.version());
    let mut body = response.into_body();
    let mut content_length = 0u64;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(ProbeError::Body)?;
        if let Some(chunk) = frame.data_ref() {
            content_length += chunk.len() as u64;
        }
    }
    let load_time = timing.start.elapsed();

    Ok(Hop::Final(ProbeResult {
        url: url.to_string(),
        dns_time: timing.dns_time,
        tcp_handshake: timing.tcp_handshake,
        ttfb,
        load_time,
        content_length,
        http_status: status.as_u16(),
        http_version,
        redirects: 0,
    }))
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn format_version(version: Version) -> String {
    match version {
        Version::HTTP_09 => "HTTP/0.9".to_string(),
        Version::HTTP_10 => "HTTP/1.0".to_string(),
        Version::HTTP_11 => "HTTP/1.1".to_string(),
        Version::HTTP_2 => "HTTP/2.0".to_string(),
        Version::HTTP_3 => "HTTP/3.0".to_string(),
        _ => "UNKNOWN".to_string(),
    }
}
