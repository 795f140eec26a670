//! Pull endpoints: `/` home page, `/metrics` exposition and `/health`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::exporter::{self, home};
use crate::health::{self, Health};
use crate::snapshot::SnapshotStore;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Everything a request handler needs; cheap to clone per connection.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub target_url: Arc<str>,
    pub check_interval: Duration,
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Map a request line onto a response. `HEAD` is answered like `GET`; hyper
/// drops the body on the wire.
pub fn route(method: &Method, path: &str, state: &AppState, now: DateTime<Utc>) -> Response<Full<Bytes>> {
    if !matches!(path, "/" | "/metrics" | "/health") {
        return respond(StatusCode::NOT_FOUND, PLAIN_TEXT, "404 page not found\n");
    }
    if method != Method::GET && method != Method::HEAD {
        let mut response = respond(StatusCode::METHOD_NOT_ALLOWED, PLAIN_TEXT, "405 method not allowed\n");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
        return response;
    }

    let snapshot = state.store.read();
    match path {
        "/metrics" => respond(
            StatusCode::OK,
            exporter::CONTENT_TYPE,
            exporter::render_metrics(&snapshot, now),
        ),
        "/health" => match health::evaluate(&snapshot, state.check_interval, now) {
            Health::Healthy => respond(StatusCode::OK, PLAIN_TEXT, "OK"),
            Health::Unhealthy(reason) => respond(
                StatusCode::SERVICE_UNAVAILABLE,
                PLAIN_TEXT,
                format!("UNHEALTHY: {reason}"),
            ),
        },
        _ => respond(
            StatusCode::OK,
            home::CONTENT_TYPE,
            home::render_home(&state.target_url, state.check_interval, &snapshot, now),
        ),
    }
}

/// Accept connections until `shutdown` fires, then give open connections
/// `grace` to finish before aborting them.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
    grace: Duration,
) {
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        log::warn!("Failed to accept connection: {e}");
                        continue;
                    }
                };
                let state = state.clone();
                let service = service_fn(move |req: Request<Incoming>| {
                    let response = route(req.method(), req.uri().path(), &state, Utc::now());
                    async move { Ok::<_, Infallible>(response) }
                });
                let conn = graceful.watch(
                    http1::Builder::new().serve_connection(TokioIo::new(stream), service),
                );
                connections.spawn(async move {
                    if let Err(e) = conn.await {
                        log::debug!("Connection from {peer} closed with error: {e}");
                    }
                });
            }
        }
    }

    drop(listener);
    log::info!("Shutting down server...");
    match tokio::time::timeout(grace, graceful.shutdown()).await {
        Ok(()) => log::info!("All connections drained"),
        Err(_) => {
            log::warn!(
                "Timed out after {grace:?} waiting for {} connection(s) to drain, closing them",
                connections.len()
            );
            connections.abort_all();
        }
    }
}
