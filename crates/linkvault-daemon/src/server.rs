//! Local interception proxy
//!
//! Accepts HTTP/1 connections on `server.listen`, turns each request into a
//! [`RequestSnapshot`], and answers with whatever the [`NetworkRouter`]
//! decides. Errors the router propagates become `502 Bad Gateway`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use linkvault_core::domain::{HttpResponse, RequestSnapshot};
use linkvault_offline::NetworkRouter;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Response headers the proxy recomputes itself
const SKIPPED_RESPONSE_HEADERS: &[&str] = &["connection", "content-length", "transfer-encoding"];

/// HTTP server dispatching intercepted requests through the router
pub struct ProxyServer {
    router: Arc<NetworkRouter>,
    listener: TcpListener,
    addr: SocketAddr,
}

impl ProxyServer {
    /// Binds the listening socket
    ///
    /// # Arguments
    /// * `router` - The shared request router
    /// * `listen` - Address to bind, e.g. `"127.0.0.1:8787"` (port 0 picks one)
    pub async fn bind(router: Arc<NetworkRouter>, listen: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = listen
            .parse()
            .with_context(|| format!("Invalid listen address: {listen}"))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let addr = listener.local_addr()?;
        Ok(Self {
            router,
            listener,
            addr,
        })
    }

    /// The address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves connections until `shutdown` is cancelled
    ///
    /// Connection tasks are spawned on `tracker` so in-flight requests can be
    /// awaited at shutdown.
    pub async fn run(self, shutdown: CancellationToken, tracker: TaskTracker) -> anyhow::Result<()> {
        info!(addr = %self.addr, "Proxy listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let router = Arc::clone(&self.router);

                    tracker.spawn(async move {
                        let service = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { handle_request(req, &router).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, peer = %peer, "Proxy connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Proxy shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handles a single intercepted request
async fn handle_request(
    req: Request<Incoming>,
    router: &NetworkRouter,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let snapshot = match to_snapshot(req).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "Could not read request");
            return Ok(error_response(StatusCode::BAD_REQUEST, &e.to_string()));
        }
    };

    match router.handle(snapshot).await {
        Ok(response) => Ok(to_hyper(response)),
        Err(e) => {
            warn!(error = %e, "Request failed");
            Ok(error_response(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

async fn to_snapshot(req: Request<Incoming>) -> anyhow::Result<RequestSnapshot> {
    let (parts, body) = req.into_parts();
    let url = parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

    let mut snapshot = RequestSnapshot::new(parts.method.as_str(), url);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            snapshot = snapshot.with_header(name.as_str(), value);
        }
    }

    let body = body.collect().await.context("Failed to read body")?.to_bytes();
    if !body.is_empty() {
        snapshot = snapshot.with_body(body.to_vec());
    }
    debug!(method = %snapshot.method(), url = %snapshot.url(), "Intercepted request");
    Ok(snapshot)
}

fn to_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers: Vec<(String, String)> = response.headers().to_vec();

    let mut out = Response::new(Full::new(Bytes::from(response.into_body())));
    *out.status_mut() = status;
    for (name, value) in headers {
        if SKIPPED_RESPONSE_HEADERS
            .iter()
            .any(|h| name.eq_ignore_ascii_case(h))
        {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            out.headers_mut().append(name, value);
        }
    }
    out
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(Bytes::from(message.to_string())));
    *out.status_mut() = status;
    out.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    out
}
