//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener until shutdown
//! - Tunnel connections that open with an upgrade handshake straight off the
//!   socket
//! - Serve every other connection with hyper's HTTP/1.1 server, upgrades
//!   enabled
//! - Resolve the Host header into a route
//! - Dispatch to the HTTP forwarder or the tunnel forwarder
//! - Drain in-flight connections on shutdown

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::forward::{self, path_and_query};
use crate::http::preface::{self, Preface, UpgradeRequest};
use crate::http::response::{self, ProxyBody};
use crate::http::tunnel::{self, is_upgrade_request};
use crate::net::{
    Accepted, BufferedStream, ConnectionGuard, ConnectionTracker, Listener, ListenerError,
};
use crate::routing::{PortMapper, Rejection, Route};

/// How long a new connection may take to send its first request head.
/// Matches hyper's own header read timeout.
const FIRST_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request dispatch state, cloned into every connection.
#[derive(Debug, Clone)]
pub struct Proxy {
    ports: Arc<PortMapper>,
    upstream_host: IpAddr,
    listen_port: u16,
}

impl Proxy {
    /// Create the dispatcher. `listen_port` is quoted in 400 responses.
    pub fn new(ports: Arc<PortMapper>, upstream_host: IpAddr, listen_port: u16) -> Self {
        Self {
            ports,
            upstream_host,
            listen_port,
        }
    }

    /// Route one request served by hyper.
    ///
    /// An `Err` means the client connection must be closed without a
    /// response; this only happens for upgrade requests.
    pub async fn handle(&self, request: Request<Incoming>) -> Result<Response<ProxyBody>, ProxyError> {
        let upgrade = is_upgrade_request(&request);
        let route = match self.route(&request, upgrade) {
            Ok(route) => route,
            Err(rejection) if upgrade => return Err(rejection.into()),
            Err(_) => return Ok(response::bad_request(self.listen_port)),
        };

        if upgrade {
            tunnel::tunnel(request, &route, self.upstream_host).await
        } else {
            Ok(forward::forward(request, &route, self.upstream_host).await)
        }
    }

    /// Tunnel an upgrade handshake that opened `client`. Returns once the
    /// tunnel is closed; an unroutable handshake just drops the client.
    pub async fn handle_upgrade(&self, client: TcpStream, upgrade: UpgradeRequest) {
        let Ok(route) = self.route(&upgrade.request, true) else {
            return;
        };
        // Failures are logged by the tunnel; the client is closed either way.
        let _ = tunnel::tunnel_raw(client, upgrade, &route, self.upstream_host).await;
    }

    fn route<B>(&self, request: &Request<B>, upgrade: bool) -> Result<Route, Rejection> {
        let host = request.headers().get(HOST).and_then(|v| v.to_str().ok());
        Route::resolve(host, &self.ports).inspect_err(|rejection| {
            tracing::warn!(
                host = host.unwrap_or("-"),
                reason = %rejection,
                method = %request.method(),
                path = %path_and_query(request),
                upgrade,
                "Unroutable request"
            );
        })
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    config: ProxyConfig,
    ports: Arc<PortMapper>,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server. The port mapper is shared with the caller.
    pub fn new(config: ProxyConfig, ports: Arc<PortMapper>) -> Self {
        Self {
            config,
            ports,
            connections: ConnectionTracker::new(),
        }
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!("wt proxy listening on :{}", addr.port());
        tracing::info!("Route: <feature>.localhost:{} → deterministic port", addr.port());

        let proxy = Proxy::new(self.ports.clone(), self.config.upstream.host, addr.port());

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => self.spawn_connection(accepted, proxy.clone()),
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                },
            }
        }

        let drain = Duration::from_secs(self.config.lifecycle.drain_timeout_secs);
        let active = self.connections.active_count();
        if active > 0 {
            tracing::info!(active, drain_secs = drain.as_secs(), "Draining connections");
            if tokio::time::timeout(drain, self.connections.wait_idle()).await.is_err() {
                tracing::warn!(
                    active = self.connections.active_count(),
                    "Drain timeout elapsed, dropping remaining connections"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, accepted: Accepted, proxy: Proxy) {
        let Accepted {
            mut stream,
            peer_addr,
            slot,
        } = accepted;
        let guard = Arc::new(self.connections.track(Some(slot)));
        let span = tracing::info_span!(
            "connection",
            connection_id = %guard.id(),
            peer_addr = %peer_addr
        );

        tokio::spawn(
            async move {
                let first =
                    tokio::time::timeout(FIRST_REQUEST_TIMEOUT, preface::read(&mut stream)).await;
                match first {
                    Ok(Ok(Preface::Upgrade(upgrade))) => {
                        proxy.handle_upgrade(stream, upgrade).await;
                    }
                    Ok(Ok(Preface::Http(buffered))) => {
                        serve_http(BufferedStream::new(stream, buffered), proxy, guard).await;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "Connection failed before first request");
                    }
                    Err(_) => {
                        tracing::debug!("No request head within {:?}", FIRST_REQUEST_TIMEOUT);
                    }
                }
            }
            .instrument(span),
        );
    }
}

/// Serve `stream` with hyper until the client goes away. Each request carries
/// the connection's guard so a tunnel opened from it can keep the slot.
async fn serve_http(stream: BufferedStream, proxy: Proxy, guard: Arc<ConnectionGuard>) {
    let service = service_fn(move |mut request: Request<Incoming>| {
        let proxy = proxy.clone();
        request.extensions_mut().insert(guard.clone());
        async move { proxy.handle(request).await }
    });

    if let Err(e) = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        tracing::debug!(error = %e, "Connection closed with error");
    }
}
