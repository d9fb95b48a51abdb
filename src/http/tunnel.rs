//! Protocol-upgrade tunneling (WebSocket, HMR).
//!
//! # Responsibilities
//! - Detect upgrade requests
//! - Replay the client's handshake to the backend over a fresh connection
//! - Splice both sockets once the handshake is on its way
//!
//! # Data Flow
//! ```text
//! Client ── upgrade request + early bytes ──▶ Proxy ── replayed head + early bytes ──▶ Backend
//! Client ◀═══════════════ raw bytes, both directions (101 included) ═══════════════▶ Backend
//! ```
//!
//! # Design Decisions
//! - A handshake that opens a connection is read off the raw socket
//!   (`preface`) and tunneled by `tunnel_raw`: the head goes upstream, the
//!   early bytes right behind it, and the backend's answer is spliced back
//!   unparsed, whatever its status
//! - A handshake on a reused keep-alive connection has already been parsed
//!   by hyper; `tunnel` replays it through hyper's upgrade-aware client, relays
//!   a non-`101` answer as an ordinary response, and splices after `101`
//! - A failure before the tunnel exists closes the client connection without
//!   an HTTP answer
//! - Tunnels keep the client's `ConnectionGuard`, so they count against the
//!   connection limit and are waited for on shutdown

use std::net::IpAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONNECTION, UPGRADE};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{io_error_code, ProxyError};
use crate::http::forward::path_and_query;
use crate::http::preface::UpgradeRequest;
use crate::http::response::{self, ProxyBody};
use crate::http::upstream;
use crate::net::ConnectionGuard;
use crate::routing::{FeatureName, Route};

/// True when the request asks to switch protocols.
pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    let connection_upgrade = request
        .headers()
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && request.headers().contains_key(UPGRADE)
}

/// Tunnel an upgrade handshake read off the raw client socket.
///
/// The backend receives the handshake immediately followed by the early
/// bytes; everything it writes back, its answer included, goes to the client
/// as-is. Returns when the tunnel closes. On error nothing has been sent to
/// the client, and dropping `client` closes it.
pub async fn tunnel_raw(
    client: TcpStream,
    upgrade: UpgradeRequest,
    route: &Route,
    upstream_host: IpAddr,
) -> Result<(), ProxyError> {
    log_upgrade(route, &upgrade.request);

    let addr = route.upstream_addr(upstream_host);
    let replayed = async {
        let mut upstream = TcpStream::connect(addr).await.map_err(ProxyError::Connect)?;
        if let Err(e) = upstream.set_nodelay(true) {
            tracing::trace!(upstream = %addr, error = %e, "Failed to set TCP_NODELAY");
        }
        upstream
            .write_all(&upgrade.handshake)
            .await
            .map_err(ProxyError::Replay)?;
        if !upgrade.early.is_empty() {
            upstream
                .write_all(&upgrade.early)
                .await
                .map_err(ProxyError::Replay)?;
        }
        Ok::<_, ProxyError>(upstream)
    };

    let upstream = replayed.await.inspect_err(|e| log_failure(route, e))?;
    splice(client, upstream, &route.feature, route.port).await;
    Ok(())
}

/// Tunnel an upgrade request hyper has already parsed.
///
/// On error nothing has been sent to the client; the caller must drop the
/// client connection.
pub async fn tunnel(
    request: Request<Incoming>,
    route: &Route,
    upstream_host: IpAddr,
) -> Result<Response<ProxyBody>, ProxyError> {
    log_upgrade(route, &request);
    open(request, route, upstream_host)
        .await
        .inspect_err(|e| log_failure(route, e))
}

fn log_upgrade<B>(route: &Route, request: &Request<B>) {
    tracing::info!(
        feature = %route.feature,
        port = route.port,
        method = "WS UPGRADE",
        path = %path_and_query(request),
        "Tunneling upgrade"
    );
}

fn log_failure(route: &Route, e: &ProxyError) {
    tracing::error!(
        feature = %route.feature,
        port = route.port,
        code = e.code(),
        error = %e,
        "WS ERROR"
    );
}

async fn open(
    mut request: Request<Incoming>,
    route: &Route,
    upstream_host: IpAddr,
) -> Result<Response<ProxyBody>, ProxyError> {
    let downstream = hyper::upgrade::on(&mut request);
    let connection = request.extensions_mut().remove::<Arc<ConnectionGuard>>();
    let (parts, _) = request.into_parts();
    let handshake = Request::from_parts(parts, Empty::<Bytes>::new());

    let mut sender = upstream::connect::<Empty<Bytes>>(route.upstream_addr(upstream_host)).await?;
    let mut answer = sender
        .send_request(handshake)
        .await
        .map_err(ProxyError::Upstream)?;

    if answer.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::debug!(
            feature = %route.feature,
            port = route.port,
            status = %answer.status(),
            "Backend declined upgrade"
        );
        return Ok(answer.map(|body| body.boxed()));
    }

    let upstream = hyper::upgrade::on(&mut answer);
    let feature = route.feature.clone();
    let port = route.port;
    tokio::spawn(async move {
        // The tunnel keeps the client's connection slot until it closes.
        let _connection = connection;
        match tokio::try_join!(downstream, upstream) {
            Ok((downstream, upstream)) => {
                splice(TokioIo::new(downstream), TokioIo::new(upstream), &feature, port).await
            }
            Err(e) => tracing::debug!(
                feature = %feature,
                port,
                error = %ProxyError::Upgrade(e),
                "Upgrade abandoned before tunnel opened"
            ),
        }
    });

    let (parts, _) = answer.into_parts();
    Ok(Response::from_parts(parts, response::empty()))
}

/// Copy bytes both ways until either side closes. An EOF is passed on as a
/// write shutdown; both sockets are closed on return.
async fn splice<D, U>(mut downstream: D, mut upstream: U, feature: &FeatureName, port: u16)
where
    D: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::io::copy_bidirectional(&mut downstream, &mut upstream).await {
        Ok((to_upstream, to_downstream)) => tracing::debug!(
            feature = %feature,
            port,
            to_upstream,
            to_downstream,
            "Tunnel closed"
        ),
        Err(e) => tracing::warn!(
            feature = %feature,
            port,
            code = io_error_code(&e),
            error = %e,
            "Tunnel aborted"
        ),
    }
}
