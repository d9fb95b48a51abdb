//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Send the inbound request, unmodified, over a fresh upstream connection
//! - Return the upstream response, unmodified, with its body streaming
//! - Turn any failure before response headers into a 502
//!
//! # Design Decisions
//! - Method, path+query, headers (Host included) and body pass through as-is
//! - Bodies are polled straight from one connection into the other, so a slow
//!   reader on either side slows the writer on the other
//! - No retries: one failed attempt is the answer

use std::net::IpAddr;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response};

use crate::error::ProxyError;
use crate::http::response::{self, ProxyBody};
use crate::http::upstream;
use crate::routing::Route;

/// Forward `request` to the backend for `route`.
pub async fn forward(
    request: Request<Incoming>,
    route: &Route,
    upstream_host: IpAddr,
) -> Response<ProxyBody> {
    tracing::info!(
        feature = %route.feature,
        port = route.port,
        method = %request.method(),
        path = %path_and_query(&request),
        "Forwarding request"
    );

    match send(request, route, upstream_host).await {
        Ok(response) => response.map(|body| body.boxed()),
        Err(e) => {
            tracing::error!(
                feature = %route.feature,
                port = route.port,
                code = e.code(),
                error = %e,
                "Upstream unreachable"
            );
            response::bad_gateway(route.port, e.code())
        }
    }
}

async fn send(
    request: Request<Incoming>,
    route: &Route,
    upstream_host: IpAddr,
) -> Result<Response<Incoming>, ProxyError> {
    let mut sender = upstream::connect::<Incoming>(route.upstream_addr(upstream_host)).await?;
    sender
        .send_request(request)
        .await
        .map_err(ProxyError::Upstream)
}

/// Path and query exactly as the client sent them.
pub(crate) fn path_and_query<B>(request: &Request<B>) -> &str {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| request.uri().path())
}
