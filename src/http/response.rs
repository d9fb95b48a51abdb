//! Response bodies and locally generated responses.
//!
//! # Responsibilities
//! - Define the body type shared by proxied and local responses
//! - Build the 400 (unroutable host) and 502 (no upstream) responses
//!
//! # Design Decisions
//! - Proxied bodies are boxed `Incoming` streams, never collected
//! - Local responses are plain text with an explicit Content-Type

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Body of every response the proxy writes downstream.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Wrap a fixed byte string as a `ProxyBody`.
pub fn full(chunk: impl Into<Bytes>) -> ProxyBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// An empty `ProxyBody`.
pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

fn plain_text(status: StatusCode, body: String) -> Response<ProxyBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// 400 for requests whose Host header is not `<feature>.localhost`.
pub fn bad_request(listen_port: u16) -> Response<ProxyBody> {
    plain_text(
        StatusCode::BAD_REQUEST,
        format!("Bad request: use <feature>.localhost:{listen_port}\n"),
    )
}

/// 502 for requests whose backend could not be reached.
pub fn bad_gateway(port: u16, code: &str) -> Response<ProxyBody> {
    plain_text(
        StatusCode::BAD_GATEWAY,
        format!("502 Bad Gateway: no server on :{port} ({code})\n"),
    )
}
