//! Proxy error taxonomy.
//!
//! Every failure on the forwarding paths is a `ProxyError`. Its `code()` is
//! the errno-style token (`ECONNREFUSED`, `ECONNRESET`, ...) that appears in
//! logs and in the body of 502 responses.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::routing::Rejection;

/// Errors raised while routing or forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("unroutable host: {0}")]
    Rejected(#[from] Rejection),

    #[error("upstream connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("handshake replay failed: {0}")]
    Replay(#[source] io::Error),

    #[error("upstream handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] hyper::Error),

    #[error("protocol upgrade failed: {0}")]
    Upgrade(#[source] hyper::Error),
}

impl ProxyError {
    /// Errno-style code describing the failure.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Rejected(_) => "EINVAL",
            ProxyError::Connect(e) | ProxyError::Replay(e) => io_error_code(e),
            ProxyError::Handshake(e) | ProxyError::Upstream(e) | ProxyError::Upgrade(e) => {
                hyper_error_code(e)
            }
        }
    }
}

/// Map an I/O error to its errno-style name.
pub fn io_error_code(err: &io::Error) -> &'static str {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::ConnectionReset => "ECONNRESET",
        io::ErrorKind::ConnectionAborted => "ECONNABORTED",
        io::ErrorKind::NotConnected => "ENOTCONN",
        io::ErrorKind::AddrInUse => "EADDRINUSE",
        io::ErrorKind::AddrNotAvailable => "EADDRNOTAVAIL",
        io::ErrorKind::BrokenPipe => "EPIPE",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::UnexpectedEof => "ECONNRESET",
        _ => "EIO",
    }
}

fn hyper_error_code(err: &hyper::Error) -> &'static str {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return io_error_code(io_err);
        }
        source = cause.source();
    }

    if err.is_incomplete_message() || err.is_closed() || err.is_canceled() {
        "ECONNRESET"
    } else if err.is_timeout() {
        "ETIMEDOUT"
    } else {
        "EPROTO"
    }
}
