//! First request on a fresh client connection.
//!
//! # Responsibilities
//! - Read the head of the connection's first request off the raw socket
//! - Recognise an upgrade handshake and rebuild it for replay upstream
//! - Keep whatever followed the head, so it can go upstream right behind it
//!
//! # Design Decisions
//! - Anything that is not a complete upgrade head (plain requests, malformed
//!   or oversized heads, early EOF) is handed back untouched for hyper to serve
//! - The replayed handshake is `<method> <path> HTTP/1.1`, then every header
//!   in the client's order and spelling

use std::io;

use hyper::body::Bytes;
use hyper::{Request, Version};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::tunnel::is_upgrade_request;

/// Largest head read before giving up and letting hyper deal with it.
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Same header limit hyper applies.
const MAX_HEADERS: usize = 100;

/// What the first bytes of a connection turned out to be.
#[derive(Debug)]
pub enum Preface {
    /// The connection opens with an upgrade handshake.
    Upgrade(UpgradeRequest),
    /// Anything else. These bytes must be served before the socket's.
    Http(Bytes),
}

/// An upgrade handshake read off the raw client socket.
#[derive(Debug)]
pub struct UpgradeRequest {
    /// Parsed head, used for routing and logging.
    pub request: Request<()>,
    /// The handshake as it is replayed upstream, blank line included.
    pub handshake: Bytes,
    /// Client bytes that arrived behind the head.
    pub early: Bytes,
}

/// Read until the first request head is complete, or until it is clear the
/// connection is not opening with an upgrade.
pub async fn read<S>(stream: &mut S) -> io::Result<Preface>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(Preface::Http(Bytes::from(buf)));
        }
        buf.extend_from_slice(&chunk[..n]);

        match parse(&buf) {
            Head::Partial if buf.len() < MAX_HEAD_BYTES => continue,
            Head::Upgrade {
                request,
                handshake,
                len,
            } => {
                let early = Bytes::from(buf).slice(len..);
                return Ok(Preface::Upgrade(UpgradeRequest {
                    request,
                    handshake,
                    early,
                }));
            }
            Head::Partial | Head::Other => return Ok(Preface::Http(Bytes::from(buf))),
        }
    }
}

enum Head {
    Partial,
    Other,
    Upgrade {
        request: Request<()>,
        handshake: Bytes,
        len: usize,
    },
}

fn parse(buf: &[u8]) -> Head {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);
    let len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Head::Partial,
        Err(_) => return Head::Other,
    };

    let (Some(method), Some(path), Some(1)) = (parsed.method, parsed.path, parsed.version) else {
        return Head::Other;
    };

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .version(Version::HTTP_11);
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }
    let Ok(request) = builder.body(()) else {
        return Head::Other;
    };
    if !is_upgrade_request(&request) {
        return Head::Other;
    }

    let mut handshake = Vec::with_capacity(len);
    handshake.extend_from_slice(format!("{method} {path} HTTP/1.1\r\n").as_bytes());
    for header in parsed.headers.iter() {
        handshake.extend_from_slice(header.name.as_bytes());
        handshake.extend_from_slice(b": ");
        handshake.extend_from_slice(header.value);
        handshake.extend_from_slice(b"\r\n");
    }
    handshake.extend_from_slice(b"\r\n");

    Head::Upgrade {
        request,
        handshake: Bytes::from(handshake),
        len,
    }
}
