//! Upstream connections.
//!
//! One fresh TCP connection per proxied exchange, driven by hyper's HTTP/1
//! client on its own task. There is no pool: when the exchange's sender and
//! response body are dropped, the driver task ends and the socket closes.

use std::error::Error as StdError;
use std::net::SocketAddr;

use hyper::body::Body;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::error::ProxyError;

/// Open a TCP connection to `addr` and perform the HTTP/1.1 client handshake.
pub async fn connect<B>(addr: SocketAddr) -> Result<SendRequest<B>, ProxyError>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let stream = TcpStream::connect(addr).await.map_err(ProxyError::Connect)?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::trace!(upstream = %addr, error = %e, "Failed to set TCP_NODELAY");
    }

    let (sender, connection) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(ProxyError::Handshake)?;

    tokio::spawn(async move {
        if let Err(e) = connection.with_upgrades().await {
            tracing::debug!(upstream = %addr, error = %e, "Upstream connection ended with error");
        }
    });

    Ok(sender)
}
