//! The proxy's single listening socket.
//!
//! Every accepted client holds one slot of the `max_connections` budget for as
//! long as its socket lives, tunnels included. A slot is reserved before
//! `accept` is polled, so once the budget is spent new clients wait in the
//! kernel backlog instead of being accepted and dropped.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot listen: {0}")]
    Bind(#[source] io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("connection budget closed")]
    Closed,
}

/// Listening socket plus the connection budget.
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

/// A client socket and the budget slot it occupies.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub slot: ConnectionSlot,
}

/// One unit of the connection budget, returned on drop.
#[derive(Debug)]
pub struct ConnectionSlot {
    _permit: OwnedSemaphorePermit,
}

impl Listener {
    /// Listen on `config.bind_address`.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let socket = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(socket, config.max_connections))
    }

    /// Use an already-bound socket, e.g. one on an ephemeral port.
    pub fn from_tcp(socket: TcpListener, max_connections: usize) -> Self {
        match socket.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, max_connections, "Listener bound"),
            Err(e) => tracing::warn!(error = %e, "Listener bound to unknown address"),
        }
        Self {
            socket,
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Wait for a free slot, then for the next client.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map(|permit| ConnectionSlot { _permit: permit })
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::trace!(%peer_addr, error = %e, "Failed to set TCP_NODELAY");
        }
        tracing::debug!(%peer_addr, free_slots = self.free_slots(), "Client accepted");

        Ok(Accepted {
            stream,
            peer_addr,
            slot,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Slots not held by any client.
    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn slot_is_held_until_dropped() {
        let listener = Listener::from_tcp(TcpListener::bind("127.0.0.1:0").await.unwrap(), 2);
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let accepted = listener.accept().await.unwrap();
        assert_eq!(listener.free_slots(), 1);

        drop(accepted);
        assert_eq!(listener.free_slots(), 2);
    }

    #[tokio::test]
    async fn full_budget_delays_accept() {
        let listener = Listener::from_tcp(TcpListener::bind("127.0.0.1:0").await.unwrap(), 1);
        let addr = listener.local_addr().unwrap();

        let _first = TcpStream::connect(addr).await.unwrap();
        let _second = TcpStream::connect(addr).await.unwrap();
        let held = listener.accept().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(waiting.is_err());

        drop(held);
        let next = tokio::time::timeout(Duration::from_secs(2), listener.accept()).await;
        assert!(matches!(next, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn bind_rejects_bad_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            ..ListenerConfig::default()
        };
        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind(_))
        ));
    }
}
