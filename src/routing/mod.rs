//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → resolver.rs (Host → FeatureName, or Rejection)
//!     → ports.rs (FeatureName → port, memoized)
//!         → cksum.rs (POSIX cksum of the name)
//!     → Return: Route { feature, port }
//! ```
//!
//! # Design Decisions
//! - No route table: the backend is derived from the name itself
//! - Deterministic: same name always maps to the same port, across processes
//! - The port cache is the only shared state in the proxy

pub mod cksum;
pub mod ports;
pub mod resolver;

use std::net::{IpAddr, SocketAddr};

pub use ports::{derive_port, PortMapper, PORT_RANGE};
pub use resolver::{resolve, FeatureName, Rejection};

/// A resolved request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub feature: FeatureName,
    pub port: u16,
}

impl Route {
    /// Resolve a Host header through `ports` into a route.
    pub fn resolve(host: Option<&str>, ports: &PortMapper) -> Result<Self, Rejection> {
        let feature = resolve(host)?;
        let port = ports.port_for(&feature);
        Ok(Self { feature, port })
    }

    /// Address of the backend serving this route on `host`.
    pub fn upstream_addr(&self, host: IpAddr) -> SocketAddr {
        SocketAddr::new(host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_loopback_backend() {
        let ports = PortMapper::new();
        let route = Route::resolve(Some("demo.localhost:3000"), &ports).unwrap();

        assert_eq!(route.feature.as_str(), "demo");
        assert_eq!(route.port, 3132);
        assert_eq!(
            route.upstream_addr([127, 0, 0, 1].into()).to_string(),
            "127.0.0.1:3132"
        );
    }

    #[test]
    fn rejection_skips_port_lookup() {
        let ports = PortMapper::new();
        assert_eq!(Route::resolve(None, &ports), Err(Rejection::MissingHost));
        assert_eq!(Route::resolve(Some("example.com"), &ports), Err(Rejection::NotLocalhost));
        assert_eq!(ports.computations(), 0);
        assert!(ports.is_empty());
    }
}
