//! Feature name → backend port.
//!
//! # Responsibilities
//! - Derive a stable port from a feature name (`cksum % 997 + 3001`)
//! - Memoize derived ports for the life of the process
//!
//! # Design Decisions
//! - The mapping is a pure function of the name's bytes, so any process (or
//!   a shell script running `cksum`) can predict a feature's port
//! - Collisions between names are accepted and not detected
//! - The cache never needs invalidation; a racing double insert writes the
//!   same value twice

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::cksum::cksum;
use super::resolver::FeatureName;

/// Lowest port a feature can be assigned.
pub const PORT_BASE: u16 = 3001;

/// Number of distinct ports (prime).
pub const PORT_SPREAD: u32 = 997;

/// Every port `derive_port` can return.
pub const PORT_RANGE: RangeInclusive<u16> = PORT_BASE..=PORT_BASE + (PORT_SPREAD as u16 - 1);

/// Compute the port for a feature name without touching any cache.
pub fn derive_port(name: &str) -> u16 {
    PORT_BASE + (cksum(name.as_bytes()) % PORT_SPREAD) as u16
}

/// Memoizing port mapper shared by all connections.
#[derive(Debug, Default)]
pub struct PortMapper {
    cache: DashMap<String, u16>,
    computations: AtomicU64,
}

impl PortMapper {
    /// Create a mapper with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Port assigned to `feature`.
    pub fn port_for(&self, feature: &FeatureName) -> u16 {
        if let Some(port) = self.cache.get(feature.as_str()) {
            return *port;
        }

        let port = derive_port(feature.as_str());
        self.computations.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(feature.as_str().to_owned(), port);

        tracing::trace!(feature = %feature, port, "Port derived");
        port
    }

    /// How many times a port was computed rather than served from cache.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Number of cached feature names.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True when no feature has been looked up yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
