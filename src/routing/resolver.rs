//! Host header → feature name.
//!
//! # Responsibilities
//! - Strip the `:port` suffix from the Host header
//! - Require the `localhost` top label
//! - Return everything in front of it as the feature name
//!
//! # Design Decisions
//! - No normalization: `Demo.localhost` and `demo.localhost` are different features
//! - Malformed input is a `Rejection`, never a panic
//! - Multi-label features are kept whole (`team.auth.localhost` → `team.auth`)

use std::fmt;

use thiserror::Error;

/// The label every routable host must end with.
pub const ROUTING_SUFFIX: &str = "localhost";

/// Developer-chosen name of a branch or worktree, taken from the Host header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureName(String);

impl FeatureName {
    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a Host header could not be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing Host header")]
    MissingHost,
    #[error("host is not a <feature>.localhost name")]
    NotLocalhost,
    #[error("empty feature name")]
    EmptyFeature,
}

/// Resolve a raw Host header value to a feature name.
pub fn resolve(host: Option<&str>) -> Result<FeatureName, Rejection> {
    let host = host.ok_or(Rejection::MissingHost)?;
    let hostname = host.split(':').next().unwrap_or_default();

    let (feature, top) = hostname
        .rsplit_once('.')
        .ok_or(Rejection::NotLocalhost)?;
    if top != ROUTING_SUFFIX {
        return Err(Rejection::NotLocalhost);
    }
    if feature.is_empty() {
        return Err(Rejection::EmptyFeature);
    }

    Ok(FeatureName(feature.to_string()))
}
