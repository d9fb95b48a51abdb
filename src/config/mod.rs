//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyConfig::default() (startup constants)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to the listener, server and logging setup
//! ```
//!
//! # Design Decisions
//! - No config file, no flags: the listening port is a startup constant
//! - All fields have defaults
//! - Validation separates construction from semantic checks

pub mod schema;
pub mod validation;

pub use schema::{
    LifecycleConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, UpstreamConfig,
    DEFAULT_LISTEN_PORT,
};
pub use validation::{validate_config, ValidationError};
