//! Host-routed reverse proxy for per-worktree dev servers.
//!
//! Routes `<feature>.localhost:3000` to `127.0.0.1:<port>`, where the port is
//! derived from the feature name with POSIX `cksum`. Plain HTTP requests are
//! forwarded over a fresh upstream connection; Upgrade requests (WebSocket,
//! HMR) are tunneled byte-for-byte.
//!
//! ```text
//! Client ─▶ net::Listener ─▶ http::server ─▶ routing (Host → feature → port)
//!                                   │
//!                     ┌─────────────┴─────────────┐
//!                     ▼                           ▼
//!              http::forward               http::tunnel
//!            (request/response)        (101 + raw byte splice)
//!                     └──────────▶ 127.0.0.1:<port> ◀┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::PortMapper;
