//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → preface.rs (first request head: upgrade handshake or not)
//!         → upgrade: tunnel.rs straight off the socket
//!     → server.rs (hyper HTTP/1.1 server, upgrades enabled)
//!     → routing (Host → feature → port)
//!     → forward.rs (ordinary request) or tunnel.rs (Upgrade request)
//!         → upstream.rs (fresh connection to 127.0.0.1:<port>)
//!     → response.rs (local 400/502 answers)
//!     → Send to client
//! ```

pub mod forward;
pub mod preface;
pub mod response;
pub mod server;
pub mod tunnel;
pub mod upstream;

pub use response::ProxyBody;
pub use server::{HttpServer, Proxy};
