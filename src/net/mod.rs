//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection budget)
//!     → connection.rs (lifecycle tracking, connection IDs)
//!     → buffered.rs (bytes read ahead are replayed to the HTTP server)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod buffered;
pub mod connection;
pub mod listener;

pub use buffered::BufferedStream;
pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Accepted, ConnectionSlot, Listener, ListenerError};
