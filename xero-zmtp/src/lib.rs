//! # Xero ZMTP
//!
//! **Internal protocol implementation crate for the xero RPC runtime.**
//!
//! This is an internal implementation detail. Use the `xero` crate's
//! public API for application development; it wraps the socket types
//! here with ergonomic constructors and error handling.
//!
//! This crate provides the ZMTP 3.1 wire protocol (greeting, handshake,
//! framing) plus direct-stream ROUTER and DEALER sockets — the two
//! roles the point-to-point RPC runtime pairs with each other. No
//! broker, no PUB/SUB, no security mechanism: a single TCP connection
//! per pair, NULL mechanism only.
//!
//! ## Socket Types (Internal API)
//!
//! - **ROUTER**: bound, passive transport role — plays the client side
//!   of the RPC runtime.
//! - **DEALER**: connecting, active transport role — plays the worker
//!   side of the RPC runtime.
//!
//! ## Features
//!
//! - **Zero-copy**: Messages use `Bytes` for efficient sharing
//! - **`io_uring`**: High-performance async I/O via `compio`
//! - **Type-safe**: No unsafe code in the protocol layer

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

// Internal modules (not part of public API)
mod greeting;
mod handshake;
mod session;
mod utils;

pub mod codec;
pub mod config;

// Socket implementations
pub mod dealer;
pub mod router;

// Re-export socket types for clean API
pub use config::BufferConfig;
pub use dealer::DealerSocket;
pub use router::RouterSocket;

// Re-export commonly used types
pub use session::SocketType;

/// Prelude module for convenient imports
///
/// ```rust
/// use xero_zmtp::prelude::*;
/// ```
pub mod prelude {
    pub use super::session::SocketType;
    pub use super::{BufferConfig, DealerSocket, RouterSocket};
    pub use bytes::Bytes;
}
