//! ZMTP transport sockets used by the RPC runtime.
//!
//! This module exposes exactly the two socket roles the point-to-point
//! RPC runtime pairs with each other. There is no PUB/SUB, no broker,
//! no security mechanism here — see `xero_zmtp` for the rationale.
//!
//! # Socket Types
//!
//! - [`RouterSocket`] - bound, passive transport role (client peer)
//! - [`DealerSocket`] - connecting, active transport role (worker peer)
//!
//! # Quick Start
//!
//! ## DEALER (worker side)
//!
//! ```rust,no_run
//! use xero::zmq::DealerSocket;
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
//! socket.send(vec![Bytes::from("REQUEST")]).await?;
//!
//! if let Some(reply) = socket.recv().await {
//!     println!("Got reply: {:?}", reply);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## ROUTER (client side)
//!
//! ```rust,no_run
//! use xero::zmq::RouterSocket;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (listener, mut socket) = RouterSocket::bind("127.0.0.1:5555").await?;
//!
//! while let Some(msg) = socket.recv().await {
//!     socket.send(msg).await?; // Echo back
//! }
//! # Ok(())
//! # }
//! ```

mod common;
mod dealer;
mod router;

// Re-export socket types
pub use dealer::DealerSocket;
pub use router::RouterSocket;

/// Convenient imports for ZeroMQ transport sockets.
///
/// # Example
///
/// ```rust
/// use xero::zmq::prelude::*;
///
/// // Now you have:
/// // - DealerSocket, RouterSocket
/// // - Bytes for zero-copy messages
/// ```
pub mod prelude {
    pub use super::{DealerSocket, RouterSocket};
    pub use bytes::Bytes;
}
