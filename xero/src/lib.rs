//! # Xero
//!
//! A lightweight point-to-point RPC runtime built on a reliable
//! request/reply messaging pattern ("Paranoid Pirate") over ZMTP
//! ROUTER/DEALER sockets.
//!
//! ## Architecture
//!
//! Xero pairs exactly one client with exactly one worker across a
//! single endpoint:
//!
//! - **`xero-core`**: runtime-agnostic allocation, buffering, options,
//!   reconnection and error primitives.
//! - **`xero-zmtp`**: the ZMTP 3.1 wire protocol plus direct-stream
//!   ROUTER (client transport role) and DEALER (worker transport role)
//!   sockets — pure sans-IO state machines wherever possible.
//! - **`xero`** (this crate): the public API — thin `zmq` socket
//!   wrappers plus the [`rpc`] module implementing request/reply with
//!   per-call timeout, streaming partial replies, worker-initiated
//!   emission, and bidirectional heartbeat liveness.
//!
//! ## Protocols (opt-in via features)
//!
//! - **`zmq`** - ZMTP 3.x ROUTER/DEALER transport, required by [`rpc`].
//!
//! ```toml
//! [dependencies]
//! xero = { version = "0.1", features = ["zmq"] }
//! ```
//!
//! ## Quick Start
//!
//! ### RPC worker
//!
//! `RpcClient`/`RpcWorker` each own a dedicated event-loop thread; `bind`
//! and `connect` block until the transport is ready, and every other
//! method is a plain synchronous call safe to make from any thread.
//!
//! ```rust,no_run
//! # #[cfg(feature = "zmq")]
//! use xero::rpc::{WorkerConfig, RpcWorker, Handler, HandlerOutcome, Payload};
//!
//! # #[cfg(feature = "zmq")]
//! struct Echo;
//!
//! # #[cfg(feature = "zmq")]
//! impl Handler for Echo {
//!     fn call(&self, _method: &str, args: Payload, _kwargs: Payload, _replies: &xero::rpc::ReplySink) -> HandlerOutcome {
//!         HandlerOutcome::Final(args)
//!     }
//! }
//!
//! # #[cfg(feature = "zmq")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let worker = RpcWorker::connect(WorkerConfig::new("tcp://127.0.0.1:5556"), Echo)?;
//! worker.join();
//! # Ok(())
//! # }
//! ```
//!
//! ### RPC client
//!
//! ```rust,no_run
//! # #[cfg(feature = "zmq")]
//! use xero::rpc::{ClientConfig, RpcClient, Payload};
//! # #[cfg(feature = "zmq")]
//! use std::time::Duration;
//!
//! # #[cfg(feature = "zmq")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RpcClient::bind(ClientConfig::new("tcp://127.0.0.1:5556"))?;
//! client.wait_for_connected(Duration::from_secs(3))?;
//! let reply = client.rpc("echo", Payload::Nil, Payload::Nil)?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Performance
//!
//! - **Zero-copy**: Uses `bytes::Bytes` for refcounted message buffers
//! - **`io_uring`**: Native Linux async I/O (via `compio`)
//! - **Sans-IO**: Protocol logic is pure, testable, and runtime-agnostic
//!
//! ## Safety
//!
//! - `unsafe` code is isolated to `xero-core`'s slab allocator
//! - All protocol and RPC layers are 100% safe Rust

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow some pedantic patterns
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::missing_errors_doc)] // Will add gradually
#![allow(clippy::doc_markdown)] // Too many false positives

// Re-export core types
pub use bytes::Bytes;
pub use xero_core::endpoint::{Endpoint, EndpointError};
pub use xero_core::monitor::{SocketEvent, SocketMonitor};
pub use xero_core::options::SocketOptions;
pub use xero_core::reconnect::{ReconnectError, ReconnectState};

// Protocol modules (opt-in via features)
#[cfg(feature = "zmq")]
pub mod zmq;

/// Point-to-point RPC runtime (request/reply, streaming, emit, heartbeat).
#[cfg(feature = "zmq")]
pub mod rpc;

/// Development helpers (benches/tests)
pub mod dev_tracing;
