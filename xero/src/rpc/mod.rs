//! Point-to-point RPC over a ZMTP ROUTER/DEALER pair (§1): request/reply
//! with per-call timeout, streaming partial replies, worker-initiated
//! emit, and bidirectional heartbeat liveness.
//!
//! [`RpcClient`] binds and waits for exactly one [`RpcWorker`] to
//! connect; both run their own event loop on a dedicated thread and are
//! safe to call into from any other thread.

mod bridge;
mod codec;
mod config;
mod constants;
mod engine;
mod error;
mod frame;
mod loop_runner;

pub use bridge::{Handler, HandlerOutcome, ReplySink, RpcClient, RpcWorker};
pub use codec::Payload;
pub use config::{ClientConfig, WorkerConfig};
pub use error::{CodecError, RemoteException, RpcError};
