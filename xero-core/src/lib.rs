//! Xero Core
//!
//! Runtime-agnostic building blocks shared by the transport and RPC
//! layers:
//! - Pinned / io_uring-safe allocation (`alloc`)
//! - Zero-copy segmented receive buffering (`buffer`)
//! - Transport addressing (`endpoint`)
//! - Cancellation-safety guard for multi-step writes (`poison`)
//! - Exponential-backoff reconnection bookkeeping (`reconnect`)
//! - Socket lifecycle events (`monitor`)
//! - Socket configuration (`options`)
//! - TCP tuning (`tcp`)
//! - Error types (`error`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod alloc;
pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod options;
pub mod poison;
pub mod reconnect;
pub mod tcp;

/// A small prelude to make downstream crates ergonomic.
pub mod prelude {
    pub use crate::alloc::{IoArena, IoBytes, SlabMut};
    pub use crate::buffer::SegmentedBuffer;
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{CoreError, Result};
    pub use crate::options::SocketOptions;
    pub use crate::poison::PoisonGuard;
}
