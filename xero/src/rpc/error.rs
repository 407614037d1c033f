//! Error types surfaced across the RPC runtime's thread boundary.
//!
//! Modeled on `xero-core::error::CoreError`: a `thiserror`-derived enum
//! with narrow variants and small `is_*`-style helpers, rather than a
//! single opaque string.

use thiserror::Error;

/// A decoded handler exception, carried by [`RpcError::RemoteException`].
///
/// The wire format only ever carries `message` and `traceback` (see
/// [`crate::rpc::codec`]); `class` is not transmitted and defaults to
/// `"Exception"`, matching the distilled source's decoder, which always
/// reconstructs a generic `Exception` regardless of the handler's
/// original exception type.
#[derive(Debug, Clone, Error)]
#[error("{class}: {message}")]
pub struct RemoteException {
    /// Exception class name. Always `"Exception"` unless the worker-side
    /// handler supplies one explicitly via [`crate::rpc::HandlerOutcome::Exception`].
    pub class: String,
    /// Human-readable exception message.
    pub message: String,
    /// Traceback or other diagnostic text, opaque to the runtime.
    pub traceback: String,
}

impl RemoteException {
    /// Build a remote exception with the default class name.
    #[must_use]
    pub fn new(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            class: "Exception".to_string(),
            message: message.into(),
            traceback: traceback.into(),
        }
    }
}

/// Errors raised while decoding or encoding RPC payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A mapping carried a `"__type__"` tag this decoder does not recognize.
    #[error("unrecognized __type__ tag: {0}")]
    UnknownTag(String),
    /// A recognized `"__type__"` tag was missing a required field.
    #[error("malformed {0} extension: missing field {1}")]
    MissingField(&'static str, &'static str),
    /// A recognized `"__type__"` tag had a field of the wrong shape.
    #[error("malformed {0} extension: {1}")]
    InvalidField(&'static str, String),
    /// The underlying MessagePack bytes were not well-formed.
    #[error("malformed MessagePack payload: {0}")]
    Malformed(String),
}

/// Errors surfaced to RPC callers across the event-loop/caller-thread boundary.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No peer is currently registered, or the peer was lost while waiting.
    ///
    /// Raised synchronously on `rpc` timeout, on `wait_for_connected`
    /// timeout, and on `rpc`/`emit` with no registered peer.
    #[error("lost peer")]
    LostPeer,
    /// The worker's handler raised; carries the decoded exception payload.
    #[error(transparent)]
    RemoteException(#[from] RemoteException),
    /// A reply or request payload failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    /// The event loop thread shut down while a caller was waiting.
    #[error("runtime shut down")]
    ShutDown,
}

impl RpcError {
    /// Whether this error reflects the peer being gone, as opposed to a
    /// local decoding or handler-side failure.
    #[must_use]
    pub const fn is_lost_peer(&self) -> bool {
        matches!(self, Self::LostPeer)
    }
}
