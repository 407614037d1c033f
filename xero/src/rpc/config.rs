//! Runtime configuration (§10.3).

use std::time::Duration;

use super::constants::{HB_INTERVAL, HB_LIVENESS, INITIAL_CONNECTION_TIME, RPC_TIMEOUT};

/// Configuration for an [`RpcClient`](super::RpcClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) endpoint: String,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) heartbeat_liveness: i32,
    pub(crate) initial_connection_timeout: Duration,
    pub(crate) rpc_timeout: Duration,
}

impl ClientConfig {
    /// Start a config bound to `endpoint` (e.g. `"tcp://127.0.0.1:5556"`),
    /// with every other field at its protocol default.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            heartbeat_interval: HB_INTERVAL,
            heartbeat_liveness: HB_LIVENESS,
            initial_connection_timeout: INITIAL_CONNECTION_TIME,
            rpc_timeout: RPC_TIMEOUT,
        }
    }

    /// Override the heartbeat tick interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override how many missed heartbeats a peer tolerates before it is
    /// considered lost.
    #[must_use]
    pub const fn with_heartbeat_liveness(mut self, liveness: i32) -> Self {
        self.heartbeat_liveness = liveness;
        self
    }

    /// Override how long [`RpcClient::wait_for_connected`](super::RpcClient::wait_for_connected)
    /// waits by default.
    #[must_use]
    pub const fn with_initial_connection_timeout(mut self, timeout: Duration) -> Self {
        self.initial_connection_timeout = timeout;
        self
    }

    /// Override how long [`RpcClient::rpc`](super::RpcClient::rpc) waits for
    /// a final reply by default.
    #[must_use]
    pub const fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// The endpoint this client will bind.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Configuration for an [`RpcWorker`](super::RpcWorker).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub(crate) endpoint: String,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) heartbeat_liveness: i32,
}

impl WorkerConfig {
    /// Start a config bound to `endpoint` (e.g. `"tcp://127.0.0.1:5556"`),
    /// with every other field at its protocol default.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            heartbeat_interval: HB_INTERVAL,
            heartbeat_liveness: HB_LIVENESS,
        }
    }

    /// Override the heartbeat tick interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override how many missed heartbeats the client tolerates before this
    /// worker re-sends `READY`.
    #[must_use]
    pub const fn with_heartbeat_liveness(mut self, liveness: i32) -> Self {
        self.heartbeat_liveness = liveness;
        self
    }

    /// The endpoint this worker will connect to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_defaults_match_constants() {
        let cfg = ClientConfig::new("tcp://127.0.0.1:5556");
        assert_eq!(cfg.heartbeat_interval, HB_INTERVAL);
        assert_eq!(cfg.heartbeat_liveness, HB_LIVENESS);
        assert_eq!(cfg.initial_connection_timeout, INITIAL_CONNECTION_TIME);
        assert_eq!(cfg.rpc_timeout, RPC_TIMEOUT);
        assert_eq!(cfg.endpoint(), "tcp://127.0.0.1:5556");
    }

    #[test]
    fn builder_overrides_apply() {
        let cfg = ClientConfig::new("tcp://127.0.0.1:5556")
            .with_rpc_timeout(Duration::from_secs(1))
            .with_heartbeat_liveness(5);
        assert_eq!(cfg.rpc_timeout, Duration::from_secs(1));
        assert_eq!(cfg.heartbeat_liveness, 5);
    }
}
