//! Wire constants and timing defaults for the RPC runtime.
//!
//! Mirrors the original source's `xero_constants.py`, trimmed to the
//! opcodes the point-to-point client/worker pair actually uses.

use std::time::Duration;

/// Protocol tag prepended to every client → worker frame.
pub const UNI_CLIENT_HEADER: &[u8] = b"client";

/// Worker announces itself; client registers the peer.
pub const MSG_READY: u8 = 0x01;
/// Client → worker RPC invocation.
pub const MSG_REQUEST: u8 = 0x02;
/// Worker → client streaming progress update (does not fulfill the call).
pub const MSG_PARTIAL_REPLY: u8 = 0x03;
/// Worker → client terminal successful reply.
pub const MSG_FINAL_REPLY: u8 = 0x04;
/// Worker → client unsolicited event.
pub const MSG_EMIT: u8 = 0x05;
/// Liveness probe, sent by both sides.
pub const MSG_HEARTBEAT: u8 = 0x06;
/// Graceful teardown notice.
pub const MSG_DISCONNECT: u8 = 0x07;
/// Reserved, unused: the original multi-peer broker's multicast-join opcode.
/// Implementers should keep this opcode reserved rather than reassign it.
#[allow(dead_code)]
pub const MSG_MULTICAST_ADD: u8 = 0x08;
/// Worker → client terminal reply carrying a handler exception.
pub const MSG_EXCEPTION: u8 = 0x09;
/// Reserved, unused in the point-to-point paths: see the distilled source's
/// `WORKER_ERROR`. Logged-and-dropped if ever received.
#[allow(dead_code)]
pub const MSG_ERROR: u8 = 0x0A;

/// Heartbeat tick period.
pub const HB_INTERVAL: Duration = Duration::from_millis(1000);
/// Missed heartbeat ticks before a peer counts as dead.
pub const HB_LIVENESS: i32 = 3;
/// Default per-call RPC timeout.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);
/// Default wait for the initial handshake; deliberately longer than
/// `HB_LIVENESS * HB_INTERVAL` so a transient startup race never looks
/// like a disconnect.
pub const INITIAL_CONNECTION_TIME: Duration = Duration::from_millis(3200);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_connection_time_exceeds_detection_window() {
        let detection_window = HB_INTERVAL * HB_LIVENESS as u32;
        assert!(INITIAL_CONNECTION_TIME > detection_window);
    }
}
