//! Sans-IO protocol engines (§4.2): pure state machines that turn inbound
//! frame parts into actions and outbound intents into frame parts, with
//! no socket or thread involvement. [`crate::rpc::loop_runner`] is the
//! only caller that touches a real transport.

use bytes::Bytes;

use super::codec::{self, Payload};
use super::constants::{MSG_EMIT, MSG_EXCEPTION, MSG_FINAL_REPLY, MSG_PARTIAL_REPLY};
use super::error::{CodecError, RemoteException};
use super::frame::{self, ClientMessage, WorkerMessage};

// ---------------------------------------------------------------------
// Client engine
// ---------------------------------------------------------------------

struct Peer {
    identity: Bytes,
    liveness: i32,
}

/// Outcome of feeding the client engine an inbound frame or a timer tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Send these parts (first part is the peer identity) on the socket.
    Send(Vec<Bytes>),
    /// A peer registered for the first time.
    Connected(Bytes),
    /// The peer was unregistered (liveness exhausted or `DISCONNECT`).
    Disconnected,
    /// A streaming progress update for the in-flight call.
    Partial(Payload),
    /// The in-flight call completed normally.
    Final(Payload),
    /// The in-flight call completed with a worker-side exception.
    Exception(RemoteException),
    /// A final reply or exception payload failed to decode.
    DecodeError(CodecError),
    /// An emission, independent of any in-flight call.
    Emit(Payload),
}

/// Client-side peer-tracking and framing state machine (§3, §4.2).
pub struct ClientEngine {
    peer: Option<Peer>,
    liveness_limit: i32,
}

impl ClientEngine {
    /// Build a new engine with no registered peer.
    #[must_use]
    pub const fn new(liveness_limit: i32) -> Self {
        Self {
            peer: None,
            liveness_limit,
        }
    }

    /// Whether a peer is currently registered.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// The registered peer's identity, if any.
    #[must_use]
    pub fn peer_identity(&self) -> Option<&Bytes> {
        self.peer.as_ref().map(|p| &p.identity)
    }

    /// Build the frame for a `REQUEST`. Returns `None` if no peer is
    /// registered (callers should raise *lost-peer*).
    #[must_use]
    pub fn build_request(&self, method: &str, args: &Payload, kwargs: &Payload) -> Option<Vec<Bytes>> {
        let peer = self.peer.as_ref()?;
        Some(frame::request_parts(&peer.identity, method, args, kwargs))
    }

    /// Process one inbound frame. `parts[0]` must be the peer-identity
    /// part the ROUTER socket prepended on receipt.
    pub fn handle_inbound(&mut self, parts: &[Bytes]) -> Vec<ClientAction> {
        let Some((identity, rest)) = parts.split_first() else {
            return Vec::new();
        };

        match frame::parse_worker_message(rest) {
            WorkerMessage::Ready => self.handle_ready(identity),
            WorkerMessage::Heartbeat => {
                self.refresh_from_any(identity);
                Vec::new()
            }
            WorkerMessage::Emit(bytes) => {
                self.refresh_from_any(identity);
                self.decode_or_error(bytes, ClientAction::Emit, |e| vec![ClientAction::DecodeError(e)])
            }
            WorkerMessage::Disconnect => {
                if self.peer.take().is_some() {
                    vec![ClientAction::Disconnected]
                } else {
                    Vec::new()
                }
            }
            WorkerMessage::PartialReply(bytes) => {
                if !self.accept_from(identity) {
                    return Vec::new();
                }
                self.refresh_from(identity);
                // Best-effort: an undecodable partial is still delivered, as
                // opaque bytes, rather than dropped (§7).
                let payload = codec::decode(&bytes).unwrap_or(Payload::Bin(bytes));
                vec![ClientAction::Partial(payload)]
            }
            WorkerMessage::FinalReply(bytes) => {
                if !self.accept_from(identity) {
                    return Vec::new();
                }
                self.refresh_from(identity);
                self.decode_or_error(bytes, ClientAction::Final, |e| vec![ClientAction::DecodeError(e)])
            }
            WorkerMessage::Exception(bytes) => {
                if !self.accept_from(identity) {
                    return Vec::new();
                }
                self.refresh_from(identity);
                match codec::decode(&bytes) {
                    Ok(Payload::Exception(exc)) => vec![ClientAction::Exception(exc)],
                    Ok(other) => vec![ClientAction::Exception(RemoteException::new(
                        format!("malformed EXCEPTION payload shape: {other:?}"),
                        String::new(),
                    ))],
                    Err(e) => vec![ClientAction::DecodeError(e)],
                }
            }
            WorkerMessage::Unknown(_) | WorkerMessage::Malformed(_) => Vec::new(),
        }
    }

    fn handle_ready(&mut self, identity: &Bytes) -> Vec<ClientAction> {
        if self.peer.is_some() {
            // Duplicate or foreign READY while registered: idempotent, log and ignore (P1).
            return Vec::new();
        }
        self.peer = Some(Peer {
            identity: identity.clone(),
            liveness: self.liveness_limit,
        });
        vec![ClientAction::Connected(identity.clone())]
    }

    fn accept_from(&self, identity: &Bytes) -> bool {
        self.peer.as_ref().is_some_and(|p| &p.identity == identity)
    }

    fn refresh_from(&mut self, identity: &Bytes) {
        if let Some(p) = &mut self.peer {
            if &p.identity == identity {
                p.liveness = self.liveness_limit;
            }
        }
    }

    /// Refresh regardless of identity match; used for `EMIT`/`HEARTBEAT`,
    /// which intentionally skip the strict identity check (§9).
    fn refresh_from_any(&mut self, _identity: &Bytes) {
        if let Some(p) = &mut self.peer {
            p.liveness = self.liveness_limit;
        }
    }

    fn decode_or_error(
        &self,
        bytes: Bytes,
        ok: impl FnOnce(Payload) -> ClientAction,
        err: impl FnOnce(CodecError) -> Vec<ClientAction>,
    ) -> Vec<ClientAction> {
        match codec::decode(&bytes) {
            Ok(p) => vec![ok(p)],
            Err(e) => err(e),
        }
    }

    /// Force-unregister the current peer without waiting out a heartbeat
    /// timeout. Used by the call/reply bridge when a caller's own RPC
    /// timeout elapses (§5): the bridge enforces the deadline, not a loop
    /// timer, so it must evict the peer itself before raising *lost-peer*.
    /// Returns whether a peer was actually registered.
    pub fn force_unregister(&mut self) -> bool {
        self.peer.take().is_some()
    }

    /// Heartbeat tick: decrement the registered peer's liveness, sending a
    /// `HEARTBEAT` frame if it survives, or unregistering it if exhausted.
    pub fn tick(&mut self) -> Vec<ClientAction> {
        let Some(peer) = self.peer.as_mut() else {
            return Vec::new();
        };
        peer.liveness -= 1;
        let liveness = peer.liveness;
        let identity = peer.identity.clone();
        if liveness <= 0 {
            self.peer = None;
            vec![ClientAction::Disconnected]
        } else {
            vec![ClientAction::Send(frame::client_heartbeat_parts(&identity))]
        }
    }
}

// ---------------------------------------------------------------------
// Worker engine
// ---------------------------------------------------------------------

/// Outcome of feeding the worker engine an inbound frame or a timer tick.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerAction {
    /// Send these parts on the socket (no identity prefix; DEALER is
    /// point-to-point).
    Send(Vec<Bytes>),
    /// The client handshake completed (first valid inbound frame seen).
    Connected,
    /// The client is considered lost; the worker will resend `READY`.
    Disconnected,
    /// A `REQUEST` was decoded and should be dispatched to the handler.
    Dispatch {
        /// Method name.
        method: String,
        /// Decoded positional arguments.
        args: Payload,
        /// Decoded keyword arguments.
        kwargs: Payload,
    },
    /// An inbound frame was dropped: bad header, unknown type, or an
    /// undecodable `REQUEST` payload.
    Dropped(&'static str),
}

/// Worker-side handshake and liveness state machine (§3, §4.2).
pub struct WorkerEngine {
    liveness: i32,
    liveness_limit: i32,
    handshake_pending: bool,
}

impl WorkerEngine {
    /// Construct a new engine and the startup action (send `READY`).
    #[must_use]
    pub fn startup(liveness_limit: i32) -> (Self, Vec<WorkerAction>) {
        let engine = Self {
            liveness: liveness_limit,
            liveness_limit,
            handshake_pending: true,
        };
        (engine, vec![WorkerAction::Send(frame::ready_parts())])
    }

    /// Whether the worker currently considers itself connected to a client.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !self.handshake_pending
    }

    /// Build the frame for a reply-shaped message of kind `ty` (one of
    /// `MSG_PARTIAL_REPLY`, `MSG_FINAL_REPLY`, `MSG_EXCEPTION`, `MSG_EMIT` —
    /// all four share the `[type, b"", packed_payload]` layout).
    #[must_use]
    pub fn build_reply(ty: u8, payload: &Payload) -> Vec<Bytes> {
        debug_assert!(matches!(
            ty,
            MSG_PARTIAL_REPLY | MSG_FINAL_REPLY | MSG_EXCEPTION | MSG_EMIT
        ));
        frame::reply_parts(ty, payload)
    }

    /// Build the frame for an `EMIT`. Returns `None` if not connected
    /// (callers should raise *lost-peer*).
    #[must_use]
    pub fn build_emit(&self, payload: &Payload) -> Option<Vec<Bytes>> {
        if self.is_connected() {
            Some(frame::reply_parts(MSG_EMIT, payload))
        } else {
            None
        }
    }

    /// Process one inbound frame (already stripped of any transport
    /// framing beyond the wire protocol's own `UNI_CLIENT_HEADER` tag).
    pub fn handle_inbound(&mut self, parts: &[Bytes]) -> Vec<WorkerAction> {
        let Some(msg) = frame::parse_client_message(parts) else {
            return vec![WorkerAction::Dropped("missing client header")];
        };

        let was_pending = self.handshake_pending;
        self.liveness = self.liveness_limit;
        self.handshake_pending = false;

        let mut actions = Vec::new();
        if was_pending {
            actions.push(WorkerAction::Connected);
        }

        match msg {
            ClientMessage::Request { method, args, kwargs } => {
                match (codec::decode(&args), codec::decode(&kwargs)) {
                    (Ok(args), Ok(kwargs)) => actions.push(WorkerAction::Dispatch { method, args, kwargs }),
                    _ => actions.push(WorkerAction::Dropped("undecodable REQUEST payload")),
                }
            }
            ClientMessage::Heartbeat => {}
            ClientMessage::Disconnect => {
                // Force re-handshake on the next tick (§4.2).
                self.liveness = 0;
            }
            ClientMessage::Unknown(_) => actions.push(WorkerAction::Dropped("unknown message type")),
            ClientMessage::Malformed(reason) => actions.push(WorkerAction::Dropped(reason)),
        }
        actions
    }

    /// Heartbeat tick: three-way branch on the sign of `liveness`, as in
    /// the distilled source's worker loop.
    pub fn tick(&mut self) -> Vec<WorkerAction> {
        if self.liveness >= 0 {
            self.liveness -= 1;
        }
        if self.liveness > 0 {
            vec![WorkerAction::Send(frame::worker_heartbeat_parts())]
        } else if self.liveness == 0 {
            self.handshake_pending = true;
            vec![WorkerAction::Disconnected]
        } else {
            vec![WorkerAction::Send(frame::ready_parts())]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(bytes: &'static [u8]) -> Bytes {
        Bytes::from_static(bytes)
    }

    #[test]
    fn ready_registers_peer_and_duplicate_is_ignored() {
        let mut engine = ClientEngine::new(3);
        let parts = [identity(b"w1"), Bytes::copy_from_slice(&[0x01])];
        assert_eq!(
            engine.handle_inbound(&parts),
            vec![ClientAction::Connected(identity(b"w1"))]
        );
        assert!(engine.is_connected());

        // P1: a second READY for the same identity changes nothing.
        assert!(engine.handle_inbound(&parts).is_empty());
        assert_eq!(engine.peer_identity(), Some(&identity(b"w1")));
    }

    #[test]
    fn final_reply_from_foreign_identity_is_dropped() {
        let mut engine = ClientEngine::new(3);
        engine.handle_inbound(&[identity(b"w1"), Bytes::copy_from_slice(&[0x01])]);

        let payload = Payload::Bool(true);
        let mut reply = vec![identity(b"w2")];
        reply.extend(frame::reply_parts(MSG_FINAL_REPLY, &payload));
        assert!(engine.handle_inbound(&reply).is_empty());
    }

    #[test]
    fn final_reply_refreshes_liveness_and_resolves_call() {
        let mut engine = ClientEngine::new(3);
        engine.handle_inbound(&[identity(b"w1"), Bytes::copy_from_slice(&[0x01])]);
        // Exhaust two ticks first.
        engine.tick();
        engine.tick();

        let payload = Payload::map([("equal", Payload::Bool(false))]);
        let mut reply = vec![identity(b"w1")];
        reply.extend(frame::reply_parts(MSG_FINAL_REPLY, &payload));
        assert_eq!(engine.handle_inbound(&reply), vec![ClientAction::Final(payload)]);

        // Liveness was refreshed: three more ticks are needed to disconnect.
        assert!(engine.tick().is_empty() == false); // sends a heartbeat, not yet disconnected
        assert!(engine.is_connected());
    }

    #[test]
    fn liveness_exhaustion_disconnects_within_bound() {
        let mut engine = ClientEngine::new(3);
        engine.handle_inbound(&[identity(b"w1"), Bytes::copy_from_slice(&[0x01])]);

        assert!(matches!(engine.tick().as_slice(), [ClientAction::Send(_)]));
        assert!(matches!(engine.tick().as_slice(), [ClientAction::Send(_)]));
        assert_eq!(engine.tick(), vec![ClientAction::Disconnected]);
        assert!(!engine.is_connected());
    }

    #[test]
    fn emit_accepted_without_identity_check() {
        let mut engine = ClientEngine::new(3);
        engine.handle_inbound(&[identity(b"w1"), Bytes::copy_from_slice(&[0x01])]);

        let payload = Payload::Str("tick".to_string());
        let mut emit = vec![identity(b"anyone")];
        emit.extend(frame::reply_parts(MSG_EMIT, &payload));
        assert_eq!(engine.handle_inbound(&emit), vec![ClientAction::Emit(payload)]);
    }

    #[test]
    fn worker_sends_ready_on_startup() {
        let (engine, actions) = WorkerEngine::startup(3);
        assert_eq!(actions, vec![WorkerAction::Send(frame::ready_parts())]);
        assert!(!engine.is_connected());
    }

    #[test]
    fn worker_dispatches_request_and_connects() {
        let (mut engine, _) = WorkerEngine::startup(3);
        let args = Payload::array([]);
        let kwargs = Payload::map([("a", Payload::from(1i64))]);
        let mut parts = vec![Bytes::from_static(b"client"), Bytes::copy_from_slice(&[0x02])];
        parts.push(Bytes::copy_from_slice(b"echo"));
        parts.push(codec::encode(&args));
        parts.push(codec::encode(&kwargs));

        let actions = engine.handle_inbound(&parts);
        assert_eq!(
            actions,
            vec![
                WorkerAction::Connected,
                WorkerAction::Dispatch {
                    method: "echo".to_string(),
                    args,
                    kwargs,
                },
            ]
        );
        assert!(engine.is_connected());
    }

    #[test]
    fn worker_tick_three_way_branch() {
        let (mut engine, _) = WorkerEngine::startup(1);
        // liveness starts at 1: first tick sends heartbeat (1 -> 0 after decrement? let's trace)
        // liveness=1 -> tick: decrement to 0 -> branch "==0" -> Disconnected.
        assert_eq!(engine.tick(), vec![WorkerAction::Disconnected]);
        assert!(!engine.is_connected());
        // Next tick: liveness stays negative-bound (no further decrement since <0 after this)
        assert_eq!(engine.tick(), vec![WorkerAction::Send(frame::ready_parts())]);
    }
}
