//! Wire framing (§6): translates protocol messages into and out of the
//! multipart frames a ROUTER/DEALER pair exchanges.
//!
//! Frame layout is structural only here — this module never decodes a
//! payload's MessagePack bytes. The two engines decode payloads
//! themselves because the failure handling differs per message type
//! (partial replies tolerate a bad payload and fall back to raw bytes;
//! final replies and requests do not, per §7).

use bytes::Bytes;

use super::constants::{
    MSG_DISCONNECT, MSG_EMIT, MSG_EXCEPTION, MSG_FINAL_REPLY, MSG_HEARTBEAT, MSG_PARTIAL_REPLY,
    MSG_READY, MSG_REQUEST, UNI_CLIENT_HEADER,
};
use super::codec::{self, Payload};

fn type_byte(b: u8) -> Bytes {
    Bytes::copy_from_slice(&[b])
}

// ---------------------------------------------------------------------
// Client -> worker
// ---------------------------------------------------------------------

/// Build the parts for a client → worker `REQUEST`, addressed to `identity`.
///
/// The first part (`identity`) is consumed by the ROUTER socket to route
/// the frame to the right peer; it is not part of the wire message itself.
pub fn request_parts(identity: &Bytes, method: &str, args: &Payload, kwargs: &Payload) -> Vec<Bytes> {
    vec![
        identity.clone(),
        Bytes::from_static(UNI_CLIENT_HEADER),
        type_byte(MSG_REQUEST),
        Bytes::copy_from_slice(method.as_bytes()),
        codec::encode(args),
        codec::encode(kwargs),
    ]
}

/// Build the parts for a client → worker `HEARTBEAT`, addressed to `identity`.
pub fn client_heartbeat_parts(identity: &Bytes) -> Vec<Bytes> {
    vec![
        identity.clone(),
        Bytes::from_static(UNI_CLIENT_HEADER),
        type_byte(MSG_HEARTBEAT),
    ]
}

/// A structurally-parsed client → worker message. Payload parts are left
/// as raw bytes; the worker engine decodes them.
pub enum ClientMessage {
    /// `REQUEST`: a named call with packed positional and keyword arguments.
    Request {
        /// Method name.
        method: String,
        /// Packed positional-argument sequence.
        args: Bytes,
        /// Packed keyword-argument mapping.
        kwargs: Bytes,
    },
    /// `HEARTBEAT`: liveness probe, no payload.
    Heartbeat,
    /// `DISCONNECT`: not sent by this crate's client, but accepted for
    /// robustness since the opcode is shared (see §4.2).
    Disconnect,
    /// A message type byte this engine does not recognize.
    Unknown(u8),
    /// The frame had the right header but was structurally truncated or
    /// carried a non-UTF-8 method name.
    Malformed(&'static str),
}

/// Parse a worker-bound frame. Returns `None` if the leading header part
/// does not match [`UNI_CLIENT_HEADER`] — the caller should log and drop
/// without further interpretation.
pub fn parse_client_message(parts: &[Bytes]) -> Option<ClientMessage> {
    if parts.first().map(Bytes::as_ref) != Some(UNI_CLIENT_HEADER) {
        return None;
    }
    let Some(ty) = parts.get(1).and_then(|b| b.first()).copied() else {
        return Some(ClientMessage::Malformed("missing message type"));
    };
    Some(match ty {
        MSG_REQUEST => parse_request(parts),
        MSG_HEARTBEAT => ClientMessage::Heartbeat,
        MSG_DISCONNECT => ClientMessage::Disconnect,
        other => ClientMessage::Unknown(other),
    })
}

fn parse_request(parts: &[Bytes]) -> ClientMessage {
    let (Some(method_bytes), Some(args), Some(kwargs)) = (parts.get(2), parts.get(3), parts.get(4))
    else {
        return ClientMessage::Malformed("truncated REQUEST");
    };
    let Ok(method) = std::str::from_utf8(method_bytes) else {
        return ClientMessage::Malformed("non-UTF-8 method name");
    };
    ClientMessage::Request {
        method: method.to_string(),
        args: args.clone(),
        kwargs: kwargs.clone(),
    }
}

// ---------------------------------------------------------------------
// Worker -> client
// ---------------------------------------------------------------------

/// Build the parts for a worker → client `READY`.
pub fn ready_parts() -> Vec<Bytes> {
    vec![type_byte(MSG_READY)]
}

/// Build the parts for a worker → client `HEARTBEAT`.
pub fn worker_heartbeat_parts() -> Vec<Bytes> {
    vec![type_byte(MSG_HEARTBEAT)]
}

/// Build the parts for a worker → client `DISCONNECT`.
pub fn disconnect_parts() -> Vec<Bytes> {
    vec![type_byte(MSG_DISCONNECT)]
}

/// Build the parts for a worker → client reply-shaped message
/// (`PARTIAL_REPLY`, `FINAL_REPLY`, `EMIT`, or `EXCEPTION`): `[type, b"",
/// packed_payload]`.
pub fn reply_parts(ty: u8, payload: &Payload) -> Vec<Bytes> {
    vec![type_byte(ty), Bytes::new(), codec::encode(payload)]
}

/// A structurally-parsed worker → client message (the transport's
/// peer-identity part has already been stripped by the caller).
pub enum WorkerMessage {
    /// `READY`: worker handshake announcement.
    Ready,
    /// `PARTIAL_REPLY`: streaming progress update, packed payload bytes.
    PartialReply(Bytes),
    /// `FINAL_REPLY`: terminal successful reply, packed payload bytes.
    FinalReply(Bytes),
    /// `EXCEPTION`: terminal reply carrying a handler exception, packed
    /// payload bytes.
    Exception(Bytes),
    /// `EMIT`: unsolicited event, packed payload bytes.
    Emit(Bytes),
    /// `HEARTBEAT`: liveness probe, no payload.
    Heartbeat,
    /// `DISCONNECT`: graceful teardown notice.
    Disconnect,
    /// A message type byte this engine does not recognize.
    Unknown(u8),
    /// The frame was empty or missing its payload part.
    Malformed(&'static str),
}

/// Parse a client-bound frame whose identity frame has already been
/// stripped by [`super::engine::ClientEngine::handle_inbound`].
pub fn parse_worker_message(parts: &[Bytes]) -> WorkerMessage {
    let Some(ty) = parts.first().and_then(|b| b.first()).copied() else {
        return WorkerMessage::Malformed("empty frame");
    };
    match ty {
        MSG_READY => WorkerMessage::Ready,
        MSG_HEARTBEAT => WorkerMessage::Heartbeat,
        MSG_DISCONNECT => WorkerMessage::Disconnect,
        MSG_PARTIAL_REPLY => reply_payload(parts).map_or(
            WorkerMessage::Malformed("truncated PARTIAL_REPLY"),
            WorkerMessage::PartialReply,
        ),
        MSG_FINAL_REPLY => reply_payload(parts).map_or(
            WorkerMessage::Malformed("truncated FINAL_REPLY"),
            WorkerMessage::FinalReply,
        ),
        MSG_EXCEPTION => reply_payload(parts).map_or(
            WorkerMessage::Malformed("truncated EXCEPTION"),
            WorkerMessage::Exception,
        ),
        MSG_EMIT => reply_payload(parts)
            .map_or(WorkerMessage::Malformed("truncated EMIT"), WorkerMessage::Emit),
        other => WorkerMessage::Unknown(other),
    }
}

fn reply_payload(parts: &[Bytes]) -> Option<Bytes> {
    parts.get(2).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_client_parser() {
        let identity = Bytes::from_static(b"worker-1");
        let args = Payload::array([Payload::from(1i64)]);
        let kwargs = Payload::map([("a", Payload::from("b"))]);
        let parts = request_parts(&identity, "compare", &args, &kwargs);

        // Drop the identity part the way ROUTER::send consumes it, and
        // parse exactly what the worker receives.
        let on_wire = &parts[1..];
        match parse_client_message(on_wire) {
            Some(ClientMessage::Request { method, args: a, kwargs: k }) => {
                assert_eq!(method, "compare");
                assert_eq!(codec::decode(&a).unwrap(), args);
                assert_eq!(codec::decode(&k).unwrap(), kwargs);
            }
            _ => panic!("expected Request"),
        }
    }

    #[test]
    fn unknown_header_is_rejected() {
        let bogus = vec![Bytes::from_static(b"not-client")];
        assert!(parse_client_message(&bogus).is_none());
    }

    #[test]
    fn ready_has_no_payload() {
        assert!(matches!(parse_worker_message(&ready_parts()), WorkerMessage::Ready));
    }

    #[test]
    fn final_reply_round_trips() {
        let payload = Payload::map([("equal", Payload::Bool(true))]);
        let parts = reply_parts(MSG_FINAL_REPLY, &payload);
        match parse_worker_message(&parts) {
            WorkerMessage::FinalReply(bytes) => {
                assert_eq!(codec::decode(&bytes).unwrap(), payload);
            }
            _ => panic!("expected FinalReply"),
        }
    }
}
