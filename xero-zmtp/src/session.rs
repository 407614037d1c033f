//! Supported ZMTP socket types.

/// Supported ZMQ socket types (no heap allocation).
///
/// The RPC runtime only ever constructs `Router` (client side) and
/// `Dealer` (worker side), but the handshake needs the full
/// enumeration to validate whatever the peer announces in its READY
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Pair,
    Dealer,
    Router,
    Pub,
    Sub,
    Req,
    Rep,
    Push,
    Pull,
}

impl SocketType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Push => "PUSH",
            Self::Pull => "PULL",
        }
    }
}
