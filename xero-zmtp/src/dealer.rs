//! Direct-stream DEALER socket implementation
//!
//! This module provides a DEALER socket using direct stream I/O, mirroring
//! `router.rs`'s structure. A DEALER is the connecting, active-transport
//! side of a ROUTER/DEALER pair: unlike ROUTER it does not receive a peer
//! identity prefix on every message and does not prepend one on send.
//!
//! # DEALER Pattern
//!
//! DEALER sockets send and receive messages as-is, with no envelope
//! manipulation. Paired with a single ROUTER, this gives a plain
//! bidirectional stream of multipart messages.

use bytes::Bytes;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use smallvec::SmallVec;
use std::io;
use tracing::{debug, trace};
use xero_core::options::SocketOptions;

use crate::base::SocketBase;
use crate::codec::encode_multipart;
use crate::config::BufferConfig;
use crate::{handshake::perform_handshake_with_timeout, session::SocketType};

/// Direct-stream DEALER socket.
pub struct DealerSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Base socket infrastructure (stream, buffers, options)
    base: SocketBase<S>,
    /// Accumulated frames for current multipart message
    frames: SmallVec<[Bytes; 4]>,
    /// Peer identity, if the remote ROUTER announced one during handshake
    peer_identity: Option<Bytes>,
}

impl<S> DealerSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new DEALER socket from a stream with small buffer configuration (4KB).
    ///
    /// DEALER sockets typically exchange small request/reply messages, so small
    /// buffers are the sensible default. Use `with_config()` for bulk transfer.
    ///
    /// Works with both TCP and Unix domain sockets.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_options(stream, BufferConfig::small(), SocketOptions::default()).await
    }

    /// Create a new DEALER socket from a stream with custom buffer configuration.
    ///
    /// **Note**: For TCP streams, use `from_tcp_with_config()` instead to ensure TCP_NODELAY is enabled.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new DEALER socket with custom buffer configuration and socket options.
    pub async fn with_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let options = options.with_buffer_sizes(config.read_buf_size, config.write_buf_size);
        debug!("[DEALER] Creating new direct DEALER socket");

        debug!("[DEALER] Performing ZMTP handshake...");
        let identity = options.routing_id.clone();
        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Dealer,
            identity.as_deref(),
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_identity = ?handshake_result.peer_identity,
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[DEALER] Handshake complete"
        );

        Ok(Self {
            base: SocketBase::new(stream, SocketType::Dealer, options),
            frames: SmallVec::new(),
            peer_identity: handshake_result.peer_identity,
        })
    }

    /// Receive a multipart message.
    ///
    /// Unlike ROUTER, no identity frame is prepended: the returned vector is
    /// exactly the frames the peer sent.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        trace!("[DEALER] Waiting for message");

        loop {
            loop {
                match self.base.decoder.decode(&mut self.base.recv)? {
                    Some(frame) => {
                        let more = frame.more();
                        self.frames.push(frame.payload);

                        if !more {
                            let msg: Vec<Bytes> = self.frames.drain(..).collect();
                            trace!("[DEALER] Received {} frames", msg.len());
                            return Ok(Some(msg));
                        }
                    }
                    None => break,
                }
            }

            let n = self.base.read_raw().await?;
            if n == 0 {
                trace!("[DEALER] Connection closed");
                return Ok(None);
            }
        }
    }

    /// Send a multipart message immediately.
    ///
    /// Encodes and sends the message in a single I/O operation. For
    /// high-throughput scenarios, consider `send_buffered()` + `flush()`.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        trace!("[DEALER] Sending {} frames", msg.len());

        self.base.write_buf.clear();
        encode_multipart(&msg, &mut self.base.write_buf);
        self.base.write_from_buf().await?;

        trace!("[DEALER] Message sent successfully");
        Ok(())
    }

    /// Send a message to the internal buffer without flushing.
    ///
    /// Call `flush()` to send all buffered messages.
    pub fn send_buffered(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        trace!("[DEALER] Buffering {} frames", msg.len());
        encode_multipart(&msg, &mut self.base.send_buffer);
        Ok(())
    }

    /// Flush all buffered messages to the network.
    pub async fn flush(&mut self) -> io::Result<()> {
        trace!("[DEALER] Flushing {} bytes", self.base.send_buffer.len());
        self.base.flush_send_buffer().await?;
        trace!("[DEALER] Flush completed");
        Ok(())
    }

    /// Send multiple messages in a single batch (convenience method).
    pub async fn send_batch(&mut self, messages: &[Vec<Bytes>]) -> io::Result<()> {
        trace!("[DEALER] Batching {} messages", messages.len());

        for msg in messages {
            encode_multipart(msg, &mut self.base.send_buffer);
        }

        self.flush().await
    }

    /// Get the number of bytes currently buffered.
    #[inline]
    pub fn buffered_bytes(&self) -> usize {
        self.base.send_buffer.len()
    }

    /// Close the socket gracefully, respecting the linger timeout.
    ///
    /// See `RouterSocket::close` for the linger semantics.
    pub async fn close(mut self) -> io::Result<()> {
        let linger = self.base.options.linger;

        if self.base.send_buffer.is_empty() {
            trace!("[DEALER] No buffered data, closing immediately");
            return Ok(());
        }

        trace!(
            "[DEALER] Closing with {} bytes buffered, linger={:?}",
            self.base.send_buffer.len(),
            linger
        );

        match linger {
            Some(dur) if dur.is_zero() => {
                debug!("[DEALER] Linger=0, discarding {} bytes", self.base.send_buffer.len());
                Ok(())
            }
            Some(dur) => {
                use compio::time::timeout;
                match timeout(dur, self.flush()).await {
                    Ok(Ok(())) => {
                        debug!("[DEALER] Successfully flushed before close");
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        debug!("[DEALER] Flush failed: {}", e);
                        Err(e)
                    }
                    Err(_) => {
                        debug!("[DEALER] Linger timeout expired, closing anyway");
                        Ok(())
                    }
                }
            }
            None => {
                debug!("[DEALER] Linger=indefinite, flushing all buffered data");
                self.flush().await
            }
        }
    }

    /// Get a reference to the socket options.
    #[inline]
    pub fn options(&self) -> &SocketOptions {
        &self.base.options
    }

    /// Get a mutable reference to the socket options.
    #[inline]
    pub fn options_mut(&mut self) -> &mut SocketOptions {
        &mut self.base.options
    }

    /// Set socket options (builder-style).
    #[inline]
    pub fn set_options(&mut self, options: SocketOptions) {
        self.base.options = options;
    }

    /// Get the peer's identity, if the ROUTER it is connected to announced one.
    #[inline]
    pub fn peer_identity(&self) -> Option<&Bytes> {
        self.peer_identity.as_ref()
    }

    /// Get the last connected endpoint, if any.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&str> {
        self.base.last_endpoint_string()
    }

    /// Check if more frames are expected for the in-progress message.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.base.has_more()
    }

    /// Get current socket readiness events (`POLLIN`/`POLLOUT`).
    #[inline]
    pub fn events(&self) -> u32 {
        self.base.events()
    }
}

// Specialized implementation for TCP streams to enable TCP_NODELAY and
// endpoint-based connect/reconnect.
impl DealerSocket<TcpStream> {
    /// Connect to a ROUTER at `addr` and perform the ZMTP handshake.
    pub async fn connect(addr: std::net::SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream).await
    }

    /// Create a new DEALER socket from a TCP stream with TCP_NODELAY enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::small()).await
    }

    /// Create a new DEALER socket from a TCP stream with TCP_NODELAY and custom config.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        xero_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[DEALER] TCP_NODELAY enabled");
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new DEALER socket from a TCP stream with full configuration.
    pub async fn from_tcp_with_options(
        stream: TcpStream,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        xero_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[DEALER] TCP_NODELAY enabled");
        Self::with_options(stream, config, options).await
    }
}
