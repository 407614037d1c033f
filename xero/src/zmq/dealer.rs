//! DEALER socket implementation.

use super::common::channel_to_io_error;
use bytes::Bytes;
use compio::net::TcpStream;
use xero_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use xero_zmtp::dealer::DealerSocket as InternalDealer;
use std::io;

/// A DEALER socket for asynchronous request-reply patterns.
///
/// DEALER sockets are fair-queuing clients that distribute messages
/// across multiple server endpoints. They're used for:
///
/// - Load-balanced request-reply
/// - Async RPC clients
/// - Worker pools
///
/// ## ZeroMQ Compatibility
///
/// Compatible with `zmq::DEALER` and `zmq::ROUTER` sockets from libzmq.
///
/// ## Example
///
/// ```rust,no_run
/// use xero::zmq::DealerSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Connect to server
/// let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
///
/// // Send request
/// socket.send(vec![Bytes::from("REQUEST")]).await?;
///
/// // Receive reply
/// if let Some(reply) = socket.recv().await {
///     println!("Got reply: {:?}", reply);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DealerSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalDealer<S>,
    monitor: Option<SocketEventSender>,
}

impl DealerSocket {
    /// Connect to a ZeroMQ peer and create a DEALER socket.
    ///
    /// Accepts `"tcp://127.0.0.1:5555"` or a bare `"127.0.0.1:5555"` address.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Endpoint to connect to
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The connection fails (network unreachable, connection refused, etc.)
    /// - DNS resolution fails for TCP endpoints
    /// - Invalid endpoint format
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use xero::zmq::DealerSocket;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// // TCP connection
    /// let socket1 = DealerSocket::connect("tcp://127.0.0.1:5555").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(endpoint: &str) -> io::Result<Self> {
        // Try parsing as endpoint, fall back to raw address
        let addr = if let Ok(xero_core::endpoint::Endpoint::Tcp(a)) =
            xero_core::endpoint::Endpoint::parse(endpoint)
        {
            a
        } else {
            endpoint
                .parse::<std::net::SocketAddr>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        };

        let stream = TcpStream::connect(addr).await?;
        let sock = Self::from_stream(stream).await?;
        sock.emit_event(SocketEvent::Connected(
            xero_core::endpoint::Endpoint::Tcp(addr),
        ));
        Ok(sock)
    }

    /// Create a DEALER socket from an existing TCP stream.
    ///
    /// Use this for advanced scenarios where you need full control over
    /// the TCP connection (e.g., custom socket options, TLS wrapping).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use xero::zmq::DealerSocket;
    /// use compio::net::TcpStream;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let stream = TcpStream::connect("127.0.0.1:5555").await?;
    /// // Configure stream (e.g., set TCP_NODELAY)
    /// let socket = DealerSocket::from_stream(stream).await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_stream(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::new(stream).await?,
            monitor: None,
        })
    }

    /// Create a DEALER socket from an existing TCP stream with custom buffer configuration.
    ///
    /// # Buffer Configuration
    /// - Use `BufferConfig::small()` (4KB) for low-latency with small messages
    /// - Use `BufferConfig::large()` (16KB) for high-throughput with large messages (recommended)
    pub async fn from_stream_with_config(
        stream: TcpStream,
        config: xero_zmtp::config::BufferConfig,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::with_config(stream, config).await?,
            monitor: None,
        })
    }

    /// Connect to a ZeroMQ peer with custom socket options.
    ///
    /// Accepts `"tcp://127.0.0.1:5555"` or a bare `"127.0.0.1:5555"` address.
    pub async fn connect_with_options(
        endpoint: &str,
        options: xero_core::options::SocketOptions,
    ) -> io::Result<Self> {
        let addr = if let Ok(xero_core::endpoint::Endpoint::Tcp(a)) =
            xero_core::endpoint::Endpoint::parse(endpoint)
        {
            a
        } else {
            endpoint
                .parse::<std::net::SocketAddr>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        };

        let stream = TcpStream::connect(addr).await?;
        let sock = Self::with_options(stream, options).await?;
        sock.emit_event(SocketEvent::Connected(
            xero_core::endpoint::Endpoint::Tcp(addr),
        ));
        Ok(sock)
    }

    /// Create a DEALER socket from an existing TCP stream with custom options.
    pub async fn with_options(
        stream: TcpStream,
        options: xero_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::from_tcp_with_options(
                stream,
                xero_zmtp::config::BufferConfig::small(),
                options,
            )
            .await?,
            monitor: None,
        })
    }

    /// Create a DEALER socket from an existing TCP stream with TCP_NODELAY enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::from_tcp(stream).await?,
            monitor: None,
        })
    }
}

// Generic impl - works with any stream type
impl<S> DealerSocket<S>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    /// Enable monitoring for this socket.
    ///
    /// Returns a receiver for socket lifecycle events. Once enabled, the socket
    /// will emit events like Connected, Disconnected, etc.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use xero::zmq::{DealerSocket, SocketEvent};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
    /// let monitor = socket.monitor();
    ///
    /// // Spawn task to handle events
    /// compio::runtime::spawn(async move {
    ///     while let Ok(event) = monitor.recv_async().await {
    ///         println!("Socket event: {}", event);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn monitor(&mut self) -> SocketMonitor {
        let (sender, receiver) = create_monitor();
        self.monitor = Some(sender);
        receiver
    }

    /// Helper to emit monitoring events (if monitoring is enabled).
    #[allow(dead_code)]
    fn emit_event(&self, event: SocketEvent) {
        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(event); // Ignore errors if receiver dropped
        }
    }

    /// Send a multipart message.
    ///
    /// Messages are sent asynchronously - this returns immediately after
    /// queuing the message for transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying connection is closed or broken.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use xero::zmq::DealerSocket;
    /// # use bytes::Bytes;
    /// # async fn example(mut socket: DealerSocket) -> Result<(), Box<dyn std::error::Error>> {
    /// socket.send(vec![
    ///     Bytes::from("part1"),
    ///     Bytes::from("part2"),
    /// ]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        channel_to_io_error(self.inner.send(msg).await)
    }

    /// Send a message to the internal buffer without flushing.
    ///
    /// Use this for batching multiple messages before a single flush.
    pub fn send_buffered(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.inner.send_buffered(msg)
    }

    /// Flush all buffered messages to the network.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    /// Send multiple messages in a single batch.
    pub async fn send_batch(&mut self, messages: &[Vec<Bytes>]) -> io::Result<()> {
        self.inner.send_batch(messages).await
    }

    /// Get the number of bytes currently buffered.
    #[inline]
    pub fn buffered_bytes(&self) -> usize {
        self.inner.buffered_bytes()
    }

    /// Receive a multipart message.
    ///
    /// Returns `None` if the connection is closed.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use xero::zmq::DealerSocket;
    /// # async fn example(mut socket: DealerSocket) -> Result<(), Box<dyn std::error::Error>> {
    /// while let Some(msg) = socket.recv().await {
    ///     println!("Received {} parts", msg.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn recv(&mut self) -> Option<Vec<Bytes>> {
        self.inner.recv().await.ok().flatten()
    }
}

// Unix-specific impl for IPC support
#[cfg(unix)]
impl DealerSocket<compio::net::UnixStream> {
    /// Create a DEALER socket from an existing Unix domain socket stream (IPC).
    pub async fn from_unix_stream(stream: compio::net::UnixStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::new(stream).await?,
            monitor: None,
        })
    }

    /// Create a DEALER socket from an existing Unix stream with custom buffer configuration.
    pub async fn from_unix_stream_with_config(
        stream: compio::net::UnixStream,
        config: xero_zmtp::config::BufferConfig,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::with_config(stream, config).await?,
            monitor: None,
        })
    }
}
