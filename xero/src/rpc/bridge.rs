//! Call/reply bridge (§4.3): the synchronous, thread-safe API callers
//! actually hold. [`RpcClient`] and [`RpcWorker`] each own one event-loop
//! thread (`loop_runner`) and reach it only through [`super::loop_runner::LoopHandle`],
//! a shared outbound frame queue, and a handful of flume/condvar channels.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::codec::Payload;
use super::config::{ClientConfig, WorkerConfig};
use super::constants::{MSG_EMIT, MSG_PARTIAL_REPLY};
use super::engine::{ClientEngine, WorkerEngine};
use super::error::{RemoteException, RpcError};
use super::loop_runner::{
    new_conn_signal, new_outbound_queue, run_client_loop, run_worker_loop, ConnSignal, LoopHandle,
    OutboundQueue, ReplyEvent, Timers,
};

/// Outcome of one worker handler invocation (§4.2). Returned from
/// [`Handler::call`]; the worker loop turns it into a `FINAL_REPLY` or
/// `EXCEPTION` frame.
pub enum HandlerOutcome {
    /// Call succeeded; `payload` becomes the `FINAL_REPLY`.
    Final(Payload),
    /// Call raised; `exception` is packed and sent as an `EXCEPTION` frame.
    Exception(RemoteException),
}

/// The user-supplied request dispatch table (§1 Non-goals: the table
/// itself — method names, argument validation — is out of scope; the
/// core only routes a decoded `REQUEST` into this one callback).
///
/// Re-architected per §9's "abstract class hierarchies" note as a single
/// capability rather than a virtual base class: implementors get a
/// `&method` name, decoded positional/keyword arguments, and a
/// [`ReplySink`] for streaming partial replies before they return.
///
/// `call` runs on the worker's event-loop thread (§5) and must not
/// block; long-running handlers should spawn their own thread, return a
/// placeholder partial immediately if useful, and post the eventual
/// final reply through a cloned `ReplySink` from that thread.
pub trait Handler: Send + Sync + 'static {
    /// Handle one decoded `REQUEST`.
    fn call(&self, method: &str, args: Payload, kwargs: Payload, replies: &ReplySink) -> HandlerOutcome;
}

impl<F> Handler for F
where
    F: Fn(&str, Payload, Payload, &ReplySink) -> HandlerOutcome + Send + Sync + 'static,
{
    fn call(&self, method: &str, args: Payload, kwargs: Payload, replies: &ReplySink) -> HandlerOutcome {
        self(method, args, kwargs, replies)
    }
}

/// Lets a [`Handler`] push streaming `PARTIAL_REPLY` frames before
/// returning its final outcome (§4.2, §8 P6). Cheap to clone; the clone
/// is `Send` so a handler may move it into a worker-owned thread and call
/// [`ReplySink::partial`] from there once long-running work completes.
#[derive(Clone)]
pub struct ReplySink {
    outbound: OutboundQueue,
    loop_handle: LoopHandle,
}

impl ReplySink {
    pub(crate) fn new(outbound: OutboundQueue, loop_handle: LoopHandle) -> Self {
        Self { outbound, loop_handle }
    }

    /// Enqueue a `PARTIAL_REPLY`. Does not fulfill the call; the handler
    /// must still return a [`HandlerOutcome`] to produce the terminal
    /// `FINAL_REPLY`/`EXCEPTION` frame.
    ///
    /// Posted to the loop rather than pushed onto the outbound queue
    /// directly (§4.3): a handler that offloaded its work to its own
    /// thread calls this from off the loop thread, and the push alone
    /// would sit unflushed until the next inbound frame or heartbeat tick.
    pub fn partial(&self, payload: Payload) {
        let outbound = self.outbound.clone();
        self.loop_handle.post(move || {
            outbound
                .lock()
                .push_back(WorkerEngine::build_reply(MSG_PARTIAL_REPLY, &payload));
        });
    }
}

/// Spawn a dedicated OS thread running its own single-threaded `compio`
/// runtime, matching `xero-zmtp`'s example pattern of one
/// `Runtime::new().block_on(...)` per peer.
///
/// Takes a closure that *builds* the future rather than the future
/// itself: the socket types the loop body holds across `.await` points
/// are tied to this thread's `io_uring` instance and need not be `Send`,
/// only the plain data (`Arc`s, channels, strings) the closure captures
/// to construct them.
fn spawn_loop_thread<F, Fut>(name: &'static str, make_future: F) -> std::thread::JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = io::Result<()>>,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let rt = compio::runtime::Runtime::new().expect("failed to start compio runtime for RPC loop");
            if let Err(e) = rt.block_on(make_future()) {
                tracing::warn!(error = %e, "{name} loop exited with an error");
            }
        })
        .expect("failed to spawn RPC event-loop thread")
}

fn await_ready(ready_rx: std::sync::mpsc::Receiver<io::Result<()>>) -> Result<(), RpcError> {
    match ready_rx.recv() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RpcError::Io(e)),
        Err(_) => Err(RpcError::ShutDown),
    }
}

/// A synchronous RPC client (§4.3). Binds an endpoint, pairs with exactly
/// one worker, and exposes blocking `rpc`/`emit`-drain operations safe to
/// call from any thread.
///
/// Concurrent `rpc()` calls on one instance serialize (§8 P2, §4.3); an
/// application that needs parallel in-flight calls should construct
/// multiple `RpcClient`s.
pub struct RpcClient {
    loop_handle: super::loop_runner::LoopHandle,
    engine: Arc<Mutex<ClientEngine>>,
    outbound: OutboundQueue,
    connected: ConnSignal,
    reply_tx: flume::Sender<ReplyEvent>,
    reply_rx: flume::Receiver<ReplyEvent>,
    emit_rx: flume::Receiver<Payload>,
    partial_slot: Arc<Mutex<Option<Box<dyn FnMut(Payload) + Send>>>>,
    call_lock: Mutex<()>,
    config: ClientConfig,
    _loop_thread: std::thread::JoinHandle<()>,
}

impl RpcClient {
    /// Bind `config.endpoint()` and start the client's event loop.
    ///
    /// Returns once the transport has bound and accepted its one
    /// connection (§3 Lifecycle); the RPC-level handshake (the worker's
    /// `READY`) completes asynchronously afterward — use
    /// [`wait_for_connected`](Self::wait_for_connected) to block on that.
    pub fn bind(config: ClientConfig) -> Result<Self, RpcError> {
        let engine = Arc::new(Mutex::new(ClientEngine::new(config.heartbeat_liveness)));
        let outbound = new_outbound_queue();
        let connected = new_conn_signal();
        let (reply_tx, reply_rx) = flume::bounded(1);
        let (emit_tx, emit_rx) = flume::bounded(1024);
        let partial_slot: Arc<Mutex<Option<Box<dyn FnMut(Payload) + Send>>>> = Arc::new(Mutex::new(None));
        let (timers, loop_handle) = Timers::new();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let endpoint = config.endpoint().to_string();
        let thread_engine = engine.clone();
        let thread_outbound = outbound.clone();
        let thread_connected = connected.clone();
        let thread_partial = partial_slot.clone();
        let thread_loop_handle = loop_handle.clone();
        let thread_reply_tx = reply_tx.clone();
        let heartbeat_interval = config.heartbeat_interval;

        let loop_thread = spawn_loop_thread("xero-rpc-client", move || {
            run_client_loop(
                endpoint,
                thread_engine,
                thread_outbound,
                thread_connected,
                thread_reply_tx,
                emit_tx,
                thread_partial,
                timers,
                thread_loop_handle,
                heartbeat_interval,
                ready_tx,
            )
        });

        await_ready(ready_rx)?;

        Ok(Self {
            loop_handle,
            engine,
            outbound,
            connected,
            reply_tx,
            reply_rx,
            emit_rx,
            partial_slot,
            call_lock: Mutex::new(()),
            config,
            _loop_thread: loop_thread,
        })
    }

    /// Issue an RPC and block for its result, invoking `on_partial` for
    /// every `PARTIAL_REPLY` that arrives first (§8 P6 guarantees every
    /// partial callback runs before this returns).
    pub fn rpc_with_partial(
        &self,
        method: &str,
        args: Payload,
        kwargs: Payload,
        timeout: Duration,
        mut on_partial: impl FnMut(Payload) + Send + 'static,
    ) -> Result<Payload, RpcError> {
        let _serialize = self.call_lock.lock();
        // A reply for a call this bridge already gave up on (§5 RPC
        // timeout) can still land in the bounded channel right after
        // `recv_timeout` returned; drop it before it's mistaken for this
        // call's answer.
        while self.reply_rx.try_recv().is_ok() {}
        *self.partial_slot.lock() = Some(Box::new(move |p| on_partial(p)));

        let method = method.to_string();
        let engine = self.engine.clone();
        let outbound = self.outbound.clone();
        let reply_tx_for_post = self.reply_tx.clone();
        self.loop_handle.post(move || {
            let frame = engine.lock().build_request(&method, &args, &kwargs);
            match frame {
                Some(frame) => outbound.lock().push_back(frame),
                None => {
                    let _ = reply_tx_for_post.try_send(ReplyEvent::Error(RpcError::LostPeer));
                }
            }
        });

        let result = match self.reply_rx.recv_timeout(timeout) {
            Ok(ReplyEvent::Final(payload)) => Ok(payload),
            Ok(ReplyEvent::Exception(exc)) => Err(RpcError::RemoteException(exc)),
            Ok(ReplyEvent::Error(err)) => Err(err),
            Err(flume::RecvTimeoutError::Timeout) => {
                self.engine.lock().force_unregister();
                super::loop_runner::set_signal(&self.connected, false);
                Err(RpcError::LostPeer)
            }
            Err(flume::RecvTimeoutError::Disconnected) => Err(RpcError::ShutDown),
        };

        *self.partial_slot.lock() = None;
        result
    }

    /// Issue an RPC using `config`'s default timeout and no partial
    /// callback, and block for its result.
    pub fn rpc(&self, method: &str, args: Payload, kwargs: Payload) -> Result<Payload, RpcError> {
        self.rpc_timeout(method, args, kwargs, self.config.rpc_timeout)
    }

    /// Issue an RPC with an explicit timeout and no partial callback.
    pub fn rpc_timeout(
        &self,
        method: &str,
        args: Payload,
        kwargs: Payload,
        timeout: Duration,
    ) -> Result<Payload, RpcError> {
        self.rpc_with_partial(method, args, kwargs, timeout, |_| {})
    }

    /// Block until a worker peer registers, or `timeout` elapses.
    pub fn wait_for_connected(&self, timeout: Duration) -> Result<(), RpcError> {
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self.connected.0.lock();
        while !*guard {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Err(RpcError::LostPeer);
            }
            self.connected.1.wait_for(&mut guard, remaining);
        }
        Ok(())
    }

    /// Non-blocking snapshot of whether a worker peer is currently
    /// registered.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.connected.0.lock()
    }

    /// Block for the next emission, up to `timeout`.
    pub fn get_emit(&self, timeout: Duration) -> Result<Payload, RpcError> {
        self.emit_rx.recv_timeout(timeout).map_err(|_| RpcError::LostPeer)
    }

    /// Drain every emission currently queued, waiting up to `timeout` for
    /// at least the first one if the queue is empty.
    pub fn drain_emits(&self, timeout: Duration) -> Vec<Payload> {
        let mut out = Vec::new();
        if let Ok(first) = self.emit_rx.recv_timeout(timeout) {
            out.push(first);
            while let Ok(next) = self.emit_rx.try_recv() {
                out.push(next);
            }
        }
        out
    }

    /// Ask the event loop to stop. Idempotent and safe from any thread.
    pub fn stop(&self) {
        self.loop_handle.stop();
    }
}

/// A synchronous RPC worker (§4.3). Connects to a client's endpoint,
/// completes the `READY` handshake, and dispatches every `REQUEST` to a
/// user [`Handler`].
pub struct RpcWorker {
    loop_handle: super::loop_runner::LoopHandle,
    connected: ConnSignal,
    outbound: OutboundQueue,
    _loop_thread: std::thread::JoinHandle<()>,
}

impl RpcWorker {
    /// Connect to `config.endpoint()`, send the initial `READY`, and
    /// start dispatching `REQUEST`s to `handler`.
    pub fn connect(config: WorkerConfig, handler: impl Handler) -> Result<Self, RpcError> {
        let (engine, _startup_actions) = WorkerEngine::startup(config.heartbeat_liveness);
        let engine = Arc::new(Mutex::new(engine));
        let outbound = new_outbound_queue();
        let priority_outbound = new_outbound_queue();
        let connected = new_conn_signal();
        let (timers, loop_handle) = Timers::new();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let endpoint = config.endpoint().to_string();
        let thread_outbound = outbound.clone();
        let thread_connected = connected.clone();
        let thread_loop_handle = loop_handle.clone();
        let heartbeat_interval = config.heartbeat_interval;
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let loop_thread = spawn_loop_thread("xero-rpc-worker", move || {
            run_worker_loop(
                endpoint,
                engine,
                handler,
                thread_outbound,
                priority_outbound,
                thread_connected,
                timers,
                thread_loop_handle,
                heartbeat_interval,
                ready_tx,
            )
        });

        await_ready(ready_rx)?;

        Ok(Self {
            loop_handle,
            connected,
            outbound,
            _loop_thread: loop_thread,
        })
    }

    /// Emit an unsolicited event. Fails with *lost-peer* if the worker is
    /// not currently connected to a client.
    ///
    /// Posted to the loop rather than pushed onto the outbound queue
    /// directly (§4.3): a caller may invoke this from a worker-owned
    /// thread outside the loop, and the push alone would sit unflushed
    /// until the next inbound frame or heartbeat tick.
    pub fn emit(&self, payload: Payload) -> Result<(), RpcError> {
        if !self.is_connected() {
            return Err(RpcError::LostPeer);
        }
        let outbound = self.outbound.clone();
        self.loop_handle.post(move || {
            outbound
                .lock()
                .push_back(WorkerEngine::build_reply(MSG_EMIT, &payload));
        });
        Ok(())
    }

    /// Non-blocking snapshot of whether this worker currently considers
    /// itself connected to a client.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.connected.0.lock()
    }

    /// Ask the event loop to stop. Idempotent and safe from any thread.
    pub fn stop(&self) {
        self.loop_handle.stop();
    }

    /// Block the calling thread until the worker's event loop exits
    /// (e.g. after [`stop`](Self::stop) or a transport failure).
    pub fn join(self) {
        let _ = self._loop_thread.join();
    }
}
