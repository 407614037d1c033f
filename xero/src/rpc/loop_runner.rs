//! The event loop (§4.1): a single task, running on `compio`, that owns the
//! socket and the protocol engine and is the only place either is touched.
//! Other threads reach it only through a [`LoopHandle`].

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Work posted onto the loop from another thread.
type Command = Box<dyn FnOnce() + Send + 'static>;

/// Handle returned by [`LoopHandle::schedule_after`], usable with
/// [`LoopHandle::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

fn next_timer_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

enum LoopMessage {
    Post(Command),
    ScheduleAfter(TimerHandle, Duration, Command),
    Cancel(TimerHandle),
    Stop,
}

/// A thread-safe handle for reaching a running loop.
///
/// Cloning is cheap; every clone posts onto the same loop. This is the
/// only way [`RpcClient`](super::RpcClient)/[`RpcWorker`](super::RpcWorker)
/// methods called from a caller thread reach the socket.
#[derive(Clone)]
pub struct LoopHandle {
    tx: flume::Sender<LoopMessage>,
}

impl LoopHandle {
    /// Run `f` on the loop thread as soon as it is next polled.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(LoopMessage::Post(Box::new(f)));
    }

    /// Run `f` on the loop thread after `delay` has elapsed. Returns a
    /// handle that can cancel the callback before it fires.
    pub fn schedule_after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) -> TimerHandle {
        let handle = TimerHandle(next_timer_id());
        let _ = self
            .tx
            .send(LoopMessage::ScheduleAfter(handle, delay, Box::new(f)));
        handle
    }

    /// Cancel a pending [`schedule_after`](Self::schedule_after) callback.
    /// A no-op if it has already fired or was already cancelled.
    pub fn cancel(&self, handle: TimerHandle) {
        let _ = self.tx.send(LoopMessage::Cancel(handle));
    }

    /// Ask the loop to exit after its current iteration.
    pub fn stop(&self) {
        let _ = self.tx.send(LoopMessage::Stop);
    }
}

struct ScheduledTimer {
    handle: TimerHandle,
    fire_at: Instant,
    callback: Option<Command>,
}

impl PartialEq for ScheduledTimer {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}
impl Eq for ScheduledTimer {}
impl PartialOrd for ScheduledTimer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledTimer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse: BinaryHeap is a max-heap, we want the earliest deadline on top.
        other.fire_at.cmp(&self.fire_at)
    }
}

/// Owns the command queue and the min-heap of scheduled timers for one
/// running loop. Construction produces the [`LoopHandle`] callers get;
/// [`Timers::drain_due`] and [`Timers::next_deadline`] are consulted by the
/// loop body each iteration.
pub(crate) struct Timers {
    rx: flume::Receiver<LoopMessage>,
    heap: BinaryHeap<ScheduledTimer>,
    stopped: bool,
}

impl Timers {
    pub(crate) fn new() -> (Self, LoopHandle) {
        let (tx, rx) = flume::unbounded();
        (
            Self {
                rx,
                heap: BinaryHeap::new(),
                stopped: false,
            },
            LoopHandle { tx },
        )
    }

    /// Whether [`LoopHandle::stop`] has been requested.
    pub(crate) fn stopped(&self) -> bool {
        self.stopped
    }

    /// Wait for the next command (post, schedule, cancel, or stop).
    pub(crate) async fn recv_command(&mut self) -> Option<()> {
        match self.rx.recv_async().await {
            Ok(msg) => {
                self.apply(msg);
                Some(())
            }
            Err(_) => None,
        }
    }

    /// Drain any commands already queued without waiting.
    pub(crate) fn drain_ready(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg);
        }
    }

    fn apply(&mut self, msg: LoopMessage) {
        match msg {
            LoopMessage::Post(f) => f(),
            LoopMessage::ScheduleAfter(handle, delay, callback) => {
                self.heap.push(ScheduledTimer {
                    handle,
                    fire_at: Instant::now() + delay,
                    callback: Some(callback),
                });
            }
            LoopMessage::Cancel(target) => {
                // Mark-as-fired rather than rebuild the heap; cheap and the
                // heap is small (one RPC runtime per loop).
                for timer in self.heap.iter_mut() {
                    if timer.handle == target {
                        timer.callback = None;
                    }
                }
            }
            LoopMessage::Stop => self.stopped = true,
        }
    }

    /// Run every timer whose deadline has passed.
    pub(crate) fn fire_due(&mut self) {
        let now = Instant::now();
        while let Some(top) = self.heap.peek() {
            if top.fire_at > now {
                break;
            }
            if let Some(mut timer) = self.heap.pop() {
                if let Some(cb) = timer.callback.take() {
                    cb();
                }
            }
        }
    }

    /// How long the loop may sleep before the earliest pending timer fires.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|t| t.fire_at)
    }
}

// ---------------------------------------------------------------------
// Client / worker loop bodies
//
// These are the only functions in the crate that hold an `&mut` socket
// and an owned protocol engine at the same time. Everything else reaches
// them through the shared, `Mutex`-guarded state below or through
// `LoopHandle`/flume channels — see `bridge.rs` for the caller-facing
// side of that hand-off.
// ---------------------------------------------------------------------

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::zmq::{DealerSocket, RouterSocket};

use super::codec::Payload;
use super::engine::{ClientAction, ClientEngine, WorkerAction, WorkerEngine};
use super::error::RpcError;
use super::frame;

/// Shared connected/registered signal: a plain bool behind a mutex plus a
/// condvar so `wait_for_connected` can block without polling.
pub(crate) type ConnSignal = Arc<(Mutex<bool>, Condvar)>;

pub(crate) fn new_conn_signal() -> ConnSignal {
    Arc::new((Mutex::new(false), Condvar::new()))
}

pub(crate) fn set_signal(sig: &ConnSignal, value: bool) {
    let mut guard = sig.0.lock();
    if *guard != value {
        *guard = value;
        sig.1.notify_all();
    }
}

/// Outbound frame queue, `Mutex`-guarded so it can be pushed onto from a
/// posted command, a heartbeat tick, or (on the worker side) a
/// [`super::bridge::ReplySink`] called from a thread the handler spawned.
pub(crate) type OutboundQueue = Arc<Mutex<VecDeque<Vec<Bytes>>>>;

pub(crate) fn new_outbound_queue() -> OutboundQueue {
    Arc::new(Mutex::new(VecDeque::new()))
}

/// Events the client loop delivers across the reply queue (§3): final
/// replies, exceptions, and local errors (*lost-peer*, codec failures)
/// that `rpc()` would otherwise have to synthesize from a dropped channel.
pub(crate) enum ReplyEvent {
    Final(Payload),
    Exception(super::error::RemoteException),
    Error(RpcError),
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => {
            let now = Instant::now();
            if at > now {
                compio::time::sleep(at - now).await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

fn schedule_client_tick(
    loop_handle: LoopHandle,
    engine: Arc<Mutex<ClientEngine>>,
    outbound: OutboundQueue,
    connected: ConnSignal,
    interval: Duration,
) {
    let handle_for_reschedule = loop_handle.clone();
    loop_handle.schedule_after(interval, move || {
        let actions = engine.lock().tick();
        for action in actions {
            match action {
                ClientAction::Send(frame) => outbound.lock().push_back(frame),
                ClientAction::Disconnected => {
                    debug!("client heartbeat exhausted, peer considered lost");
                    set_signal(&connected, false);
                }
                _ => {}
            }
        }
        schedule_client_tick(handle_for_reschedule, engine, outbound, connected, interval);
    });
}

/// Apply one [`ClientAction`] to the cross-thread channels the bridge
/// reads from. Runs on the loop thread only.
fn apply_client_action(
    action: ClientAction,
    connected: &ConnSignal,
    reply_tx: &flume::Sender<ReplyEvent>,
    emit_tx: &flume::Sender<Payload>,
    partial_slot: &Arc<Mutex<Option<Box<dyn FnMut(Payload) + Send>>>>,
) {
    match action {
        ClientAction::Send(_) => unreachable!("tick-only action reached inbound dispatch"),
        ClientAction::Connected(identity) => {
            info!(identity = ?identity, "worker peer connected");
            set_signal(connected, true);
        }
        ClientAction::Disconnected => {
            info!("worker peer disconnected");
            set_signal(connected, false);
        }
        ClientAction::Partial(payload) => {
            trace!("partial reply received");
            if let Some(cb) = partial_slot.lock().as_mut() {
                cb(payload);
            }
        }
        ClientAction::Final(payload) => {
            let _ = reply_tx.try_send(ReplyEvent::Final(payload));
        }
        ClientAction::Exception(exc) => {
            warn!(message = %exc.message, "worker handler raised");
            let _ = reply_tx.try_send(ReplyEvent::Exception(exc));
        }
        ClientAction::DecodeError(err) => {
            let _ = reply_tx.try_send(ReplyEvent::Error(RpcError::Codec(err)));
        }
        ClientAction::Emit(payload) => {
            let _ = emit_tx.try_send(payload);
        }
    }
}

async fn flush_outbound_router(outbound: &OutboundQueue, socket: &mut RouterSocket) -> io::Result<()> {
    loop {
        let next = outbound.lock().pop_front();
        match next {
            Some(frame) => socket.send(frame).await?,
            None => return Ok(()),
        }
    }
}

/// Drives one client peer's event loop for its entire lifetime: binds the
/// transport, runs the protocol engine, and forwards decoded events onto
/// the channels [`super::bridge::RpcClient`] reads from. Returns once
/// [`LoopHandle::stop`] is called or the transport connection closes.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_client_loop(
    endpoint: String,
    engine: Arc<Mutex<ClientEngine>>,
    outbound: OutboundQueue,
    connected: ConnSignal,
    reply_tx: flume::Sender<ReplyEvent>,
    emit_tx: flume::Sender<Payload>,
    partial_slot: Arc<Mutex<Option<Box<dyn FnMut(Payload) + Send>>>>,
    mut timers: Timers,
    loop_handle: LoopHandle,
    heartbeat_interval: Duration,
    ready_tx: std::sync::mpsc::Sender<io::Result<()>>,
) -> io::Result<()> {
    let addr = match xero_core::endpoint::Endpoint::parse(&endpoint) {
        Ok(xero_core::endpoint::Endpoint::Tcp(addr)) => addr,
        _ => {
            let err = io::Error::new(io::ErrorKind::InvalidInput, format!("unsupported endpoint: {endpoint}"));
            let _ = ready_tx.send(Err(io::Error::new(err.kind(), err.to_string())));
            return Err(err);
        }
    };

    let (_listener, mut socket) = match RouterSocket::bind(addr).await {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready_tx.send(Err(io::Error::new(e.kind(), e.to_string())));
            return Err(e);
        }
    };
    let _ = ready_tx.send(Ok(()));
    info!(endpoint, "client bound, awaiting worker handshake");

    schedule_client_tick(loop_handle, engine.clone(), outbound.clone(), connected.clone(), heartbeat_interval);

    loop {
        timers.drain_ready();
        timers.fire_due();
        if timers.stopped() {
            break;
        }
        flush_outbound_router(&outbound, &mut socket).await?;

        let deadline = timers.next_deadline();
        futures::select! {
            msg = socket.recv().fuse() => {
                match msg {
                    Some(parts) => {
                        trace!(parts = parts.len(), "inbound frame");
                        let actions = engine.lock().handle_inbound(&parts);
                        for action in actions {
                            apply_client_action(action, &connected, &reply_tx, &emit_tx, &partial_slot);
                        }
                    }
                    None => {
                        warn!("transport closed by worker");
                        break;
                    }
                }
            }
            _ = timers.recv_command().fuse() => {}
            _ = sleep_until_deadline(deadline).fuse() => {}
        }
    }
    set_signal(&connected, false);
    Ok(())
}

fn schedule_worker_tick(
    loop_handle: LoopHandle,
    engine: Arc<Mutex<WorkerEngine>>,
    priority_outbound: OutboundQueue,
    connected: ConnSignal,
    interval: Duration,
) {
    let handle_for_reschedule = loop_handle.clone();
    loop_handle.schedule_after(interval, move || {
        let actions = engine.lock().tick();
        for action in actions {
            match action {
                WorkerAction::Send(frame) => priority_outbound.lock().push_back(frame),
                WorkerAction::Disconnected => {
                    debug!("client heartbeat exhausted, will re-handshake");
                    set_signal(&connected, false);
                }
                WorkerAction::Connected => set_signal(&connected, true),
                _ => {}
            }
        }
        schedule_worker_tick(handle_for_reschedule, engine, priority_outbound, connected, interval);
    });
}

async fn flush_outbound_dealer(outbound: &OutboundQueue, socket: &mut DealerSocket) -> io::Result<()> {
    loop {
        let next = outbound.lock().pop_front();
        match next {
            Some(frame) => socket.send(frame).await?,
            None => return Ok(()),
        }
    }
}

/// Drives one worker peer's event loop for its entire lifetime: connects
/// the transport, sends the initial `READY`, runs the protocol engine,
/// dispatches `REQUEST`s to `handler`, and bypasses the regular outbound
/// queue for heartbeat/`READY`/`DISCONNECT` frames so a backlog of
/// emissions can't suppress liveness signalling (§5).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_worker_loop(
    endpoint: String,
    engine: Arc<Mutex<WorkerEngine>>,
    handler: Arc<dyn super::bridge::Handler>,
    outbound: OutboundQueue,
    priority_outbound: OutboundQueue,
    connected: ConnSignal,
    mut timers: Timers,
    loop_handle: LoopHandle,
    heartbeat_interval: Duration,
    ready_tx: std::sync::mpsc::Sender<io::Result<()>>,
) -> io::Result<()> {
    let mut socket = match DealerSocket::connect(&endpoint).await {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(io::Error::new(e.kind(), e.to_string())));
            return Err(e);
        }
    };
    let _ = ready_tx.send(Ok(()));
    info!(endpoint, "worker connected, sending READY");

    // Startup READY bypasses both queues; nothing has been flushed yet.
    socket.send(frame::ready_parts()).await?;

    schedule_worker_tick(
        loop_handle.clone(),
        engine.clone(),
        priority_outbound.clone(),
        connected.clone(),
        heartbeat_interval,
    );

    loop {
        timers.drain_ready();
        timers.fire_due();
        if timers.stopped() {
            let _ = socket.send(frame::disconnect_parts()).await;
            break;
        }
        flush_outbound_dealer(&priority_outbound, &mut socket).await?;
        flush_outbound_dealer(&outbound, &mut socket).await?;

        let deadline = timers.next_deadline();
        futures::select! {
            msg = socket.recv().fuse() => {
                match msg {
                    Some(parts) => {
                        trace!(parts = parts.len(), "inbound frame");
                        let actions = engine.lock().handle_inbound(&parts);
                        for action in actions {
                            match action {
                                WorkerAction::Send(frame) => priority_outbound.lock().push_back(frame),
                                WorkerAction::Connected => {
                                    info!("client handshake complete");
                                    set_signal(&connected, true);
                                }
                                WorkerAction::Disconnected => set_signal(&connected, false),
                                WorkerAction::Dispatch { method, args, kwargs } => {
                                    let sink =
                                        super::bridge::ReplySink::new(outbound.clone(), loop_handle.clone());
                                    dispatch(&handler, &method, args, kwargs, &sink, &outbound);
                                }
                                WorkerAction::Dropped(reason) => {
                                    debug!(reason, "dropped inbound frame");
                                }
                            }
                        }
                    }
                    None => {
                        warn!("transport closed by client");
                        break;
                    }
                }
            }
            _ = timers.recv_command().fuse() => {}
            _ = sleep_until_deadline(deadline).fuse() => {}
        }
    }
    set_signal(&connected, false);
    Ok(())
}

/// Invoke the user handler for one `REQUEST` and enqueue its reply frame.
/// Runs on the loop thread (§5): handlers that need to do long-running
/// work must spawn their own thread and call back through `sink` later.
fn dispatch(
    handler: &Arc<dyn super::bridge::Handler>,
    method: &str,
    args: Payload,
    kwargs: Payload,
    sink: &super::bridge::ReplySink,
    outbound: &OutboundQueue,
) {
    use super::bridge::HandlerOutcome;
    use super::constants::{MSG_EXCEPTION, MSG_FINAL_REPLY};

    let outcome = handler.call(method, args, kwargs, sink);
    let (ty, payload) = match outcome {
        HandlerOutcome::Final(payload) => (MSG_FINAL_REPLY, payload),
        HandlerOutcome::Exception(exc) => (MSG_EXCEPTION, Payload::Exception(exc)),
    };
    outbound.lock().push_back(WorkerEngine::build_reply(ty, &payload));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn schedule_cancel_prevents_firing() {
        let (mut timers, handle) = Timers::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let th = handle.schedule_after(Duration::from_secs(0), move || {
            fired2.store(true, Ordering::SeqCst);
        });
        handle.cancel(th);
        timers.drain_ready();
        timers.fire_due();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn schedule_fires_when_due() {
        let (mut timers, handle) = Timers::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        handle.schedule_after(Duration::from_secs(0), move || {
            fired2.store(true, Ordering::SeqCst);
        });
        timers.drain_ready();
        std::thread::sleep(Duration::from_millis(5));
        timers.fire_due();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_sets_flag() {
        let (mut timers, handle) = Timers::new();
        handle.stop();
        timers.drain_ready();
        assert!(timers.stopped());
    }
}
