//! Request/response correlation over a [`Transport`].
//!
//! An [`Engine`] owns one receive loop per connection. Callers register an
//! expectation (an acceptance predicate plus success and error
//! continuations) and write a frame; the loop cuts inbound bytes into frames,
//! decodes them with the [`Protocol`] adapter and hands each one to the
//! first live expectation that accepts it. Frames nobody claimed go to a
//! bounded default channel.

use crate::protocol::{Inbound, Protocol};
use crate::EngineError;
use fieldwire_transport::{Transport, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
const DEFAULT_TTL: Duration = Duration::from_secs(3);
const DEFAULT_UNSOLICITED_CAPACITY: usize = 64;

/// What happens to an unmatched frame when the default channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OverflowPolicy {
    /// The receive loop waits for room. Someone must drain the channel.
    Block,
    /// The frame is logged and dropped.
    #[default]
    DropNewest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Upper bound on how long the loop waits for bytes before running an
    /// expiry scan. This is also the timeout granularity.
    pub poll_interval: Duration,
    /// TTL used when a caller passes none.
    pub default_ttl: Duration,
    pub unsolicited_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_ttl: DEFAULT_TTL,
            unsolicited_capacity: DEFAULT_UNSOLICITED_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    pub fn with_unsolicited_capacity(mut self, capacity: usize) -> Self {
        self.unsolicited_capacity = capacity;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}

/// Engine lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Disconnected,
    Connected,
    Running,
    Closed,
}

type Interceptor<F> = Arc<dyn Fn(&F) + Send + Sync>;

struct Expectation<F> {
    id: u64,
    expires_at: Instant,
    accept: Box<dyn Fn(&F) -> bool + Send>,
    on_success: Box<dyn FnOnce(F) + Send>,
    on_error: Box<dyn FnOnce(EngineError) + Send>,
}

enum Readiness {
    Ready,
    Idle,
    Closed,
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fail<F>(expectations: Vec<Expectation<F>>, error: impl Fn() -> EngineError) {
    for expectation in expectations {
        (expectation.on_error)(error());
    }
}

/// Removes every entry whose deadline has passed, keeping order.
fn take_expired<F>(pending: &mut VecDeque<Expectation<F>>, now: Instant) -> Vec<Expectation<F>> {
    let mut expired = Vec::new();
    let mut i = 0;
    while i < pending.len() {
        if pending[i].expires_at <= now {
            expired.extend(pending.remove(i));
        } else {
            i += 1;
        }
    }
    expired
}

struct Shared<T, P: Protocol> {
    transport: T,
    protocol: P,
    config: EngineConfig,
    expectations: StdMutex<VecDeque<Expectation<P::Frame>>>,
    state: watch::Sender<EngineState>,
    unsolicited: mpsc::Sender<P::Frame>,
    interceptor: StdMutex<Option<Interceptor<P::Frame>>>,
}

impl<T: Transport, P: Protocol> Shared<T, P> {
    fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    fn set_state(&self, state: EngineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::debug!("engine state {previous:?} -> {state:?}");
        }
    }

    async fn write_frame(&self, frame: &P::Frame) -> Result<(), EngineError> {
        let bytes = self.protocol.encode(frame)?;
        self.transport.write(&bytes).await?;
        Ok(())
    }

    async fn wait_for(&self, len: usize) -> Readiness {
        match timeout(self.config.poll_interval, self.transport.readable(len)).await {
            Ok(Ok(())) => Readiness::Ready,
            Ok(Err(TransportError::Closed)) => Readiness::Closed,
            Ok(Err(err)) => {
                log::warn!("transport read failed: {err}");
                tokio::time::sleep(self.config.poll_interval).await;
                self.expire();
                Readiness::Idle
            }
            Err(_) => {
                self.expire();
                Readiness::Idle
            }
        }
    }

    fn discard_one(&self) {
        if let Err(err) = self.transport.read(1) {
            log::debug!("discarding a byte failed: {err}");
        }
    }

    fn expire(&self) {
        let expired = take_expired(&mut lock(&self.expectations), Instant::now());
        if !expired.is_empty() {
            log::debug!("{} expectation(s) timed out", expired.len());
        }
        fail(expired, || EngineError::Timeout);
    }

    fn fail_pending(&self) {
        let drained: Vec<_> = lock(&self.expectations).drain(..).collect();
        if !drained.is_empty() {
            log::debug!("failing {} pending expectation(s): connection closed", drained.len());
        }
        fail(drained, || EngineError::ConnectionClosed);
    }

    /// One scan: expire stale entries and hand the frame to the first live
    /// acceptor. Returns the frame when nobody took it.
    fn offer(&self, frame: P::Frame) -> Option<P::Frame> {
        let now = Instant::now();
        let (expired, matched) = {
            let mut pending = lock(&self.expectations);
            let mut expired = Vec::new();
            let mut matched = None;
            let mut i = 0;
            while i < pending.len() {
                if pending[i].expires_at <= now {
                    expired.extend(pending.remove(i));
                } else if matched.is_none() && (pending[i].accept)(&frame) {
                    matched = pending.remove(i);
                } else {
                    i += 1;
                }
            }
            (expired, matched)
        };

        fail(expired, || EngineError::Timeout);
        match matched {
            Some(expectation) => {
                (expectation.on_success)(frame);
                None
            }
            None => Some(frame),
        }
    }

    async fn deliver(&self, frame: P::Frame) {
        match self.config.overflow_policy {
            OverflowPolicy::Block => {
                if self.unsolicited.send(frame).await.is_err() {
                    log::debug!("default channel closed; dropping frame");
                }
            }
            OverflowPolicy::DropNewest => match self.unsolicited.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(frame)) => {
                    log::warn!("default channel full; dropping {frame:?}");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("default channel closed; dropping frame");
                }
            },
        }
    }

    async fn dispatch(&self, frame: P::Frame) {
        let deliverable = match self.protocol.classify(&frame) {
            Inbound::Ignore => false,
            Inbound::Acknowledge(ack) => {
                if let Err(err) = self.write_frame(&ack).await {
                    log::warn!("failed to acknowledge {frame:?}: {err}");
                }
                true
            }
            Inbound::Deliver => true,
        };

        // Silently consumed acks bypass the hook.
        let hook = lock(&self.interceptor).clone();
        if let (true, Some(hook)) = (deliverable, hook) {
            hook(&frame);
        }

        if let Some(frame) = self.offer(frame) {
            if deliverable {
                self.deliver(frame).await;
            } else {
                log::debug!("ignoring unsolicited {frame:?}");
            }
        }
    }
}

async fn receive_loop<T: Transport, P: Protocol>(shared: Arc<Shared<T, P>>) {
    loop {
        match shared.wait_for(P::HEADER_LEN).await {
            Readiness::Ready => {}
            Readiness::Idle => continue,
            Readiness::Closed => break,
        }
        let header = match shared.transport.peek(P::HEADER_LEN) {
            Ok(header) => header,
            Err(err) => {
                log::debug!("header peek failed: {err}");
                continue;
            }
        };
        let len = match shared.protocol.frame_len(&header) {
            Ok(len) if len >= P::HEADER_LEN => len,
            Ok(len) => {
                log::warn!("header {header:02x?} announces {len} bytes; discarding one byte");
                shared.discard_one();
                continue;
            }
            Err(err) => {
                log::warn!("no frame length in header {header:02x?} ({err}); discarding one byte");
                shared.discard_one();
                continue;
            }
        };

        match shared.wait_for(len).await {
            Readiness::Ready => {}
            Readiness::Idle => continue,
            Readiness::Closed => break,
        }
        let bytes = match shared.transport.read(len) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::debug!("frame read failed: {err}");
                continue;
            }
        };
        match shared.protocol.decode(&bytes) {
            Ok(frame) => shared.dispatch(frame).await,
            Err(err) => log::warn!("discarding undecodable {len}-byte frame: {err}"),
        }
    }

    log::debug!("transport closed underneath the engine");
    shared.set_state(EngineState::Closed);
    shared.fail_pending();
}

/// Correlation engine for one connection.
pub struct Engine<T: Transport, P: Protocol> {
    shared: Arc<Shared<T, P>>,
    next_id: AtomicU64,
    unsolicited_rx: StdMutex<Option<mpsc::Receiver<P::Frame>>>,
    receive_task: StdMutex<Option<JoinHandle<()>>>,
}

impl<T: Transport, P: Protocol> Engine<T, P> {
    pub fn new(transport: T, protocol: P, config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.unsolicited_capacity.max(1));
        let (state, _) = watch::channel(EngineState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                transport,
                protocol,
                config,
                expectations: StdMutex::new(VecDeque::new()),
                state,
                unsolicited: tx,
                interceptor: StdMutex::new(None),
            }),
            next_id: AtomicU64::new(0),
            unsolicited_rx: StdMutex::new(Some(rx)),
            receive_task: StdMutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn protocol(&self) -> &P {
        &self.shared.protocol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.shared.state.subscribe()
    }

    /// Takes the receiver of frames no expectation claimed. Only the first
    /// call gets it.
    pub fn default_channel(&self) -> Option<mpsc::Receiver<P::Frame>> {
        lock(&self.unsolicited_rx).take()
    }

    /// Installs a hook that sees every decoded frame before matching.
    pub fn set_interceptor(&self, hook: impl Fn(&P::Frame) + Send + Sync + 'static) {
        *lock(&self.shared.interceptor) = Some(Arc::new(hook));
    }

    pub fn clear_interceptor(&self) {
        *lock(&self.shared.interceptor) = None;
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.shared.expectations).len()
    }

    /// Connects the transport and starts the receive loop.
    pub async fn connect(&self) -> Result<(), EngineError> {
        match self.state() {
            EngineState::Running => return Ok(()),
            EngineState::Closed => return Err(EngineError::ConnectionClosed),
            EngineState::Disconnected | EngineState::Connected => {}
        }
        self.shared.transport.connect().await?;
        self.shared.set_state(EngineState::Connected);
        self.shared.set_state(EngineState::Running);
        let task = tokio::spawn(receive_loop(self.shared.clone()));
        if let Some(old) = lock(&self.receive_task).replace(task) {
            old.abort();
        }
        Ok(())
    }

    /// Stops the receive loop, closes the transport and fails everything
    /// still pending with [`EngineError::ConnectionClosed`].
    pub async fn close(&self) -> Result<(), EngineError> {
        self.shared.set_state(EngineState::Closed);
        let task = lock(&self.receive_task).take();
        if let Some(task) = task {
            task.abort();
        }
        let closed = self.shared.transport.close().await;
        self.shared.fail_pending();
        closed.map_err(EngineError::from)
    }

    /// Registers an expectation, then writes `frame`.
    ///
    /// Exactly one of `on_success` and `on_error` runs once the expectation
    /// is registered: on a match, on TTL expiry, on a failed write, or when
    /// the connection closes. An error returned from here means nothing
    /// was registered and neither continuation will run.
    pub async fn send<A, S, E>(
        &self,
        frame: &P::Frame,
        accept: A,
        on_success: S,
        on_error: E,
        ttl: Option<Duration>,
    ) -> Result<(), EngineError>
    where
        A: Fn(&P::Frame) -> bool + Send + 'static,
        S: FnOnce(P::Frame) + Send + 'static,
        E: FnOnce(EngineError) + Send + 'static,
    {
        let bytes = self.shared.protocol.encode(frame)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let ttl = ttl.unwrap_or(self.shared.config.default_ttl);
        {
            let mut pending = lock(&self.shared.expectations);
            match self.state() {
                EngineState::Running => {}
                EngineState::Closed => return Err(EngineError::ConnectionClosed),
                EngineState::Disconnected | EngineState::Connected => {
                    return Err(EngineError::NotRunning)
                }
            }
            pending.push_back(Expectation {
                id,
                expires_at: Instant::now() + ttl,
                accept: Box::new(accept),
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            });
        }

        if let Err(err) = self.shared.transport.write(&bytes).await {
            let removed = {
                let mut pending = lock(&self.shared.expectations);
                pending
                    .iter()
                    .position(|e| e.id == id)
                    .and_then(|i| pending.remove(i))
            };
            match removed {
                Some(expectation) => (expectation.on_error)(EngineError::Transport(err)),
                None => log::debug!("write failed after expectation {id} completed: {err}"),
            }
        }
        Ok(())
    }

    /// Sends `frame` and waits for the first accepted frame.
    pub async fn request<A>(
        &self,
        frame: &P::Frame,
        accept: A,
        ttl: Option<Duration>,
    ) -> Result<P::Frame, EngineError>
    where
        A: Fn(&P::Frame) -> bool + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(StdMutex::new(Some(tx)));
        let success_slot = slot.clone();
        self.send(
            frame,
            accept,
            move |frame| complete(&success_slot, Ok(frame)),
            move |err| complete(&slot, Err(err)),
            ttl,
        )
        .await?;
        rx.await.map_err(|_| EngineError::ConnectionClosed)?
    }

    /// Writes without registering an expectation.
    pub async fn send_unmatched(&self, frame: &P::Frame) -> Result<(), EngineError> {
        self.shared.write_frame(frame).await
    }
}

type Completion<F> = StdMutex<Option<oneshot::Sender<Result<F, EngineError>>>>;

fn complete<F>(slot: &Completion<F>, result: Result<F, EngineError>) {
    if let Some(tx) = lock(slot).take() {
        let _ = tx.send(result);
    }
}

impl<T: Transport, P: Protocol> Drop for Engine<T, P> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.receive_task).take() {
            task.abort();
        }
        self.shared.set_state(EngineState::Closed);
        self.shared.fail_pending();
    }
}
