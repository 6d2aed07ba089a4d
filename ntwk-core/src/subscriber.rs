//! Reconnecting subscriber.
//!
//! One outbound connection per subscriber. Frames are decoded on the I/O
//! thread, pushed into a bounded latest-wins queue and handed to the
//! application handler on the main context.

use std::collections::VecDeque;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::SubscriberCodec;
use crate::config::{NodeConfig, ReconnectConfig};
use crate::context::MainHandle;
use crate::error::NtwkError;
use crate::message::{MsgCtrl, MsgTypeId};
use crate::policy::CodecPolicy;
use crate::state::LinkPhase;
use crate::task::IoContext;

/// A decoded message handed to a subscription handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Received<M> {
    pub msg_type: MsgTypeId,
    pub payload: M,
}

type Handler<M> = Box<dyn FnMut(Received<M>) + Send + 'static>;

/// Snapshot of a subscriber's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    /// Frames decoded and queued.
    pub received: u64,
    /// Queued messages discarded to make room for newer ones.
    pub dropped: u64,
    /// Frames the policy failed to decode.
    pub decode_failures: u64,
    /// Connect attempts, successful or not.
    pub connect_attempts: u64,
    /// Connections established.
    pub connections: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    dropped: AtomicU64,
    decode_failures: AtomicU64,
    connect_attempts: AtomicU64,
    connections: AtomicU64,
}

struct Inbox<M> {
    queue: VecDeque<Received<M>>,
    /// A drain job is posted and has not yet emptied the queue.
    scheduled: bool,
}

// ── Backoff ──────────────────────────────────────────────────────

/// Retry delay sequence derived from a [`ReconnectConfig`].
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &ReconnectConfig) -> Self {
        Self {
            base: config.delay,
            cap: config.max_delay.max(config.delay),
            current: config.delay,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.cap);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.base;
    }
}

// ── TcpSubscriber ────────────────────────────────────────────────

/// Outbound subscription to one publisher endpoint.
///
/// The receive loop holds a strong reference, so the subscriber keeps
/// running after the caller drops its handle, until [`shutdown`] or the
/// owning node is torn down.
///
/// [`shutdown`]: TcpSubscriber::shutdown
pub struct TcpSubscriber<P: CodecPolicy> {
    endpoint: SocketAddr,
    policy: P,
    queue_size: usize,
    reconnect: ReconnectConfig,
    max_payload: usize,
    tcp_nodelay: bool,
    inbox: Mutex<Inbox<P::Message>>,
    handler: Mutex<Handler<P::Message>>,
    main: MainHandle,
    phase: watch::Sender<LinkPhase>,
    counters: Counters,
    token: CancellationToken,
}

impl<P: CodecPolicy> TcpSubscriber<P> {
    /// Resolve `host:port` and start connecting on the I/O context.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<F>(
        io: &IoContext,
        main: MainHandle,
        host: &str,
        port: u16,
        handler: F,
        queue_size: usize,
        policy: P,
        config: &NodeConfig,
    ) -> Result<Arc<Self>, NtwkError>
    where
        F: FnMut(Received<P::Message>) + Send + 'static,
    {
        if queue_size == 0 {
            return Err(NtwkError::InvalidConfig("queue_size must be at least 1".into()));
        }
        config.reconnect.validate()?;
        let endpoint = resolve(host, port)?;

        let (phase, _) = watch::channel(LinkPhase::Disconnected);
        let subscriber = Arc::new(Self {
            endpoint,
            policy,
            queue_size,
            reconnect: config.reconnect,
            max_payload: config.max_payload,
            tcp_nodelay: config.tcp_nodelay,
            inbox: Mutex::new(Inbox {
                queue: VecDeque::with_capacity(queue_size + 1),
                scheduled: false,
            }),
            handler: Mutex::new(Box::new(handler)),
            main,
            phase,
            counters: Counters::default(),
            token: io.child_token(),
        });

        io.spawn(Arc::clone(&subscriber).run());
        Ok(subscriber)
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn phase(&self) -> LinkPhase {
        *self.phase.borrow()
    }

    /// Observe phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<LinkPhase> {
        self.phase.subscribe()
    }

    pub fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            received: self.counters.received.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            decode_failures: self.counters.decode_failures.load(Ordering::Relaxed),
            connect_attempts: self.counters.connect_attempts.load(Ordering::Relaxed),
            connections: self.counters.connections.load(Ordering::Relaxed),
        }
    }

    /// End the reconnect loop and close the socket.
    ///
    /// Messages already queued are still delivered on the next pump.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    // ── Connection loop ──────────────────────────────────────────

    async fn run(self: Arc<Self>) {
        let mut backoff = Backoff::new(&self.reconnect);

        loop {
            self.transition(LinkPhase::begin_connect);
            self.counters.connect_attempts.fetch_add(1, Ordering::Relaxed);

            let connected = tokio::select! {
                _ = self.token.cancelled() => break,
                res = TcpStream::connect(self.endpoint) => res,
            };

            match connected {
                Ok(stream) => {
                    backoff.reset();
                    self.transition(LinkPhase::establish);
                    self.counters.connections.fetch_add(1, Ordering::Relaxed);
                    info!(endpoint = %self.endpoint, "subscriber connected");

                    if self.tcp_nodelay {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(error = %e, "failed to set TCP_NODELAY");
                        }
                    }

                    let outcome = tokio::select! {
                        _ = self.token.cancelled() => break,
                        res = self.session(stream) => res,
                    };
                    self.transition(LinkPhase::drop_link);
                    if let Err(e) = outcome {
                        warn!(endpoint = %self.endpoint, error = %e, "link lost, reconnecting");
                    }
                }
                Err(e) => {
                    self.transition(LinkPhase::drop_link);
                    let delay = backoff.next_delay();
                    debug!(endpoint = %self.endpoint, error = %e, ?delay, "connect failed");
                    tokio::select! {
                        _ = self.token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.phase.send_replace(LinkPhase::Disconnected);
        debug!(endpoint = %self.endpoint, "subscriber stopped");
    }

    /// Receive, decode, enqueue, ACK until the link fails.
    async fn session(self: &Arc<Self>, stream: TcpStream) -> Result<(), NtwkError> {
        let mut framed = Framed::new(stream, SubscriberCodec::new(self.max_payload));

        while let Some(frame) = framed.next().await {
            let frame = frame?;
            trace!(msg_type = %frame.msg_type, len = frame.payload.len(), "frame received");

            let payload = match self.policy.decode(frame.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            };
            self.enqueue(Received {
                msg_type: frame.msg_type,
                payload,
            });

            framed.send(MsgCtrl::Ack).await?;
        }

        Err(NtwkError::ConnectionClosed)
    }

    fn transition(&self, step: fn(&mut LinkPhase) -> Result<(), NtwkError>) {
        self.phase.send_modify(|phase| {
            if let Err(e) = step(phase) {
                debug!(%phase, error = %e, "ignored link transition");
            }
        });
    }

    // ── Dispatch ─────────────────────────────────────────────────

    fn enqueue(self: &Arc<Self>, msg: Received<P::Message>) {
        let post = {
            let mut inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
            inbox.queue.push_back(msg);
            while inbox.queue.len() > self.queue_size {
                inbox.queue.pop_front();
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
            !std::mem::replace(&mut inbox.scheduled, true)
        };
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if post {
            let this = Arc::clone(self);
            if !self.main.post(move || this.drain()) {
                debug!("main context closed, message not dispatched");
            }
        }
    }

    /// Runs on the main context.
    fn drain(&self) {
        loop {
            let next = {
                let mut inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
                match inbox.queue.pop_front() {
                    Some(msg) => msg,
                    None => {
                        inbox.scheduled = false;
                        return;
                    }
                }
            };
            let mut handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
            (*handler)(next);
        }
    }
}

impl<P: CodecPolicy> std::fmt::Debug for TcpSubscriber<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSubscriber")
            .field("endpoint", &self.endpoint)
            .field("phase", &self.phase())
            .field("queue_size", &self.queue_size)
            .finish()
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, NtwkError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| NtwkError::Resolve(format!("{host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| NtwkError::Resolve(format!("{host}:{port}: no addresses")))
}
