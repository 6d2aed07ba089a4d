//! Fan-out publisher with per-type, per-socket backpressure.
//!
//! ```text
//!  publish() ──mpsc──► fan-out task ──stage──► Outbox ──► writer task ──► socket
//!                         ▲   (one per publisher)  (one per socket)
//!                      accept()
//! ```
//!
//! Every socket owns an [`Outbox`] holding at most one staged payload per
//! message type. A newer publish of the same type replaces the staged
//! payload. The writer sends one frame, waits for the ACK, then takes the
//! next staged type in round-robin order, so an unacknowledged socket only
//! ever holds the latest state of each type and never a backlog.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::PublisherCodec;
use crate::config::NodeConfig;
use crate::error::NtwkError;
use crate::frame::Frame;
use crate::message::{MsgCtrl, MsgTypeId};
use crate::msgs::Schema;
use crate::policy::CodecPolicy;
use crate::task::IoContext;

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

// ── PublisherStats ───────────────────────────────────────────────

/// Snapshot of a publisher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Calls to `publish` accepted.
    pub published: u64,
    /// Frames written to a socket and acknowledged.
    pub frames_sent: u64,
    /// Header plus payload bytes of acknowledged frames.
    pub bytes_sent: u64,
    /// Staged payloads replaced by a newer publish before being sent.
    pub superseded: u64,
    /// Sockets removed after a write or ACK failure.
    pub peers_dropped: u64,
}

#[derive(Default)]
struct Counters {
    connections: AtomicUsize,
    published: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    superseded: AtomicU64,
    peers_dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            peers_dropped: self.peers_dropped.load(Ordering::Relaxed),
        }
    }
}

// ── TcpPublisher ─────────────────────────────────────────────────

/// Accepts subscriber connections on one port and fans every published
/// payload out to all of them.
///
/// Dropping the last handle stops accepting and closes every socket.
pub struct TcpPublisher {
    local_addr: SocketAddr,
    tx: UnboundedSender<Frame>,
    max_payload: usize,
    counters: Arc<Counters>,
    token: CancellationToken,
}

impl TcpPublisher {
    /// Bind `addr` on the calling thread and start the accept and
    /// fan-out loop on the I/O context.
    pub fn bind(io: &IoContext, addr: SocketAddr, config: &NodeConfig) -> Result<Self, NtwkError> {
        let std_listener =
            std::net::TcpListener::bind(addr).map_err(|source| NtwkError::Bind { addr, source })?;
        std_listener.set_nonblocking(true)?;
        let local_addr = std_listener.local_addr()?;

        let listener = {
            let _guard = io.enter();
            TcpListener::from_std(std_listener)?
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let token = io.child_token();

        let fan_out = FanOut {
            listener,
            rx,
            peers: Vec::new(),
            counters: Arc::clone(&counters),
            max_payload: config.max_payload,
            tcp_nodelay: config.tcp_nodelay,
            token: token.clone(),
        };
        io.spawn(fan_out.run());

        info!(addr = %local_addr, "publisher listening");
        Ok(Self {
            local_addr,
            tx,
            max_payload: config.max_payload,
            counters,
            token,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queue `payload` for every connected socket. Never blocks.
    ///
    /// Sockets still waiting for the ACK of an earlier `msg_type` payload
    /// receive this one in its place.
    pub fn publish(&self, msg_type: MsgTypeId, payload: impl Into<Bytes>) -> Result<(), NtwkError> {
        let frame = Frame::new(msg_type, payload);
        if frame.payload.len() > self.max_payload {
            return Err(NtwkError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload,
            });
        }
        if self.token.is_cancelled() {
            return Err(NtwkError::Shutdown);
        }
        self.tx.send(frame).map_err(|_| NtwkError::Shutdown)?;
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Encode `msg` with `policy` on the calling thread, then publish it.
    pub fn publish_encoded<P: CodecPolicy>(
        &self,
        policy: &P,
        msg_type: MsgTypeId,
        msg: &P::Message,
    ) -> Result<(), NtwkError> {
        let wire = policy.encode(msg)?;
        self.publish(msg_type, wire)
    }

    /// Publish a typed schema message under its own type id.
    pub fn publish_msg<T: Schema + Serialize>(&self, msg: &T) -> Result<(), NtwkError> {
        let wire = bincode::serialize(msg)?;
        self.publish(T::MSG_TYPE, wire)
    }

    /// Sockets currently accepted and not yet dropped.
    pub fn connection_count(&self) -> usize {
        self.counters.connections.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PublisherStats {
        self.counters.snapshot()
    }

    /// Stop accepting and close every socket.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TcpPublisher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for TcpPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPublisher")
            .field("local_addr", &self.local_addr)
            .field("connections", &self.connection_count())
            .finish()
    }
}

// ── Fan-out task ─────────────────────────────────────────────────

struct FanOut {
    listener: TcpListener,
    rx: UnboundedReceiver<Frame>,
    peers: Vec<Arc<Outbox>>,
    counters: Arc<Counters>,
    max_payload: usize,
    tcp_nodelay: bool,
    token: CancellationToken,
}

impl FanOut {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.add_peer(stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept failed, retrying");
                        tokio::select! {
                            _ = self.token.cancelled() => break,
                            _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                        }
                    }
                },

                frame = self.rx.recv() => match frame {
                    Some(frame) => self.stage(frame),
                    // Every publisher handle is gone.
                    None => break,
                },
            }
        }

        self.token.cancel();
        for outbox in &self.peers {
            outbox.close();
        }
        debug!("publisher fan-out stopped");
    }

    fn add_peer(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, error = %e, "failed to set TCP_NODELAY");
            }
        }

        self.peers.retain(|outbox| !outbox.is_closed());
        let outbox = Arc::new(Outbox::default());
        self.peers.push(Arc::clone(&outbox));
        self.counters.connections.fetch_add(1, Ordering::AcqRel);
        info!(%peer, "subscriber connected");

        let writer = PeerWriter {
            framed: Framed::new(stream, PublisherCodec::new(self.max_payload)),
            peer,
            outbox,
            counters: Arc::clone(&self.counters),
            token: self.token.child_token(),
        };
        tokio::spawn(writer.run());
    }

    fn stage(&mut self, frame: Frame) {
        self.peers.retain(|outbox| !outbox.is_closed());
        for outbox in &self.peers {
            if outbox.stage(frame.clone()) {
                self.counters.superseded.fetch_add(1, Ordering::Relaxed);
            }
        }
        trace!(msg_type = %frame.msg_type, len = frame.payload.len(), peers = self.peers.len(), "staged");
    }
}

// ── Outbox ───────────────────────────────────────────────────────

/// Latest staged payload per message type for one socket.
#[derive(Default)]
struct Outbox {
    staged: Mutex<BTreeMap<MsgTypeId, Bytes>>,
    ready: Notify,
    closed: AtomicBool,
}

impl Outbox {
    /// Stage `frame`, returning `true` if it replaced an unsent payload.
    fn stage(&self, frame: Frame) -> bool {
        let replaced = self
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(frame.msg_type, frame.payload)
            .is_some();
        self.ready.notify_one();
        replaced
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove the first staged type after `last`, wrapping around.
    fn take_after(&self, last: Option<MsgTypeId>) -> Option<Frame> {
        let mut staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        let next = last
            .and_then(|last| {
                staged
                    .range((Bound::Excluded(last), Bound::Unbounded))
                    .next()
                    .map(|(ty, _)| *ty)
            })
            .or_else(|| staged.keys().next().copied())?;
        staged.remove(&next).map(|payload| Frame::new(next, payload))
    }

    /// Wait for the next staged frame. `None` once the outbox is closed.
    async fn next(&self, last: Option<MsgTypeId>) -> Option<Frame> {
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(frame) = self.take_after(last) {
                return Some(frame);
            }
            self.ready.notified().await;
        }
    }
}

// ── Per-socket writer ────────────────────────────────────────────

struct PeerWriter {
    framed: Framed<TcpStream, PublisherCodec>,
    peer: SocketAddr,
    outbox: Arc<Outbox>,
    counters: Arc<Counters>,
    token: CancellationToken,
}

impl PeerWriter {
    async fn run(mut self) {
        let token = self.token.clone();
        let outcome = tokio::select! {
            _ = token.cancelled() => Ok(()),
            res = self.exchange_loop() => res,
        };

        self.outbox.close();
        self.counters.connections.fetch_sub(1, Ordering::AcqRel);
        match outcome {
            Ok(()) => debug!(peer = %self.peer, "subscriber socket closed"),
            Err(e) => {
                self.counters.peers_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(peer = %self.peer, error = %e, "dropping subscriber socket");
            }
        }
    }

    /// Header, payload, ACK, repeat. Only one frame is ever in flight.
    async fn exchange_loop(&mut self) -> Result<(), NtwkError> {
        let mut last = None;
        loop {
            // While idle, anything arriving from the subscriber is either
            // a hang-up or a protocol violation.
            let frame = tokio::select! {
                frame = self.outbox.next(last) => match frame {
                    Some(frame) => frame,
                    None => return Ok(()),
                },
                ctrl = self.framed.next() => return Err(match ctrl {
                    None => NtwkError::ConnectionClosed,
                    Some(Ok(_)) => NtwkError::ProtocolViolation("control byte with no message in flight"),
                    Some(Err(e)) => e,
                }),
            };

            last = Some(frame.msg_type);
            let wire_len = frame.wire_len() as u64;
            let msg_type = frame.msg_type;
            self.framed.send(frame).await?;

            match self.framed.next().await {
                Some(Ok(MsgCtrl::Ack)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(NtwkError::ConnectionClosed),
            }

            self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
            self.counters.bytes_sent.fetch_add(wire_len, Ordering::Relaxed);
            trace!(peer = %self.peer, %msg_type, bytes = wire_len, "acknowledged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ty: MsgTypeId, body: &'static [u8]) -> Frame {
        Frame::new(ty, Bytes::from_static(body))
    }

    #[test]
    fn outbox_keeps_latest_per_type() {
        let outbox = Outbox::default();
        assert!(!outbox.stage(frame(MsgTypeId::Image, b"one")));
        assert!(outbox.stage(frame(MsgTypeId::Image, b"two")));
        assert!(!outbox.stage(frame(MsgTypeId::Twist, b"t")));

        let first = outbox.take_after(None).unwrap();
        assert_eq!(first, frame(MsgTypeId::Image, b"two"));
        let second = outbox.take_after(Some(first.msg_type)).unwrap();
        assert_eq!(second.msg_type, MsgTypeId::Twist);
        assert!(outbox.take_after(Some(second.msg_type)).is_none());
    }

    #[test]
    fn outbox_round_robin_wraps() {
        let outbox = Outbox::default();
        outbox.stage(frame(MsgTypeId::Image, b"i"));
        outbox.stage(frame(MsgTypeId::Vector3, b"v"));
        outbox.stage(frame(MsgTypeId::Joystick, b"j"));

        let order: Vec<_> = std::iter::successors(outbox.take_after(Some(MsgTypeId::Joystick)), |f| {
            outbox.take_after(Some(f.msg_type))
        })
        .map(|f| f.msg_type)
        .collect();
        assert_eq!(
            order,
            vec![MsgTypeId::Vector3, MsgTypeId::Image, MsgTypeId::Joystick]
        );
    }

    #[tokio::test]
    async fn outbox_wakes_waiter_and_closes() {
        let outbox = Arc::new(Outbox::default());
        let waiter = tokio::spawn({
            let outbox = Arc::clone(&outbox);
            async move { outbox.next(None).await }
        });
        tokio::task::yield_now().await;
        outbox.stage(frame(MsgTypeId::Uint8Array, b"x"));
        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.msg_type, MsgTypeId::Uint8Array);

        outbox.stage(frame(MsgTypeId::Uint8Array, b"y"));
        outbox.close();
        assert!(outbox.next(None).await.is_none());
    }

    #[test]
    fn publish_rejects_oversize_and_after_shutdown() {
        let io = IoContext::start().unwrap();
        let config = NodeConfig {
            max_payload: 4,
            ..Default::default()
        };
        let publisher = TcpPublisher::bind(&io, "127.0.0.1:0".parse().unwrap(), &config).unwrap();
        assert_ne!(publisher.local_addr().port(), 0);

        assert!(matches!(
            publisher.publish(MsgTypeId::Uint8Array, vec![0u8; 5]),
            Err(NtwkError::PayloadTooLarge { size: 5, max: 4 })
        ));
        publisher.publish(MsgTypeId::Uint8Array, vec![0u8; 4]).unwrap();
        assert_eq!(publisher.stats().published, 1);

        publisher.shutdown();
        assert!(matches!(
            publisher.publish(MsgTypeId::Uint8Array, vec![1u8]),
            Err(NtwkError::Shutdown)
        ));
    }

    #[test]
    fn bind_conflict_is_a_setup_error() {
        let io = IoContext::start().unwrap();
        let config = NodeConfig::default();
        let first = TcpPublisher::bind(&io, "127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let taken = first.local_addr();
        assert!(matches!(
            TcpPublisher::bind(&io, taken, &config),
            Err(NtwkError::Bind { .. })
        ));
    }
}
