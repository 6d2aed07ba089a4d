//! Shared helpers for the localhost integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use ntwk_core::{
    Frame, MsgCtrl, MsgTypeId, Node, NodeConfig, PublisherCodec, ReconnectConfig, SubscriberCodec,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

pub const WAIT: Duration = Duration::from_secs(5);

/// A node bound to loopback with a fast fixed retry.
pub fn loopback_node() -> Node {
    Node::with_config(NodeConfig {
        bind_host: "127.0.0.1".into(),
        reconnect: ReconnectConfig::fixed(Duration::from_millis(10)),
        ..Default::default()
    })
    .unwrap()
}

/// Poll `cond` every few milliseconds, pumping the node each time.
pub async fn pump_until(node: &Node, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    loop {
        node.run_once();
        if cond() {
            return;
        }
        assert!(Instant::now() < deadline, "condition not met within {WAIT:?}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait for `cond` without pumping.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within {WAIT:?}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ── Raw peers ────────────────────────────────────────────────────

/// A hand-driven subscriber socket.
pub async fn raw_subscriber(addr: SocketAddr) -> Framed<TcpStream, SubscriberCodec> {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, SubscriberCodec::default())
}

pub async fn next_frame(framed: &mut Framed<TcpStream, SubscriberCodec>) -> Frame {
    tokio::time::timeout(WAIT, framed.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("publisher closed the socket")
        .expect("frame failed to decode")
}

pub async fn ack(framed: &mut Framed<TcpStream, SubscriberCodec>) {
    framed.send(MsgCtrl::Ack).await.unwrap();
}

/// A listener standing in for a publisher.
pub async fn raw_publisher() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

pub async fn accept(listener: &TcpListener) -> Framed<TcpStream, PublisherCodec> {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("timed out waiting for the subscriber")
        .unwrap();
    Framed::new(stream, PublisherCodec::default())
}

/// Send one frame and wait for its ACK.
pub async fn send_acked(
    framed: &mut Framed<TcpStream, PublisherCodec>,
    msg_type: MsgTypeId,
    payload: impl Into<bytes::Bytes>,
) {
    framed.send(Frame::new(msg_type, payload)).await.unwrap();
    let ctrl = tokio::time::timeout(WAIT, framed.next())
        .await
        .expect("timed out waiting for ACK")
        .expect("subscriber closed the socket")
        .unwrap();
    assert_eq!(ctrl, MsgCtrl::Ack);
}
