//! # ntwk-core
//!
//! Pub/sub transport for streaming sensor and control messages over TCP.
//!
//! This crate contains:
//! - **Wire types**: `MsgTypeId`, `MsgCtrl`, `MsgHeader`, `Frame`
//! - **Codec**: `SubscriberCodec` / `PublisherCodec` for framed TCP I/O via `tokio_util`
//! - **Policies**: `CodecPolicy` with Identity, Zlib, Zstd, JPEG and bincode schemas
//! - **Messages**: typed schemas (`Image`, `Twist`, `Vector3`, ...)
//! - **Transport**: `TcpPublisher` fan-out with per-type backpressure, reconnecting `TcpSubscriber`
//! - **Node**: composition root owning the caller-pumped `MainContext` and the background `IoContext`
//! - **Error**: `NtwkError`, a typed `thiserror`-based error hierarchy
//!
//! ```no_run
//! use ntwk_core::{Identity, MsgTypeId, Node};
//!
//! # fn main() -> Result<(), ntwk_core::NtwkError> {
//! let node = Node::new()?;
//! let publisher = node.advertise(9000)?;
//! let _sub = node.subscribe("127.0.0.1", 9000, |msg| println!("{:?}", msg.msg_type), 2, Identity)?;
//!
//! publisher.publish(MsgTypeId::Uint8Array, vec![1, 2, 3])?;
//! node.run_once();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;
pub mod msgs;
pub mod node;
pub mod policy;
pub mod publisher;
pub mod rate;
pub mod state;
pub mod subscriber;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{PublisherCodec, SubscriberCodec};
pub use config::{NodeConfig, ReconnectConfig};
pub use context::{MainContext, MainHandle};
pub use error::{NtwkError, Result};
pub use frame::{Frame, MAX_PAYLOAD_SIZE};
pub use header::MsgHeader;
pub use message::{MsgCtrl, MsgTypeId};
pub use msgs::{Image, Joystick, Schema, Twist, Uint8Array, Vector3};
pub use node::Node;
pub use policy::{
    Bincode, CodecPolicy, Identity, ImageCompression, Jpeg, RawImage, Zlib, Zstd,
};
pub use publisher::{PublisherStats, TcpPublisher};
pub use rate::Rate;
pub use state::LinkPhase;
pub use subscriber::{Received, SubscriberStats, TcpSubscriber};
pub use task::IoContext;
