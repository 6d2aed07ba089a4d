//! Composition root.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::context::{MainContext, MainHandle};
use crate::error::NtwkError;
use crate::policy::CodecPolicy;
use crate::publisher::TcpPublisher;
use crate::subscriber::{Received, TcpSubscriber};
use crate::task::IoContext;

/// Owns the two execution contexts and creates publishers and
/// subscribers bound to them.
///
/// Socket I/O runs on the node's background thread. Subscription
/// handlers run only when the application pumps the node with
/// [`run`](Node::run) or [`run_once`](Node::run_once).
///
/// Dropping the node shuts every publisher and subscriber down and
/// joins the I/O thread; no handler runs after that.
pub struct Node {
    config: NodeConfig,
    main: MainContext,
    io: IoContext,
}

impl Node {
    pub fn new() -> Result<Self, NtwkError> {
        Self::with_config(NodeConfig::default())
    }

    pub fn with_config(config: NodeConfig) -> Result<Self, NtwkError> {
        config.validate()?;
        let io = IoContext::start()?;
        debug!(?config, "node started");
        Ok(Self {
            config,
            main: MainContext::new(),
            io,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Listen on `bind_host:port` (port 0 picks a free port).
    ///
    /// The publisher runs while the returned handle (or a clone of it) is
    /// alive. Dropping the last handle stops accepting and closes every
    /// connected socket, so `let _ = node.advertise(port)?` advertises
    /// nothing.
    pub fn advertise(&self, port: u16) -> Result<Arc<TcpPublisher>, NtwkError> {
        let addr = self.bind_addr(port)?;
        let publisher = TcpPublisher::bind(&self.io, addr, &self.config)?;
        Ok(Arc::new(publisher))
    }

    /// Connect to a publisher at `host:port`, decoding every frame with
    /// `policy` and delivering at most the latest `queue_size` messages
    /// per pump to `handler`.
    pub fn subscribe<P, F>(
        &self,
        host: &str,
        port: u16,
        handler: F,
        queue_size: usize,
        policy: P,
    ) -> Result<Arc<TcpSubscriber<P>>, NtwkError>
    where
        P: CodecPolicy,
        F: FnMut(Received<P::Message>) + Send + 'static,
    {
        let subscriber = TcpSubscriber::spawn(
            &self.io,
            self.main.handle(),
            host,
            port,
            handler,
            queue_size,
            policy,
            &self.config,
        )?;
        info!(endpoint = %subscriber.endpoint(), queue_size, "subscribed");
        Ok(subscriber)
    }

    /// Block pumping handlers until [`MainHandle::stop`] is called.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run(&self) {
        self.main.run();
    }

    /// Run every handler that is ready and return how many ran.
    pub fn run_once(&self) -> usize {
        self.main.run_once()
    }

    /// Handle that ends [`run`](Node::run), usable from any thread.
    pub fn stop_handle(&self) -> MainHandle {
        self.main.handle()
    }

    fn bind_addr(&self, port: u16) -> Result<SocketAddr, NtwkError> {
        let host = self.config.bind_host.as_str();
        (host, port)
            .to_socket_addrs()
            .map_err(|e| NtwkError::Resolve(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| NtwkError::Resolve(format!("{host}:{port}: no addresses")))
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.main.handle().stop();
        self.io.shutdown();
        debug!("node stopped");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("io_running", &self.io.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Identity;

    fn loopback() -> NodeConfig {
        NodeConfig {
            bind_host: "127.0.0.1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn invalid_config_fails_construction() {
        let cfg = NodeConfig {
            default_queue_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Node::with_config(cfg),
            Err(NtwkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn advertise_on_ephemeral_port() {
        let node = Node::with_config(loopback()).unwrap();
        let publisher = node.advertise(0).unwrap();
        assert!(publisher.local_addr().ip().is_loopback());
        assert_ne!(publisher.local_addr().port(), 0);
        assert_eq!(publisher.connection_count(), 0);
    }

    #[test]
    fn dropping_the_publisher_handle_closes_its_listener() {
        let node = Node::with_config(loopback()).unwrap();
        let publisher = node.advertise(0).unwrap();
        let addr = publisher.local_addr();
        assert!(std::net::TcpStream::connect(addr).is_ok());

        drop(publisher);
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while std::net::TcpStream::connect(addr).is_ok() {
            assert!(std::time::Instant::now() < deadline, "listener still open");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    #[test]
    fn unresolvable_host_is_a_setup_error() {
        let node = Node::with_config(loopback()).unwrap();
        let res = node.subscribe("no such host .invalid", 1, |_| {}, 1, Identity);
        assert!(matches!(res, Err(NtwkError::Resolve(_))));
    }

    #[test]
    fn drop_stops_subscribers() {
        let node = Node::with_config(loopback()).unwrap();
        let sub = node.subscribe("127.0.0.1", 1, |_| {}, 1, Identity).unwrap();
        drop(node);
        assert!(sub.is_shutdown());
    }

    #[test]
    fn run_once_with_nothing_queued() {
        let node = Node::new().unwrap();
        assert_eq!(node.run_once(), 0);
    }
}
