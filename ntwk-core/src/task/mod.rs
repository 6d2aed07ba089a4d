//! Background I/O context.
//!
//! Exactly one OS thread drives every socket operation of a node. The
//! thread runs a current-thread tokio runtime until the context's
//! [`CancellationToken`] fires; each publisher and subscriber derives a
//! child token so it can be shut down individually.

use std::future::Future;
use std::thread::JoinHandle;

use tokio::runtime::{Builder, EnterGuard, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::error::NtwkError;

/// Name given to the I/O thread.
pub const IO_THREAD_NAME: &str = "ntwk-io";

/// Dedicated I/O thread plus its runtime handle.
pub struct IoContext {
    handle: Handle,
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl IoContext {
    /// Build the runtime and start the I/O thread.
    pub fn start() -> Result<Self, NtwkError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name(IO_THREAD_NAME.into())
            .spawn(move || {
                trace!("io context running");
                runtime.block_on(token.cancelled());
                // Dropping the runtime here drops every pending task and
                // the references they hold, before the join completes.
                drop(runtime);
                trace!("io context stopped");
            })?;

        Ok(Self {
            handle,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Schedule a future on the I/O thread.
    pub fn spawn<F>(&self, fut: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Enter the runtime from the calling thread, e.g. to register a
    /// socket with the I/O driver.
    pub fn enter(&self) -> EnterGuard<'_> {
        self.handle.enter()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// A token cancelled when this context shuts down.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Cancel every task and join the I/O thread.
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("io thread panicked during shutdown");
            }
        }
    }
}

impl Drop for IoContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn spawned_tasks_run_on_io_thread() {
        let io = IoContext::start().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        io.spawn(async move {
            let name = std::thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(IO_THREAD_NAME));
    }

    #[test]
    fn shutdown_drops_pending_tasks() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let mut io = IoContext::start().unwrap();
        let guard = SetOnDrop(Arc::clone(&dropped));
        io.spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });

        io.shutdown();
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!io.is_running());
    }

    #[test]
    fn child_tokens_follow_parent() {
        let mut io = IoContext::start().unwrap();
        let child = io.child_token();
        assert!(!child.is_cancelled());
        io.shutdown();
        assert!(child.is_cancelled());
    }
}
