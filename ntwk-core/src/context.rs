//! Caller-side execution context.
//!
//! Subscriber handlers never run on the I/O thread: completed messages
//! are posted here as jobs and only execute when the application pumps
//! the context with [`MainContext::run`] or [`MainContext::run_once`].
//! Handlers therefore never run concurrently with each other or with
//! the pumping thread.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum MainTask {
    Run(Job),
    Stop,
}

/// Cloneable handle used to post work onto a [`MainContext`].
#[derive(Clone)]
pub struct MainHandle {
    tx: UnboundedSender<MainTask>,
}

impl MainHandle {
    /// Queue `job` for the next pump. Returns `false` if the context
    /// is gone.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(MainTask::Run(Box::new(job))).is_ok()
    }

    /// Make a blocking [`MainContext::run`] return after the jobs
    /// queued before this call.
    pub fn stop(&self) {
        let _ = self.tx.send(MainTask::Stop);
    }
}

impl std::fmt::Debug for MainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Job queue driven by the application thread.
pub struct MainContext {
    // Owning a sender keeps `run` from ever seeing a closed channel.
    tx: UnboundedSender<MainTask>,
    rx: Mutex<UnboundedReceiver<MainTask>>,
}

impl MainContext {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn handle(&self) -> MainHandle {
        MainHandle {
            tx: self.tx.clone(),
        }
    }

    /// Block the calling thread executing jobs until a stop is posted.
    ///
    /// Must not be called from inside an async runtime. Calling it from
    /// inside a handler deadlocks.
    pub fn run(&self) {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(task) = rx.blocking_recv() {
            match task {
                MainTask::Run(job) => job(),
                MainTask::Stop => break,
            }
        }
    }

    /// Execute every job currently queued without blocking, then
    /// return how many ran. A pending stop ends the cycle early.
    pub fn run_once(&self) -> usize {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut executed = 0;
        loop {
            match rx.try_recv() {
                Ok(MainTask::Run(job)) => {
                    job();
                    executed += 1;
                }
                Ok(MainTask::Stop) => break,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        executed
    }
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}
