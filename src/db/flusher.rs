use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, error};
use crate::core::error::{Error, ErrorKind, Result};
use crate::db::generation::Generation;

/// Single-slot semaphore: at most one flush in flight.
#[derive(Clone)]
pub struct FlushPermit {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl FlushPermit {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        // bounded(1) with no receiver blocked: cannot fail
        let _ = sender.try_send(());
        FlushPermit { sender, receiver }
    }

    /// Blocks until the permit is free.
    pub fn acquire(&self) -> Result<PermitGuard> {
        self.receiver.recv().map_err(|_| {
            Error::new(ErrorKind::Internal, "flush permit channel disconnected".to_string())
        })?;
        Ok(PermitGuard {
            sender: self.sender.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !self.receiver.is_empty()
    }
}

impl Default for FlushPermit {
    fn default() -> Self {
        FlushPermit::new()
    }
}

/// Held permit, released on drop.
pub struct PermitGuard {
    sender: Sender<()>,
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        let _ = self.sender.try_send(());
    }
}

/// A retired generation on its way to disk. Owns the flush permit until
/// the worker is done with it.
pub struct FlushJob<K, F, V, T> {
    pub sequence: u64,
    pub generation: Arc<Generation<K, F, V, T>>,
    pub permit: PermitGuard,
}

/// Dedicated thread draining a bounded job queue.
pub struct FlushWorker<J> {
    sender: Option<Sender<J>>,
    handle: Option<JoinHandle<()>>,
}

impl<J: Send + 'static> FlushWorker<J> {
    pub fn spawn<H>(name: &str, mut handler: H) -> Result<Self>
    where
        H: FnMut(J) + Send + 'static,
    {
        let (sender, receiver) = bounded::<J>(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    handler(job);
                }
                debug!("flush worker stopped");
            })?;

        Ok(FlushWorker {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn submit(&self, job: J) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, "flush worker is stopped".to_string())
        })?;
        sender.send(job).map_err(|_| {
            Error::new(ErrorKind::Internal, "flush worker exited".to_string())
        })
    }

    /// Lets queued jobs finish, then joins the thread.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("flush worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl<J> Drop for FlushWorker<J> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
