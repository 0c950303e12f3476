use crate::error::{Error, Result};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::debug;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads behind a bounded queue. Admission never
/// blocks: a full queue rejects the task.
pub struct WorkerPool {
    sender: Mutex<Option<SyncSender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(size: usize, queue_capacity: usize) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<Task>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::new();
        for i in 0..size.max(1) {
            let rx = Arc::clone(&rx);
            let handle = std::thread::Builder::new()
                .name(format!("simdeck-worker-{i}"))
                .spawn(move || worker_loop(&rx))?;
            workers.push(handle);
        }
        debug!("worker pool started: {} workers", workers.len());
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    pub fn try_execute(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = sender.as_ref() else {
            return Err(Error::Rejected("worker pool is shut down".into()));
        };
        tx.try_send(Box::new(task)).map_err(|e| match e {
            TrySendError::Full(_) => Error::Rejected("job queue is full".into()),
            TrySendError::Disconnected(_) => Error::Rejected("worker pool is shut down".into()),
        })
    }

    /// Stop admitting work, let queued tasks drain, and join the workers.
    pub fn shutdown(&self) {
        self.sender.lock().unwrap_or_else(|p| p.into_inner()).take();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|p| p.into_inner()));
        for handle in workers {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: &Mutex<Receiver<Task>>) {
    loop {
        let task = {
            let guard = rx.lock().unwrap_or_else(|p| p.into_inner());
            guard.recv()
        };
        match task {
            Ok(task) => task(),
            Err(_) => break,
        }
    }
}
