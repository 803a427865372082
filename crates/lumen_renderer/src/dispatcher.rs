//! Worker pool consuming tile requests.
//!
//! Requests go into one shared queue; each worker blocks on it, renders the
//! tile and posts the reply into the queue named by the request. Requests
//! whose pass was superseded before a worker got to them are skipped; any
//! stale reply that still slips through is filtered by whoever receives it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::messages::{RaytraceRequest, WorkerMessage};
use crate::queue::{DispatchError, MessageQueue};

pub struct Dispatcher {
    requests: MessageQueue<WorkerMessage>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl Dispatcher {
    /// Start `worker_count` worker threads.
    ///
    /// A pool with no workers accepts requests but never answers them.
    pub fn new(worker_count: usize) -> Result<Self, DispatchError> {
        let requests = MessageQueue::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let queue = requests.clone();
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("lumen-worker-{index}"))
                .spawn(move || worker_loop(index, &queue, &shutdown))?;
            workers.push(handle);
        }

        log::info!("Dispatcher started with {} workers", worker_count);
        Ok(Self {
            requests,
            workers,
            shutdown,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a tile for the next free worker.
    pub fn post(&self, request: RaytraceRequest) -> Result<(), DispatchError> {
        self.requests.post(WorkerMessage::Raytrace(request))
    }
}

fn worker_loop(index: usize, queue: &MessageQueue<WorkerMessage>, shutdown: &AtomicBool) {
    log::debug!("Worker {} started", index);

    while let Some(message) = queue.recv() {
        let request = match message {
            WorkerMessage::Raytrace(request) => request,
            WorkerMessage::Shutdown => break,
        };
        if shutdown.load(Ordering::Acquire) {
            // Drain what is left without rendering it
            continue;
        }
        if request.is_superseded() {
            log::trace!("Worker {}: skipping superseded gen {}", index, request.id);
            continue;
        }

        log::trace!(
            "Worker {}: tile {:?} gen {} lod {}",
            index,
            request.coverage,
            request.id,
            request.tile_size
        );
        let reply = request.execute();

        // The requester may be gone; its reply is simply dropped
        if request.reply_to.post(reply).is_err() {
            log::trace!("Worker {}: reply queue closed", index);
        }
    }

    log::debug!("Worker {} stopped", index);
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for _ in 0..self.workers.len() {
            let _ = self.requests.post(WorkerMessage::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("A worker thread panicked");
            }
        }
        log::info!("Dispatcher stopped");
    }
}
