//! Multi-producer, multi-consumer message queue.
//!
//! A thin layer over `std::sync::mpsc`: senders are cloned freely, the
//! receiving end sits behind a mutex so several worker threads can consume
//! from the same queue. The control thread only ever polls (`try_recv`,
//! `drain`), which never block even while a worker holds the receiver.

use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the queue and the worker pool built on it.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message queue disconnected")]
    Disconnected,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Posting half of a `MessageQueue`, handed out to repliers.
pub struct QueueSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender").finish_non_exhaustive()
    }
}

impl<T> QueueSender<T> {
    /// Enqueue `message`; fails once the queue itself has been dropped.
    pub fn post(&self, message: T) -> Result<(), DispatchError> {
        self.tx.send(message).map_err(|_| DispatchError::Disconnected)
    }
}

/// FIFO queue safe for any number of producers and consumers.
pub struct MessageQueue<T> {
    tx: Sender<T>,
    rx: Arc<Mutex<Receiver<T>>>,
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue").finish_non_exhaustive()
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn post(&self, message: T) -> Result<(), DispatchError> {
        self.tx.send(message).map_err(|_| DispatchError::Disconnected)
    }

    /// A handle that can only post into this queue.
    pub fn sender(&self) -> QueueSender<T> {
        QueueSender {
            tx: self.tx.clone(),
        }
    }

    /// Block until a message arrives.
    ///
    /// Returns `None` if the lock is poisoned. The queue holds its own
    /// sender, so it never reports disconnection while `self` is alive.
    pub fn recv(&self) -> Option<T> {
        let rx = self.rx.lock().ok()?;
        rx.recv().ok()
    }

    /// Wait at most `timeout` for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let rx = self.rx.lock().ok()?;
        match rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take one message if one is ready. Never blocks: a receiver held by
    /// another consumer counts as empty.
    pub fn try_recv(&self) -> Option<T> {
        let rx = match self.rx.try_lock() {
            Ok(rx) => rx,
            Err(TryLockError::WouldBlock | TryLockError::Poisoned(_)) => return None,
        };
        match rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take every message that is ready without blocking.
    pub fn drain(&self) -> Vec<T> {
        let Ok(rx) = self.rx.try_lock() else {
            return Vec::new();
        };
        rx.try_iter().collect()
    }
}
