//! Event delivery to the host application.
//!
//! The host supplies an [`EventSink`]: a callback taking one [`InputEvent`]
//! at a time, with no promise about how long it takes.  The receive loop must
//! never wait on it, so events go through a [`SinkDispatcher`]:
//!
//! ```text
//! receive thread ──try_send──► queue ──► "wing-events" thread ──► host sink
//! ```
//!
//! When the queue is bounded and full, the newest event is dropped and
//! counted rather than blocking the receive thread.
//!
//! Stopping never waits for the host: [`SinkDispatcher::detach`] cancels the
//! dispatcher and lets its thread discard whatever is still queued, while
//! [`SinkDispatcher::shutdown`] waits for every queued event to be delivered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wing_core::InputEvent;

/// Default capacity of the bounded event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Destination for input events.  Implemented by the host.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: InputEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn deliver(&self, event: InputEvent) {
        (**self).deliver(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(InputEvent) + Send + Sync,
{
    fn deliver(&self, event: InputEvent) {
        (self.0)(event);
    }
}

/// Forwards events into a Tokio channel, for hosts built on an async runtime.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<InputEvent>,
}

impl ChannelSink {
    /// Creates the sink and the receiver the host reads events from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InputEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: InputEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped; discarding event");
        }
    }
}

/// What to do when the host falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Queue at most `capacity` events; drop new ones beyond that.
    DropNewest { capacity: usize },
    /// Queue everything.  Memory grows while the host is stalled.
    Unbounded,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropNewest {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

enum QueueSender {
    Bounded(mpsc::Sender<InputEvent>),
    Unbounded(mpsc::UnboundedSender<InputEvent>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<InputEvent>),
    Unbounded(mpsc::UnboundedReceiver<InputEvent>),
}

impl QueueReceiver {
    fn blocking_recv(&mut self) -> Option<InputEvent> {
        match self {
            QueueReceiver::Bounded(rx) => rx.blocking_recv(),
            QueueReceiver::Unbounded(rx) => rx.blocking_recv(),
        }
    }
}

/// Non-blocking [`EventSink`] that feeds the dispatcher queue.
pub struct QueuedSink {
    tx: QueueSender,
    dropped: Arc<AtomicU64>,
}

impl QueuedSink {
    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for QueuedSink {
    fn deliver(&self, event: InputEvent) {
        let result = match &self.tx {
            QueueSender::Bounded(tx) => tx.try_send(event).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => true,
                mpsc::error::TrySendError::Closed(_) => false,
            }),
            QueueSender::Unbounded(tx) => tx.send(event).map_err(|_| false),
        };

        match result {
            Ok(()) => {}
            Err(true) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // First drop, then every 1000th.
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!("event queue full; {dropped} event(s) dropped so far");
                }
            }
            Err(false) => debug!("event dispatcher stopped; discarding event"),
        }
    }
}

/// The thread that drains the event queue into the host sink.
///
/// The thread exits once every [`QueuedSink`] handle has been dropped and the
/// queue is empty.  Events still queued after cancellation are counted as
/// dropped instead of delivered.
pub struct SinkDispatcher {
    dropped: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SinkDispatcher {
    /// Spawns the dispatcher thread and returns it with the producer side.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(
        policy: OverflowPolicy,
        host: Arc<dyn EventSink>,
    ) -> std::io::Result<(Self, Arc<QueuedSink>)> {
        let (tx, mut rx) = match policy {
            OverflowPolicy::DropNewest { capacity } => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
            OverflowPolicy::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
        };

        let dropped = Arc::new(AtomicU64::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        let thread_dropped = Arc::clone(&dropped);
        let thread_cancelled = Arc::clone(&cancelled);
        let thread = std::thread::Builder::new()
            .name("wing-events".to_string())
            .spawn(move || {
                while let Some(event) = rx.blocking_recv() {
                    if thread_cancelled.load(Ordering::Relaxed) {
                        thread_dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    host.deliver(event);
                }
                debug!("event queue closed");
            })?;

        let queue = Arc::new(QueuedSink {
            tx,
            dropped: Arc::clone(&dropped),
        });
        let dispatcher = Self {
            dropped,
            cancelled,
            thread: Some(thread),
        };
        Ok((dispatcher, queue))
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Waits until everything queued has been delivered.
    ///
    /// Every [`QueuedSink`] handle must be dropped first, otherwise this
    /// blocks until they are.  Blocks for as long as the host takes.
    pub fn shutdown(mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.join().is_err() {
            warn!("event dispatcher thread panicked");
        } else {
            info!("event dispatcher stopped");
        }
    }

    /// Cancels delivery without waiting for the host.
    ///
    /// The event currently in the host's hands finishes.  Everything queued
    /// behind it is counted as dropped, and the thread exits once the queue
    /// closes.
    pub fn detach(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if self.thread.take().is_some() {
            self.cancelled.store(true, Ordering::Relaxed);
            debug!("event dispatcher detached");
        }
    }
}

impl Drop for SinkDispatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
