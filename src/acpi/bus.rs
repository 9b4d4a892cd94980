//! Event bus with a bounded worker pool
//!
//! Each dispatched event becomes one job per registered handler. Jobs go
//! through a bounded queue to a fixed set of worker threads; when the queue
//! is full the job is dropped and counted instead of blocking the listener.
//!
//! Drops are per handler: under an event storm one handler can miss an event
//! that the others received. Every drop is logged at error level and shows
//! up in [`DispatchStats::jobs_dropped`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace};

use super::{AcpiError, AcpiEvent, Result, SharedHandler};

struct Job {
    handler: SharedHandler,
    event: AcpiEvent,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Dispatch statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Events passed to [`EventBus::dispatch`]
    pub events_dispatched: u64,
    /// Handler jobs accepted by the queue
    pub jobs_queued: u64,
    /// Handler jobs dropped because the queue was full
    pub jobs_dropped: u64,
    /// Handler jobs that ran to completion
    pub jobs_completed: u64,
    /// Handler jobs that panicked
    pub jobs_panicked: u64,
}

/// Fan-out of events to registered handlers
///
/// Every handler sees every event as long as the queue has room. A full
/// queue drops the job for the handler being queued only, so handlers
/// registered later in the list are the first to miss events.
pub struct EventBus {
    handlers: RwLock<Vec<SharedHandler>>,
    job_tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.read().len())
            .field("workers", &self.workers.lock().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl EventBus {
    /// Create a bus and start its workers
    ///
    /// # Arguments
    ///
    /// * `workers` - Number of worker threads (at least one is started)
    /// * `queue_depth` - Jobs that may wait for a worker (at least one)
    ///
    /// # Errors
    ///
    /// Returns error if a worker thread cannot be spawned
    pub fn new(workers: usize, queue_depth: usize) -> Result<Self> {
        let (job_tx, job_rx) = bounded::<Job>(queue_depth.max(1));
        let counters = Arc::new(Counters::default());

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let rx = job_rx.clone();
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("acpi-dispatch-{index}"))
                .spawn(move || run_worker(rx, counters))
                .map_err(|e| AcpiError::ThreadSpawn(e.to_string()))?;
            handles.push(handle);
        }

        debug!(
            "Event bus started with {} workers, queue depth {}",
            handles.len(),
            queue_depth.max(1)
        );

        Ok(Self {
            handlers: RwLock::new(Vec::new()),
            job_tx: Mutex::new(Some(job_tx)),
            workers: Mutex::new(handles),
            counters,
        })
    }

    /// Register a handler; it receives every event dispatched from now on
    pub fn add_event_handler(&self, handler: SharedHandler) {
        self.handlers.write().push(handler);
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Queue `event` once for every registered handler
    ///
    /// Never blocks. Returns how many handler jobs were queued.
    pub fn dispatch(&self, event: AcpiEvent) -> usize {
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let handlers: Vec<SharedHandler> = self.handlers.read().clone();
        let Some(tx) = self.job_tx.lock().clone() else {
            debug!("Event bus shut down, dropping {}", event);
            return 0;
        };

        trace!("Dispatching {} to {} handlers", event, handlers.len());
        let mut queued = 0;
        for handler in handlers {
            match tx.try_send(Job { handler, event }) {
                Ok(()) => {
                    queued += 1;
                    self.counters.queued.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    error!("Dispatch queue full, handler misses {}", event);
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Dispatch workers gone, dropping {}", event);
                    break;
                }
            }
        }
        queued
    }

    /// Current counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            events_dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            jobs_queued: self.counters.queued.load(Ordering::Relaxed),
            jobs_dropped: self.counters.dropped.load(Ordering::Relaxed),
            jobs_completed: self.counters.completed.load(Ordering::Relaxed),
            jobs_panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting events, let workers finish queued jobs, join them
    pub fn shutdown(&self) {
        let Some(tx) = self.job_tx.lock().take() else {
            return;
        };
        drop(tx);

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                error!("Dispatch worker panicked");
            }
        }
        info!("Event bus stopped: {:?}", self.stats());
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(rx: Receiver<Job>, counters: Arc<Counters>) {
    for job in rx.iter() {
        let Job { handler, event } = job;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle_event(event))) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                error!("Event handler panicked while handling {}", event);
                counters.panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    trace!("Dispatch worker exiting");
}
