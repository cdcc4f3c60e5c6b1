//! Background thread pool - the decode context
//!
//! Uses crossbeam for an MPMC queue with closure-based task execution.
//! Decode batches are submitted here; completions are marshaled elsewhere
//! (see `completion`).

use crossbeam_channel::{Sender, unbounded};
use log::{debug, error, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool for decode work.
///
/// Workers execute arbitrary closures with captured state (payloads).
///
/// # Example
/// ```
/// # use flipbook::Workers;
/// let workers = Workers::new(2).unwrap();
/// workers.execute(move || {
///     // runs on a worker thread
/// });
/// ```
pub struct Workers {
    sender: Sender<Job>,
    handles: Vec<thread::JoinHandle<()>>, // Keep handles to prevent premature drop
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("threads", &self.handles.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Workers {
    /// Create worker pool with `num_threads` threads (at least one).
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let (tx, rx) = unbounded::<Job>();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(num_threads);

        for worker_id in 0..num_threads {
            let rx = rx.clone();
            let in_flight = Arc::clone(&in_flight);

            let handle = thread::Builder::new()
                .name(format!("flipbook-decode-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);

                    // Worker loop: execute closures until channel closes
                    while let Ok(job) = rx.recv() {
                        job();
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    }

                    trace!("Worker {} stopped", worker_id);
                })?;

            handles.push(handle);
        }

        debug!("Workers initialized: {} threads", num_threads);

        Ok(Self {
            sender: tx,
            handles,
            in_flight,
        })
    }

    /// Pool sized for the machine: 3/4 of the logical CPUs, leaving room for
    /// the main/render thread.
    pub fn auto() -> std::io::Result<Self> {
        Self::new(Self::auto_threads())
    }

    pub fn auto_threads() -> usize {
        (num_cpus::get() * 3 / 4).max(1)
    }

    /// Execute closure on a worker thread. No return value; share results
    /// through Arc/Mutex.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.sender.send(Box::new(f)) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            error!("Failed to enqueue job: {}", e);
        }
    }

    /// Jobs queued or running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

// Channels close when the sender drops, threads exit their recv() loop.
// Running batches finish first: they own everything they touch.
impl Drop for Workers {
    fn drop(&mut self) {
        debug!("Workers shutting down ({} threads)...", self.handles.len());
    }
}
