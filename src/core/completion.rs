//! Completion contexts - where `prepare` callbacks run.
//!
//! Architecture:
//! - Decode batches finish on worker threads and `dispatch()` their completion
//! - `MainQueue` holds completions until the host drains them on its main loop
//!   (`run_pending()` once per frame, like an event bus poll)
//! - `Inline` runs the completion right away on the worker thread
//!
//! Order: FIFO within one queue. Completions are never dropped.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::trace;

/// Boxed completion callback
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Execution context completions are marshaled to.
pub trait CompletionContext: Send + Sync {
    fn dispatch(&self, completion: Completion);
}

impl<T: CompletionContext + ?Sized> CompletionContext for Arc<T> {
    fn dispatch(&self, completion: Completion) {
        (**self).dispatch(completion)
    }
}

/// Runs completions on whichever thread dispatches them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl CompletionContext for Inline {
    fn dispatch(&self, completion: Completion) {
        completion();
    }
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Vec<Completion>>,
    ready: Condvar,
}

/// Deferred completion queue drained by the main loop.
///
/// Cheap to clone; all clones share one queue.
///
/// # Example
/// ```
/// # use flipbook::{CompletionContext, MainQueue};
/// let main = MainQueue::new();
/// main.dispatch(Box::new(|| println!("prepared")));
/// // ... later, on the main thread:
/// assert_eq!(main.run_pending(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MainQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue").field("queue_len", &self.len()).finish()
    }
}

impl MainQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued completion on the calling thread. Returns how many ran.
    ///
    /// Completions dispatched while running are left for the next call.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.lock());
        let count = batch.len();
        for completion in batch {
            completion();
        }
        if count > 0 {
            trace!("MainQueue ran {} completions", count);
        }
        count
    }

    /// Block until at least one completion is queued (or `timeout` passes),
    /// then run everything queued. Returns how many ran.
    pub fn wait_and_run(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        {
            let mut queue = self.lock();
            while queue.is_empty() {
                let now = Instant::now();
                if now >= deadline {
                    return 0;
                }
                queue = self
                    .shared
                    .ready
                    .wait_timeout(queue, deadline - now)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
            }
        }
        self.run_pending()
    }

    /// Queued completions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Completion>> {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CompletionContext for MainQueue {
    fn dispatch(&self, completion: Completion) {
        self.lock().push(completion);
        self.shared.ready.notify_all();
    }
}
