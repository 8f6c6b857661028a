//! Background thread pool for preload fetches.
//!
//! Work-stealing layout: jobs go to a global injector, each worker drains
//! its local deque first, then the injector, then steals from siblings.
//! Nothing running here touches engine state; jobs report back through
//! channels owned by whoever submitted them.

use crossbeam::deque::{Injector, Steal, Stealer, Worker};
use log::{trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle sleep between polls when no work is queued
const IDLE_SLEEP: Duration = Duration::from_millis(1);
/// Upper bound on waiting for workers at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Arc<Vec<Stealer<Job>>> = Arc::new(locals.iter().map(Worker::stealer).collect());

        let mut handles = Vec::with_capacity(num_threads);
        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let stealers = Arc::clone(&stealers);
            let shutdown = Arc::clone(&shutdown);

            let spawned = thread::Builder::new()
                .name(format!("storyplay-preload-{}", worker_id))
                .spawn(move || {
                    trace!("Preload worker {} started", worker_id);
                    loop {
                        if let Some(job) = find_job(&local, &injector, &stealers) {
                            job();
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(IDLE_SLEEP);
                    }
                    trace!("Preload worker {} stopped", worker_id);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Failed to spawn preload worker {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads", handles.len());

        Self {
            injector,
            handles,
            shutdown,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job. It runs on some worker thread; no return value.
    ///
    /// With zero live threads (every spawn failed) the job runs inline.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.handles.is_empty() {
            f();
            return;
        }
        self.injector.push(Box::new(f));
    }
}

/// Local deque, then injector batch, then siblings.
fn find_job(local: &Worker<Job>, injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    local.pop().or_else(|| {
        std::iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(Stealer::steal).collect::<Steal<Job>>())
        })
        .find(|s| !s.is_retry())
        .and_then(Steal::success)
    })
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown grace elapsed, leaving remaining workers detached");
                    return;
                }
                thread::sleep(IDLE_SLEEP);
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_executes_all_jobs() {
        let workers = Workers::new(2);
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..16 {
            let tx = tx.clone();
            workers.execute(move || {
                let _ = tx.send(i);
            });
        }
        let mut got: Vec<i32> = (0..16)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_joins_idle_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let workers = Workers::new(3);
            assert_eq!(workers.num_threads(), 3);
            let c = Arc::clone(&counter);
            let (tx, rx) = crossbeam_channel::bounded(1);
            workers.execute(move || {
                c.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            });
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
