//! Fixed-size worker pool.
//!
//! A single FIFO queue shared by `size` OS threads. Workers block on a
//! condition variable while the queue is empty; a second condition variable
//! reports "queue empty and every worker idle" to [`WorkerPool::wait_all`].

use crate::traits::PoolError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// One thread for the writer coordinator plus at least one extractor.
pub const MIN_THREADS: usize = 2;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: VecDeque<Job>,
    active: usize,
    stop: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    task_ready: Condvar,
    drained: Condvar,
}

/// Pool size derived from hardware concurrency, never below [`MIN_THREADS`].
pub fn default_pool_size() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS)
        .max(MIN_THREADS)
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

/// Handle to the result of a submitted task.
pub struct TaskHandle<T> {
    rx: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until this task has run.
    pub fn wait(self) -> Result<T, PoolError> {
        match self.rx.recv() {
            Ok(outcome) => outcome.map_err(|_| PoolError::TaskPanicked),
            Err(_) => Err(PoolError::TaskDropped),
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning the
    /// handle so the caller can retry.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<T, PoolError>, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome.map_err(|_| PoolError::TaskPanicked)),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(PoolError::TaskDropped)),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    /// Non-blocking check; `None` while the task is queued or running.
    pub fn try_wait(&self) -> Option<Result<T, PoolError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome.map_err(|_| PoolError::TaskPanicked)),
            Err(TryRecvError::Disconnected) => Some(Err(PoolError::TaskDropped)),
            Err(TryRecvError::Empty) => None,
        }
    }
}

impl WorkerPool {
    /// Starts `threads` workers (raised to [`MIN_THREADS`] if lower).
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let size = threads.max(MIN_THREADS);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                active: 0,
                stop: false,
            }),
            task_ready: Condvar::new(),
            drained: Condvar::new(),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(size)),
            size,
        };

        for worker_id in 0..size {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("fileinfo-worker-{}", worker_id))
                .spawn(move || worker_loop(&shared))?;
            pool.workers.lock().push(handle);
        }

        debug!(threads = size, "Worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of queued tasks not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Enqueues `f`; fails once [`shutdown`](Self::shutdown) has begun.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f));
            // The handle may already be gone; nobody is waiting then.
            let _ = tx.send(outcome);
        });

        {
            let mut state = self.shared.state.lock();
            if state.stop {
                return Err(PoolError::Closed);
            }
            state.queue.push_back(job);
        }
        self.shared.task_ready.notify_one();
        Ok(TaskHandle { rx })
    }

    /// Blocks until the queue is empty and no worker is mid-task.
    pub fn wait_all(&self) {
        let mut state = self.shared.state.lock();
        while !(state.queue.is_empty() && state.active == 0) {
            self.shared.drained.wait(&mut state);
        }
    }

    /// Discards queued tasks that have not started. Their handles resolve
    /// to [`PoolError::TaskDropped`]. Returns how many were discarded.
    pub fn drain_pending(&self) -> usize {
        let discarded: Vec<Job> = {
            let mut state = self.shared.state.lock();
            let jobs = state.queue.drain(..).collect();
            if state.active == 0 {
                self.shared.drained.notify_all();
            }
            jobs
        };
        let count = discarded.len();
        // Dropped outside the lock: closures may own channel senders.
        drop(discarded);
        if count > 0 {
            debug!(count, "Discarded pending tasks");
        }
        count
    }

    /// Stops accepting work, lets workers finish the queue, joins them.
    ///
    /// Safe to call more than once; later calls are no-ops. Must not be
    /// called from inside a pool task.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
        }
        self.shared.task_ready.notify_all();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("Worker thread exited with a panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.stop {
                    return;
                }
                shared.task_ready.wait(&mut state);
            }
        };

        job();

        let mut state = shared.state.lock();
        state.active -= 1;
        if state.active == 0 && state.queue.is_empty() {
            shared.drained.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pool_size_floor() {
        let pool = WorkerPool::new(1).unwrap();
        assert_eq!(pool.size(), MIN_THREADS);
        assert!(default_pool_size() >= MIN_THREADS);
    }

    #[test]
    fn test_submit_and_wait() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(|| 6 * 7).unwrap();
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn test_wait_all_runs_every_task() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..500 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait_all();
        assert_eq!(counter.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn test_fifo_order_on_single_lane() {
        // Both workers are parked on a gate so the remaining tasks queue up.
        let pool = WorkerPool::new(2).unwrap();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
        let (started_tx, started_rx) = crossbeam_channel::unbounded::<()>();
        for _ in 0..2 {
            let gate_rx = gate_rx.clone();
            let started_tx = started_tx.clone();
            pool.submit(move || {
                let _ = started_tx.send(());
                let _ = gate_rx.recv();
            })
            .unwrap();
        }
        started_rx.recv().unwrap();
        started_rx.recv().unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || order.lock().push(i)).unwrap()
            })
            .collect();
        assert_eq!(pool.pending(), 3);

        // Release one worker at a time so only one lane consumes the queue.
        gate_tx.send(()).unwrap();
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);

        gate_tx.send(()).unwrap();
        pool.wait_all();
    }

    #[test]
    fn test_panicking_task_reports_error() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(|| -> u32 { panic!("boom") }).unwrap();
        assert_eq!(handle.wait(), Err(PoolError::TaskPanicked));

        // The worker survives the panic.
        assert_eq!(pool.submit(|| 1).unwrap().wait(), Ok(1));
    }

    #[test]
    fn test_drain_pending_drops_queued_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
        for _ in 0..2 {
            let gate_rx = gate_rx.clone();
            pool.submit(move || {
                let _ = gate_rx.recv();
            })
            .unwrap();
        }

        let queued: Vec<_> = (0..5).map(|i| pool.submit(move || i).unwrap()).collect();
        // Workers may not have dequeued the gate tasks yet.
        let discarded = pool.drain_pending();
        assert!(discarded >= 5);

        drop(gate_tx);
        pool.wait_all();
        for handle in queued {
            assert_eq!(handle.wait(), Err(PoolError::TaskDropped));
        }
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.submit(|| ()).err(), Some(PoolError::Closed));
    }

    #[test]
    fn test_shutdown_finishes_queue() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_try_wait_and_wait_timeout() {
        let pool = WorkerPool::new(2).unwrap();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = pool
            .submit(move || {
                let _ = gate_rx.recv();
                "done"
            })
            .unwrap();

        assert!(handle.try_wait().is_none());
        let handle = match handle.wait_timeout(Duration::from_millis(10)) {
            Ok(_) => panic!("task finished before the gate opened"),
            Err(handle) => handle,
        };

        gate_tx.send(()).unwrap();
        assert_eq!(handle.wait(), Ok("done"));
    }
}
