use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use anyhow::anyhow;
use anyhow::Context;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    tasks: VecDeque<Task>,
    stopped: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    signal: Condvar,
}

/// A fixed size pool of worker threads draining a shared FIFO of
/// closures.
///
/// Each worker waits until the pool is stopped or the queue is non
/// empty, pops one task under the lock, releases the lock and runs the
/// task. After [WorkerPool::stop_all_workers] the workers drain the
/// remaining tasks and exit. Tasks are observed in enqueue order but
/// completion order is unspecified. The pool never inspects task
/// results; callers submit closures that cannot fail.
pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(workers: usize) -> Result<WorkerPool, anyhow::Error> {
        let shared = Arc::new(
            Shared {
                state: Mutex::new(
                    PoolState {
                        tasks: VecDeque::new(),
                        stopped: false,
                    }
                ),
                signal: Condvar::new(),
            }
        );
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("chunk-sort-{}", i))
                .spawn(move || Self::run(shared))
                .with_context(|| format!("spawn worker thread {}", i))?;
            handles.push(handle);
        }
        Ok(
            WorkerPool {
                shared,
                workers: handles,
            }
        )
    }

    fn run(shared: Arc<Shared>) {
        loop {
            let task = {
                let mut state = shared.state.lock().unwrap();
                while !state.stopped && state.tasks.is_empty() {
                    state = shared.signal.wait(state).unwrap();
                }
                if state.stopped && state.tasks.is_empty() {
                    break;
                }
                state.tasks.pop_front()
            };
            if let Some(task) = task {
                task();
            }
        }
    }

    pub(crate) fn submit(&self, task: Task) {
        let mut state = self.shared.state.lock().unwrap();
        state.tasks.push_back(task);
        drop(state);
        self.shared.signal.notify_one();
    }

    /// Set the sticky stopped flag and wake every worker. Pending
    /// tasks are still completed before the workers exit.
    pub(crate) fn stop_all_workers(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.stopped = true;
        drop(state);
        self.shared.signal.notify_all();
    }

    /// Join every worker thread.
    pub(crate) fn wait_workers(self) -> Result<(), anyhow::Error> {
        for handle in self.workers {
            handle.join().map_err(|_| anyhow!("worker thread panicked"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use crate::worker_pool::WorkerPool;

    #[test]
    fn test_all_tasks_execute() -> Result<(), anyhow::Error> {
        let pool = WorkerPool::new(4)?;
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.stop_all_workers();
        pool.wait_workers()?;
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        Ok(())
    }

    #[test]
    fn test_pending_tasks_drain_after_stop() -> Result<(), anyhow::Error> {
        let pool = WorkerPool::new(1)?;
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        // stop before the single worker can have drained the queue
        pool.stop_all_workers();
        pool.wait_workers()?;
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        Ok(())
    }

    #[test]
    fn test_stop_with_empty_queue() -> Result<(), anyhow::Error> {
        let pool = WorkerPool::new(8)?;
        pool.stop_all_workers();
        pool.wait_workers()?;
        Ok(())
    }
}
