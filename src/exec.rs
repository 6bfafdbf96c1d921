//! Execution contexts for asynchronous loading.
//!
//! Two contexts back the reload coordinator:
//!
//! - the **orchestration context** ([`Dispatcher`]): one dedicated thread
//!   draining a FIFO task channel. Every consumer callback is posted here,
//!   which is what gives the loader its strict delivery order.
//! - the **worker context** ([`WorkerPool`]): a bounded pool for the
//!   blocking query executions. Workers are spawned lazily up to the
//!   configured bound and retire after sitting idle for the keep-alive
//!   period.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::trace;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Shutdown,
}

/// Single-threaded FIFO executor: the orchestration context.
///
/// Tasks posted through a [`DispatcherHandle`] run on the dispatcher's
/// thread in posting order. Dropping the `Dispatcher` runs every task
/// already queued, then joins the thread; tasks posted after that are
/// silently discarded.
pub struct Dispatcher {
    tx: Sender<Message>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Message>();
        let thread = thread::Builder::new()
            .name("rowstore-orchestrator".to_string())
            .spawn(move || {
                while let Ok(message) = rx.recv() {
                    match message {
                        Message::Run(task) => task(),
                        Message::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn orchestration thread");
        Self {
            tx,
            thread: Some(thread),
        }
    }

    /// A cloneable posting handle for this dispatcher.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            tx: self.tx.clone(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Posting side of a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: Sender<Message>,
}

impl DispatcherHandle {
    /// Queues a task to run on the orchestration thread.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Message::Run(Box::new(task)));
    }
}

/// Sizing for the worker context.
#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    /// Upper bound on concurrently live workers.
    pub max_workers: usize,
    /// How long an idle worker waits for work before retiring.
    pub keep_alive: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            keep_alive: Duration::from_secs(1),
        }
    }
}

/// Bounded pool of lazily spawned worker threads with idle expiry.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    state: Mutex<PoolState>,
    config: WorkerPoolConfig,
}

#[derive(Default)]
struct PoolState {
    live: usize,
    idle: usize,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (tx, rx) = unbounded::<Task>();
        Self {
            inner: Arc::new(PoolInner {
                tx,
                rx,
                state: Mutex::new(PoolState::default()),
                config,
            }),
        }
    }

    /// Queues a task for the worker context, spawning a worker when none is
    /// idle and the bound allows one.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) {
        // rx lives in the shared inner, so the channel cannot disconnect
        let _ = self.inner.tx.send(Box::new(task));
        let mut state = lock(&self.inner.state);
        if state.idle == 0 && state.live < self.inner.config.max_workers {
            state.live += 1;
            state.idle += 1;
            let inner = Arc::clone(&self.inner);
            let spawned = thread::Builder::new()
                .name("rowstore-worker".to_string())
                .spawn(move || worker_loop(inner));
            if spawned.is_err() {
                // roll back; the task waits for an existing worker
                state.live -= 1;
                state.idle -= 1;
            }
        }
    }

    #[cfg(test)]
    fn live_workers(&self) -> usize {
        lock(&self.inner.state).live
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(WorkerPoolConfig::default())
    }
}

fn worker_loop(inner: Arc<PoolInner>) {
    loop {
        match inner.rx.recv_timeout(inner.config.keep_alive) {
            Ok(task) => {
                lock(&inner.state).idle -= 1;
                task();
                lock(&inner.state).idle += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut state = lock(&inner.state);
                // a task may have raced the timeout; drain it before retiring
                match inner.rx.try_recv() {
                    Ok(task) => {
                        state.idle -= 1;
                        drop(state);
                        task();
                        lock(&inner.state).idle += 1;
                    }
                    Err(_) => {
                        state.idle -= 1;
                        state.live -= 1;
                        trace!("idle worker retired");
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                let mut state = lock(&inner.state);
                state.idle -= 1;
                state.live -= 1;
                return;
            }
        }
    }
}

fn lock(mutex: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn dispatcher_runs_tasks_in_posting_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let dispatcher = Dispatcher::new();
            let handle = dispatcher.handle();
            for i in 0..5 {
                let seen = Arc::clone(&seen);
                handle.post(move || seen.lock().unwrap().push(i));
            }
            // drop drains the queue and joins
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn pool_runs_queued_tasks() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_workers: 2,
            keep_alive: Duration::from_millis(200),
        });
        let counter = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = bounded(8);
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            let done_tx = done_tx.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        }
        for _ in 0..8 {
            done_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("task did not complete");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn pool_respects_the_worker_bound() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_workers: 1,
            keep_alive: Duration::from_millis(500),
        });
        let (started_tx, started_rx) = bounded(1);
        let (release_tx, release_rx) = bounded::<()>(1);
        pool.execute(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        });
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("first task did not start");

        let (second_tx, second_rx) = bounded(1);
        pool.execute(move || {
            let _ = second_tx.send(());
        });
        // the single worker is blocked, so the second task must wait
        assert!(second_rx.recv_timeout(Duration::from_millis(100)).is_err());

        release_tx.send(()).unwrap();
        second_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second task did not run after the worker freed up");
    }

    #[test]
    fn idle_workers_expire_after_keep_alive() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_workers: 2,
            keep_alive: Duration::from_millis(50),
        });
        let (done_tx, done_rx) = bounded(1);
        pool.execute(move || {
            let _ = done_tx.send(());
        });
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("task did not complete");

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.live_workers() > 0 {
            assert!(Instant::now() < deadline, "worker never retired");
            thread::sleep(Duration::from_millis(10));
        }
    }
}
