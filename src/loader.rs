//! Asynchronous reload coordination.
//!
//! A [`ReloadCoordinator`] re-runs one query on the worker context and
//! streams the decoded rows to a [`LoadObserver`] on the orchestration
//! context. Reload requests arriving while an execution is in flight are
//! coalesced: however many arrive, exactly one trailing execution runs after
//! the current one finishes, so the observer always ends up seeing a result
//! set at least as fresh as the last request.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::DbError;
use crate::exec::{DispatcherHandle, WorkerPool};
use crate::row::Row;

/// Consumer callbacks for one load execution.
///
/// All methods are invoked on the orchestration context, strictly in the
/// order `on_load_start`, `on_row_loaded` per row in store iteration order,
/// then `on_load_finish` or `on_load_error`. Callbacks from successive
/// executions never interleave.
pub trait LoadObserver: Send {
    fn on_load_start(&mut self) {}
    fn on_row_loaded(&mut self, row: Row) {
        let _ = row;
    }
    fn on_load_finish(&mut self) {}
    fn on_load_error(&mut self, error: DbError) {
        let _ = error;
    }
}

/// A re-runnable query execution.
///
/// Each `run` performs one full load, handing every produced row to `sink`
/// in order. Implemented by any matching closure; see
/// [`TableStore::reload_source`](crate::access::TableStore::reload_source)
/// for the usual way to obtain one.
pub trait QuerySource: Send + Sync {
    fn run(&self, sink: &mut dyn FnMut(Row)) -> Result<(), DbError>;
}

impl<F> QuerySource for F
where
    F: Fn(&mut dyn FnMut(Row)) -> Result<(), DbError> + Send + Sync,
{
    fn run(&self, sink: &mut dyn FnMut(Row)) -> Result<(), DbError> {
        self(sink)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoadState {
    Idle,
    Running,
    RunningWithPendingReload,
}

/// Coalescing driver for one observed query.
///
/// Cheap to clone; clones share the same execution state.
#[derive(Clone)]
pub struct ReloadCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    source: Arc<dyn QuerySource>,
    observer: Arc<Mutex<dyn LoadObserver>>,
    dispatcher: DispatcherHandle,
    pool: WorkerPool,
    state: Mutex<LoadState>,
}

impl ReloadCoordinator {
    pub fn new(
        source: impl QuerySource + 'static,
        observer: Arc<Mutex<dyn LoadObserver>>,
        dispatcher: DispatcherHandle,
        pool: WorkerPool,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                source: Arc::new(source),
                observer,
                dispatcher,
                pool,
                state: Mutex::new(LoadState::Idle),
            }),
        }
    }

    /// Requests a fresh execution of the query.
    ///
    /// Returns immediately. When idle this schedules an execution; while one
    /// is running it marks a single trailing re-run instead, no matter how
    /// many requests pile up.
    pub fn request_reload(&self) {
        let mut state = lock_state(&self.inner.state);
        match *state {
            LoadState::Idle => {
                *state = LoadState::Running;
                drop(state);
                debug!("reload scheduled");
                schedule(Arc::clone(&self.inner));
            }
            LoadState::Running => {
                *state = LoadState::RunningWithPendingReload;
                trace!("reload pending behind running execution");
            }
            LoadState::RunningWithPendingReload => {
                trace!("reload coalesced into pending re-run");
            }
        }
    }
}

/// Hands one execution to the worker context. The state is already
/// `Running` when this is called.
fn schedule(inner: Arc<CoordinatorInner>) {
    let pool = inner.pool.clone();
    pool.execute(move || run_once(inner));
}

fn run_once(inner: Arc<CoordinatorInner>) {
    post_to_observer(&inner, |observer| observer.on_load_start());

    let result = inner.source.run(&mut |row| {
        let observer = Arc::clone(&inner.observer);
        inner.dispatcher.post(move || {
            lock_observer(&observer).on_row_loaded(row);
        });
    });

    match result {
        Ok(()) => post_to_observer(&inner, |observer| observer.on_load_finish()),
        Err(error) => {
            debug!(%error, "load execution failed");
            post_to_observer(&inner, |observer| observer.on_load_error(error));
        }
    }

    // The terminal callback is already queued, so re-scheduling here keeps
    // the next execution's callbacks behind it in the dispatcher.
    let mut state = lock_state(&inner.state);
    match *state {
        LoadState::RunningWithPendingReload => {
            *state = LoadState::Running;
            drop(state);
            schedule(inner);
        }
        LoadState::Running => *state = LoadState::Idle,
        LoadState::Idle => unreachable!("execution finished while marked idle"),
    }
}

fn post_to_observer(
    inner: &Arc<CoordinatorInner>,
    callback: impl FnOnce(&mut dyn LoadObserver) + Send + 'static,
) {
    let observer = Arc::clone(&inner.observer);
    inner.dispatcher.post(move || {
        callback(&mut *lock_observer(&observer));
    });
}

fn lock_state(mutex: &Mutex<LoadState>) -> MutexGuard<'_, LoadState> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn lock_observer(mutex: &Mutex<dyn LoadObserver>) -> MutexGuard<'_, dyn LoadObserver + 'static> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
