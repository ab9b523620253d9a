//! Cancellation scopes owned by screen components.
//!
//! Every component that launches background work does so through its
//! [`Scope`]. Cancelling the scope (or dropping its last clone) aborts every
//! task it launched at whatever suspension point the task is parked on, so
//! no value is delivered after the owner is gone.

use crate::error::TaskError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{AbortHandle, JoinHandle};

struct ScopeInner {
    name: String,
    cancelled: AtomicBool,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl ScopeInner {
    fn abort_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let live = tasks.iter().filter(|task| !task.is_finished()).count();
        for task in tasks {
            task.abort();
        }
        live
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            let aborted = self.abort_all();
            if aborted > 0 {
                log::debug!("scope '{}' dropped, aborted {aborted} task(s)", self.name);
            }
        }
    }
}

/// Named cancellation scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name: name.into(),
                cancelled: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Spawn `future` on the current tokio runtime as part of this scope.
    ///
    /// Launching into a cancelled scope still returns a handle, but the task
    /// is aborted before it gets to run.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn launch<F>(&self, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            log::warn!("launch into cancelled scope '{}' ignored", self.inner.name);
            drop(future);
            let join = tokio::spawn(std::future::pending::<()>());
            join.abort();
            return TaskHandle { join };
        }
        let join = tokio::spawn(future);
        tasks.retain(|task| !task.is_finished());
        tasks.push(join.abort_handle());
        TaskHandle { join }
    }

    /// Abort every task launched in this scope. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let aborted = self.inner.abort_all();
        log::debug!("scope '{}' cancelled, aborted {aborted} task(s)", self.inner.name);
    }

    /// Number of launched tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }
}

/// Handle to a task launched in a [`Scope`].
///
/// Dropping the handle detaches it; the task keeps running until it ends or
/// its scope is cancelled.
#[derive(Debug)]
pub struct TaskHandle {
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub async fn join(self) -> Result<(), TaskError> {
        self.join.await.map_err(TaskError::from)
    }

    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Turn this handle into a guard that aborts the task when dropped.
    pub fn into_guard(self) -> TaskGuard {
        TaskGuard {
            abort: self.join.abort_handle(),
        }
    }
}

/// Aborts its task on drop.
#[derive(Debug)]
pub struct TaskGuard {
    abort: AbortHandle,
}

impl TaskGuard {
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.abort.abort();
    }
}
