//! Deferred task queue for the same-thread fallback.
//!
//! Tasks posted here do not run when they are posted. They run the next
//! time the owner drains the queue, which is what gives fallback execution
//! the same "completes later" contract as the background executor.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// A boxed task closure producing `T`.
type BoxedTask<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Queue of tasks waiting for the next tick.
pub(crate) struct TaskQueue<T> {
    tasks: VecDeque<BoxedTask<T>>,
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Post a task to be executed on the next tick.
    pub fn post<F>(&mut self, task: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.tasks.push_back(Box::new(task));
    }

    pub fn has_pending(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Remove every task queued so far, in posting order.
    ///
    /// Tasks posted after this call belong to the following tick.
    pub fn take_all(&mut self) -> VecDeque<BoxedTask<T>> {
        std::mem::take(&mut self.tasks)
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe wrapper around `TaskQueue`.
pub(crate) struct SharedTaskQueue<T> {
    inner: Mutex<TaskQueue<T>>,
}

impl<T> SharedTaskQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TaskQueue::new()),
        }
    }

    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.inner.lock().post(task);
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock().has_pending()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending_count()
    }

    /// Run every task queued before this call and collect their outputs.
    ///
    /// The lock is released before any task runs.
    pub fn run_tick(&self) -> Vec<T> {
        let tasks = self.inner.lock().take_all();
        tasks.into_iter().map(|task| task()).collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl<T> Default for SharedTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
