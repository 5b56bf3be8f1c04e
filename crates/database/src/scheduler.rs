//! FIFO task queue standing in for the host's event loop.
//!
//! Units of work are queued instead of run inline, so every caller sees the same
//! ordering an asynchronous host would give it: requests return first, results
//! arrive when the queue is drained.

use ripple_core::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::trace;

/// A queued unit of work. An `Err` stops the drain.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// FIFO queue of tasks.
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task.
    pub fn push(&self, task: impl FnOnce() -> Result<()> + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Returns the number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Runs tasks until the queue is empty, including tasks queued while draining.
    ///
    /// Returns the number of tasks run. The first failing task stops the drain and
    /// its error is returned; the remaining tasks stay queued.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut ran = 0;
        loop {
            // The borrow ends before the task runs, so tasks may queue more tasks.
            let Some(task) = self.tasks.borrow_mut().pop_front() else {
                break;
            };
            ran += 1;
            task()?;
        }
        if ran > 0 {
            trace!(ran, "task queue idle");
        }
        Ok(ran)
    }
}
