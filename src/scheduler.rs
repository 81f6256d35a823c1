//! Cooperative, single-threaded task queue.
//!
//! Evaluations that run past their time slice park themselves here as a
//! deferred task and return. The host decides when queued work runs, either
//! one task at a time or until the queue is empty.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

/// FIFO run queue of deferred tasks
#[derive(Default)]
pub struct Scheduler {
    queue: RefCell<VecDeque<Task>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run after everything already queued
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Run the oldest queued task. Returns false when the queue was empty.
    pub fn run_one(&self) -> bool {
        // The queue borrow ends before the task runs, so tasks may defer more work.
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks queued along the
    /// way. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        while self.run_one() {
            count += 1;
        }
        log::trace!("scheduler idle after {count} tasks");
        count
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}
