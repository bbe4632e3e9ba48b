//! FIFO holding area for tasks that have not started yet.

use std::collections::VecDeque;

use super::task::{TaskId, TaskRecord};

/// Ordered queue of pending tasks.
///
/// New submissions go to the tail; retries go to the head so they run ahead
/// of work submitted after them. No depth limit is enforced.
pub(crate) struct TaskQueue<P, R> {
    tasks: VecDeque<TaskRecord<P, R>>,
}

impl<P, R> TaskQueue<P, R> {
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Append a newly submitted task.
    pub fn push_back(&mut self, task: TaskRecord<P, R>) {
        self.tasks.push_back(task);
    }

    /// Re-insert a task ahead of everything else.
    pub fn push_front(&mut self, task: TaskRecord<P, R>) {
        self.tasks.push_front(task);
    }

    /// Next task to admit.
    pub fn pop_front(&mut self) -> Option<TaskRecord<P, R>> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord<P, R>> {
        self.tasks.iter()
    }

    pub fn find(&self, id: TaskId) -> Option<&TaskRecord<P, R>> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Remove and return every queued task in order.
    pub fn drain(&mut self) -> impl Iterator<Item = TaskRecord<P, R>> + '_ {
        self.tasks.drain(..)
    }
}
