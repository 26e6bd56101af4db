//! Deferred work queue driven by the injected clock.
//!
//! Tasks are keyed: scheduling a task that is already queued replaces it.
//! Nothing runs on its own; [`Master::pump`](crate::Master::pump) pops due
//! tasks one at a time and executes them on the control thread.

use crate::types::{BindingId, ManagerId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredTask {
    /// Sweep orphaned provisional sessions, then refresh every manager.
    Startup,
    /// Release the session's bridge once the grace window has passed.
    ReleaseSession(SessionId),
    /// Issue the bridge `play` for a binding configured with a start delay.
    DelayedStart(BindingId),
}

#[derive(Debug, Clone)]
struct Entry {
    task: DeferredTask,
    due_millis: i64,
    scope: Option<ManagerId>,
    seq: u64,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` at `due_millis`, replacing any queued instance.
    pub fn schedule(&mut self, task: DeferredTask, due_millis: i64, scope: Option<ManagerId>) {
        self.cancel(&task);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry {
            task,
            due_millis,
            scope,
            seq,
        });
    }

    pub fn cancel(&mut self, task: &DeferredTask) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.task != *task);
        before != self.entries.len()
    }

    /// Drop every task scoped to `manager`.
    pub fn cancel_scope(&mut self, manager: ManagerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.scope != Some(manager));
        before - self.entries.len()
    }

    pub fn is_scheduled(&self, task: &DeferredTask) -> bool {
        self.entries.iter().any(|entry| entry.task == *task)
    }

    /// Sequence number the next scheduled task will receive.
    ///
    /// Passing it to [`pop_due`](Self::pop_due) limits a pass to work that
    /// was queued before the pass started.
    pub fn watermark(&self) -> u64 {
        self.next_seq
    }

    /// Remove and return the earliest due task queued before `watermark`,
    /// FIFO among equal due times.
    pub fn pop_due(&mut self, now_millis: i64, watermark: u64) -> Option<DeferredTask> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due_millis <= now_millis && entry.seq < watermark)
            .min_by_key(|(_, entry)| (entry.due_millis, entry.seq))
            .map(|(index, _)| index)?;
        Some(self.entries.swap_remove(index).task)
    }

    pub fn next_due(&self) -> Option<i64> {
        self.entries.iter().map(|entry| entry.due_millis).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
