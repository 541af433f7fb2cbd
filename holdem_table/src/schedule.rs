//! Cancellable delayed tasks.
//!
//! Everything that happens "later" at a table (turn clocks, card reveal
//! pacing, showdown pauses, reconnection grace windows) is an entry in a
//! [`Scheduler`]. Nothing runs on its own: the owner asks for the next
//! deadline, sleeps until then, and pops the tasks that are due. A cancelled
//! handle is removed from the queue, so it can never fire.
//!
//! Owners schedule follow-up tasks relative to the instant the current task
//! was due rather than the wall clock, so a late wakeup replays the same
//! sequence of events it would have produced on time.

use std::collections::BTreeMap;
use tokio::time::Instant;

/// Identifies one scheduled task. Handles are never reused.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TaskHandle(u64);

#[derive(Debug)]
pub struct Scheduler<T> {
    // Keyed by (due, handle) so that ties fire in scheduling order.
    queue: BTreeMap<(Instant, TaskHandle), T>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due: Instant, task: T) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.queue.insert((due, handle), task);
        handle
    }

    /// Drop a task before it fires. Returns the task if it was still pending.
    pub fn cancel(&mut self, handle: TaskHandle) -> Option<T> {
        let key = self.queue.keys().find(|(_, h)| *h == handle).copied()?;
        self.queue.remove(&key)
    }

    /// Cancel whatever `slot` holds and leave it empty.
    pub fn cancel_slot(&mut self, slot: &mut Option<TaskHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    /// Arm `slot` with a new task due at `due`, cancelling the one it held.
    pub fn rearm(&mut self, slot: &mut Option<TaskHandle>, due: Instant, task: T) {
        self.cancel_slot(slot);
        *slot = Some(self.schedule_at(due, task));
    }

    #[must_use]
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.queue.keys().any(|(_, h)| *h == handle)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Remove and return the earliest task due at or before `now`, along
    /// with the instant it was due.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, TaskHandle, T)> {
        let (due, _) = *self.queue.keys().next()?;
        if due > now {
            return None;
        }
        self.queue.pop_first().map(|((due, handle), task)| (due, handle, task))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    #[test]
    fn test_pops_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.schedule_at(now + Duration::from_secs(2), "late");
        scheduler.schedule_at(now + Duration::from_secs(1), "early");

        assert_eq!(scheduler.next_deadline(), Some(now + Duration::from_secs(1)));
        assert!(scheduler.pop_due(now).is_none());

        let later = now + Duration::from_secs(5);
        assert_eq!(scheduler.pop_due(later).map(|(_, _, t)| t), Some("early"));
        assert_eq!(scheduler.pop_due(later).map(|(_, _, t)| t), Some("late"));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_ties_fire_in_scheduling_order() {
        let mut scheduler = Scheduler::new();
        let due = Instant::now();
        scheduler.schedule_at(due, 1);
        scheduler.schedule_at(due, 2);
        assert_eq!(scheduler.pop_due(due).map(|(_, _, t)| t), Some(1));
        assert_eq!(scheduler.pop_due(due).map(|(_, _, t)| t), Some(2));
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let handle = scheduler.schedule_at(now, "stale");
        assert!(scheduler.is_pending(handle));
        assert_eq!(scheduler.cancel(handle), Some("stale"));
        assert!(!scheduler.is_pending(handle));
        assert!(scheduler.pop_due(now + Duration::from_secs(60)).is_none());
        // Cancelling twice is harmless.
        assert_eq!(scheduler.cancel(handle), None);
    }

    #[test]
    fn test_rearm_replaces_previous_task() {
        let mut scheduler = Scheduler::new();
        let mut slot = None;
        let due = Instant::now() + Duration::from_secs(30);
        scheduler.rearm(&mut slot, due, "first");
        scheduler.rearm(&mut slot, due, "second");
        assert_eq!(scheduler.len(), 1);

        let far = Instant::now() + Duration::from_secs(60);
        assert_eq!(scheduler.pop_due(far).map(|(_, _, t)| t), Some("second"));

        scheduler.cancel_slot(&mut slot);
        assert!(slot.is_none());
    }
}
