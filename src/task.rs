//! Cooperative task queue on a virtual millisecond clock.
//!
//! Everything that happens "later" (event dispatch, callbacks, load
//! limit timers) is posted here and run by
//! [`FontSelector::advance_time`](crate::FontSelector::advance_time).

use alloc::collections::btree_map::BTreeMap;

use crate::{FontFaceId, SourceId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Task {
    /// Dispatch `loading` / `loadingdone` / `loadingerror` and settle `ready`.
    HandlePendingEvents,
    /// Notify everything waiting on a face that just loaded or failed.
    RunFaceCallbacks(FontFaceId),
    ShortLimitExceeded { face: FontFaceId, source: SourceId },
    LongLimitExceeded { face: FontFaceId, source: SourceId },
    LcpLimitReached,
    BuildUniqueNameLookup,
}

#[derive(Debug, Default, Clone)]
pub struct TaskQueue {
    now_ms: u64,
    seq: u64,
    queue: BTreeMap<(u64, u64), Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Runs at the current time, after everything already posted for it.
    pub fn post(&mut self, task: Task) {
        self.post_delayed(task, 0);
    }

    pub fn post_delayed(&mut self, task: Task, delay_ms: u64) {
        let due = self.now_ms.saturating_add(delay_ms);
        self.seq += 1;
        self.queue.insert((due, self.seq), task);
    }

    /// Removes and returns the next task due at or before the current time.
    pub fn pop_ready(&mut self) -> Option<Task> {
        let key = *self.queue.keys().next()?;
        if key.0 > self.now_ms {
            return None;
        }
        self.queue.remove(&key)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Moves the clock forward; never backwards.
    pub fn advance_to(&mut self, ms: u64) {
        self.now_ms = self.now_ms.max(ms);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
