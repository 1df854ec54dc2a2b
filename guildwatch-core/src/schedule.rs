//! Deferred re-checks as explicit, data-only tasks.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use guildwatch_schema::{ActorId, GuildId, NoticeId};

/// A deferred callback. Carries keys only; handlers look up current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Re-test a warned actor when its grace period ends.
    SpamGraceRecheck {
        guild: GuildId,
        actor: ActorId,
        deadline_ms: u64,
    },
    /// Remove a transient public warning.
    DeleteNotice { guild: GuildId, notice: NoticeId },
    RaidExpiry { guild: GuildId, generation: u64 },
    NukeExpiry { guild: GuildId, generation: u64 },
}

#[derive(Debug)]
struct Entry {
    due_ms: u64,
    seq: u64,
    task: ScheduledTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ms
            .cmp(&other.due_ms)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of tasks ordered by due time, then by scheduling order.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, task: ScheduledTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due_ms, seq, task }));
    }

    /// Pop the earliest task if it is due at `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(u64, ScheduledTask)> {
        if self.next_due()? > now_ms {
            return None;
        }
        self.queue.pop().map(|Reverse(e)| (e.due_ms, e.task))
    }

    /// Pop the earliest task regardless of time.
    pub fn pop_next(&mut self) -> Option<(u64, ScheduledTask)> {
        self.queue.pop().map(|Reverse(e)| (e.due_ms, e.task))
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(e)| e.due_ms)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
