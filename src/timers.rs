// Per-room timer queue
//
// Every delayed action in a room (fuses, slide steps, bot think cycles, sudden
// death ticks, round transitions) is an entry in this queue. The room actor
// sleeps until the earliest deadline and then pops due entries in order, so
// all callbacks run inside the room's single serialized context. Handles are
// plain ids stored on the owning bomb or room, and cancelling one is an
// explicit call.

use std::collections::{BTreeMap, HashMap};

use crate::types::{BombId, PlayerId};

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Fuse(BombId),
    SlideStep(BombId),
    BotThink(PlayerId),
    RoundClock,
    SuddenDeathTick,
    AnnounceRound,
    NextRound,
}

/// Virtual-clock timer queue, milliseconds since the room opened
#[derive(Debug, Default)]
pub struct TimerQueue {
    now_ms: u64,
    next_id: u64,
    queue: BTreeMap<(u64, TimerId), TimerKind>,
    deadlines: HashMap<TimerId, u64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current room time
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Moves the clock forward. The clock never runs backwards.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Schedules `kind` to fire `delay_ms` from now
    pub fn schedule(&mut self, delay_ms: u64, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let deadline = self.now_ms + delay_ms;
        self.queue.insert((deadline, id), kind);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancels a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.queue.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pops the earliest timer due at or before `until`, advancing the clock
    /// to its deadline so anything it reschedules is relative to that instant.
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerId, TimerKind)> {
        let (&(deadline, id), _) = self.queue.iter().next()?;
        if deadline > until {
            return None;
        }

        let kind = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        self.set_now(deadline);
        Some((id, kind))
    }

    /// Drops every pending timer
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
