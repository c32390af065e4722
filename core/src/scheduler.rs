//! One-shot timers keyed by game cycle.
//!
//! Each pending timer goes `Scheduled -> Fired` or `Scheduled -> Cancelled`
//! and is discarded right after; a handle never fires twice. Timers due on
//! the same cycle fire in the order they were (re)scheduled.
//!
//! The scheduler owns the payloads. Whoever scheduled a timer only keeps the
//! [`TimerHandle`], which is a plain id and never keeps anything alive.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use hashbrown::HashMap;
use tickfx_types::GameCycle;

/// Stale heap entries tolerated before the queue is rebuilt
const COMPACT_THRESHOLD: usize = 64;

/// Cancellable reference to a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A timer that came due during [`Scheduler::advance`] / [`Scheduler::pop_due`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer<T> {
    pub handle: TimerHandle,
    pub due: GameCycle,
    pub payload: T,
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    due: GameCycle,
    seq: u64,
    handle: TimerHandle,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.due.cmp(&other.due) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            o => o,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingTimer<T> {
    due: GameCycle,
    seq: u64,
    payload: T,
}

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: GameCycle,
    next_seq: u64,
    next_handle: u64,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    pending: HashMap<TimerHandle, PendingTimer<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            next_handle: 1,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Latest cycle the scheduler has been advanced to
    pub fn now(&self) -> GameCycle {
        self.now
    }

    /// Move the scheduler's notion of "now" forward without firing anything
    pub fn sync(&mut self, current: GameCycle) {
        self.now = self.now.max(current);
    }

    /// Schedule `payload` to fire `ticks_from_now` cycles after [`Self::now`]
    pub fn schedule(&mut self, ticks_from_now: u64, payload: T) -> TimerHandle {
        self.schedule_at(self.now.saturating_add(ticks_from_now), payload)
    }

    /// Schedule `payload` to fire on cycle `due`. A cycle already in the past
    /// fires on the next advance.
    pub fn schedule_at(&mut self, due: GameCycle, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let seq = self.bump_seq();

        self.pending.insert(handle, PendingTimer { due, seq, payload });
        self.queue.push(Reverse(QueueEntry { due, seq, handle }));
        handle
    }

    /// Move a pending timer to `ticks_from_now` cycles after [`Self::now`].
    /// Returns false if the timer already fired or was cancelled.
    pub fn reschedule(&mut self, handle: TimerHandle, ticks_from_now: u64) -> bool {
        self.reschedule_at(handle, self.now.saturating_add(ticks_from_now))
    }

    /// Move a pending timer to cycle `due`. The timer goes to the back of the
    /// line for that cycle.
    pub fn reschedule_at(&mut self, handle: TimerHandle, due: GameCycle) -> bool {
        let seq = self.next_seq;
        let Some(timer) = self.pending.get_mut(&handle) else {
            return false;
        };
        timer.due = due;
        timer.seq = seq;
        self.next_seq += 1;
        self.queue.push(Reverse(QueueEntry { due, seq, handle }));
        true
    }

    /// Cancel a pending timer, handing back its payload. Cancelling a handle
    /// that already fired or was cancelled is a no-op returning `None`.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let timer = self.pending.remove(&handle)?;
        self.maybe_compact();
        Some(timer.payload)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn due_cycle(&self, handle: TimerHandle) -> Option<GameCycle> {
        self.pending.get(&handle).map(|t| t.due)
    }

    pub fn payload(&self, handle: TimerHandle) -> Option<&T> {
        self.pending.get(&handle).map(|t| &t.payload)
    }

    /// Number of timers still waiting to fire
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pop the next timer due at or before `current`, if any.
    ///
    /// Timers scheduled while draining that are already due are returned by
    /// later calls within the same cycle.
    pub fn pop_due(&mut self, current: GameCycle) -> Option<FiredTimer<T>> {
        self.sync(current);
        loop {
            let Reverse(entry) = *self.queue.peek()?;
            if entry.due > current {
                return None;
            }
            self.queue.pop();

            // Entries left behind by cancel/reschedule no longer match
            let live = self
                .pending
                .get(&entry.handle)
                .is_some_and(|t| t.seq == entry.seq);
            if !live {
                continue;
            }
            if let Some(timer) = self.pending.remove(&entry.handle) {
                return Some(FiredTimer {
                    handle: entry.handle,
                    due: timer.due,
                    payload: timer.payload,
                });
            }
        }
    }

    /// Fire every timer due at or before `current`, in order
    pub fn advance(&mut self, current: GameCycle) -> Vec<FiredTimer<T>> {
        let mut fired = Vec::new();
        while let Some(timer) = self.pop_due(current) {
            fired.push(timer);
        }
        fired
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn maybe_compact(&mut self) {
        if self.queue.len() < COMPACT_THRESHOLD || self.queue.len() < self.pending.len() * 4 {
            return;
        }
        self.queue = self
            .pending
            .iter()
            .map(|(handle, t)| {
                Reverse(QueueEntry {
                    due: t.due,
                    seq: t.seq,
                    handle: *handle,
                })
            })
            .collect();
    }
}
