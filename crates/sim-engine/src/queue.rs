//! Future-event set.
//!
//! A binary-heap event queue keyed by (timestamp, insertion sequence).
//! Events with equal timestamps fire in the order they were scheduled, so a
//! run is fully deterministic. Cancellation is by tombstone: a cancelled
//! entry stays in the heap but is skipped when it surfaces, which keeps
//! `cancel` O(1) instead of rebuilding the heap.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use tracing::trace;

use crate::time::{SimDuration, SimTime};
use crate::{EngineError, Result};

/// Identifies a scheduled event so it can be cancelled before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Scheduled<E> {
    time: SimTime,
    seq: u64,
    handle: TimerHandle,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// The future-event set plus the simulation clock.
///
/// The clock only advances when an event is popped, and it never moves
/// backwards: scheduling strictly before `now()` is an error.
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Reverse<Scheduled<E>>>,
    live: HashSet<TimerHandle>,
    now: SimTime,
    next_seq: u64,
    next_handle: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            now: SimTime::ZERO,
            next_seq: 0,
            next_handle: 0,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of scheduled events that have not fired or been cancelled.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Schedule `event` at an absolute timestamp. `time == now()` is
    /// allowed and fires after events already queued for that instant.
    pub fn schedule_at(&mut self, time: SimTime, event: E) -> Result<TimerHandle> {
        if time < self.now {
            return Err(EngineError::ScheduledInPast {
                time,
                now: self.now,
            });
        }
        Ok(self.push(time, event))
    }

    /// Schedule `event` at `now() + delay`. Cannot land in the past.
    pub fn schedule_after(&mut self, delay: SimDuration, event: E) -> TimerHandle {
        self.push(self.now + delay, event)
    }

    fn push(&mut self, time: SimTime, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(handle);
        self.heap.push(Reverse(Scheduled {
            time,
            seq,
            handle,
            event,
        }));
        handle
    }

    /// Cancel a pending event. Returns `false` if the event already fired
    /// or was cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let was_live = self.live.remove(&handle);
        if was_live {
            trace!(?handle, "timer cancelled");
        }
        was_live
    }

    /// Pop the next live event and advance the clock to its timestamp.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        loop {
            let Reverse(top) = self.heap.pop()?;
            if self.live.remove(&top.handle) {
                self.now = top.time;
                return Some((top.time, top.event));
            }
        }
    }

    /// Pop the next live event only if it is due at or before `horizon`.
    pub fn pop_before(&mut self, horizon: SimTime) -> Option<(SimTime, E)> {
        self.prune();
        match self.heap.peek() {
            Some(Reverse(top)) if top.time <= horizon => self.pop(),
            _ => None,
        }
    }

    /// Timestamp of the next live event, if any.
    pub fn next_time(&mut self) -> Option<SimTime> {
        self.prune();
        self.heap.peek().map(|Reverse(top)| top.time)
    }

    fn prune(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.live.contains(&top.handle) {
                break;
            }
            self.heap.pop();
        }
    }

    fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain and dispatch every event due at or before `horizon`, in timestamp
/// order. Handlers receive the queue and may schedule or cancel events.
/// When the loop ends the clock sits exactly on `horizon`, even if the
/// queue drained early. Returns the number of events dispatched.
pub fn run_until<E>(
    queue: &mut EventQueue<E>,
    horizon: SimTime,
    mut dispatch: impl FnMut(&mut EventQueue<E>, SimTime, E),
) -> usize {
    let mut dispatched = 0usize;
    while let Some((time, event)) = queue.pop_before(horizon) {
        dispatch(queue, time, event);
        dispatched += 1;
    }
    queue.advance_to(horizon);
    trace!(events = dispatched, clock = %queue.now(), "run loop drained");
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_fire_in_timestamp_order() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_secs(3), "late").unwrap();
        q.schedule_at(SimTime::from_secs(1), "early").unwrap();
        q.schedule_at(SimTime::from_secs(2), "middle").unwrap();

        let mut fired = Vec::new();
        while let Some((time, ev)) = q.pop() {
            fired.push((time.as_nanos() / 1_000_000_000, ev));
        }
        assert_eq!(fired, vec![(1, "early"), (2, "middle"), (3, "late")]);
    }

    #[test]
    fn equal_timestamps_fire_in_schedule_order() {
        let mut q = EventQueue::new();
        let t = SimTime::from_secs(5);
        q.schedule_at(t, "first").unwrap();
        q.schedule_at(t, "second").unwrap();
        q.schedule_at(t, "third").unwrap();

        let mut fired = Vec::new();
        while let Some((_, ev)) = q.pop() {
            fired.push(ev);
        }
        assert_eq!(fired, vec!["first", "second", "third"]);
    }

    #[test]
    fn cancelled_event_never_fires() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_secs(1), "keep").unwrap();
        let doomed = q.schedule_at(SimTime::from_secs(2), "drop").unwrap();
        assert!(q.cancel(doomed));
        assert_eq!(q.len(), 1);

        let mut fired = Vec::new();
        while let Some((_, ev)) = q.pop() {
            fired.push(ev);
        }
        assert_eq!(fired, vec!["keep"]);
    }

    #[test]
    fn cancel_after_fire_reports_false() {
        let mut q = EventQueue::new();
        let h = q.schedule_at(SimTime::from_secs(1), ()).unwrap();
        assert!(q.pop().is_some());
        assert!(!q.cancel(h));
        assert!(!q.cancel(h));
    }

    #[test]
    fn scheduling_in_the_past_is_rejected() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_secs(10), ()).unwrap();
        q.pop();
        assert_eq!(q.now(), SimTime::from_secs(10));

        let err = q.schedule_at(SimTime::from_secs(9), ()).unwrap_err();
        assert_eq!(
            err,
            EngineError::ScheduledInPast {
                time: SimTime::from_secs(9),
                now: SimTime::from_secs(10),
            }
        );
        // Exactly `now` is still legal.
        assert!(q.schedule_at(SimTime::from_secs(10), ()).is_ok());
    }

    #[test]
    fn run_until_stops_on_the_horizon() {
        let mut q = EventQueue::new();
        for s in [1u64, 2, 3] {
            q.schedule_at(SimTime::from_secs(s), s).unwrap();
        }

        let mut fired = Vec::new();
        let n = run_until(&mut q, SimTime::from_secs(2), |_, _, ev| fired.push(ev));
        assert_eq!(n, 2);
        assert_eq!(fired, vec![1, 2]);
        assert_eq!(q.now(), SimTime::from_secs(2));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn clock_reaches_horizon_when_queue_drains_early() {
        let mut q: EventQueue<()> = EventQueue::new();
        q.schedule_at(SimTime::from_secs(1), ()).unwrap();
        run_until(&mut q, SimTime::from_secs(60), |_, _, _| {});
        assert_eq!(q.now(), SimTime::from_secs(60));
        assert!(q.is_empty());
    }

    #[test]
    fn handlers_can_reschedule_periodic_events() {
        let mut q = EventQueue::new();
        let interval = SimDuration::from_secs(10);
        q.schedule_after(interval, "tick");

        let mut ticks = 0;
        run_until(&mut q, SimTime::from_secs(60), |q, _, _| {
            ticks += 1;
            q.schedule_after(interval, "tick");
        });
        // Ticks at 10, 20, 30, 40, 50, 60.
        assert_eq!(ticks, 6);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn next_time_skips_tombstones() {
        let mut q = EventQueue::new();
        let dead = q.schedule_at(SimTime::from_secs(1), ()).unwrap();
        q.schedule_at(SimTime::from_secs(4), ()).unwrap();
        q.cancel(dead);
        assert_eq!(q.next_time(), Some(SimTime::from_secs(4)));
    }
}
