//! Virtual-time timer queue.
//!
//! Every simulated delay in carepal (call progression, payment processing,
//! auto-confirmation) is an entry in a [`TimerQueue`] owned by the component
//! that armed it. Time only moves when the owner advances the queue, so tests
//! are deterministic. [`drive_realtime`] ties a queue to the tokio clock for
//! interactive use.

use std::time::Duration;

use tracing::trace;

/// Handle to a scheduled timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer that has come due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    /// The timer that fired.
    pub id: TimerId,
    /// Virtual time at which it fired.
    pub at: Duration,
    /// The payload it was armed with.
    pub event: E,
}

#[derive(Debug)]
struct Entry<E> {
    id: TimerId,
    deadline: Duration,
    event: E,
}

/// Ordered set of pending timers over a virtual clock that starts at zero.
///
/// Timers with equal deadlines fire in the order they were scheduled.
#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry<E>>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<E> TimerQueue<E> {
    /// Create an empty queue at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arm a timer `delay` after the current virtual time.
    pub fn schedule_after(&mut self, delay: Duration, event: E) -> TimerId {
        self.schedule_at(self.now + delay, event)
    }

    /// Arm a timer at an absolute virtual time. Deadlines in the past fire on
    /// the next advance.
    pub fn schedule_at(&mut self, deadline: Duration, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        trace!(timer = id.0, deadline_ms = deadline.as_millis(), "timer armed");
        self.entries.push(Entry {
            id,
            deadline,
            event,
        });
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Cancel every pending timer, returning how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// moving virtual time to its deadline.
    ///
    /// Callers loop on this so that handlers may arm new timers which still
    /// fire within the same advance, then call [`settle`](Self::settle).
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired<E>> {
        // ids increase with scheduling order, so (deadline, id) is FIFO on ties
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= until)
            .min_by_key(|(_, e)| (e.deadline, e.id))
            .map(|(i, _)| i)?;

        let entry = self.entries.swap_remove(index);
        self.now = self.now.max(entry.deadline);
        trace!(timer = entry.id.0, at_ms = self.now.as_millis(), "timer fired");
        Some(Fired {
            id: entry.id,
            at: self.now,
            event: entry.event,
        })
    }

    /// Move virtual time to `until` once every due timer has been popped.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    /// Advance by `by`, returning every timer that came due in order.
    ///
    /// Use this when handling a timer never arms another one.
    pub fn advance_by(&mut self, by: Duration) -> Vec<Fired<E>> {
        let until = self.now + by;
        let mut fired = Vec::new();
        while let Some(f) = self.pop_due(until) {
            fired.push(f);
        }
        self.settle(until);
        fired
    }
}

/// Something that owns timers and reacts to virtual time advancing.
pub trait Timed {
    /// What one advance reports.
    type Step;

    /// Virtual time elapsed so far.
    fn elapsed(&self) -> Duration;

    /// Earliest pending deadline, if any timer is armed.
    fn next_deadline(&self) -> Option<Duration>;

    /// Advance virtual time by `by`, firing due timers.
    fn advance(&mut self, by: Duration) -> Vec<Self::Step>;
}

/// Run `timed` in virtual time until it has no pending timers or `limit` is
/// reached, handing every step to `on_step`.
pub fn drive_virtual<T: Timed>(timed: &mut T, limit: Duration, mut on_step: impl FnMut(&T::Step)) {
    while let Some(deadline) = timed.next_deadline() {
        if deadline > limit {
            break;
        }
        let by = deadline.saturating_sub(timed.elapsed());
        for step in timed.advance(by) {
            on_step(&step);
        }
    }
}

/// Like [`drive_virtual`], but sleeps on the tokio clock between deadlines so
/// the timeline plays out in real time.
pub async fn drive_realtime<T: Timed>(
    timed: &mut T,
    limit: Duration,
    mut on_step: impl FnMut(&T::Step),
) {
    while let Some(deadline) = timed.next_deadline() {
        if deadline > limit {
            break;
        }
        let by = deadline.saturating_sub(timed.elapsed());
        tokio::time::sleep(by).await;
        for step in timed.advance(by) {
            on_step(&step);
        }
    }
}
