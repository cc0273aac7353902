// Copyright (c) 2025 Zensical and contributors

// SPDX-License-Identifier: MIT
// Third-party contributions licensed under DCO

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:

// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NON-INFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

// ----------------------------------------------------------------------------

//! Timer queue.

use ahash::AHashMap;
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Number of stale heap entries tolerated beyond the number of live jobs.
const SLACK: usize = 64;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Timer handle.
///
/// Handles are issued in insertion order, which is also the tie-breaker for
/// jobs scheduled at the same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Heap entry, ordered as a min-heap on fire time, then insertion order.
#[derive(Debug, PartialEq, Eq)]
struct Entry {
    /// Fire time.
    at: Instant,
    /// Timer handle.
    id: TimerId,
}

/// Timer queue.
///
/// Jobs live in a map keyed by handle, while the heap only holds handles and
/// fire times. Cancelling removes the job from the map and leaves its heap
/// entry behind, which is skipped once it surfaces. Once stale entries
/// outnumber live jobs, the heap is compacted, so its size stays bounded by
/// the number of live jobs, no matter how often jobs are rescheduled. Firing works on a snapshot
/// of the expired handles, so handlers can schedule and cancel freely while
/// a batch is being fired: cancelled jobs in the batch are skipped, and newly
/// scheduled jobs wait for the next batch even if already expired.
///
/// # Examples
///
/// ```
/// use hio::TimerQueue;
/// use std::time::{Duration, Instant};
///
/// // Create timer queue and schedule jobs
/// let mut timers = TimerQueue::new();
/// let now = Instant::now();
/// timers.schedule(now + Duration::from_secs(30), 30);
/// timers.schedule(now + Duration::from_secs(10), 10);
/// timers.schedule(now + Duration::from_secs(20), 20);
///
/// // Fire all jobs in fire-time order
/// let mut fired = Vec::new();
/// timers.run_expired(now + Duration::from_secs(31), |_, _, job| {
///     fired.push(job);
/// });
/// assert_eq!(fired, [10, 20, 30]);
/// ```
pub struct TimerQueue<J> {
    /// Fire times and handles.
    heap: BinaryHeap<Entry>,
    /// Live jobs by handle.
    jobs: AHashMap<TimerId, J>,
    /// Next handle.
    next: u64,
}

/// Back-pointer slot for a scheduled job.
///
/// The slot holds the handle of the job scheduled through it, and is cleared
/// right before the job runs, so cancelling through the slot from inside the
/// handler is a no-op, and scheduling through it again re-arms the slot.
#[derive(Clone, Default)]
pub struct TimerSlot {
    /// Shared handle.
    inner: Rc<Cell<Option<TimerId>>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<J> TimerQueue<J> {
    /// Creates a timer queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            jobs: AHashMap::new(),
            next: 0,
        }
    }

    /// Schedules a job to fire at or after the given instant.
    pub fn schedule(&mut self, at: Instant, job: J) -> TimerId {
        let id = TimerId(self.next);
        self.next += 1;
        self.heap.push(Entry { at, id });
        self.jobs.insert(id, job);
        id
    }

    /// Cancels the job with the given handle, returning it if it was live.
    pub fn cancel(&mut self, id: TimerId) -> Option<J> {
        let job = self.jobs.remove(&id);
        if self.jobs.is_empty() {
            self.heap.clear();
        } else if self.heap.len() > 2 * self.jobs.len() + SLACK {
            let jobs = &self.jobs;
            self.heap.retain(|entry| jobs.contains_key(&entry.id));
        }
        job
    }

    /// Returns whether the job with the given handle is still scheduled.
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Returns the fire time of the earliest live job.
    pub fn next_expiry(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if self.jobs.contains_key(&entry.id) {
                return Some(entry.at);
            }
            self.heap.pop();
        }
        None
    }

    /// Removes and returns the handles of all live jobs due at `now`, in
    /// fire-time order. The jobs themselves stay in the queue until they
    /// are taken with [`TimerQueue::cancel`].
    pub fn expired(&mut self, now: Instant) -> Vec<TimerId> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.at > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                if self.jobs.contains_key(&entry.id) {
                    expired.push(entry.id);
                }
            }
        }
        expired
    }

    /// Fires all jobs due at `now`, returning how many were fired.
    ///
    /// The handler receives the queue itself, so it can reschedule or cancel
    /// other jobs while the batch is being fired.
    pub fn run_expired<F>(&mut self, now: Instant, mut f: F) -> usize
    where
        F: FnMut(&mut Self, TimerId, J),
    {
        let mut fired = 0;
        for id in self.expired(now) {
            if let Some(job) = self.jobs.remove(&id) {
                f(self, id, job);
                fired += 1;
            }
        }
        fired
    }
}

#[allow(clippy::must_use_candidate)]
impl<J> TimerQueue<J> {
    /// Returns the number of live jobs.
    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns whether there are no live jobs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

// ----------------------------------------------------------------------------

impl TimerSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle currently held by the slot.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<TimerId> {
        self.inner.get()
    }

    /// Returns whether the slot holds a scheduled job.
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Stores a handle in the slot, returning the previous one.
    #[inline]
    pub(crate) fn replace(&self, id: Option<TimerId>) -> Option<TimerId> {
        self.inner.replace(id)
    }

    /// Clears the slot, but only if it still holds the given handle.
    #[inline]
    pub(crate) fn clear_if(&self, id: TimerId) {
        if self.inner.get() == Some(id) {
            self.inner.set(None);
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed, so the earliest fire time surfaces first
        other.at.cmp(&self.at).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ----------------------------------------------------------------------------

impl<J> Default for TimerQueue<J> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<J> fmt::Debug for TimerQueue<J> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("jobs", &self.jobs.len())
            .field("entries", &self.heap.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("TimerSlot").field(&self.inner.get()).finish()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_fires_in_fire_time_order() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        timers.schedule(t + secs(30), 30);
        timers.schedule(t + secs(10), 10);
        timers.schedule(t + secs(20), 20);

        let mut fired = Vec::new();
        let n = timers.run_expired(t + secs(31), |_, _, job| fired.push(job));
        assert_eq!(n, 3);
        assert_eq!(fired, [10, 20, 30]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_ties_fire_in_insertion_order() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        for job in 0..5 {
            timers.schedule(t, job);
        }

        let mut fired = Vec::new();
        timers.run_expired(t, |_, _, job| fired.push(job));
        assert_eq!(fired, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_only_due_jobs_fire() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        timers.schedule(t + secs(1), "a");
        timers.schedule(t + secs(5), "b");

        let mut fired = Vec::new();
        timers.run_expired(t + secs(2), |_, _, job| fired.push(job));
        assert_eq!(fired, ["a"]);
        assert_eq!(timers.next_expiry(), Some(t + secs(5)));
    }

    #[test]
    fn test_cancel_skips_job() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        let a = timers.schedule(t + secs(1), "a");
        timers.schedule(t + secs(2), "b");

        assert_eq!(timers.cancel(a), Some("a"));
        assert_eq!(timers.cancel(a), None);
        assert_eq!(timers.next_expiry(), Some(t + secs(2)));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_handler_cancels_job_in_same_batch() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        timers.schedule(t, 0);
        let victim = timers.schedule(t, 1);
        timers.schedule(t, 2);

        let mut fired = Vec::new();
        timers.run_expired(t, |timers, _, job| {
            if job == 0 {
                timers.cancel(victim);
            }
            fired.push(job);
        });
        assert_eq!(fired, [0, 2]);
    }

    #[test]
    fn test_rescheduled_job_waits_for_next_batch() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        timers.schedule(t, 0);

        let mut fired = Vec::new();
        timers.run_expired(t, |timers, _, job| {
            fired.push(job);
            timers.schedule(t, job + 1);
        });
        assert_eq!(fired, [0]);
        assert_eq!(timers.len(), 1);

        timers.run_expired(t, |_, _, job| fired.push(job));
        assert_eq!(fired, [0, 1]);
    }

    #[test]
    fn test_cancel_self_while_firing_is_noop() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        timers.schedule(t, ());

        let mut cancelled = None;
        timers.run_expired(t, |timers, id, ()| {
            cancelled = Some(timers.cancel(id));
        });
        assert_eq!(cancelled, Some(None));
    }

    #[test]
    fn test_rescheduling_keeps_heap_bounded() {
        let mut timers = TimerQueue::new();
        let t = Instant::now();
        timers.schedule(t + secs(5), 0);

        // Re-arm a second job over and over, as read timeouts do
        let mut prev = timers.schedule(t + secs(30), 1);
        for n in 0..100_000 {
            let at = t + secs(30) + Duration::from_micros(n);
            let next = timers.schedule(at, 1);
            timers.cancel(prev);
            timers.next_expiry();
            prev = next;
        }
        assert_eq!(timers.len(), 2);
        assert!(timers.heap.len() <= 2 * timers.len() + SLACK + 1);
        assert_eq!(timers.next_expiry(), Some(t + secs(5)));

        // Compaction keeps the remaining jobs in fire-time order
        let mut fired = Vec::new();
        timers.run_expired(t + secs(60), |_, _, job| fired.push(job));
        assert_eq!(fired, [0, 1]);
    }

    #[test]
    fn test_slot_clear_if() {
        let slot = TimerSlot::new();
        assert!(!slot.is_armed());
        slot.replace(Some(TimerId(3)));
        slot.clear_if(TimerId(4));
        assert_eq!(slot.get(), Some(TimerId(3)));
        slot.clear_if(TimerId(3));
        assert_eq!(slot.get(), None);
    }
}
