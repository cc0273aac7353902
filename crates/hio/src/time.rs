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

//! Monotonic clocks.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Monotonic clock.
///
/// The loop reads the current time through this trait whenever it computes
/// timer deadlines or poll timeouts, which allows tests to drive timers
/// deterministically with a [`ManualClock`].
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// System clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

/// Manually advanced clock.
///
/// Clones share the same instant, so a test can keep one clone while the
/// loop owns another.
///
/// # Examples
///
/// ```
/// use hio::{Clock, ManualClock};
/// use std::time::Duration;
///
/// // Create clock and advance it
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now() - start, Duration::from_secs(5));
/// ```
#[derive(Clone)]
pub struct ManualClock {
    /// Shared current instant.
    now: Rc<Cell<Instant>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl ManualClock {
    /// Creates a manual clock starting at the current system instant.
    #[must_use]
    pub fn new() -> Self {
        Self { now: Rc::new(Cell::new(Instant::now())) }
    }

    /// Moves the clock forward by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Sets the clock to the given instant.
    pub fn set(&self, at: Instant) {
        self.now.set(at);
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Instant {
        self.now.get()
    }
}

// ----------------------------------------------------------------------------

impl Default for ManualClock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now.get())
            .finish()
    }
}
