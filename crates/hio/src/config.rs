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

//! Loop configuration.

use std::fmt;
use std::time::Duration;

use super::reactor::Loop;
use super::time::{Clock, SystemClock};
use super::Result;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Policy applied when a timed write expires before it was fully sent.
///
/// The expired write is always removed from the queue and reported to the
/// handler with [`Written::Timeout`][]. This policy decides whether the loop
/// additionally halts the device on its own.
///
/// [`Written::Timeout`]: crate::Written::Timeout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteTimeout {
    /// Only report the timeout, leaving the decision to the handler.
    #[default]
    Report,
    /// Report the timeout, then halt the device.
    Halt,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Loop configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the readiness event buffer.
    pub events: usize,
    /// Size of a single read.
    pub read_chunk: usize,
    /// Bytes read from one device per dispatch before yielding to others.
    pub read_budget: usize,
    /// Capacity of the hand-off inbox.
    pub handoff_capacity: usize,
    /// Delay between attempts to deliver queued hand-offs.
    pub handoff_retry: Duration,
    /// Attempts after which a queued hand-off is shed.
    pub handoff_attempts: u32,
    /// Policy for expired timed writes.
    pub write_timeout: WriteTimeout,
}

/// Loop builder.
pub struct Builder {
    /// Loop configuration.
    config: Config,
    /// Clock.
    clock: Box<dyn Clock>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Builder {
    /// Creates a loop builder with the default configuration.
    ///
    /// Note that the canonical way to create a [`Builder`] is to invoke the
    /// [`Loop::builder`] method, while [`Loop::new`] creates a loop with the
    /// default configuration directly.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio::Builder;
    ///
    /// // Create loop with a smaller read budget
    /// let lp = Builder::new()
    ///     .read_budget(64 * 1024)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Sets the capacity of the readiness event buffer.
    #[must_use]
    pub fn events(mut self, events: usize) -> Self {
        self.config.events = events.max(1);
        self
    }

    /// Sets the size of a single read.
    #[must_use]
    pub fn read_chunk(mut self, size: usize) -> Self {
        self.config.read_chunk = size.max(1);
        self
    }

    /// Sets the number of bytes read per device and dispatch.
    #[must_use]
    pub fn read_budget(mut self, budget: usize) -> Self {
        self.config.read_budget = budget.max(1);
        self
    }

    /// Sets the capacity of the hand-off inbox.
    ///
    /// A capacity of zero makes every delivery a rendezvous, so hand-offs
    /// only succeed while the receiving loop is draining its inbox.
    #[must_use]
    pub fn handoff_capacity(mut self, capacity: usize) -> Self {
        self.config.handoff_capacity = capacity;
        self
    }

    /// Sets the delay and number of attempts for queued hand-offs.
    #[must_use]
    pub fn handoff_retry(mut self, delay: Duration, attempts: u32) -> Self {
        self.config.handoff_retry = delay;
        self.config.handoff_attempts = attempts.max(1);
        self
    }

    /// Sets the policy for expired timed writes.
    #[must_use]
    pub fn write_timeout(mut self, policy: WriteTimeout) -> Self {
        self.config.write_timeout = policy;
        self
    }

    /// Creates the loop.
    pub fn build(self) -> Result<Loop> {
        Loop::with_config(self.config, self.clock)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            events: 1024,
            read_chunk: 16 * 1024,
            read_budget: 256 * 1024,
            handoff_capacity: 128,
            handoff_retry: Duration::from_millis(10),
            handoff_attempts: 100,
            write_timeout: WriteTimeout::Report,
        }
    }
}

impl Default for Builder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
