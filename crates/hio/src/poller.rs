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

//! Poller for readiness events.

use mio::event::Source;
use mio::{Events, Interest, Poll, Token, Waker};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use super::error::Result;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Token reserved for the waker, so device tokens map to slab keys directly.
pub const WAKER: Token = Token(usize::MAX);

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Readiness reported for a single token.
#[derive(Clone, Copy, Debug)]
pub struct Ready {
    /// Token of the source.
    pub token: Token,
    /// Source is readable, or its read side was closed.
    pub readable: bool,
    /// Source is writable, or its write side was closed.
    pub writable: bool,
    /// Source reported an error.
    pub error: bool,
}

/// Poller for readiness events.
pub struct Poller {
    /// Poll instance.
    poll: Poll,
    /// Event queue.
    events: Events,
    /// Waker.
    waker: Arc<Waker>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Poller {
    /// Creates a poller with the given capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let res = Poll::new().and_then(|poll| {
            Waker::new(poll.registry(), WAKER).map(|waker| Self {
                waker: Arc::new(waker),
                events: Events::with_capacity(capacity),
                poll,
            })
        });

        // Return poller or convert error
        res.map_err(Into::into)
    }

    /// Moves a source from its current interest to the wanted one.
    ///
    /// Registration is tracked by the caller in `current`, which is updated
    /// on success. A source without any wanted interest is deregistered, as
    /// the underlying registry does not accept empty interests. Unchanged
    /// interests are left alone, since re-registering would re-arm edge
    /// notifications for no reason.
    pub fn update<S>(
        &self, source: &mut S, token: Token, current: &mut Option<Interest>,
        wanted: Option<Interest>,
    ) -> Result
    where
        S: Source + ?Sized,
    {
        let registry = self.poll.registry();
        match (*current, wanted) {
            (None, Some(interest)) => {
                registry.register(source, token, interest)?;
            }
            (Some(old), Some(interest)) if old != interest => {
                registry.reregister(source, token, interest)?;
            }
            (Some(_), None) => registry.deregister(source)?,
            _ => return Ok(()),
        }
        *current = wanted;
        Ok(())
    }

    /// Removes a source from the poller, if registered.
    pub fn forget<S>(&self, source: &mut S, current: &mut Option<Interest>)
    where
        S: Source + ?Sized,
    {
        if current.take().is_some() {
            let _ = self.poll.registry().deregister(source);
        }
    }

    /// Waits for readiness events and collects them into the given buffer.
    ///
    /// Interrupted waits are not errors, they just yield no events. Every
    /// other failure of the underlying system call is returned.
    pub fn poll(
        &mut self, timeout: Option<Duration>, ready: &mut Vec<Ready>,
    ) -> Result {
        ready.clear();
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        // Flatten events, so the caller is free to mutate the loop
        ready.extend(self.events.iter().map(|event| Ready {
            token: event.token(),
            readable: event.is_readable() || event.is_read_closed(),
            writable: event.is_writable() || event.is_write_closed(),
            error: event.is_error(),
        }));
        Ok(())
    }

    /// Returns the waker.
    #[inline]
    #[must_use]
    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }
}
