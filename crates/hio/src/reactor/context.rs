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

//! Handler context.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::device::{DeviceId, State};
use crate::resource::Resource;
use crate::Result;

use super::Loop;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Handler context.
///
/// A context is handed to every handler callback. It is bound to the device
/// the callback belongs to, and forwards operations to the loop, which only
/// services them at its next dispatch point. The loop itself is reachable
/// through [`Context::event_loop`], e.g., to schedule timers or open other
/// devices.
pub struct Context<'a> {
    /// Event loop.
    lp: &'a mut Loop,
    /// Device handle.
    id: DeviceId,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<'a> Context<'a> {
    /// Creates a context for the given device.
    pub(crate) fn new(lp: &'a mut Loop, id: DeviceId) -> Self {
        Self { lp, id }
    }

    /// Returns the device handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the event loop.
    #[inline]
    pub fn event_loop(&mut self) -> &mut Loop {
        self.lp
    }

    /// Returns the current instant of the loop's clock.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Instant {
        self.lp.now()
    }

    /// Returns the state of the device.
    pub fn state(&self) -> Result<State> {
        self.lp.state(self.id)
    }

    /// Returns the peer address of the device.
    pub fn peer(&self) -> Result<Option<SocketAddr>> {
        self.lp.peer(self.id)
    }

    /// Returns the local address of the device.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.lp.local_addr(self.id)
    }

    /// Queues data to be written, see [`Loop::write`].
    #[inline]
    pub fn write<D>(&mut self, data: D, tag: usize) -> Result
    where
        D: Into<Vec<u8>>,
    {
        self.lp.write(self.id, data, tag)
    }

    /// Queues data to be written with a deadline, see [`Loop::timed_write`].
    #[inline]
    pub fn timed_write<D>(
        &mut self, data: D, tag: usize, timeout: Duration,
    ) -> Result
    where
        D: Into<Vec<u8>>,
    {
        self.lp.timed_write(self.id, data, tag, timeout)
    }

    /// Queues a datagram, see [`Loop::write_to`].
    #[inline]
    pub fn write_to<D>(&mut self, data: D, tag: usize, dest: SocketAddr) -> Result
    where
        D: Into<Vec<u8>>,
    {
        self.lp.write_to(self.id, data, tag, dest)
    }

    /// Requests a half-close once all queued writes were sent.
    #[inline]
    pub fn shutdown(&mut self, tag: usize) -> Result {
        self.lp.write(self.id, Vec::new(), tag)
    }

    /// Enables or disables reading, see [`Loop::read`].
    #[inline]
    pub fn read(&mut self, enable: bool) -> Result {
        self.lp.read(self.id, enable)
    }

    /// Sets the read timeout, see [`Loop::read_timeout`].
    #[inline]
    pub fn read_timeout(&mut self, timeout: Option<Duration>) -> Result {
        self.lp.read_timeout(self.id, timeout)
    }

    /// Requests the device to be halted, see [`Loop::halt`].
    #[inline]
    pub fn halt(&mut self) -> Result {
        self.lp.halt(self.id)
    }

    /// Attaches a resource to the device, see [`Loop::attach`].
    #[inline]
    pub fn attach<T>(&mut self, resource: Resource<T>) -> Result
    where
        T: 'static,
    {
        self.lp.attach(self.id, resource)
    }
}
