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

//! Single-threaded I/O event loop and device framework.
//!
//! A [`Loop`] owns a set of devices (TCP streams, listeners and UDP sockets),
//! a timer queue and a deferred task queue, and drives them from a readiness
//! poller. Devices talk to user code through the [`Handler`] trait, which
//! receives one callback per event and issues new operations through the
//! [`Context`] it is handed. Operations requested from inside a callback are
//! only serviced at the next safe dispatch point, so handlers never observe
//! re-entrant invocations.
//!
//! Loops are not shared between threads. Multiple loops can run on separate
//! threads, and a listener on one loop can hand accepted connections to its
//! siblings through their [`Remote`] handles.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod device;
mod error;
pub mod handoff;
mod poller;
pub mod reactor;
pub mod resource;
pub mod time;
pub mod timer;
pub mod tls;

pub use config::{Builder, Config, WriteTimeout};
pub use device::{
    Acceptor, DeviceId, Handler, Kind, Next, Read, State, Written,
};
pub use error::{Error, Result};
pub use handoff::{Dispatcher, NewConn, RawAccept, Remote};
pub use reactor::{Connect, Context, Loop, Stats, Stop};
pub use resource::Resource;
pub use time::{Clock, ManualClock, SystemClock};
pub use timer::{TimerId, TimerQueue, TimerSlot};
pub use tls::{Handshake, TlsSession};
