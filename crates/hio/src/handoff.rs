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

//! Cross-loop connection hand-off.
//!
//! Every loop owns a bounded inbox. A [`Remote`] is a sendable handle to that
//! inbox, which listeners on other loops use to pass accepted connections to
//! it, and which can also be used to stop the loop from another thread. The
//! receiving loop is woken through its poller's waker, and creates devices
//! for incoming connections through the acceptor installed with
//! [`Loop::accept_remote`][].
//!
//! [`Loop::accept_remote`]: crate::Loop::accept_remote

use crossbeam::channel::{Sender, TrySendError};
use mio::net::TcpStream;
use mio::Waker;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use super::reactor::{Loop, Stop};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Raw accept hook.
///
/// Listeners created with [`Loop::listen_raw`][] don't create devices for
/// accepted connections, but pass the raw sockets to this hook, which may
/// adopt them on the same loop, or hand them off to a sibling loop.
///
/// [`Loop::listen_raw`]: crate::Loop::listen_raw
pub trait RawAccept {
    /// Takes ownership of an accepted connection.
    fn raw_accept(
        &mut self, lp: &mut Loop, stream: TcpStream, peer: SocketAddr,
    );
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Connection handed off between loops.
///
/// The connection carries the overload response of its listener, so any loop
/// that can't serve it, be it the accepting loop or the target, sheds it the
/// same way.
#[derive(Debug)]
pub struct NewConn {
    /// Accepted socket.
    pub stream: TcpStream,
    /// Peer address.
    pub peer: SocketAddr,
    /// Response sent if the connection can't be served.
    pub overload: Arc<[u8]>,
}

/// Sendable handle to a loop.
#[derive(Clone)]
pub struct Remote {
    /// Inbox sender.
    sender: Sender<NewConn>,
    /// Waker of the loop's poller.
    waker: Arc<Waker>,
    /// Pending stop request.
    stop: Arc<AtomicU8>,
}

/// Round-robin dispatcher for accepted connections.
///
/// The dispatcher spreads accepted connections over a fixed set of target
/// loops. The lock is only held to pick the next target, while delivery and
/// its retries are carried out by the accepting loop. Connections that can't
/// be delivered are answered with the overload response and closed.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use hio::{Dispatcher, Loop};
/// use std::sync::Arc;
///
/// // Create target loop and dispatcher
/// let target = Loop::new()?;
/// let dispatcher = Dispatcher::new(
///     vec![target.remote()],
///     b"HTTP/1.1 503 Service Unavailable\r\n\r\n".as_slice(),
/// );
///
/// // Create accepting loop
/// let mut lp = Loop::new()?;
/// lp.listen_raw("127.0.0.1:0".parse()?, Arc::new(dispatcher))?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    /// Target loops and the index of the next one.
    targets: Mutex<(Vec<Remote>, usize)>,
    /// Response sent to connections that can't be delivered.
    overload: Arc<[u8]>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Remote {
    /// Creates a remote handle.
    pub(crate) fn new(
        sender: Sender<NewConn>, waker: Arc<Waker>, stop: Arc<AtomicU8>,
    ) -> Self {
        Self { sender, waker, stop }
    }

    /// Attempts to deliver a connection without blocking.
    ///
    /// On failure the connection is handed back inside the error, so the
    /// caller can retry delivery or shed the connection.
    pub fn try_send(&self, conn: NewConn) -> Result<(), TrySendError<NewConn>> {
        self.sender.try_send(conn)?;
        self.wake();
        Ok(())
    }

    /// Requests the loop to stop, and wakes it.
    ///
    /// Requests never downgrade: once termination was requested, a later
    /// request to drain has no effect.
    pub fn stop(&self, mode: Stop) {
        self.stop.fetch_max(mode.into(), Ordering::AcqRel);
        self.wake();
    }

    /// Wakes the loop.
    fn wake(&self) {
        if let Err(err) = self.waker.wake() {
            warn!("failed to wake loop: {err}");
        }
    }
}

// ----------------------------------------------------------------------------

impl NewConn {
    /// Sends the overload response and closes the connection.
    ///
    /// Both directions are handled in a best-effort fashion. Anything the
    /// peer already sent is drained first, so closing the socket doesn't
    /// reset the connection before the response arrives.
    pub fn shed(mut self) {
        let mut sink = [0; 1024];
        while let Ok(n) = self.stream.read(&mut sink) {
            if n == 0 {
                break;
            }
        }

        // Write response and close the write side
        match self.stream.write(&self.overload) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => warn!("failed to send overload response: {err}"),
        }
        let _ = self.stream.shutdown(Shutdown::Write);
    }
}

// ----------------------------------------------------------------------------

impl Dispatcher {
    /// Creates a dispatcher over the given targets.
    pub fn new<B>(targets: Vec<Remote>, overload: B) -> Self
    where
        B: Into<Arc<[u8]>>,
    {
        Self {
            targets: Mutex::new((targets, 0)),
            overload: overload.into(),
        }
    }

    /// Picks the next target in round-robin order.
    fn next(&self) -> Option<Remote> {
        let mut guard =
            self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        let (targets, next) = &mut *guard;
        if targets.is_empty() {
            return None;
        }

        // Advance cursor and return target
        let remote = targets[*next % targets.len()].clone();
        *next = (*next + 1) % targets.len();
        Some(remote)
    }

    /// Dispatches a connection to the next target.
    pub fn dispatch(&self, lp: &mut Loop, stream: TcpStream, peer: SocketAddr) {
        let overload = Arc::clone(&self.overload);
        let conn = NewConn { stream, peer, overload };
        match self.next() {
            Some(remote) => lp.hand_off(&remote, conn),
            None => conn.shed(),
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl RawAccept for Dispatcher {
    #[inline]
    fn raw_accept(
        &mut self, lp: &mut Loop, stream: TcpStream, peer: SocketAddr,
    ) {
        self.dispatch(lp, stream, peer);
    }
}

impl RawAccept for Arc<Dispatcher> {
    #[inline]
    fn raw_accept(
        &mut self, lp: &mut Loop, stream: TcpStream, peer: SocketAddr,
    ) {
        self.dispatch(lp, stream, peer);
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Remote")
            .field("queued", &self.sender.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("overload", &self.overload.len())
            .finish_non_exhaustive()
    }
}
