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

//! Devices.

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::Interest;
use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use super::handoff::RawAccept;
use super::reactor::Context;
use super::timer::TimerId;
use super::tls::TlsSession;
use super::Result;

mod queue;

pub(crate) use queue::{Node, Queue};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Device handler.
///
/// A handler receives one callback per device event. All callbacks get a
/// [`Context`] bound to the device, through which new operations are issued.
/// Operations never invoke callbacks synchronously, so a callback won't be
/// re-entered. Returning an error from a callback halts that device only.
///
/// # Examples
///
/// This handler echoes everything it reads back to the peer:
///
/// ```
/// use hio::{Context, Handler, Next, Read, Result};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn on_read(&mut self, cx: &mut Context, read: Read) -> Result<Next> {
///         match read {
///             Read::Data(data) => cx.write(data.to_vec(), 0)?,
///             _ => cx.halt()?,
///         }
///         Ok(Next::Again)
///     }
/// }
/// ```
pub trait Handler {
    /// Invoked once the device is connected, or accepted and ready.
    fn on_connect(&mut self, cx: &mut Context) -> Result {
        let _ = cx;
        Ok(())
    }

    /// Invoked when data, end of stream or a read timeout is available.
    ///
    /// The returned [`Next`] tells the loop whether to keep reading from
    /// the device right away, or to come back after the next poll.
    fn on_read(&mut self, cx: &mut Context, read: Read) -> Result<Next>;

    /// Invoked when a queued write completed, in the order of enqueueing.
    fn on_write(
        &mut self, cx: &mut Context, written: Written, tag: usize,
    ) -> Result {
        let _ = (cx, written, tag);
        Ok(())
    }

    /// Invoked after the device was closed.
    ///
    /// The device is gone at this point, so operations on it fail, but the
    /// context can still be used to schedule timers or create new devices.
    fn on_disconnect(&mut self, cx: &mut Context) {
        let _ = cx;
    }
}

/// Acceptor for incoming connections.
///
/// An acceptor creates the handler for every connection a listener accepts,
/// or that a sibling loop hands over.
pub trait Acceptor {
    /// Creates a handler for the connection from the given peer.
    fn accept(&mut self, peer: SocketAddr) -> Result<Box<dyn Handler>>;
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Device state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Created, not yet registered.
    Opening,
    /// Outgoing connection in progress.
    Connecting,
    /// Outgoing connection established, TLS handshake in progress.
    ConnectingSsl,
    /// Listening for connections.
    Listening,
    /// Incoming connection accepted, TLS handshake in progress.
    AcceptingSsl,
    /// Outgoing connection ready.
    Connected,
    /// Incoming connection ready.
    Accepted,
    /// Halt requested, waiting to be reaped.
    Halting,
    /// Closed.
    Closed,
}

/// Device kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// TCP stream.
    Stream,
    /// TCP listener.
    Listener,
    /// UDP socket.
    Datagram,
}

/// Read event.
#[derive(Debug)]
pub enum Read<'a> {
    /// Data read from a stream.
    Data(&'a [u8]),
    /// Datagram received from the given address.
    Datagram(&'a [u8], SocketAddr),
    /// End of stream.
    Eof,
    /// No data arrived before the read timeout elapsed.
    Timeout,
}

/// Write completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Written {
    /// All requested bytes were sent, zero for a completed half-close.
    Sent(usize),
    /// Write was queued behind a half-close, and was dropped unsent.
    Closed,
    /// Deadline elapsed before the write was fully sent.
    Timeout,
}

/// What the loop should do after a read callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Next {
    /// Keep reading right away, within the read budget.
    #[default]
    Again,
    /// Stop for now and continue after the next poll.
    Wait,
}

// ----------------------------------------------------------------------------

/// Platform handle of a device.
pub(crate) enum Io {
    /// TCP stream, optionally wrapped in a TLS session.
    Stream {
        /// Socket.
        socket: TcpStream,
        /// TLS session.
        tls: Option<Box<dyn TlsSession>>,
        /// Peer address.
        peer: Option<SocketAddr>,
    },
    /// TCP listener.
    Listener {
        /// Socket.
        listener: TcpListener,
        /// Accept mode, taken out while accepting.
        accept: Option<Accept>,
    },
    /// UDP socket.
    Datagram {
        /// Socket.
        socket: UdpSocket,
    },
}

/// Accept mode of a listener.
pub(crate) enum Accept {
    /// Create devices on this loop, optionally with TLS sessions.
    Local {
        /// Handler factory.
        acceptor: Box<dyn Acceptor>,
        /// TLS session factory.
        tls: Option<Box<dyn FnMut() -> Box<dyn TlsSession>>>,
    },
    /// Hand raw connections to a hook.
    Raw(Box<dyn RawAccept>),
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Device handle.
///
/// Handles combine the device's slot with a generation, so a handle to a
/// reaped device never refers to a newer device in the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// Slot in the device registry.
    pub(crate) index: usize,
    /// Generation of the slot's occupant.
    pub(crate) generation: u32,
}

/// Device.
pub(crate) struct Device {
    /// Generation.
    pub generation: u32,
    /// State.
    pub state: State,
    /// State to enter once the TLS handshake completes.
    pub ready: State,
    /// Platform handle.
    pub io: Io,
    /// Handler, taken out while a callback runs.
    pub handler: Option<Box<dyn Handler>>,
    /// Whether read readiness is wanted.
    pub reading: bool,
    /// Interest wanted by the TLS handshake.
    pub handshake: Interest,
    /// Interest currently registered with the poller.
    pub interest: Option<Interest>,
    /// Pending writes.
    pub queue: Queue,
    /// Timeout for reads.
    pub read_timeout: Option<Duration>,
    /// Pending read timeout.
    pub read_timer: Option<TimerId>,
    /// Pending connect timeout.
    pub connect_timer: Option<TimerId>,
    /// Whether the device is queued for an eager read.
    pub again: bool,
    /// Attached resources, released when the device is dropped.
    pub resources: Vec<Box<dyn Any>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Device {
    /// Creates a device in the opening state.
    pub fn new(
        generation: u32, io: Io, handler: Option<Box<dyn Handler>>,
        reading: bool,
    ) -> Self {
        Self {
            generation,
            state: State::Opening,
            ready: State::Connected,
            io,
            handler,
            reading,
            handshake: Interest::READABLE,
            interest: None,
            queue: Queue::new(),
            read_timeout: None,
            read_timer: None,
            connect_timer: None,
            again: false,
            resources: Vec::new(),
        }
    }

    /// Returns the device kind.
    pub fn kind(&self) -> Kind {
        match self.io {
            Io::Stream { .. } => Kind::Stream,
            Io::Listener { .. } => Kind::Listener,
            Io::Datagram { .. } => Kind::Datagram,
        }
    }

    /// Returns whether the device is halting or closed.
    pub fn is_halting(&self) -> bool {
        matches!(self.state, State::Halting | State::Closed)
    }

    /// Returns whether the device is ready for reads and writes.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Connected | State::Accepted)
    }

    /// Computes the interest the device currently needs.
    pub fn wanted(&self) -> Option<Interest> {
        match self.state {
            State::Opening | State::Halting | State::Closed => None,
            State::Connecting => Some(Interest::WRITABLE),
            State::ConnectingSsl | State::AcceptingSsl => Some(self.handshake),
            State::Listening => Some(Interest::READABLE),
            State::Connected | State::Accepted => {
                let read = self.reading.then_some(Interest::READABLE);
                let write =
                    (!self.queue.is_empty()).then_some(Interest::WRITABLE);
                match (read, write) {
                    (Some(read), Some(write)) => Some(read | write),
                    (read, write) => read.or(write),
                }
            }
        }
    }

    /// Returns the peer address, if any.
    pub fn peer(&self) -> Option<SocketAddr> {
        match &self.io {
            Io::Stream { peer, .. } => *peer,
            _ => None,
        }
    }

    /// Returns the local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let addr = match &self.io {
            Io::Stream { socket, .. } => socket.local_addr(),
            Io::Listener { listener, .. } => listener.local_addr(),
            Io::Datagram { socket } => socket.local_addr(),
        };
        addr.map_err(Into::into)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            State::Opening => "opening",
            State::Connecting => "connecting",
            State::ConnectingSsl => "connecting (ssl)",
            State::Listening => "listening",
            State::AcceptingSsl => "accepting (ssl)",
            State::Connected => "connected",
            State::Accepted => "accepted",
            State::Halting => "halting",
            State::Closed => "closed",
        })
    }
}

// ----------------------------------------------------------------------------

impl<F> Acceptor for F
where
    F: FnMut(SocketAddr) -> Box<dyn Handler>,
{
    #[inline]
    fn accept(&mut self, peer: SocketAddr) -> Result<Box<dyn Handler>> {
        Ok(self(peer))
    }
}
