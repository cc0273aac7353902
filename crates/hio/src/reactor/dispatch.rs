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

//! Event dispatch.

use mio::Interest;
use std::io::{self, ErrorKind, Read as _, Write as _};
use std::mem;
use std::net::{Shutdown, SocketAddr};
use tracing::{debug, trace, warn};

use crate::config::WriteTimeout;
use crate::device::{
    Accept, Device, DeviceId, Handler, Io, Next, Node, Read, State, Written,
};
use crate::poller::Ready;
use crate::timer::TimerId;
use crate::tls::Handshake;
use crate::Result;

use super::{Context, Loop};

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Loop {
    /// Dispatches a readiness event to the device it belongs to.
    pub(super) fn dispatch(&mut self, event: Ready) {
        let index = event.token.0;
        let Some(device) = self.devices.get(index) else {
            return;
        };
        let id = DeviceId { index, generation: device.generation };
        let state = device.state;
        trace!("device {id}: {event:?} while {state}");
        match state {
            State::Listening => self.dispatch_accept(id),
            State::Connecting => self.finish_connect(id, event.error),
            State::ConnectingSsl | State::AcceptingSsl => {
                self.dispatch_handshake(id);
            }
            State::Connected | State::Accepted => {
                if event.error {
                    self.check_error(id);
                }
                if event.readable {
                    self.dispatch_read(id);
                }
                if event.writable {
                    self.flush(id);
                }
            }
            State::Opening | State::Halting | State::Closed => {}
        }
    }

    /// Accepts all pending connections of a listener.
    fn dispatch_accept(&mut self, id: DeviceId) {
        let mode = match self.device_mut(id).map(|device| &mut device.io) {
            Ok(Io::Listener { accept, .. }) => accept.take(),
            _ => None,
        };
        let Some(mut mode) = mode else {
            return;
        };

        // Accept until the backlog is empty, as edge-triggered readiness is
        // only reported again for new connections
        loop {
            let res = match self.device_mut(id) {
                Ok(device) if device.is_halting() => break,
                Ok(Device { io: Io::Listener { listener, .. }, .. }) => {
                    listener.accept()
                }
                _ => break,
            };
            match res {
                Ok((stream, peer)) => self.accepted(&mut mode, stream, peer),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!("device {id}: accept failed: {err}");
                    break;
                }
            }
        }

        // Put accept mode back in place
        if let Ok(Io::Listener { accept, .. }) =
            self.device_mut(id).map(|device| &mut device.io)
        {
            *accept = Some(mode);
        }
    }

    /// Creates a device for an accepted connection, or passes it on.
    fn accepted(
        &mut self, mode: &mut Accept, stream: mio::net::TcpStream,
        peer: SocketAddr,
    ) {
        match mode {
            Accept::Local { acceptor, tls } => {
                let handler = match acceptor.accept(peer) {
                    Ok(handler) => handler,
                    Err(err) => {
                        warn!("acceptor rejected connection: {err}");
                        return;
                    }
                };
                let session = tls.as_mut().map(|factory| factory());
                if let Err(err) = self.adopt(stream, peer, handler, session) {
                    warn!("failed to adopt connection: {err}");
                }
            }
            Accept::Raw(hook) => hook.raw_accept(self, stream, peer),
        }
    }

    /// Completes an outgoing connection, once the socket reported readiness.
    fn finish_connect(&mut self, id: DeviceId, error: bool) {
        let Ok(device) = self.device_mut(id) else {
            return;
        };
        let Io::Stream { socket, tls, peer } = &mut device.io else {
            return;
        };

        // A pending error means that connecting failed, while a missing peer
        // address means that we're still connecting
        let res = match socket.take_error() {
            Ok(Some(err)) | Err(err) => Err(err),
            Ok(None) => match socket.peer_addr() {
                Ok(addr) => Ok(Some(addr)),
                Err(err) if err.kind() == ErrorKind::NotConnected && !error => {
                    Ok(None)
                }
                Err(err) => Err(err),
            },
        };
        match res {
            Ok(None) => {}
            Ok(Some(addr)) => {
                *peer = Some(addr);
                if tls.is_some() {
                    device.state = State::ConnectingSsl;
                    device.handshake = Interest::WRITABLE;
                    self.dispatch_handshake(id);
                } else {
                    self.become_ready(id);
                }
            }
            Err(err) => {
                debug!("device {id}: connect failed: {err}");
                let _ = self.halt(id);
            }
        }
    }

    /// Advances the TLS handshake of a device.
    fn dispatch_handshake(&mut self, id: DeviceId) {
        let step = match self.device_mut(id).map(|device| &mut device.io) {
            Ok(Io::Stream { socket, tls: Some(tls), .. }) => {
                tls.handshake_step(socket)
            }
            _ => Handshake::Failed,
        };
        match step {
            Handshake::WantRead | Handshake::WantWrite => {
                if let Ok(device) = self.device_mut(id) {
                    device.handshake = if step == Handshake::WantRead {
                        Interest::READABLE
                    } else {
                        Interest::WRITABLE
                    };
                }
                self.sync_or_halt(id);
            }
            Handshake::Done => self.become_ready(id),
            Handshake::Failed => {
                debug!("device {id}: handshake failed");
                let _ = self.halt(id);
            }
        }
    }

    /// Moves a device into its ready state, and notifies its handler.
    fn become_ready(&mut self, id: DeviceId) {
        let Ok(device) = self.device_mut(id) else {
            return;
        };
        device.state = device.ready;
        let state = device.state;
        if let Some(timer) = device.connect_timer.take() {
            self.timers.cancel(timer);
        }
        debug!("device {id}: {state}");

        // Data might have arrived before the device was ready, so we attempt
        // to read once, regardless of readiness
        self.sync_or_halt(id);
        self.rearm_read_timer(id);
        self.schedule_read(id);
        self.connected(id);
    }

    /// Invokes the connect callback of a device.
    pub(super) fn connected(&mut self, id: DeviceId) {
        self.callback(id, |handler, cx| handler.on_connect(cx));
    }

    /// Checks a stream device for a pending socket error.
    fn check_error(&mut self, id: DeviceId) {
        let res = match self.device_mut(id).map(|device| &mut device.io) {
            Ok(Io::Stream { socket, .. }) => socket.take_error(),
            _ => return,
        };
        match res {
            Ok(Some(err)) | Err(err) => self.transport_error(id, &err),
            Ok(None) => {}
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Reads from a device until it would block, or the budget is spent.
    pub(super) fn dispatch_read(&mut self, id: DeviceId) {
        let mut buffer = mem::take(&mut self.buffer);
        if buffer.len() < self.config.read_chunk {
            let additional = self.config.read_chunk - buffer.len();
            if buffer.try_reserve(additional).is_err() {
                warn!("device {id}: out of memory");
                let _ = self.halt(id);
                self.buffer = buffer;
                return;
            }
            buffer.resize(self.config.read_chunk, 0);
        }

        // Read chunks and deliver them to the handler
        let mut budget = self.config.read_budget;
        loop {
            let res = match self.device_mut(id) {
                Ok(device) if device.is_ready() && device.reading => {
                    receive(&mut device.io, &mut buffer)
                }
                _ => break,
            };
            match res {
                Ok((0, None)) => {
                    self.end_of_stream(id);
                    break;
                }
                Ok((n, from)) => {
                    self.rearm_read_timer(id);
                    let data = &buffer[..n];
                    let read = match from {
                        Some(from) => Read::Datagram(data, from),
                        None => Read::Data(data),
                    };

                    // Yield to other devices when asked to, or once the
                    // budget is spent, and come back to this one later
                    let next = self.callback(id, |handler, cx| {
                        handler.on_read(cx, read)
                    });
                    budget = budget.saturating_sub(n);
                    match next {
                        Some(Next::Again) if budget > 0 => {}
                        Some(_) => {
                            self.schedule_read(id);
                            break;
                        }
                        None => break,
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.transport_error(id, &err);
                    break;
                }
            }
        }
        self.buffer = buffer;
    }

    /// Stops reading from a device at the end of the stream, and notifies
    /// its handler.
    fn end_of_stream(&mut self, id: DeviceId) {
        if let Ok(device) = self.device_mut(id) {
            device.reading = false;
        }
        self.sync_or_halt(id);
        self.rearm_read_timer(id);
        self.callback(id, |handler, cx| handler.on_read(cx, Read::Eof));
    }

    /// Sends queued writes until the socket would block, or the queue is empty.
    pub(super) fn flush(&mut self, id: DeviceId) {
        loop {
            let (written, node) = match self.device_mut(id) {
                Ok(device) if device.is_ready() => {
                    let Device { io, queue, .. } = device;
                    let closed = queue.is_closed();
                    let Some(node) = queue.front_mut() else {
                        break;
                    };

                    // Nodes behind a half-close are dropped without sending
                    let close = node.is_close();
                    let res = if closed {
                        Ok(Some(Written::Closed))
                    } else {
                        send(io, node)
                    };
                    match res {
                        Ok(Some(written)) => {
                            if close {
                                queue.close();
                            }
                            (written, queue.pop())
                        }
                        Ok(None) => continue,
                        Err(err) if err.kind() == ErrorKind::WouldBlock => {
                            return;
                        }
                        Err(err) if err.kind() == ErrorKind::Interrupted => {
                            continue;
                        }
                        Err(err) => {
                            self.transport_error(id, &err);
                            return;
                        }
                    }
                }
                _ => return,
            };

            // Cancel deadline and report completion
            if let Some(node) = node {
                if let Some(timer) = node.timer {
                    self.timers.cancel(timer);
                }
                self.complete(id, written, node.tag);
            }
        }

        // Queue is empty, so write interest can be dropped
        self.sync_or_halt(id);
    }

    /// Invokes the write callback of a device.
    fn complete(&mut self, id: DeviceId, written: Written, tag: usize) {
        self.callback(id, |handler, cx| handler.on_write(cx, written, tag));
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Delivers a read timeout.
    pub(super) fn read_timed_out(&mut self, id: DeviceId, timer: TimerId) {
        match self.device_mut(id) {
            Ok(device) if device.read_timer == Some(timer) => {
                device.read_timer = None;
            }
            _ => return,
        }
        self.callback(id, |handler, cx| handler.on_read(cx, Read::Timeout));
        self.rearm_read_timer(id);
    }

    /// Removes an expired timed write, and reports it.
    ///
    /// A node that was partly sent can't be dropped without corrupting the
    /// stream, so the device is halted then, regardless of the policy.
    pub(super) fn write_timed_out(&mut self, id: DeviceId, node: u64) {
        let Ok(device) = self.device_mut(id) else {
            return;
        };
        let partial =
            device.queue.get_mut(node).is_some_and(|node| node.offset > 0);
        let Some(node) = device.queue.remove(node) else {
            return;
        };
        debug!("device {id}: write timed out");
        self.complete(id, Written::Timeout, node.tag);
        match self.config.write_timeout {
            WriteTimeout::Report if !partial => self.sync_or_halt(id),
            _ => {
                let _ = self.halt(id);
            }
        }
    }

    /// Halts a device that didn't become ready in time.
    pub(super) fn connect_timed_out(&mut self, id: DeviceId, timer: TimerId) {
        match self.device_mut(id) {
            Ok(device) if device.connect_timer == Some(timer) => {
                device.connect_timer = None;
                if matches!(
                    device.state,
                    State::Connecting | State::ConnectingSsl
                ) {
                    debug!("device {id}: connect timed out");
                    let _ = self.halt(id);
                }
            }
            _ => {}
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Invokes a handler callback, halting the device if it fails.
    ///
    /// The handler is taken out of the device for the duration of the call,
    /// and callbacks are never invoked for halting devices.
    fn callback<T, F>(&mut self, id: DeviceId, f: F) -> Option<T>
    where
        F: FnOnce(&mut Box<dyn Handler>, &mut Context) -> Result<T>,
    {
        let device = self.device_mut(id).ok()?;
        if device.is_halting() {
            return None;
        }
        let mut handler = device.handler.take()?;
        let res = f(&mut handler, &mut Context::new(self, id));
        if let Ok(device) = self.device_mut(id) {
            device.handler = Some(handler);
        }

        // Errors raised by the handler only affect its own device
        match res {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("device {id}: handler failed: {err}");
                let _ = self.halt(id);
                None
            }
        }
    }

    /// Updates interest, halting the device if that fails.
    fn sync_or_halt(&mut self, id: DeviceId) {
        if let Err(err) = self.sync_interest(id) {
            warn!("device {id}: failed to update interest: {err}");
            let _ = self.halt(id);
        }
    }

    /// Halts a device after a transport error.
    fn transport_error(&mut self, id: DeviceId, err: &io::Error) {
        match err.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => {
                debug!("device {id}: {err}");
            }
            _ => warn!("device {id}: {err}"),
        }
        let _ = self.halt(id);
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Receives data from a device, together with the sender of datagrams.
fn receive(
    io: &mut Io, buffer: &mut [u8],
) -> io::Result<(usize, Option<SocketAddr>)> {
    match io {
        Io::Stream { socket, tls: Some(tls), .. } => {
            tls.decrypt_recv(socket, buffer).map(|n| (n, None))
        }
        Io::Stream { socket, tls: None, .. } => {
            socket.read(buffer).map(|n| (n, None))
        }
        Io::Datagram { socket } => {
            socket.recv_from(buffer).map(|(n, from)| (n, Some(from)))
        }
        Io::Listener { .. } => Err(ErrorKind::Unsupported.into()),
    }
}

/// Sends the head node, returning its completion once fully sent.
fn send(io: &mut Io, node: &mut Node) -> io::Result<Option<Written>> {
    let n = match io {
        Io::Stream { socket, .. } if node.is_close() => {
            socket.shutdown(Shutdown::Write)?;
            return Ok(Some(Written::Sent(0)));
        }
        Io::Stream { socket, tls: Some(tls), .. } => {
            tls.encrypt_send(socket, node.remaining())?
        }
        Io::Stream { socket, tls: None, .. } => {
            socket.write(node.remaining())?
        }
        Io::Datagram { socket } => {
            let Some(dest) = node.dest else {
                return Err(ErrorKind::InvalidInput.into());
            };
            socket.send_to(&node.data, dest)?;
            node.offset = node.data.len();
            return Ok(Some(Written::Sent(node.data.len())));
        }
        Io::Listener { .. } => return Err(ErrorKind::Unsupported.into()),
    };

    // Partial sends keep the node at the head of the queue
    if n == 0 {
        return Err(ErrorKind::WriteZero.into());
    }
    node.offset += n;
    let done = node.offset == node.data.len();
    Ok(done.then_some(Written::Sent(node.data.len())))
}
