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

//! Event loop.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::Token;
use slab::Slab;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use super::config::{Builder, Config};
use super::device::{
    Accept, Acceptor, Device, DeviceId, Handler, Io, Kind, State,
};
use super::handoff::{NewConn, RawAccept, Remote};
use super::poller::{Poller, Ready, WAKER};
use super::resource::Resource;
use super::time::{Clock, SystemClock};
use super::timer::{TimerId, TimerQueue, TimerSlot};
use super::tls::TlsSession;
use super::{Error, Result};

mod context;
mod dispatch;

pub use context::Context;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Stop mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// Halt listeners and idle devices right away, and every other device
    /// once its write queue drained, then return.
    Drain,
    /// Halt all devices right away, then return.
    Terminate,
}

/// Timer job.
enum Job {
    /// User job, with optional back-pointer slot.
    User {
        /// Callback.
        f: Box<dyn FnOnce(&mut Loop)>,
        /// Slot, cleared before the callback runs.
        slot: Option<TimerSlot>,
    },
    /// Read timeout of a device.
    Read(DeviceId),
    /// Deadline of a timed write.
    Write(DeviceId, u64),
    /// Connect timeout of a device.
    Connect(DeviceId),
    /// Retry of queued hand-offs.
    Handoff,
}

/// Deferred task.
enum Task {
    /// User task.
    User(Box<dyn FnOnce(&mut Loop)>),
    /// Notify the handler that its device is ready.
    Connected(DeviceId),
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Options for outgoing connections.
///
/// # Examples
///
/// ```
/// use hio::Connect;
/// use std::time::Duration;
///
/// // Create options with connect timeout
/// let options = Connect::new().timeout(Duration::from_secs(5));
/// ```
#[derive(Default)]
pub struct Connect {
    /// TLS session to run over the connection.
    tls: Option<Box<dyn TlsSession>>,
    /// Time allowed for connecting, including the TLS handshake.
    timeout: Option<Duration>,
    /// Whether reading starts disabled.
    paused: bool,
}

/// Loop statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Live devices, including halting ones.
    pub devices: usize,
    /// Scheduled timers, including internal ones.
    pub timers: usize,
    /// Deferred tasks.
    pub tasks: usize,
    /// Hand-offs waiting for delivery.
    pub handoffs: usize,
}

/// Hand-off waiting for delivery.
struct Pending {
    /// Target loop.
    remote: Remote,
    /// Connection.
    conn: NewConn,
    /// Failed delivery attempts.
    attempts: u32,
}

/// Event loop.
///
/// A loop owns devices, timers and deferred tasks, and runs until it's told
/// to stop, or there's nothing left to wait for. Every pass first waits for
/// readiness, bounded by the nearest timer, then dispatches reads before
/// writes for every ready device, fires expired timers, runs deferred tasks,
/// and finally reaps halted devices.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use hio::Loop;
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// // Create loop and schedule a timer
/// let mut lp = Loop::new()?;
/// let fired = Rc::new(Cell::new(false));
/// lp.schedule_in(Duration::from_millis(1), {
///     let fired = fired.clone();
///     move |_| fired.set(true)
/// });
///
/// // Run until there's nothing left to do
/// lp.run()?;
/// assert!(fired.get());
/// # Ok(())
/// # }
/// ```
pub struct Loop {
    /// Poller for readiness events.
    poller: Poller,
    /// Readiness buffer, reused across passes.
    ready: Vec<Ready>,
    /// Devices.
    devices: Slab<Device>,
    /// Last issued device generation.
    generation: u32,
    /// Timers.
    timers: TimerQueue<Job>,
    /// Deferred tasks.
    tasks: VecDeque<Task>,
    /// Devices waiting to be reaped.
    halting: Vec<DeviceId>,
    /// Devices with reads left over from the current pass.
    again: Vec<DeviceId>,
    /// Read buffer.
    buffer: Vec<u8>,
    /// Clock.
    clock: Box<dyn Clock>,
    /// Configuration.
    config: Config,
    /// Hand-off inbox.
    inbox: Receiver<NewConn>,
    /// Hand-off inbox sender, cloned into remotes.
    sender: Sender<NewConn>,
    /// Pending stop request, shared with remotes.
    stop: Arc<AtomicU8>,
    /// Acceptor for handed off connections.
    acceptor: Option<Box<dyn Acceptor>>,
    /// Hand-offs waiting for delivery.
    pending: VecDeque<Pending>,
    /// Retry timer for pending hand-offs.
    retry: Option<TimerId>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Connect {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the connection over the given TLS session.
    #[must_use]
    pub fn tls<S>(mut self, session: S) -> Self
    where
        S: TlsSession + 'static,
    {
        self.tls = Some(Box::new(session));
        self
    }

    /// Halts the device if it's not ready within the given duration.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Starts with reading disabled.
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }
}

impl Stop {
    /// Decodes a stop request from its flag representation.
    fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => None,
            1 => Some(Stop::Drain),
            _ => Some(Stop::Terminate),
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Creates a loop with the default configuration.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Io`], if the poller can't be created.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default(), Box::new(SystemClock))
    }

    /// Creates a loop builder.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio::{Loop, WriteTimeout};
    ///
    /// // Create loop that halts devices on write timeouts
    /// let lp = Loop::builder()
    ///     .write_timeout(WriteTimeout::Halt)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Creates a loop with the given configuration and clock.
    pub fn with_config(config: Config, clock: Box<dyn Clock>) -> Result<Self> {
        let poller = Poller::with_capacity(config.events)?;
        let (sender, inbox) = channel::bounded(config.handoff_capacity);
        Ok(Self {
            poller,
            ready: Vec::new(),
            devices: Slab::new(),
            generation: 0,
            timers: TimerQueue::new(),
            tasks: VecDeque::new(),
            halting: Vec::new(),
            again: Vec::new(),
            buffer: Vec::new(),
            clock,
            config,
            inbox,
            sender,
            stop: Arc::new(AtomicU8::new(0)),
            acceptor: None,
            pending: VecDeque::new(),
            retry: None,
        })
    }

    /// Returns the current instant of the loop's clock.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Returns the loop configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns loop statistics.
    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats {
            devices: self.devices.len(),
            timers: self.timers.len(),
            tasks: self.tasks.len(),
            handoffs: self.pending.len(),
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Opens an outgoing connection.
    ///
    /// The device starts out connecting, and the handler's
    /// [`Handler::on_connect`] is invoked once the connection, including the
    /// TLS handshake, if any, is established. If that fails, the device is
    /// halted, and only [`Handler::on_disconnect`] is invoked.
    pub fn connect<H>(
        &mut self, addr: SocketAddr, handler: H, options: Connect,
    ) -> Result<DeviceId>
    where
        H: Handler + 'static,
    {
        let socket = TcpStream::connect(addr)?;
        let io = Io::Stream { socket, tls: options.tls, peer: None };
        let id = self.insert(io, Some(Box::new(handler)), !options.paused);
        self.open(id, State::Connecting, State::Connected)?;

        // Arm connect timeout, covering the handshake as well
        if let Some(timeout) = options.timeout {
            let at = self.now() + timeout;
            let timer = self.timers.schedule(at, Job::Connect(id));
            if let Ok(device) = self.device_mut(id) {
                device.connect_timer = Some(timer);
            }
        }
        debug!("device {id}: connecting to {addr}");
        Ok(id)
    }

    /// Opens a listener that creates devices with the given acceptor.
    pub fn listen<A>(&mut self, addr: SocketAddr, acceptor: A) -> Result<DeviceId>
    where
        A: Acceptor + 'static,
    {
        let accept = Accept::Local { acceptor: Box::new(acceptor), tls: None };
        self.open_listener(addr, accept)
    }

    /// Opens a listener that runs every accepted connection over a TLS
    /// session created by the given factory.
    pub fn listen_tls<A, F>(
        &mut self, addr: SocketAddr, acceptor: A, factory: F,
    ) -> Result<DeviceId>
    where
        A: Acceptor + 'static,
        F: FnMut() -> Box<dyn TlsSession> + 'static,
    {
        let accept = Accept::Local {
            acceptor: Box::new(acceptor),
            tls: Some(Box::new(factory)),
        };
        self.open_listener(addr, accept)
    }

    /// Opens a listener that passes accepted sockets to a raw accept hook.
    pub fn listen_raw<R>(&mut self, addr: SocketAddr, hook: R) -> Result<DeviceId>
    where
        R: RawAccept + 'static,
    {
        self.open_listener(addr, Accept::Raw(Box::new(hook)))
    }

    /// Binds a datagram device.
    pub fn bind_udp<H>(&mut self, addr: SocketAddr, handler: H) -> Result<DeviceId>
    where
        H: Handler + 'static,
    {
        let socket = UdpSocket::bind(addr)?;
        let io = Io::Datagram { socket };
        let id = self.insert(io, Some(Box::new(handler)), true);
        self.open(id, State::Connected, State::Connected)?;
        self.tasks.push_back(Task::Connected(id));
        debug!("device {id}: bound to {addr}");
        Ok(id)
    }

    /// Adopts an accepted connection, optionally running over TLS.
    ///
    /// This is the building block for raw accept hooks and hand-offs. The
    /// handler's [`Handler::on_connect`] is never invoked from within this
    /// method, but deferred to the task phase of the current pass.
    pub fn adopt(
        &mut self, stream: TcpStream, peer: SocketAddr,
        handler: Box<dyn Handler>, tls: Option<Box<dyn TlsSession>>,
    ) -> Result<DeviceId> {
        let state = match tls {
            Some(_) => State::AcceptingSsl,
            None => State::Accepted,
        };
        let io = Io::Stream { socket: stream, tls, peer: Some(peer) };
        let id = self.insert(io, Some(handler), true);
        self.open(id, state, State::Accepted)?;
        if state == State::Accepted {
            self.tasks.push_back(Task::Connected(id));
        }
        debug!("device {id}: accepted from {peer}");
        Ok(id)
    }

    /// Opens a listener with the given accept mode.
    fn open_listener(
        &mut self, addr: SocketAddr, accept: Accept,
    ) -> Result<DeviceId> {
        let listener = TcpListener::bind(addr)?;
        let io = Io::Listener { listener, accept: Some(accept) };
        let id = self.insert(io, None, true);
        self.open(id, State::Listening, State::Listening)?;
        debug!("device {id}: listening on {addr}");
        Ok(id)
    }

    /// Inserts a device in the opening state.
    fn insert(
        &mut self, io: Io, handler: Option<Box<dyn Handler>>, reading: bool,
    ) -> DeviceId {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let index = self
            .devices
            .insert(Device::new(generation, io, handler, reading));
        DeviceId { index, generation }
    }

    /// Moves a freshly inserted device into its first state and registers
    /// it with the poller, killing it if registration fails.
    fn open(&mut self, id: DeviceId, state: State, ready: State) -> Result {
        let device = self.device_mut(id)?;
        device.state = state;
        device.ready = ready;
        if let Err(err) = self.sync_interest(id) {
            self.kill(id);
            return Err(err);
        }
        Ok(())
    }

    /// Tears a device down immediately, without invoking its handler.
    pub(crate) fn kill(&mut self, id: DeviceId) {
        if self.device_mut(id).is_ok() {
            let mut device = self.devices.remove(id.index);
            self.release(&mut device);
            debug!("device {id}: killed");
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Queues data to be written to a stream device.
    ///
    /// Writes complete in order through [`Handler::on_write`], which receives
    /// the given tag. Writing no data requests a half-close, after which no
    /// data is sent anymore.
    pub fn write<D>(&mut self, id: DeviceId, data: D, tag: usize) -> Result
    where
        D: Into<Vec<u8>>,
    {
        self.enqueue(id, data.into(), tag, None, None)
    }

    /// Queues data to be written to a stream device with a deadline.
    ///
    /// If the write wasn't fully sent when the deadline elapses, it's removed
    /// from the queue and completes with [`Written::Timeout`][]. Whether the
    /// device is halted in that case depends on the configured policy.
    ///
    /// [`Written::Timeout`]: crate::Written::Timeout
    pub fn timed_write<D>(
        &mut self, id: DeviceId, data: D, tag: usize, timeout: Duration,
    ) -> Result
    where
        D: Into<Vec<u8>>,
    {
        self.enqueue(id, data.into(), tag, None, Some(timeout))
    }

    /// Queues a datagram to be sent to the given address.
    pub fn write_to<D>(
        &mut self, id: DeviceId, data: D, tag: usize, dest: SocketAddr,
    ) -> Result
    where
        D: Into<Vec<u8>>,
    {
        self.enqueue(id, data.into(), tag, Some(dest), None)
    }

    /// Enables or disables reading from a device.
    pub fn read(&mut self, id: DeviceId, enable: bool) -> Result {
        let device = self.device_mut(id)?;
        if device.is_halting() {
            return Err(Error::InvalidState { id, state: device.state });
        }
        if device.reading == enable {
            return Ok(());
        }

        // Update interest, and catch up on data that arrived meanwhile
        device.reading = enable;
        self.sync_interest(id)?;
        if enable {
            self.schedule_read(id);
        }
        self.rearm_read_timer(id);
        Ok(())
    }

    /// Sets the read timeout of a device.
    ///
    /// Once set, [`Read::Timeout`][] is delivered whenever no data arrives
    /// within the given duration while reading is enabled. The timeout is
    /// re-armed after every delivery.
    ///
    /// [`Read::Timeout`]: crate::Read::Timeout
    pub fn read_timeout(
        &mut self, id: DeviceId, timeout: Option<Duration>,
    ) -> Result {
        let device = self.device_mut(id)?;
        device.read_timeout = timeout;
        self.rearm_read_timer(id);
        Ok(())
    }

    /// Requests a device to be halted.
    ///
    /// The device stops receiving events right away, and is reaped at the end
    /// of the current pass, when [`Handler::on_disconnect`] is invoked. Halting
    /// a device more than once has no further effect.
    pub fn halt(&mut self, id: DeviceId) -> Result {
        let device = self.device_mut(id)?;
        if !device.is_halting() {
            device.state = State::Halting;
            self.halting.push(id);
            debug!("device {id}: halting");
        }
        Ok(())
    }

    /// Returns the state of a device.
    pub fn state(&self, id: DeviceId) -> Result<State> {
        self.device(id).map(|device| device.state)
    }

    /// Returns the peer address of a stream device.
    pub fn peer(&self, id: DeviceId) -> Result<Option<SocketAddr>> {
        self.device(id).map(Device::peer)
    }

    /// Returns the local address of a device.
    pub fn local_addr(&self, id: DeviceId) -> Result<SocketAddr> {
        self.device(id).and_then(Device::local_addr)
    }

    /// Attaches a resource to a device, keeping it alive until the device
    /// was reaped and its handler was notified.
    pub fn attach<T>(&mut self, id: DeviceId, resource: Resource<T>) -> Result
    where
        T: 'static,
    {
        let device = self.device_mut(id)?;
        device.resources.try_reserve(1)?;
        device.resources.push(Box::new(resource));
        Ok(())
    }

    /// Queues a write node and updates interest.
    fn enqueue(
        &mut self, id: DeviceId, data: Vec<u8>, tag: usize,
        dest: Option<SocketAddr>, timeout: Option<Duration>,
    ) -> Result {
        let device = self.device_mut(id)?;
        if device.is_halting() {
            return Err(Error::InvalidState { id, state: device.state });
        }
        match (device.kind(), dest) {
            (Kind::Stream, None) | (Kind::Datagram, Some(_)) => {}
            (Kind::Stream, Some(_)) => {
                return Err(Error::Unsupported("addressed write on stream"));
            }
            (Kind::Datagram, None) => {
                return Err(Error::Unsupported("datagram without address"));
            }
            (Kind::Listener, _) => {
                return Err(Error::Unsupported("write on listener"));
            }
        }

        // Queue node and arm its deadline
        let node = device.queue.push(data, tag, dest)?;
        if let Some(timeout) = timeout {
            let at = self.clock.now() + timeout;
            let timer = self.timers.schedule(at, Job::Write(id, node));
            if let Ok(device) = self.device_mut(id) {
                if let Some(node) = device.queue.get_mut(node) {
                    node.timer = Some(timer);
                }
            }
        }
        self.sync_interest(id)
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Schedules a callback to run at the given instant.
    pub fn schedule<F>(&mut self, at: Instant, f: F) -> TimerId
    where
        F: FnOnce(&mut Loop) + 'static,
    {
        self.timers.schedule(at, Job::User { f: Box::new(f), slot: None })
    }

    /// Schedules a callback to run after the given delay.
    pub fn schedule_in<F>(&mut self, delay: Duration, f: F) -> TimerId
    where
        F: FnOnce(&mut Loop) + 'static,
    {
        let at = self.now() + delay;
        self.schedule(at, f)
    }

    /// Schedules a callback through a slot, replacing its previous job.
    ///
    /// The slot is cleared right before the callback runs, which allows to
    /// safely schedule through the same slot again from within the callback.
    pub fn schedule_slot<F>(&mut self, slot: &TimerSlot, at: Instant, f: F)
    where
        F: FnOnce(&mut Loop) + 'static,
    {
        self.cancel_slot(slot);
        let job = Job::User { f: Box::new(f), slot: Some(slot.clone()) };
        let id = self.timers.schedule(at, job);
        slot.replace(Some(id));
    }

    /// Cancels a timer, returning whether it was still scheduled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.cancel(id) {
            Some(Job::User { slot: Some(slot), .. }) => {
                slot.clear_if(id);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Cancels the job scheduled through a slot, if any.
    pub fn cancel_slot(&mut self, slot: &TimerSlot) -> bool {
        slot.replace(None).is_some_and(|id| self.cancel(id))
    }

    /// Defers a callback to the task phase of the current pass.
    ///
    /// Tasks deferred while tasks are running are run in the next pass.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Loop) + 'static,
    {
        self.tasks.push_back(Task::User(Box::new(f)));
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Returns a sendable handle to this loop.
    #[must_use]
    pub fn remote(&self) -> Remote {
        Remote::new(self.sender.clone(), self.poller.waker(), self.stop.clone())
    }

    /// Installs the acceptor for connections handed off by other loops.
    ///
    /// A loop with an acceptor keeps running while idle, since hand-offs and
    /// stop requests may arrive at any time.
    pub fn accept_remote<A>(&mut self, acceptor: A)
    where
        A: Acceptor + 'static,
    {
        self.acceptor = Some(Box::new(acceptor));
    }

    /// Hands a connection off to the given loop.
    ///
    /// If the target's inbox is full, the hand-off is queued and retried
    /// through a timer. Connections that can't be delivered, because the
    /// target is gone, or all attempts failed, are sent their overload
    /// response and closed.
    pub fn hand_off(&mut self, remote: &Remote, conn: NewConn) {
        match remote.try_send(conn) {
            Ok(()) => debug!("handed off connection"),
            Err(TrySendError::Full(conn)) => {
                self.pending.push_back(Pending {
                    remote: remote.clone(),
                    conn,
                    attempts: 1,
                });
                self.arm_retry();
            }
            Err(TrySendError::Disconnected(conn)) => {
                debug!("hand-off target is gone, shedding {}", conn.peer);
                conn.shed();
            }
        }
    }

    /// Retries delivery of all pending hand-offs.
    fn retry_handoffs(&mut self) {
        let limit = self.config.handoff_attempts;
        for mut pending in mem::take(&mut self.pending) {
            match pending.remote.try_send(pending.conn) {
                Ok(()) => debug!("handed off connection after retry"),
                Err(TrySendError::Full(conn)) if pending.attempts < limit => {
                    pending.conn = conn;
                    pending.attempts += 1;
                    self.pending.push_back(pending);
                }
                Err(err) => {
                    let conn = err.into_inner();
                    debug!("failed to hand off {}, shedding", conn.peer);
                    conn.shed();
                }
            }
        }
        self.arm_retry();
    }

    /// Arms the hand-off retry timer, if needed.
    fn arm_retry(&mut self) {
        if self.retry.is_none() && !self.pending.is_empty() {
            let at = self.now() + self.config.handoff_retry;
            self.retry = Some(self.timers.schedule(at, Job::Handoff));
        }
    }

    /// Creates devices for all connections waiting in the inbox.
    fn drain_inbox(&mut self) {
        loop {
            let conn = match self.inbox.try_recv() {
                Ok(conn) => conn,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };

            // Without an acceptor, e.g., while draining, connections are shed
            let Some(mut acceptor) = self.acceptor.take() else {
                debug!("no acceptor, shedding {}", conn.peer);
                conn.shed();
                continue;
            };
            match acceptor.accept(conn.peer) {
                Ok(handler) => {
                    if let Err(err) =
                        self.adopt(conn.stream, conn.peer, handler, None)
                    {
                        warn!("failed to adopt connection: {err}");
                    }
                }
                Err(err) => warn!("acceptor rejected connection: {err}"),
            }
            self.acceptor = Some(acceptor);
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Requests the loop to stop.
    ///
    /// The request is observed at the top of the next pass. Requests never
    /// downgrade, so once termination was requested, draining has no effect.
    pub fn stop(&mut self, mode: Stop) {
        self.stop.fetch_max(mode.into(), Ordering::AcqRel);
    }

    /// Runs the loop.
    ///
    /// This method returns once the loop was stopped, or once there are no
    /// devices, timers and tasks left, and no acceptor for hand-offs is
    /// installed. Errors of individual devices only halt those devices.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Io`], if waiting for readiness fails,
    /// which leaves the loop in a state that can't be recovered from.
    pub fn run(&mut self) -> Result {
        let res = loop {
            match Stop::from_flag(self.stop.load(Ordering::Acquire)) {
                Some(Stop::Terminate) => {
                    self.terminate();
                    break Ok(());
                }
                Some(Stop::Drain) => {
                    if self.drain() {
                        break Ok(());
                    }
                }
                None if self.is_idle() => break Ok(()),
                None => {}
            }

            // Run next pass, waiting as long as necessary
            if let Err(err) = self.pass(None) {
                error!("poll failed: {err}");
                break Err(err);
            }
        };

        // Reset stop request, so the loop can be run again
        self.stop.store(0, Ordering::Release);
        res
    }

    /// Runs a single pass, waiting at most for the given duration.
    ///
    /// This is useful for embedding the loop into another loop, or to drive
    /// it step by step in tests. Stop requests are not observed.
    pub fn poll(&mut self, timeout: Option<Duration>) -> Result {
        self.pass(timeout)
    }

    /// Returns whether there's nothing left to wait for.
    fn is_idle(&self) -> bool {
        self.devices.is_empty()
            && self.timers.is_empty()
            && self.tasks.is_empty()
            && self.acceptor.is_none()
    }

    /// Halts and reaps all devices.
    fn terminate(&mut self) {
        let ids = self.ids();
        for id in ids {
            let _ = self.halt(id);
        }
        self.reap();
        self.acceptor = None;
        self.drain_inbox();
        for pending in mem::take(&mut self.pending) {
            pending.conn.shed();
        }
        if let Some(id) = self.retry.take() {
            self.timers.cancel(id);
        }
    }

    /// Halts all devices that are done, returning whether none are left.
    fn drain(&mut self) -> bool {
        self.acceptor = None;
        self.drain_inbox();
        let ids = self.ids();
        for id in ids {
            if let Ok(device) = self.device(id) {
                if !device.is_ready() || device.queue.is_empty() {
                    let _ = self.halt(id);
                }
            }
        }
        self.reap();
        self.devices.is_empty()
    }

    /// Returns the handles of all devices.
    fn ids(&self) -> Vec<DeviceId> {
        self.devices
            .iter()
            .map(|(index, device)| DeviceId {
                index,
                generation: device.generation,
            })
            .collect()
    }

    /// Runs a single pass.
    fn pass(&mut self, cap: Option<Duration>) -> Result {
        let timeout = self.timeout(cap);
        let again = mem::take(&mut self.again);
        let mut ready = mem::take(&mut self.ready);
        let res = self.poller.poll(timeout, &mut ready);
        if res.is_ok() {
            trace!("poll returned {} events", ready.len());
            for event in &ready {
                if event.token == WAKER {
                    self.drain_inbox();
                } else {
                    self.dispatch(*event);
                }
            }
        }
        self.ready = ready;
        res?;

        // Continue reads left over from the previous pass
        for id in again {
            if let Ok(device) = self.device_mut(id) {
                device.again = false;
                self.dispatch_read(id);
            }
        }

        // Fire timers, run tasks and reap devices
        self.run_timers();
        self.run_tasks();
        self.reap();
        Ok(())
    }

    /// Computes the poll timeout.
    fn timeout(&mut self, cap: Option<Duration>) -> Option<Duration> {
        if !self.again.is_empty()
            || !self.tasks.is_empty()
            || !self.halting.is_empty()
        {
            return Some(Duration::ZERO);
        }

        // Wait until the earliest timer expires
        let now = self.clock.now();
        let timer = self
            .timers
            .next_expiry()
            .map(|at| at.saturating_duration_since(now));
        match (timer, cap) {
            (Some(timer), Some(cap)) => Some(timer.min(cap)),
            (timer, cap) => timer.or(cap),
        }
    }

    /// Fires all expired timers.
    fn run_timers(&mut self) {
        let now = self.clock.now();
        for id in self.timers.expired(now) {
            if let Some(job) = self.timers.cancel(id) {
                self.fire(id, job);
            }
        }
    }

    /// Fires a timer job.
    fn fire(&mut self, id: TimerId, job: Job) {
        match job {
            Job::User { f, slot } => {
                if let Some(slot) = slot {
                    slot.clear_if(id);
                }
                f(self);
            }
            Job::Read(device) => self.read_timed_out(device, id),
            Job::Write(device, node) => self.write_timed_out(device, node),
            Job::Connect(device) => self.connect_timed_out(device, id),
            Job::Handoff => {
                self.retry = None;
                self.retry_handoffs();
            }
        }
    }

    /// Runs all tasks that were deferred before this phase started.
    fn run_tasks(&mut self) {
        for _ in 0..self.tasks.len() {
            match self.tasks.pop_front() {
                Some(Task::User(f)) => f(self),
                Some(Task::Connected(id)) => self.connected(id),
                None => break,
            }
        }
    }

    /// Reaps all halting devices, including those halted while reaping.
    fn reap(&mut self) {
        while !self.halting.is_empty() {
            for id in mem::take(&mut self.halting) {
                self.close(id);
            }
        }
    }

    /// Closes a halting device, and notifies its handler.
    fn close(&mut self, id: DeviceId) {
        match self.device(id) {
            Ok(device) if device.state == State::Halting => {}
            _ => return,
        }
        let mut device = self.devices.remove(id.index);
        self.release(&mut device);
        device.state = State::Closed;
        debug!("device {id}: closed");

        // Notify handler, then release resources
        if let Some(mut handler) = device.handler.take() {
            let mut cx = Context::new(self, id);
            handler.on_disconnect(&mut cx);
        }
        drop(device);
    }

    /// Releases the registration and timers of a removed device.
    fn release(&mut self, device: &mut Device) {
        let interest = &mut device.interest;
        match &mut device.io {
            Io::Stream { socket, .. } => self.poller.forget(socket, interest),
            Io::Listener { listener, .. } => {
                self.poller.forget(listener, interest);
            }
            Io::Datagram { socket } => self.poller.forget(socket, interest),
        }

        // Cancel all timers referring to the device
        let timers = [device.read_timer.take(), device.connect_timer.take()];
        for timer in timers.into_iter().flatten() {
            self.timers.cancel(timer);
        }
        for node in device.queue.drain() {
            if let Some(timer) = node.timer {
                self.timers.cancel(timer);
            }
        }
    }
}

// ----------------------------------------------------------------------------

impl Loop {
    /// Returns a reference to a device.
    fn device(&self, id: DeviceId) -> Result<&Device> {
        match self.devices.get(id.index) {
            Some(device) if device.generation == id.generation => Ok(device),
            _ => Err(Error::NoSuchDevice(id)),
        }
    }

    /// Returns a mutable reference to a device.
    fn device_mut(&mut self, id: DeviceId) -> Result<&mut Device> {
        match self.devices.get_mut(id.index) {
            Some(device) if device.generation == id.generation => Ok(device),
            _ => Err(Error::NoSuchDevice(id)),
        }
    }

    /// Registers the interest a device currently needs with the poller.
    fn sync_interest(&mut self, id: DeviceId) -> Result {
        let Self { devices, poller, .. } = self;
        let device = match devices.get_mut(id.index) {
            Some(device) if device.generation == id.generation => device,
            _ => return Err(Error::NoSuchDevice(id)),
        };
        let wanted = device.wanted();
        let token = Token(id.index);
        let Device { io, interest, .. } = device;
        match io {
            Io::Stream { socket, .. } => {
                poller.update(socket, token, interest, wanted)
            }
            Io::Listener { listener, .. } => {
                poller.update(listener, token, interest, wanted)
            }
            Io::Datagram { socket } => {
                poller.update(socket, token, interest, wanted)
            }
        }
    }

    /// Queues a device for a read attempt at the end of the dispatch phase.
    fn schedule_read(&mut self, id: DeviceId) {
        if let Ok(device) = self.device_mut(id) {
            if !device.again {
                device.again = true;
                self.again.push(id);
            }
        }
    }

    /// Cancels the read timer of a device, and arms it again if needed.
    fn rearm_read_timer(&mut self, id: DeviceId) {
        let now = self.clock.now();
        let Ok(device) = self.device_mut(id) else {
            return;
        };
        let previous = device.read_timer.take();
        let timeout = device
            .read_timeout
            .filter(|_| device.reading && device.is_ready());
        if let Some(timeout) = timeout {
            let timer = self.timers.schedule(now + timeout, Job::Read(id));
            if let Ok(device) = self.device_mut(id) {
                device.read_timer = Some(timer);
            }
        }
        if let Some(previous) = previous {
            self.timers.cancel(previous);
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl From<Stop> for u8 {
    #[inline]
    fn from(mode: Stop) -> Self {
        match mode {
            Stop::Drain => 1,
            Stop::Terminate => 2,
        }
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for Connect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connect")
            .field("tls", &self.tls.is_some())
            .field("timeout", &self.timeout)
            .field("paused", &self.paused)
            .finish()
    }
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Loop")
            .field("stats", &self.stats())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::time::ManualClock;
    use crate::{Next, Read};

    use super::*;

    struct Idle;

    impl Handler for Idle {
        fn on_read(&mut self, _: &mut Context, _: Read) -> Result<Next> {
            Ok(Next::Again)
        }
    }

    fn manual() -> (Loop, ManualClock) {
        let clock = ManualClock::new();
        let lp = Loop::builder().clock(clock.clone()).build().unwrap();
        (lp, clock)
    }

    fn local() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_timers_fire_in_order() {
        let (mut lp, clock) = manual();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let now = lp.now();
        for secs in [30, 10, 20] {
            let fired = fired.clone();
            lp.schedule(now + Duration::from_secs(secs), move |_| {
                fired.borrow_mut().push(secs);
            });
        }

        clock.advance(Duration::from_secs(15));
        lp.poll(Some(Duration::ZERO)).unwrap();
        assert_eq!(*fired.borrow(), [10]);

        clock.advance(Duration::from_secs(20));
        lp.poll(Some(Duration::ZERO)).unwrap();
        assert_eq!(*fired.borrow(), [10, 20, 30]);
        assert_eq!(lp.stats(), Stats::default());
    }

    #[test]
    fn test_slot_is_cleared_before_callback() {
        let (mut lp, clock) = manual();
        let slot = TimerSlot::new();
        let runs = Rc::new(Cell::new(0));
        let at = lp.now();
        lp.schedule_slot(&slot, at, {
            let slot = slot.clone();
            let runs = runs.clone();
            move |lp| {
                runs.set(runs.get() + 1);
                assert!(!slot.is_armed());
                assert!(!lp.cancel_slot(&slot));

                // Re-arm the same slot from within the callback
                let at = lp.now() + Duration::from_secs(1);
                let runs = runs.clone();
                lp.schedule_slot(&slot, at, move |_| runs.set(runs.get() + 1));
            }
        });

        lp.poll(Some(Duration::ZERO)).unwrap();
        assert_eq!(runs.get(), 1);
        assert!(slot.is_armed());

        clock.advance(Duration::from_secs(1));
        lp.poll(Some(Duration::ZERO)).unwrap();
        assert_eq!(runs.get(), 2);
        assert!(!slot.is_armed());
    }

    #[test]
    fn test_cancel_slot() {
        let (mut lp, clock) = manual();
        let slot = TimerSlot::new();
        let fired = Rc::new(Cell::new(false));
        let at = lp.now() + Duration::from_secs(1);
        lp.schedule_slot(&slot, at, {
            let fired = fired.clone();
            move |_| fired.set(true)
        });

        assert!(lp.cancel_slot(&slot));
        clock.advance(Duration::from_secs(2));
        lp.poll(Some(Duration::ZERO)).unwrap();
        assert!(!fired.get());
        assert_eq!(lp.stats().timers, 0);
    }

    #[test]
    fn test_tasks_deferred_while_running_wait_for_next_pass() {
        let (mut lp, _) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        lp.defer({
            let log = log.clone();
            move |lp| {
                log.borrow_mut().push(1);
                lp.defer(move |_| log.borrow_mut().push(2));
            }
        });

        lp.poll(Some(Duration::ZERO)).unwrap();
        assert_eq!(*log.borrow(), [1]);
        assert_eq!(lp.stats().tasks, 1);

        lp.poll(Some(Duration::ZERO)).unwrap();
        assert_eq!(*log.borrow(), [1, 2]);
    }

    #[test]
    fn test_run_returns_when_idle() {
        let mut lp = Loop::new().unwrap();
        lp.run().unwrap();
        assert_eq!(lp.stats(), Stats::default());
    }

    #[test]
    fn test_stale_device_id() {
        let (mut lp, _) = manual();
        let id = lp.bind_udp(local(), Idle).unwrap();
        lp.halt(id).unwrap();
        lp.halt(id).unwrap();
        assert_eq!(lp.state(id).unwrap(), State::Halting);
        lp.poll(Some(Duration::ZERO)).unwrap();

        // Slot is reused, but the old handle stays invalid
        let next = lp.bind_udp(local(), Idle).unwrap();
        assert_eq!(next.index, id.index);
        assert!(matches!(lp.state(id), Err(Error::NoSuchDevice(_))));
        assert!(matches!(lp.halt(id), Err(Error::NoSuchDevice(_))));
        assert!(matches!(
            lp.write_to(id, b"x".to_vec(), 0, local()),
            Err(Error::NoSuchDevice(_))
        ));
        assert_eq!(lp.state(next).unwrap(), State::Connected);
    }

    #[test]
    fn test_write_kind_checks() {
        let (mut lp, _) = manual();
        let udp = lp.bind_udp(local(), Idle).unwrap();
        let listener = lp
            .listen(local(), |_: SocketAddr| Box::new(Idle) as Box<dyn Handler>)
            .unwrap();
        assert!(matches!(
            lp.write(udp, b"x".to_vec(), 0),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            lp.write(listener, b"x".to_vec(), 0),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_disconnect_and_resources_on_reap() {
        struct Notify(Rc<Cell<bool>>);

        impl Handler for Notify {
            fn on_read(&mut self, _: &mut Context, _: Read) -> Result<Next> {
                Ok(Next::Again)
            }

            fn on_disconnect(&mut self, cx: &mut Context) {
                assert!(cx.state().is_err());
                self.0.set(true);
            }
        }

        let (mut lp, _) = manual();
        let disconnected = Rc::new(Cell::new(false));
        let killed = Rc::new(Cell::new(false));
        let id = lp.bind_udp(local(), Notify(disconnected.clone())).unwrap();
        let resource = Resource::with_kill((), {
            let killed = killed.clone();
            move |_| killed.set(true)
        });
        lp.attach(id, resource).unwrap();

        lp.halt(id).unwrap();
        assert!(!disconnected.get());
        lp.poll(Some(Duration::ZERO)).unwrap();
        assert!(disconnected.get());
        assert!(killed.get());
        assert_eq!(lp.stats(), Stats::default());
    }

    #[test]
    fn test_terminate_closes_everything() {
        let (mut lp, _) = manual();
        lp.listen(local(), |_: SocketAddr| Box::new(Idle) as Box<dyn Handler>)
            .unwrap();
        lp.bind_udp(local(), Idle).unwrap();
        lp.stop(Stop::Drain);
        lp.stop(Stop::Terminate);
        lp.run().unwrap();
        assert_eq!(lp.stats().devices, 0);
    }

    #[test]
    fn test_drain_halts_idle_devices() {
        let (mut lp, _) = manual();
        lp.listen(local(), |_: SocketAddr| Box::new(Idle) as Box<dyn Handler>)
            .unwrap();
        lp.stop(Stop::Drain);
        lp.run().unwrap();
        assert_eq!(lp.stats().devices, 0);
    }
}
