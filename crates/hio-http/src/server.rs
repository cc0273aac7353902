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

//! HTTP server.

use hio::{Acceptor, DeviceId, Handler, Loop, Remote, Stop};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use super::connection::Connection;
use super::error::Result;
use super::reader::Options;
use super::service::Service;

mod builder;
mod worker;

pub use builder::Builder;
use worker::Worker;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP server.
///
/// A server owns the loop its listeners are registered with. Without workers,
/// connections are served on that loop. With workers, every worker runs its
/// own loop on a dedicated thread, and the listeners hand accepted connections
/// to them in round-robin order. When all workers are saturated, connections
/// are answered with `503 Service Unavailable` and closed.
///
/// Servers are bound to the thread that created them. Use [`Server::remote`]
/// to stop a running server from another thread.
pub struct Server {
    /// Event loop of listeners.
    lp: Loop,
    /// Listener devices.
    listeners: Vec<DeviceId>,
    /// Worker threads.
    workers: Vec<Worker>,
}

/// Acceptor creating a connection for every accepted stream.
#[derive(Clone)]
pub(crate) struct Factory {
    /// Service answering requests.
    service: Arc<dyn Service>,
    /// Reader options.
    options: Options,
    /// Idle timeout.
    idle: Duration,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Server {
    /// Creates a server.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_http::server::Server;
    /// use hio_http::service::NotFound;
    ///
    /// // Create server
    /// let server = Server::new(NotFound, "127.0.0.1:0")?;
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    pub fn new<S, A>(service: S, addr: A) -> Result<Self>
    where
        S: Service,
        A: ToSocketAddrs,
    {
        Self::builder(service).bind(addr)?.listen()
    }

    /// Creates a server builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use hio_http::server::Server;
    /// use hio_http::service::NotFound;
    ///
    /// // Create server builder
    /// let builder = Server::builder(NotFound);
    /// ```
    #[inline]
    pub fn builder<S>(service: S) -> Builder
    where
        S: Service,
    {
        Builder::new(service)
    }

    /// Returns the addresses the server is listening on.
    ///
    /// This is useful when binding to port `0`, which lets the operating system
    /// pick a free port.
    pub fn local_addrs(&self) -> Result<Vec<SocketAddr>> {
        let iter = self.listeners.iter();
        iter.map(|&id| self.lp.local_addr(id).map_err(Into::into))
            .collect()
    }

    /// Returns a sendable handle to stop the server.
    #[inline]
    #[must_use]
    pub fn remote(&self) -> Remote {
        self.lp.remote()
    }

    /// Returns the number of workers.
    #[inline]
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Runs the server until it's stopped.
    ///
    /// When the listening loop stops, workers are asked to drain, which lets
    /// them finish responses in flight, and are then joined.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio::Stop;
    /// use hio_http::server::Server;
    /// use hio_http::service::NotFound;
    ///
    /// // Create server and stop it before running
    /// let server = Server::new(NotFound, "127.0.0.1:0")?;
    /// server.remote().stop(Stop::Terminate);
    /// server.run()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn run(mut self) -> Result {
        let res = self.lp.run().map_err(Into::into);
        let workers = std::mem::take(&mut self.workers);
        let joined = worker::join(workers, Stop::Drain);
        res.and(joined)
    }
}

impl Factory {
    /// Creates a connection factory.
    pub(crate) fn new(
        service: Arc<dyn Service>, options: Options, idle: Duration,
    ) -> Self {
        Self { service, options, idle }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Acceptor for Factory {
    fn accept(&mut self, _: SocketAddr) -> hio::Result<Box<dyn Handler>> {
        Ok(Box::new(Connection::new(
            Arc::clone(&self.service),
            self.options.clone(),
            self.idle,
        )))
    }
}

// ----------------------------------------------------------------------------

impl Drop for Server {
    /// Stops and joins workers of a server that was never run.
    fn drop(&mut self) {
        let workers = std::mem::take(&mut self.workers);
        let _ = worker::join(workers, Stop::Terminate);
    }
}
