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

//! HTTP server builder.

use hio::{Config, Dispatcher, Loop};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::reader::{Mode, Options};
use crate::service::Service;

use super::worker::Worker;
use super::{Factory, Server};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Response for connections no worker can take.
const OVERLOAD: &[u8] = b"HTTP/1.1 503 Service Unavailable\r\n\
    Connection: close\r\n\
    Content-Length: 0\r\n\r\n";

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP server builder.
pub struct Builder {
    /// Service answering requests.
    service: Arc<dyn Service>,
    /// Socket addresses to bind to.
    addrs: Vec<SocketAddr>,
    /// Number of worker threads.
    workers: usize,
    /// Loop configuration.
    config: Config,
    /// Reader options.
    options: Options,
    /// Idle timeout of connections.
    idle: Duration,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Builder {
    /// Creates a server builder.
    ///
    /// Note that the canonical way to create a [`Server`] is to invoke the
    /// [`Server::builder`] method, which creates an instance of [`Builder`].
    /// However, if only a single address needs to be bound, it can be done
    /// directly using the [`Server::new`] method.
    ///
    /// # Examples
    ///
    /// ```
    /// use hio_http::server::Builder;
    /// use hio_http::service::NotFound;
    ///
    /// // Create server builder
    /// let builder = Builder::new(NotFound);
    /// ```
    pub fn new<S>(service: S) -> Self
    where
        S: Service,
    {
        Self {
            service: Arc::new(service),
            addrs: Vec::new(),
            workers: 0,
            config: Config::default(),
            options: Options::request(),
            idle: Duration::from_secs(30),
        }
    }

    /// Adds a socket address to bind to.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_http::server::Builder;
    /// use hio_http::service::NotFound;
    ///
    /// // Create server builder and add address
    /// let builder = Builder::new(NotFound).bind("127.0.0.1:8080")?;
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    pub fn bind<A>(mut self, addr: A) -> Result<Self>
    where
        A: ToSocketAddrs,
    {
        // Resolution may yield duplicates, e.g., for hosts listed twice
        let addrs = addr.to_socket_addrs()?;
        for addr in addrs {
            if !self.addrs.contains(&addr) {
                self.addrs.push(addr);
            }
        }
        Ok(self)
    }

    /// Sets the number of worker threads.
    ///
    /// With `0` workers, which is the default, connections are served on the
    /// loop of the listeners.
    #[inline]
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the configuration of all loops.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the reader options of connections.
    ///
    /// The mode is always forced to requests.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = Options { mode: Mode::Request, ..options };
        self
    }

    /// Sets the idle timeout of connections.
    #[inline]
    #[must_use]
    pub fn idle_timeout(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Creates the server and binds to the configured addresses.
    ///
    /// Workers are spawned before the listeners are bound, and stopped again
    /// if binding fails.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_http::server::Builder;
    /// use hio_http::service::NotFound;
    ///
    /// // Create server builder and bind to address
    /// let server = Builder::new(NotFound)
    ///     .bind("127.0.0.1:0")?
    ///     .workers(2)
    ///     .listen()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn listen(self) -> Result<Server> {
        if self.addrs.is_empty() {
            return Err(Error::NoAddress);
        }

        // Create loop of listeners and spawn workers
        let lp = Loop::builder().config(self.config.clone()).build()?;
        let factory = Factory::new(self.service, self.options, self.idle);
        let mut server =
            Server { lp, listeners: Vec::new(), workers: Vec::new() };
        for n in 0..self.workers {
            let config = self.config.clone();
            server.workers.push(Worker::spawn(n, config, factory.clone())?);
        }

        // Bind listeners, which either serve connections themselves, or hand
        // them off to the workers. On failure, dropping the server joins them
        let res = if server.workers.is_empty() {
            self.addrs.iter().try_for_each(|&addr| {
                let id = server.lp.listen(addr, factory.clone())?;
                server.listeners.push(id);
                Ok::<_, Error>(())
            })
        } else {
            let remotes = server.workers.iter().map(Worker::remote).collect();
            let dispatcher = Arc::new(Dispatcher::new(remotes, OVERLOAD));
            self.addrs.iter().try_for_each(|&addr| {
                let id = server.lp.listen_raw(addr, Arc::clone(&dispatcher))?;
                server.listeners.push(id);
                Ok::<_, Error>(())
            })
        };
        res.map(|()| server)
    }
}
