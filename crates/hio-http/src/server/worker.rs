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

//! Server worker.

use crossbeam::channel;
use hio::{Config, Loop, Remote, Stop};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use super::Factory;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Server worker.
///
/// A worker runs its own loop on a dedicated thread, serving connections that
/// are handed off to it through its remote.
pub(super) struct Worker {
    /// Handle of the worker's loop.
    remote: Remote,
    /// Thread handle.
    handle: JoinHandle<hio::Result>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Worker {
    /// Spawns a worker, and waits until its loop is ready.
    pub(super) fn spawn(
        n: usize, config: Config, factory: Factory,
    ) -> Result<Self> {
        let (sender, receiver) = channel::bounded(1);
        let handle = thread::Builder::new()
            .name(format!("hio-http-{n}"))
            .spawn(move || -> hio::Result {
                let mut lp = Loop::builder().config(config).build()?;
                lp.accept_remote(factory);

                // Announce readiness, then serve until stopped
                let _ = sender.send(lp.remote());
                drop(sender);
                lp.run()
            })?;

        // If the worker couldn't create its loop, the channel disconnects
        // without a remote, and the error is taken from the thread
        match receiver.recv() {
            Ok(remote) => {
                debug!("worker {n} ready");
                Ok(Self { remote, handle })
            }
            Err(_) => match handle.join() {
                Ok(Err(err)) => Err(err.into()),
                _ => Err(hio::Error::Disconnected.into()),
            },
        }
    }

    /// Returns the handle of the worker's loop.
    pub(super) fn remote(&self) -> Remote {
        self.remote.clone()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Stops all workers in the given mode, and joins them.
///
/// All workers are joined, even if some of them failed. The first failure is
/// returned.
pub(super) fn join(workers: Vec<Worker>, mode: Stop) -> Result {
    for worker in &workers {
        worker.remote.stop(mode);
    }

    // Join workers in order of creation
    let mut res = Ok(());
    for worker in workers {
        let err = match worker.handle.join() {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => {
                error!("worker failed: {err}");
                err
            }
            Err(_) => {
                error!("worker panicked");
                hio::Error::Disconnected
            }
        };
        if res.is_ok() {
            res = Err(err.into());
        }
    }
    res
}
