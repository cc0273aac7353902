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

//! Loop and device error.

use std::collections::TryReserveError;
use std::{io, result};
use thiserror::Error;

use super::device::{DeviceId, State};

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Loop and device error.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Buffer allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// Device handle is stale or was never issued by this loop.
    #[error("no such device: {0}")]
    NoSuchDevice(DeviceId),

    /// Operation is not valid in the device's current state.
    #[error("device {id} is {state}")]
    InvalidState {
        /// Device handle.
        id: DeviceId,
        /// Current state.
        state: State,
    },

    /// Write side of the device was closed.
    #[error("write side closed")]
    WriteClosed,

    /// Operation does not apply to this kind of device.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Side channel disconnected.
    #[error("side channel disconnected")]
    Disconnected,

    /// Error raised by a handler.
    #[error("{0}")]
    Handler(String),
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl From<TryReserveError> for Error {
    /// Creates an error from a failed reservation.
    #[inline]
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// Loop and device result.
pub type Result<T = ()> = result::Result<T, Error>;
