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

//! HTTP error.

use std::collections::TryReserveError;
use std::{io, result};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// HTTP error.
#[derive(Debug, Error)]
pub enum Error {
    /// Request or status line is malformed.
    #[error("malformed initial line")]
    BadInitialLine,

    /// Header line is malformed, or headers contradict each other.
    #[error("malformed header")]
    BadHeader,

    /// Chunk size line or chunk terminator is malformed.
    #[error("malformed chunk")]
    BadChunk,

    /// Line, header count or content exceeds the configured limit.
    #[error("message too large")]
    TooLarge,

    /// Input ended inside a message.
    #[error("message truncated")]
    Truncated,

    /// Receiver rejected the message.
    #[error("message aborted")]
    Aborted,

    /// Reader failed before and can't be fed anymore.
    #[error("reader is dead")]
    Dead,

    /// Buffer allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// Unknown method.
    #[error("unknown method: {0}")]
    Method(String),

    /// Unknown header.
    #[error("unknown header: {0}")]
    Header(String),

    /// Server has no address to bind to.
    #[error("no address to bind to")]
    NoAddress,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Loop or device error.
    #[error(transparent)]
    Hio(#[from] hio::Error),
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Error {
    /// Returns whether the error was caused by the parsed input.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::BadInitialLine
                | Error::BadHeader
                | Error::BadChunk
                | Error::TooLarge
                | Error::Truncated
        )
    }
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

impl From<Error> for hio::Error {
    /// Creates a loop error, so handlers can propagate HTTP errors.
    fn from(err: Error) -> Self {
        match err {
            Error::Hio(err) => err,
            Error::Io(err) => hio::Error::Io(err),
            Error::OutOfMemory => hio::Error::OutOfMemory,
            err => hio::Error::Handler(err.to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// HTTP result.
pub type Result<T = ()> = result::Result<T, Error>;
