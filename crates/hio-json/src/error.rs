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

//! JSON error.

use std::collections::TryReserveError;
use std::{io, result};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// JSON error.
#[derive(Debug, Error)]
pub enum Error {
    /// Input violates the grammar.
    #[error("syntax error at offset {offset}: {reason}")]
    Syntax {
        /// Offset of the offending byte, counted over all input fed.
        offset: u64,
        /// Description of what was expected.
        reason: &'static str,
    },

    /// Escape sequence is unknown, or a surrogate is unpaired.
    #[error("invalid escape sequence")]
    Escape,

    /// String is not valid UTF-8.
    #[error("invalid UTF-8 in string")]
    Utf8,

    /// Token exceeds the configured length limit.
    #[error("token longer than {limit} bytes")]
    TooLong {
        /// Configured limit.
        limit: usize,
    },

    /// Buffer couldn't grow.
    #[error("out of memory")]
    OutOfMemory,

    /// Nesting exceeds the configured limit.
    #[error("nesting too deep")]
    Depth,

    /// Input ended inside a value.
    #[error("unterminated value")]
    Unterminated,

    /// Feeder failed before and can't be fed anymore.
    #[error("feeder is dead")]
    Dead,

    /// Writer was asked for something out of document order.
    #[error("invalid structure: {0}")]
    Structure(&'static str),

    /// Sink refused an instruction.
    #[error("instruction rejected")]
    Rejected,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Error {
    /// Creates a syntax error.
    #[inline]
    pub(crate) fn syntax(offset: u64, reason: &'static str) -> Self {
        Error::Syntax { offset, reason }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl From<TryReserveError> for Error {
    /// Creates an error from a failed allocation.
    #[inline]
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// JSON result.
pub type Result<T = ()> = result::Result<T, Error>;
