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

//! Writer options.

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Writer options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Spaces per nesting level, or `0` for compact output.
    pub indent: usize,
    /// Buffered bytes after which output is handed to the underlying writer.
    pub flush_threshold: usize,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Options {
    /// Creates options for compact output.
    #[inline]
    #[must_use]
    pub fn compact() -> Self {
        Self::default()
    }

    /// Creates options for pretty printing with the given indentation.
    #[inline]
    #[must_use]
    pub fn pretty(indent: usize) -> Self {
        Self { indent, ..Self::default() }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Options {
    /// Creates options for compact output.
    fn default() -> Self {
        Self { indent: 0, flush_threshold: 8 * 1024 }
    }
}
