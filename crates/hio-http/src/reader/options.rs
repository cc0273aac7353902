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

//! Reader options.

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Kind of messages a reader expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Requests, as read by servers.
    #[default]
    Request,
    /// Responses, as read by clients.
    Response,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Reader options.
///
/// # Examples
///
/// ```
/// use hio_http::reader::{Mode, Options};
///
/// // Create options for reading responses with smaller content
/// let options = Options {
///     max_content: 64 * 1024,
///     ..Options::response()
/// };
/// assert_eq!(options.mode, Mode::Response);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Kind of messages.
    pub mode: Mode,
    /// Maximum length of a single line, including its line terminator.
    pub max_line: usize,
    /// Maximum number of header lines per message.
    pub max_headers: usize,
    /// Maximum content length per message.
    pub max_content: u64,
    /// Whether trailers are dropped instead of collected.
    pub skip_trailers: bool,
    /// Whether lines must end with CRLF, or a bare LF is accepted.
    pub strict_crlf: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Options {
    /// Creates options for reading requests.
    #[inline]
    #[must_use]
    pub fn request() -> Self {
        Self::default()
    }

    /// Creates options for reading responses.
    #[inline]
    #[must_use]
    pub fn response() -> Self {
        Self { mode: Mode::Response, ..Self::default() }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Options {
    /// Creates options for reading requests.
    fn default() -> Self {
        Self {
            mode: Mode::Request,
            max_line: 8 * 1024,
            max_headers: 100,
            max_content: 8 * 1024 * 1024,
            skip_trailers: false,
            strict_crlf: false,
        }
    }
}
