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

//! Feeder options.

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Feeder options.
///
/// All grammar extensions are off by default, so the feeder accepts exactly
/// RFC 8259. Each extension can be enabled on its own.
///
/// # Examples
///
/// ```
/// use hio_json::feeder::Options;
///
/// // Create options accepting unquoted keys only
/// let options = Options {
///     unquoted_keys: true,
///     ..Options::default()
/// };
/// assert!(!options.line_comments);
/// assert_eq!(options.max_token, 1 << 26);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Whether object keys may be bare identifiers.
    pub unquoted_keys: bool,
    /// Whether commas between elements may be omitted.
    pub optional_commas: bool,
    /// Whether `//` comments running to the end of the line are skipped.
    pub line_comments: bool,
    /// Maximum nesting depth of containers.
    pub max_depth: usize,
    /// Maximum length in bytes of a single string, number or key.
    pub max_token: usize,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Options {
    /// Creates options accepting exactly RFC 8259.
    #[inline]
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Creates options with all grammar extensions enabled.
    #[inline]
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            unquoted_keys: true,
            optional_commas: true,
            line_comments: true,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Options {
    /// Creates options accepting exactly RFC 8259.
    fn default() -> Self {
        Self {
            unquoted_keys: false,
            optional_commas: false,
            line_comments: false,
            max_depth: 512,
            max_token: 1 << 26,
        }
    }
}
