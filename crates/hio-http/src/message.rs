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

//! HTTP message.

use std::fmt;

use super::component::{Method, Version};
use super::error::Result;
use super::headers::Headers;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP message.
///
/// A message is populated incrementally by a [`Reader`][], which hands it to
/// the receiver at three points: after the initial line, after the header
/// block, and once it's complete. Content grows with every body segment, until
/// the message is either complete or discarded, after which any further
/// content is dropped.
///
/// Request messages carry a method and a target, response messages a status
/// code and a reason. The fields of the other kind are empty.
///
/// [`Reader`]: crate::Reader
#[derive(Clone, Debug, Default)]
pub struct Message {
    /// Protocol version.
    pub(crate) version: Version,
    /// Request method as received.
    pub(crate) method: String,
    /// Request target as received.
    pub(crate) target: String,
    /// Request path, percent-decoded if possible.
    pub(crate) path: String,
    /// Request query, if any.
    pub(crate) query: Option<String>,
    /// Response status code.
    pub(crate) code: u16,
    /// Response reason phrase.
    pub(crate) reason: String,
    /// Header table.
    pub(crate) headers: Headers,
    /// Trailer table, if trailers were received.
    pub(crate) trailers: Option<Headers>,
    /// Content received so far.
    pub(crate) content: Vec<u8>,
    /// Content length announced by the header block.
    pub(crate) content_length: Option<u64>,
    /// Message flags.
    pub(crate) flags: Flags,
}

/// Message flags.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Flags {
    /// Content uses chunked framing.
    pub chunked: bool,
    /// Connection persists after this message.
    pub keep_alive: bool,
    /// Sender waits for `100 Continue` before sending content.
    pub expect_continue: bool,
    /// Path was percent-decoded.
    pub percent_decoded: bool,
    /// Connection switches protocols after this message.
    pub upgrade: bool,
    /// Message is complete.
    pub complete: bool,
    /// Content is discarded.
    pub discard: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Message {
    /// Appends a content segment.
    ///
    /// Once the message is complete or discarded, this is a no-op.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::OutOfMemory`][], if the content buffer
    /// can't be grown.
    ///
    /// [`Error::OutOfMemory`]: crate::Error::OutOfMemory
    pub fn push_content(&mut self, data: &[u8]) -> Result {
        if self.flags.complete || self.flags.discard {
            return Ok(());
        }
        self.content.try_reserve(data.len())?;
        self.content.extend_from_slice(data);
        Ok(())
    }

    /// Discards all content, including what arrives later.
    ///
    /// The message is still read to its end, so the next message on the
    /// same connection is found.
    #[inline]
    pub fn discard(&mut self) {
        self.flags.discard = true;
        self.content = Vec::new();
    }

    /// Takes the content out of the message.
    #[inline]
    pub fn take_content(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.content)
    }

    /// Marks the message as complete.
    #[inline]
    pub(crate) fn complete(&mut self) {
        self.flags.complete = true;
    }

    /// Resets the message for reuse, keeping allocated capacity.
    pub(crate) fn reset(&mut self) {
        self.version = Version::default();
        self.method.clear();
        self.target.clear();
        self.path.clear();
        self.query = None;
        self.code = 0;
        self.reason.clear();
        self.headers.clear();
        self.trailers = None;
        self.content.clear();
        self.content_length = None;
        self.flags = Flags::default();
    }
}

#[allow(clippy::must_use_candidate)]
impl Message {
    /// Returns the protocol version.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request method as received.
    #[inline]
    pub fn method_name(&self) -> &str {
        &self.method
    }

    /// Returns the request method, if it's a known one.
    #[inline]
    pub fn method(&self) -> Option<Method> {
        self.method.parse().ok()
    }

    /// Returns the request target as received.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request path, percent-decoded if possible.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request query, if any.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the response status code.
    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Returns the response reason phrase.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the header table.
    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the trailer table, if trailers were received.
    #[inline]
    pub fn trailers(&self) -> Option<&Headers> {
        self.trailers.as_ref()
    }

    /// Returns the content received so far.
    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the content length announced by the header block.
    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Returns whether the content uses chunked framing.
    #[inline]
    pub fn is_chunked(&self) -> bool {
        self.flags.chunked
    }

    /// Returns whether the connection persists after this message.
    #[inline]
    pub fn is_keep_alive(&self) -> bool {
        self.flags.keep_alive
    }

    /// Returns whether the sender waits for `100 Continue`.
    #[inline]
    pub fn expects_continue(&self) -> bool {
        self.flags.expect_continue
    }

    /// Returns whether the path was percent-decoded.
    #[inline]
    pub fn is_percent_decoded(&self) -> bool {
        self.flags.percent_decoded
    }

    /// Returns whether the connection switches protocols after this message.
    #[inline]
    pub fn is_upgrade(&self) -> bool {
        self.flags.upgrade
    }

    /// Returns whether the message is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.flags.complete
    }

    /// Returns whether the content is discarded.
    #[inline]
    pub fn is_discarded(&self) -> bool {
        self.flags.discard
    }

    /// Returns whether the message announced content.
    #[inline]
    pub fn has_content(&self) -> bool {
        self.flags.chunked || self.content_length.is_some_and(|n| n > 0)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for Message {
    /// Formats the message for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.method.is_empty() {
            write!(f, "{} {} {}\r\n", self.version, self.code, self.reason)?;
        } else {
            write!(f, "{} {} {}\r\n", self.method, self.target, self.version)?;
        }
        write!(f, "{}\r\n", self.headers)?;
        write!(f, "[Content: {} bytes]\r\n", self.content.len())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Message;

    #[test]
    fn test_content_is_frozen_once_complete() {
        let mut message = Message::default();
        message.push_content(b"abc").unwrap();
        message.complete();
        message.push_content(b"def").unwrap();
        assert_eq!(message.content(), b"abc");
    }

    #[test]
    fn test_content_is_dropped_once_discarded() {
        let mut message = Message::default();
        message.push_content(b"abc").unwrap();
        message.discard();
        message.push_content(b"def").unwrap();
        assert!(message.content().is_empty());
        assert!(message.is_discarded());
    }
}
