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

//! HTTP response.

use httpdate::fmt_http_date;
use std::fmt;
use std::time::SystemTime;

use super::component::{Header, Status};
use super::headers::Headers;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP response.
///
/// Responses are assembled by services, and encoded by the connection. The
/// builder methods consume and return the response, so they can be chained,
/// but all members are public as well.
///
/// # Examples
///
/// ```
/// use hio_http::{Header, Response, Status};
///
/// // Create response with custom content type
/// let res = Response::new()
///     .status(Status::Created)
///     .header(Header::ContentType, "application/json")
///     .body(r#"{"id":1}"#);
/// assert_eq!(res.status, Status::Created);
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    /// Status code.
    pub status: Status,
    /// Header fields.
    pub headers: Headers,
    /// Content.
    pub body: Vec<u8>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Response {
    /// Creates an empty `200 OK` response.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `200 OK` response with plain text content.
    ///
    /// # Examples
    ///
    /// ```
    /// use hio_http::{Header, Response};
    ///
    /// // Create response from text
    /// let res = Response::from_text("Hello, world!");
    /// assert_eq!(res.headers.get(Header::ContentLength), Some("13"));
    /// ```
    #[must_use]
    pub fn from_text<S>(text: S) -> Self
    where
        S: Into<String>,
    {
        Self::new().text(text)
    }

    /// Creates a response with the reason phrase of the status as text.
    #[must_use]
    pub fn from_status(status: Status) -> Self {
        Self::new().status(status).text(status.name())
    }

    /// Encodes the response.
    ///
    /// Missing `Date` and `Content-Length` headers are filled in, the latter
    /// unless the status forbids content, so the peer can always find the end
    /// of the response on a persistent connection.
    ///
    /// # Examples
    ///
    /// ```
    /// use hio_http::Response;
    ///
    /// // Create response and encode it
    /// let bytes = Response::new().body("Hello").encode();
    /// assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
    /// assert!(bytes.ends_with(b"Content-Length: 5\r\n\r\nHello"));
    /// ```
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        self.write(true)
    }

    /// Encodes the response to a HEAD request.
    ///
    /// Headers are the same as for [`Response::encode`], including the length
    /// of the content, but the content itself is left out.
    #[must_use]
    pub fn encode_head(self) -> Vec<u8> {
        self.write(false)
    }

    /// Encodes the response, with or without content.
    fn write(mut self, content: bool) -> Vec<u8> {
        if !self.headers.contains(Header::Date) {
            self.headers.set(Header::Date, fmt_http_date(SystemTime::now()));
        }
        let bodiless = self.status.is_bodiless();
        if !bodiless && !self.headers.contains(Header::ContentLength) {
            self.headers.set(Header::ContentLength, self.body.len());
        }

        // Write head, then content, if any
        let head = format!("HTTP/1.1 {}\r\n{}\r\n", self.status, self.headers);
        let mut bytes = head.into_bytes();
        if content && !bodiless {
            bytes.extend_from_slice(&self.body);
        }
        bytes
    }
}

impl Response {
    /// Sets the status.
    #[inline]
    #[must_use]
    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing all previous values.
    #[inline]
    #[must_use]
    pub fn header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: AsRef<str>,
        V: ToString,
    {
        self.headers.set(name, value);
        self
    }

    /// Sets the content.
    #[inline]
    #[must_use]
    pub fn body<B>(mut self, body: B) -> Self
    where
        B: Into<Vec<u8>>,
    {
        self.body = body.into();
        self
    }

    /// Sets plain text content, along with its type and length.
    #[must_use]
    pub fn text<S>(self, text: S) -> Self
    where
        S: Into<String>,
    {
        let text = text.into();
        let length = text.len();
        self.header(Header::ContentType, "text/plain; charset=utf-8")
            .header(Header::ContentLength, length)
            .body(text)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Response {
    /// Creates an empty `200 OK` response.
    #[inline]
    fn default() -> Self {
        Self {
            status: Status::Ok,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }
}

// ----------------------------------------------------------------------------

impl fmt::Display for Response {
    /// Formats the status line and headers for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes)\n{}", self.status, self.body.len(), self.headers)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Response;
    use crate::component::{Header, Status};

    #[test]
    fn test_encode_fills_in_length() {
        let bytes = Response::new().body("abc").encode();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.contains("Date: "));
        assert!(text.ends_with("\r\n\r\nabc"));
    }

    #[test]
    fn test_encode_head() {
        let bytes = Response::from_text("hello").encode_head();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_encode_bodiless() {
        let test_cases = vec![Status::NoContent, Status::NotModified];
        for status in test_cases {
            let bytes = Response::new().status(status).body("x").encode();
            let text = String::from_utf8(bytes).unwrap();
            assert!(
                !text.contains(Header::ContentLength.name()),
                "Failed for {status}"
            );
            assert!(text.ends_with("\r\n\r\n"), "Failed for {status}");
        }
    }
}
