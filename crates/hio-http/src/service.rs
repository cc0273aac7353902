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

//! HTTP service.

use super::component::Status;
use super::message::Message;
use super::response::Response;

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// HTTP service.
///
/// A service answers complete request messages. It's shared by all workers of
/// a [`Server`][], which is why it must be [`Send`] and [`Sync`]. Functions
/// and closures taking a [`Message`] and returning a [`Response`] are
/// services as well.
///
/// [`Server`]: crate::server::Server
///
/// # Examples
///
/// ```
/// use hio_http::service::Service;
/// use hio_http::{Message, Response};
///
/// // Create service from closure
/// let service = |message: &Message| {
///     Response::from_text(format!("You asked for {}", message.path()))
/// };
/// # fn check<S: Service>(_: S) {}
/// # check(service);
/// ```
pub trait Service: Send + Sync + 'static {
    /// Answers the given request.
    fn serve(&self, message: &Message) -> Response;
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Service answering every request with `404 Not Found`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotFound;

/// Service answering requests below a path prefix with a fixed text.
///
/// Requests for other paths are answered with `404 Not Found`.
///
/// # Examples
///
/// ```
/// use hio_http::service::Text;
///
/// // Create service answering below /txt/
/// let service = Text::new("/txt/", "Hello, world!");
/// ```
#[derive(Clone, Debug)]
pub struct Text {
    /// Path prefix.
    prefix: String,
    /// Response text.
    body: String,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Text {
    /// Creates a text service.
    pub fn new<P, B>(prefix: P, body: B) -> Self
    where
        P: Into<String>,
        B: Into<String>,
    {
        Self { prefix: prefix.into(), body: body.into() }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Service for NotFound {
    fn serve(&self, _: &Message) -> Response {
        Response::from_status(Status::NotFound)
    }
}

impl Service for Text {
    fn serve(&self, message: &Message) -> Response {
        if message.path().starts_with(&self.prefix) {
            Response::from_text(self.body.as_str())
        } else {
            Response::from_status(Status::NotFound)
        }
    }
}

// ----------------------------------------------------------------------------
// Blanket implementations
// ----------------------------------------------------------------------------

impl<F> Service for F
where
    F: Fn(&Message) -> Response + Send + Sync + 'static,
{
    #[inline]
    fn serve(&self, message: &Message) -> Response {
        self(message)
    }
}
