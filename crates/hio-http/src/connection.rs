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

//! HTTP connection.

use hio::{Context, Handler, Next, Read, Written};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::component::{Header, Status, Version};
use super::error::{Error, Result};
use super::message::Message;
use super::reader::{Flow, Options, Reader, Recv};
use super::response::Response;
use super::service::Service;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Interim response for requests waiting for permission to send content.
const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Write tag of responses.
const RESPONSE: usize = 0;

/// Write tag of the half-close after the last response.
const CLOSE: usize = 1;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP connection.
///
/// A connection reads requests from a stream device, answers each of them
/// through the service, and keeps the device open as long as both sides agree
/// on persistence. Once a response is the last one, the write side is closed
/// after it, and the device is halted as soon as the peer closed its write
/// side as well, or stays silent for the idle timeout.
///
/// Requests that can't be parsed are answered with an error status before
/// the connection is closed, and all further input is discarded.
pub struct Connection {
    /// Request reader.
    reader: Reader,
    /// Service answering requests.
    service: Arc<dyn Service>,
    /// Idle timeout.
    idle: Duration,
    /// Whether the write side is about to be closed.
    closing: bool,
    /// Whether the write side was closed.
    shut: bool,
    /// Whether the peer closed its write side.
    ended: bool,
}

/// Exchange of a request and its response.
struct Exchange<'a, 'b> {
    /// Handler context.
    cx: &'a mut Context<'b>,
    /// Service answering requests.
    service: &'a dyn Service,
    /// Whether the write side is about to be closed.
    closing: &'a mut bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Connection {
    /// Creates a connection.
    #[must_use]
    pub fn new(
        service: Arc<dyn Service>, options: Options, idle: Duration,
    ) -> Self {
        Self {
            reader: Reader::new(options),
            service,
            idle,
            closing: false,
            shut: false,
            ended: false,
        }
    }

    /// Feeds data to the reader, answering all complete requests.
    fn feed(&mut self, cx: &mut Context, data: &[u8]) -> hio::Result {
        let mut exchange = Exchange {
            cx: &mut *cx,
            service: self.service.as_ref(),
            closing: &mut self.closing,
        };
        let res = self.reader.feed(data, &mut exchange);
        self.settle(cx, res.map(|_| ()))
    }

    /// Handles the outcome of reading, answering protocol errors.
    fn settle(&mut self, cx: &mut Context, res: Result) -> hio::Result {
        match res {
            Ok(()) => {}
            Err(Error::Hio(err)) => return Err(err),
            Err(err) => {
                debug!("rejected request: {err}");
                if !self.closing {
                    let status = match err {
                        Error::TooLarge => Status::PayloadTooLarge,
                        _ if err.is_protocol() => Status::BadRequest,
                        _ => Status::InternalServerError,
                    };
                    let res = Response::from_status(status)
                        .header(Header::Connection, "close");
                    cx.write(res.encode(), RESPONSE)?;
                    cx.shutdown(CLOSE)?;
                    self.closing = true;
                }
            }
        }

        // Discard further input once the last response is queued
        if self.closing && !self.reader.is_dummy() {
            self.reader.dummify();
        }
        Ok(())
    }
}

impl Exchange<'_, '_> {
    /// Queues the response to the given request.
    fn respond(
        &mut self, request: &Message, mut response: Response, keep_alive: bool,
    ) -> Result {
        if keep_alive {
            if request.version() == Version::Http10 {
                response.headers.set(Header::Connection, "keep-alive");
            }
        } else {
            response.headers.set(Header::Connection, "close");
        }

        // Responses to HEAD requests announce, but never carry content
        let head = matches!(request.method(), Some(method) if method.is_head());
        let bytes = if head {
            response.encode_head()
        } else {
            response.encode()
        };
        self.cx.write(bytes, RESPONSE)?;
        if !keep_alive {
            self.cx.shutdown(CLOSE)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Handler for Connection {
    fn on_connect(&mut self, cx: &mut Context) -> hio::Result {
        cx.read_timeout(Some(self.idle))
    }

    fn on_read(&mut self, cx: &mut Context, read: Read) -> hio::Result<Next> {
        match read {
            Read::Data(data) => self.feed(cx, data)?,
            Read::Eof => {
                self.ended = true;
                let mut exchange = Exchange {
                    cx: &mut *cx,
                    service: self.service.as_ref(),
                    closing: &mut self.closing,
                };
                let res = self.reader.eof(&mut exchange);
                self.settle(cx, res)?;
                if !self.closing {
                    cx.shutdown(CLOSE)?;
                    self.closing = true;
                }
                if self.shut {
                    cx.halt()?;
                }
            }
            Read::Timeout => {
                debug!("connection idle for {:?}", self.idle);
                cx.halt()?;
            }
            Read::Datagram(..) => {}
        }
        Ok(Next::Again)
    }

    fn on_write(
        &mut self, cx: &mut Context, _: Written, tag: usize,
    ) -> hio::Result {
        if tag == CLOSE {
            self.shut = true;
            if self.ended {
                cx.halt()?;
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------

impl Recv for Exchange<'_, '_> {
    fn head(&mut self, message: &mut Message) -> Result<Flow> {
        if message.expects_continue()
            && message.has_content()
            && message.version() == Version::Http11
        {
            self.cx.write(CONTINUE, RESPONSE)?;
        }
        Ok(Flow::Continue)
    }

    fn poke(&mut self, message: &mut Message) -> Result<Flow> {
        let response = self.service.serve(message);
        let keep_alive = message.is_keep_alive() && !message.is_upgrade();
        self.respond(message, response, keep_alive)?;

        // Stop parsing after the last response
        if keep_alive {
            Ok(Flow::Continue)
        } else {
            *self.closing = true;
            Ok(Flow::Suspend)
        }
    }
}
