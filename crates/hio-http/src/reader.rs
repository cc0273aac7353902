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

//! Incremental HTTP reader.
//!
//! A [`Reader`] is a push parser: it's fed bytes as they arrive, in fragments
//! of any size, and reports progress to a [`Recv`] implementation, which sees
//! each message after its initial line, after its header block, and once it's
//! complete. Partial lines are buffered, so no boundary between messages or
//! their parts needs to align with the boundaries of reads.

use percent_encoding::percent_decode_str;
use std::mem;
use tracing::debug;

use super::component::{is_bodiless, Header, Version};
use super::error::{Error, Result};
use super::headers::Headers;
use super::message::Message;

mod options;

pub use options::{Mode, Options};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Receiver of messages.
///
/// Every callback returns a [`Flow`] to tell the reader whether to go on,
/// suspend until [`Reader::resume`] is invoked, or give up on the input. The
/// message handed to [`Recv::poke`] is reset right after the callback returns,
/// so its content must be taken out there.
pub trait Recv {
    /// Invoked once the initial line was read.
    fn peek(&mut self, message: &mut Message) -> Result<Flow> {
        let _ = message;
        Ok(Flow::Continue)
    }

    /// Invoked once the header block was read.
    fn head(&mut self, message: &mut Message) -> Result<Flow> {
        let _ = message;
        Ok(Flow::Continue)
    }

    /// Invoked for every content segment.
    ///
    /// The default implementation appends the segment to the message, which
    /// receivers that stream content elsewhere can override.
    fn push_content(&mut self, message: &mut Message, data: &[u8]) -> Result {
        message.push_content(data)
    }

    /// Invoked once the message is complete.
    fn poke(&mut self, message: &mut Message) -> Result<Flow>;
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Decision of a receiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Flow {
    /// Continue reading.
    #[default]
    Continue,
    /// Buffer further input until resumed.
    Suspend,
    /// Reject the message, which kills the reader.
    Abort,
}

/// Reader phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Between messages, skipping empty lines.
    Init,
    /// Reading the request or status line.
    InitialLine,
    /// Reading header lines.
    Headers,
    /// Reading content of known length, with the given number of bytes left.
    Length(u64),
    /// Reading content until the end of input.
    UntilEof,
    /// Reading a chunk size line.
    ChunkSize,
    /// Reading chunk data, with the given number of bytes left.
    ChunkData(u64),
    /// Reading the line terminator after chunk data.
    ChunkEnd,
    /// Reading trailer lines.
    Trailers,
    /// Message is complete, but not yet handed to the receiver.
    Complete,
    /// Protocol was switched, so no more input is parsed.
    Switched,
}

/// Reason for parsing to stop.
enum Halt {
    /// Input was consumed.
    Drained,
    /// Receiver asked to suspend.
    Suspended,
    /// Protocol was switched.
    Switched,
}

/// Content framing.
enum Body {
    /// No content.
    None,
    /// Content of known length.
    Length(u64),
    /// Chunked content.
    Chunked,
    /// Content until the end of input.
    UntilEof,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Incremental HTTP reader.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use hio_http::reader::{Flow, Reader};
/// use hio_http::Message;
///
/// // Collect paths of all requests
/// let mut paths = Vec::new();
/// let mut recv = |message: &mut Message| -> hio_http::Result<Flow> {
///     paths.push(message.path().to_string());
///     Ok(Flow::Continue)
/// };
///
/// // Feed two pipelined requests in arbitrary fragments
/// let mut reader = Reader::default();
/// reader.feed(b"GET /a HTTP/1.1\r\nHo", &mut recv)?;
/// reader.feed(b"st: x\r\n\r\nGET /b HTTP/1.1\r\n\r\n", &mut recv)?;
/// assert_eq!(paths, ["/a", "/b"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct Reader {
    /// Reader options.
    options: Options,
    /// Current phase.
    phase: Phase,
    /// Partial line.
    line: Vec<u8>,
    /// Buffer for handing complete lines to the parser.
    scratch: Vec<u8>,
    /// Input buffered while suspended.
    pending: Vec<u8>,
    /// Message in progress.
    message: Message,
    /// Content bytes of the message in progress.
    received: u64,
    /// Header lines of the message in progress.
    lines: usize,
    /// Whether the next response answers a HEAD request.
    head_request: bool,
    /// Whether the reader is suspended.
    suspended: bool,
    /// Whether the end of input was reached while suspended.
    ended: bool,
    /// Whether input is discarded.
    dummy: bool,
    /// Whether the reader failed.
    dead: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Reader {
    /// Creates a reader.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            phase: Phase::Init,
            line: Vec::new(),
            scratch: Vec::new(),
            pending: Vec::new(),
            message: Message::default(),
            received: 0,
            lines: 0,
            head_request: false,
            suspended: false,
            ended: false,
            dummy: false,
            dead: false,
        }
    }

    /// Feeds the given bytes to the reader.
    ///
    /// Complete lines and content segments are consumed right away, partial
    /// lines are buffered until the rest arrives. While the reader is
    /// suspended, all input is buffered.
    ///
    /// Returns the number of bytes at the end of the input that were left
    /// unconsumed, which is only ever non-zero once a message switched the
    /// protocol, e.g., through `Upgrade` or `CONNECT`. These bytes belong to
    /// the new protocol.
    ///
    /// # Errors
    ///
    /// This method returns an error, if the input is malformed, exceeds a
    /// limit, or the receiver fails or aborts. The reader is dead after any
    /// error, and further calls return [`Error::Dead`].
    pub fn feed<R>(&mut self, data: &[u8], recv: &mut R) -> Result<usize>
    where
        R: Recv + ?Sized,
    {
        if self.dead {
            return Err(Error::Dead);
        }
        if self.dummy {
            return Ok(0);
        }
        if self.phase == Phase::Switched {
            return Ok(data.len());
        }
        if self.suspended {
            return self.stash(data).map(|()| 0);
        }

        // Parse input, and stash what's left if the receiver suspended
        match self.parse(data, recv) {
            Ok((_, Halt::Drained)) => Ok(0),
            Ok((n, Halt::Suspended)) => self.stash(&data[n..]).map(|()| 0),
            Ok((n, Halt::Switched)) => Ok(data.len() - n),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Signals the end of input.
    ///
    /// Content framed by the end of input completes here. If the reader is
    /// suspended, the end of input is applied once it's resumed.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Truncated`], if the input ended inside
    /// a message, and propagates errors of the receiver.
    pub fn eof<R>(&mut self, recv: &mut R) -> Result
    where
        R: Recv + ?Sized,
    {
        if self.dead {
            return Err(Error::Dead);
        }
        if self.suspended {
            self.ended = true;
            return Ok(());
        }
        self.end(recv).map_err(|err| self.fail(err))
    }

    /// Suspends the reader, buffering all further input.
    #[inline]
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Resumes the reader, parsing all input buffered while suspended.
    ///
    /// Returns the buffered bytes left unconsumed after a protocol switch,
    /// which is empty otherwise.
    ///
    /// # Errors
    ///
    /// This method returns the same errors as [`Reader::feed`].
    pub fn resume<R>(&mut self, recv: &mut R) -> Result<Vec<u8>>
    where
        R: Recv + ?Sized,
    {
        if self.dead {
            return Err(Error::Dead);
        }
        if !self.suspended {
            return Ok(Vec::new());
        }

        // Parse buffered input, which is handed back after a protocol switch
        self.suspended = false;
        let mut pending = mem::take(&mut self.pending);
        match self.parse(&pending, recv) {
            Ok((_, Halt::Drained)) => {
                pending.clear();
                self.pending = pending;
                if mem::take(&mut self.ended) {
                    self.end(recv).map_err(|err| self.fail(err))?;
                }
                Ok(Vec::new())
            }
            Ok((n, Halt::Suspended)) => {
                pending.drain(..n);
                self.pending = pending;
                Ok(Vec::new())
            }
            Ok((n, Halt::Switched)) => {
                pending.drain(..n);
                Ok(pending)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Switches the reader to discard all further input.
    ///
    /// This is used once a connection is about to be closed, e.g., after an
    /// error response, so remaining input is drained without being parsed.
    pub fn dummify(&mut self) {
        self.dummy = true;
        self.suspended = false;
        self.pending = Vec::new();
        self.line = Vec::new();
        self.message.reset();
    }

    /// Marks the next response as answering a HEAD request.
    ///
    /// Responses to HEAD requests never carry content, whatever their framing
    /// headers announce. The mark is cleared once the response is complete.
    #[inline]
    pub fn answering_head(&mut self, head: bool) {
        self.head_request = head;
    }
}

#[allow(clippy::must_use_candidate)]
impl Reader {
    /// Returns the reader options.
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the message in progress.
    #[inline]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns whether the reader is at a message boundary.
    ///
    /// A clean reader has no partial message and no buffered input, so the
    /// connection it belongs to can be reused or closed without losing data.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.phase == Phase::Init
            && self.pending.is_empty()
            && !self.dead
    }

    /// Returns whether the reader is suspended.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Returns whether the reader discards input.
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    /// Returns whether the reader failed.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

impl Reader {
    /// Parses the given input, returning how much of it was consumed.
    fn parse<R>(&mut self, data: &[u8], recv: &mut R) -> Result<(usize, Halt)>
    where
        R: Recv + ?Sized,
    {
        let mut pos = 0;
        loop {
            let rest = &data[pos..];
            let halt = match self.phase {
                Phase::Complete => self.finish(recv)?,
                Phase::Switched => return Ok((pos, Halt::Switched)),
                _ if rest.is_empty() => return Ok((pos, Halt::Drained)),

                // Skip empty lines between messages
                Phase::Init => {
                    let n = rest
                        .iter()
                        .take_while(|&&b| b == b'\r' || b == b'\n')
                        .count();
                    pos += n;
                    if n < rest.len() {
                        self.phase = Phase::InitialLine;
                    }
                    None
                }

                // Hand content to the receiver, as much as is available
                Phase::Length(left) => {
                    let n = available(left, rest.len());
                    self.content(recv, &rest[..n])?;
                    pos += n;
                    self.phase = match left - n as u64 {
                        0 => Phase::Complete,
                        left => Phase::Length(left),
                    };
                    None
                }
                Phase::ChunkData(left) => {
                    let n = available(left, rest.len());
                    self.content(recv, &rest[..n])?;
                    pos += n;
                    self.phase = match left - n as u64 {
                        0 => Phase::ChunkEnd,
                        left => Phase::ChunkData(left),
                    };
                    None
                }
                Phase::UntilEof => {
                    self.content(recv, rest)?;
                    pos = data.len();
                    None
                }

                // Buffer line until its terminator arrives
                Phase::InitialLine
                | Phase::Headers
                | Phase::ChunkSize
                | Phase::ChunkEnd
                | Phase::Trailers => {
                    match rest.iter().position(|&b| b == b'\n') {
                        None => {
                            self.append(rest)?;
                            pos = data.len();
                            None
                        }
                        Some(n) => {
                            self.append(&rest[..n])?;
                            pos += n + 1;
                            self.line(recv)?
                        }
                    }
                }
            };

            // Stop if the receiver suspended or the protocol switched
            if let Some(halt) = halt {
                return Ok((pos, halt));
            }
        }
    }

    /// Handles a complete line.
    fn line<R>(&mut self, recv: &mut R) -> Result<Option<Halt>>
    where
        R: Recv + ?Sized,
    {
        let mut line = mem::take(&mut self.line);
        let res = self.dispatch_line(&line, recv);
        line.clear();
        self.line = line;
        res
    }

    /// Dispatches a complete line according to the current phase.
    fn dispatch_line<R>(
        &mut self, line: &[u8], recv: &mut R,
    ) -> Result<Option<Halt>>
    where
        R: Recv + ?Sized,
    {
        let line = match line.strip_suffix(b"\r") {
            Some(line) => line,
            None if self.options.strict_crlf => return Err(self.malformed()),
            None => line,
        };
        match self.phase {
            Phase::InitialLine => self.initial_line(line, recv),
            Phase::Headers if line.is_empty() => self.header_block(recv),
            Phase::Trailers if line.is_empty() => {
                self.phase = Phase::Complete;
                Ok(None)
            }
            Phase::Headers | Phase::Trailers => {
                self.header_line(line).map(|()| None)
            }
            Phase::ChunkSize => self.chunk_size(line).map(|()| None),
            Phase::ChunkEnd if line.is_empty() => {
                self.phase = Phase::ChunkSize;
                Ok(None)
            }
            _ => Err(Error::BadChunk),
        }
    }

    /// Parses the request or status line.
    fn initial_line<R>(
        &mut self, line: &[u8], recv: &mut R,
    ) -> Result<Option<Halt>>
    where
        R: Recv + ?Sized,
    {
        self.scratch.clear();
        self.scratch.try_reserve(line.len() + 4)?;
        self.scratch.extend_from_slice(line);
        self.scratch.extend_from_slice(b"\r\n\r\n");

        // The parser needs at least one header slot, even if none are used
        let mut headers = [httparse::EMPTY_HEADER; 1];
        let message = &mut self.message;
        let minor = match self.options.mode {
            Mode::Request => {
                let mut req = httparse::Request::new(&mut headers);
                let Ok(httparse::Status::Complete(_)) = req.parse(&self.scratch)
                else {
                    return Err(Error::BadInitialLine);
                };
                let (Some(method), Some(target)) = (req.method, req.path)
                else {
                    return Err(Error::BadInitialLine);
                };
                message.method.push_str(method);
                message.target.push_str(target);
                req.version
            }
            Mode::Response => {
                let mut res = httparse::Response::new(&mut headers);
                let Ok(httparse::Status::Complete(_)) = res.parse(&self.scratch)
                else {
                    return Err(Error::BadInitialLine);
                };
                let Some(code) = res.code else {
                    return Err(Error::BadInitialLine);
                };
                message.code = code;
                message.reason.push_str(res.reason.unwrap_or_default());
                res.version
            }
        };
        message.version = minor
            .and_then(Version::from_minor)
            .ok_or(Error::BadInitialLine)?;

        // Split request target into path and query
        if self.options.mode == Mode::Request {
            let (path, query) = match message.target.split_once('?') {
                Some((path, query)) => (path, Some(query.to_string())),
                None => (message.target.as_str(), None),
            };
            let (path, decoded) = match percent_decode_str(path).decode_utf8() {
                Ok(path) => (path.into_owned(), true),
                Err(_) => (path.to_string(), false),
            };
            message.path = path;
            message.query = query;
            message.flags.percent_decoded = decoded;
        }

        // Hand message to receiver
        self.phase = Phase::Headers;
        let flow = recv.peek(&mut self.message)?;
        self.flow(flow)
    }

    /// Parses a header or trailer line.
    fn header_line(&mut self, line: &[u8]) -> Result {
        let trailer = self.phase == Phase::Trailers;
        if trailer && self.options.skip_trailers {
            return Ok(());
        }

        // Continuation lines extend the most recent value
        if matches!(line.first(), Some(b' ' | b'\t')) {
            let value = String::from_utf8_lossy(line);
            let headers = if trailer {
                self.message.trailers.as_mut().ok_or(Error::BadHeader)?
            } else {
                &mut self.message.headers
            };
            return headers.fold(&value);
        }

        // Ensure header count doesn't exceed the limit
        self.lines += 1;
        if self.lines > self.options.max_headers {
            return Err(Error::TooLarge);
        }

        // Validate name and value through the parser
        self.scratch.clear();
        self.scratch.try_reserve(line.len() + 4)?;
        self.scratch.extend_from_slice(line);
        self.scratch.extend_from_slice(b"\r\n\r\n");
        let mut headers = [httparse::EMPTY_HEADER; 1];
        let (name, value) = match httparse::parse_headers(&self.scratch, &mut headers)
        {
            Ok(httparse::Status::Complete((_, [header]))) => (
                header.name.to_string(),
                String::from_utf8_lossy(header.value).into_owned(),
            ),
            _ => return Err(Error::BadHeader),
        };

        // Add to headers or trailers
        if trailer {
            let trailers = self.message.trailers.get_or_insert_with(Headers::new);
            trailers.append(name, value);
        } else {
            self.message.headers.append(name, value);
        }
        Ok(())
    }

    /// Completes the header block, choosing the content framing.
    fn header_block<R>(&mut self, recv: &mut R) -> Result<Option<Halt>>
    where
        R: Recv + ?Sized,
    {
        self.phase = match self.framing()? {
            Body::None | Body::Length(0) => Phase::Complete,
            Body::Length(n) => Phase::Length(n),
            Body::Chunked => Phase::ChunkSize,
            Body::UntilEof => Phase::UntilEof,
        };
        let flow = recv.head(&mut self.message)?;
        self.flow(flow)
    }

    /// Determines content framing and connection flags from the headers.
    fn framing(&mut self) -> Result<Body> {
        let request = self.options.mode == Mode::Request;
        let message = &mut self.message;
        let headers = &message.headers;

        // Determine whether the connection persists after this message
        let close = headers.has_token(Header::Connection, "close");
        message.flags.keep_alive = match message.version {
            Version::Http11 => !close,
            Version::Http10 => {
                !close && headers.has_token(Header::Connection, "keep-alive")
            }
        };

        // Determine whether the protocol switches after this message
        if request {
            message.flags.expect_continue = headers
                .get(Header::Expect)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("100-continue"));
            let connect =
                matches!(message.method(), Some(method) if method.is_connect());
            message.flags.upgrade = connect
                || (headers.contains(Header::Upgrade)
                    && headers.has_token(Header::Connection, "upgrade"));
        } else {
            message.flags.upgrade = message.code == 101;
        }

        // Collect content length, where all values must agree
        let mut length = None;
        for value in headers.get_all(Header::ContentLength) {
            for item in value.split(',').map(str::trim) {
                if item.is_empty() || !item.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::BadHeader);
                }
                let n = item.parse::<u64>().map_err(|_| Error::BadHeader)?;
                if length.is_some_and(|m| m != n) {
                    return Err(Error::BadHeader);
                }
                length = Some(n);
            }
        }

        // Responses to HEAD requests and some status codes have no content
        if !request && (self.head_request || is_bodiless(message.code)) {
            message.content_length = length;
            return Ok(Body::None);
        }

        // Transfer encoding takes precedence over content length
        if headers.contains(Header::TransferEncoding) {
            let coding = headers
                .get_all(Header::TransferEncoding)
                .flat_map(|value| value.split(','))
                .map(str::trim)
                .filter(|coding| !coding.is_empty())
                .last();
            if coding.is_some_and(|coding| coding.eq_ignore_ascii_case("chunked")) {
                message.flags.chunked = true;
                return Ok(Body::Chunked);
            }

            // Requests must end with chunked, responses are read until EOF
            if request {
                return Err(Error::BadHeader);
            }
            message.flags.keep_alive = false;
            return Ok(Body::UntilEof);
        }

        // Use content length, or fall back to defaults
        message.content_length = length;
        match length {
            Some(n) if n > self.options.max_content => Err(Error::TooLarge),
            Some(n) => Ok(Body::Length(n)),
            None if request => Ok(Body::None),
            None => {
                message.flags.keep_alive = false;
                Ok(Body::UntilEof)
            }
        }
    }

    /// Parses a chunk size line.
    fn chunk_size(&mut self, line: &[u8]) -> Result {
        if !line.first().is_some_and(u8::is_ascii_hexdigit) {
            return Err(Error::BadChunk);
        }

        // Parse chunk size, ignoring extensions
        self.scratch.clear();
        self.scratch.try_reserve(line.len() + 2)?;
        self.scratch.extend_from_slice(line);
        self.scratch.extend_from_slice(b"\r\n");
        let size = match httparse::parse_chunk_size(&self.scratch) {
            Ok(httparse::Status::Complete((_, size))) => size,
            _ => return Err(Error::BadChunk),
        };

        // Zero-size chunk is the last one, and is followed by trailers
        if size == 0 {
            self.phase = Phase::Trailers;
        } else if self.received.saturating_add(size) > self.options.max_content {
            return Err(Error::TooLarge);
        } else {
            self.phase = Phase::ChunkData(size);
        }
        Ok(())
    }

    /// Hands a content segment to the receiver.
    fn content<R>(&mut self, recv: &mut R, data: &[u8]) -> Result
    where
        R: Recv + ?Sized,
    {
        self.received += data.len() as u64;
        if self.received > self.options.max_content {
            return Err(Error::TooLarge);
        }
        recv.push_content(&mut self.message, data)
    }

    /// Completes the message in progress, and prepares for the next one.
    fn finish<R>(&mut self, recv: &mut R) -> Result<Option<Halt>>
    where
        R: Recv + ?Sized,
    {
        self.message.complete();
        let flow = recv.poke(&mut self.message)?;

        // Reset state for the next message
        let upgrade = self.message.flags.upgrade;
        self.message.reset();
        self.received = 0;
        self.lines = 0;
        self.head_request = false;

        // Stop parsing after a protocol switch
        if upgrade {
            self.phase = Phase::Switched;
            return match flow {
                Flow::Abort => Err(Error::Aborted),
                _ => Ok(Some(Halt::Switched)),
            };
        }
        self.phase = Phase::Init;
        self.flow(flow)
    }

    /// Handles the end of input.
    fn end<R>(&mut self, recv: &mut R) -> Result
    where
        R: Recv + ?Sized,
    {
        if self.dummy {
            return Ok(());
        }
        match self.phase {
            Phase::Init | Phase::Switched => Ok(()),
            Phase::UntilEof | Phase::Complete => {
                self.phase = Phase::Complete;
                self.finish(recv).map(|_| ())
            }
            _ => Err(Error::Truncated),
        }
    }

    /// Applies the decision of a receiver.
    fn flow(&mut self, flow: Flow) -> Result<Option<Halt>> {
        match flow {
            Flow::Continue => Ok(None),
            Flow::Suspend => {
                self.suspended = true;
                Ok(Some(Halt::Suspended))
            }
            Flow::Abort => Err(Error::Aborted),
        }
    }

    /// Appends the given bytes to the partial line.
    fn append(&mut self, data: &[u8]) -> Result {
        if self.line.len() + data.len() >= self.options.max_line {
            return Err(Error::TooLarge);
        }
        self.line.try_reserve(data.len())?;
        self.line.extend_from_slice(data);
        Ok(())
    }

    /// Buffers input while suspended.
    fn stash(&mut self, data: &[u8]) -> Result {
        if let Err(err) = self.pending.try_reserve(data.len()) {
            return Err(self.fail(err.into()));
        }
        self.pending.extend_from_slice(data);
        Ok(())
    }

    /// Returns the error for a malformed line in the current phase.
    fn malformed(&self) -> Error {
        match self.phase {
            Phase::InitialLine => Error::BadInitialLine,
            Phase::Headers | Phase::Trailers => Error::BadHeader,
            _ => Error::BadChunk,
        }
    }

    /// Marks the reader as dead.
    fn fail(&mut self, err: Error) -> Error {
        debug!("reader failed: {err}");
        self.dead = true;
        err
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Reader {
    /// Creates a reader for requests.
    #[inline]
    fn default() -> Self {
        Self::new(Options::default())
    }
}

// ----------------------------------------------------------------------------
// Blanket implementations
// ----------------------------------------------------------------------------

impl<F> Recv for F
where
    F: FnMut(&mut Message) -> Result<Flow>,
{
    #[inline]
    fn poke(&mut self, message: &mut Message) -> Result<Flow> {
        self(message)
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns how many of the available bytes belong to the content left.
#[inline]
fn available(left: u64, available: usize) -> usize {
    usize::try_from(left).map_or(available, |left| left.min(available))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Flow, Message, Options, Phase, Reader, Recv, Result};
    use crate::Error;

    /// Snapshot of a complete message.
    #[derive(Debug, PartialEq, Eq)]
    struct Seen {
        start: String,
        headers: Vec<(String, String)>,
        trailers: Option<Vec<(String, String)>>,
        content: Vec<u8>,
        keep_alive: bool,
    }

    /// Receiver recording every callback.
    #[derive(Default)]
    struct Collect {
        peeks: usize,
        heads: usize,
        seen: Vec<Seen>,
        suspend_on_head: bool,
    }

    impl Recv for Collect {
        fn peek(&mut self, _: &mut Message) -> Result<Flow> {
            self.peeks += 1;
            Ok(Flow::Continue)
        }

        fn head(&mut self, _: &mut Message) -> Result<Flow> {
            self.heads += 1;
            if self.suspend_on_head {
                return Ok(Flow::Suspend);
            }
            Ok(Flow::Continue)
        }

        fn poke(&mut self, message: &mut Message) -> Result<Flow> {
            let pairs = |headers: &crate::Headers| -> Vec<(String, String)> {
                headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect()
            };
            let start = if message.method_name().is_empty() {
                format!("{} {}", message.code(), message.reason())
            } else {
                format!("{} {}", message.method_name(), message.path())
            };
            self.seen.push(Seen {
                start,
                headers: pairs(message.headers()),
                trailers: message.trailers().map(pairs),
                content: message.take_content(),
                keep_alive: message.is_keep_alive(),
            });
            Ok(Flow::Continue)
        }
    }

    const CHUNKED: &[u8] = b"POST /upload HTTP/1.1\r\n\
        Host: example.com\r\n\
        X-Folded: first\r\n \
        second\r\n\
        Transfer-Encoding: chunked\r\n\
        \r\n\
        5;ext=1\r\nhello\r\n\
        7\r\n, world\r\n\
        0\r\n\
        X-Checksum: abc\r\n\
        \r\n";

    fn feed_all(reader: &mut Reader, recv: &mut Collect, parts: &[&[u8]]) {
        for part in parts {
            assert_eq!(reader.feed(part, recv).unwrap(), 0);
        }
    }

    #[test]
    fn test_chunked_request() {
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        feed_all(&mut reader, &mut recv, &[CHUNKED]);
        assert_eq!(recv.seen.len(), 1);
        let seen = &recv.seen[0];
        assert_eq!(seen.start, "POST /upload");
        assert_eq!(seen.content, b"hello, world");
        assert_eq!(
            seen.headers[1],
            ("X-Folded".to_string(), "first second".to_string())
        );
        assert_eq!(
            seen.trailers,
            Some(vec![("X-Checksum".to_string(), "abc".to_string())])
        );
        assert!(reader.is_clean());
    }

    #[test]
    fn test_every_split_parses_identically() {
        let mut reader = Reader::default();
        let mut expected = Collect::default();
        feed_all(&mut reader, &mut expected, &[CHUNKED]);

        // Split into two parts at every position
        for n in 0..=CHUNKED.len() {
            let (head, tail) = CHUNKED.split_at(n);
            let mut reader = Reader::default();
            let mut recv = Collect::default();
            feed_all(&mut reader, &mut recv, &[head, tail]);
            assert_eq!(recv.seen, expected.seen, "Failed for split at {n}");
            assert_eq!((recv.peeks, recv.heads), (1, 1));
        }

        // Feed byte by byte
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        for byte in CHUNKED {
            assert_eq!(reader.feed(&[*byte], &mut recv).unwrap(), 0);
        }
        assert_eq!(recv.seen, expected.seen);
    }

    #[test]
    fn test_chunk_sizes() {
        let test_cases = vec![
            vec![0],
            vec![1],
            vec![7],
            vec![4096],
            vec![1, 7, 4096],
        ];
        for sizes in test_cases {
            let mut data = b"PUT /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
            let mut body = Vec::new();
            for (n, size) in sizes.iter().copied().enumerate() {
                if size == 0 {
                    continue;
                }
                let chunk: Vec<u8> =
                    (0..size).map(|i| b'a' + ((i + n) % 26) as u8).collect();
                data.extend_from_slice(format!("{size:x}\r\n").as_bytes());
                data.extend_from_slice(&chunk);
                data.extend_from_slice(b"\r\n");
                body.extend_from_slice(&chunk);
            }
            data.extend_from_slice(b"0\r\n\r\n");

            // Feed in fragments of 3 bytes, so chunk boundaries never align
            let mut reader = Reader::default();
            let mut recv = Collect::default();
            for part in data.chunks(3) {
                reader.feed(part, &mut recv).unwrap();
            }
            assert_eq!(recv.seen.len(), 1, "Failed for {sizes:?}");
            assert_eq!(recv.seen[0].content, body, "Failed for {sizes:?}");
        }
    }

    #[test]
    fn test_pipelined_requests() {
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        let data = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc\
            GET /b HTTP/1.0\r\n\r\n\r\n\
            GET /c HTTP/1.1\r\nConnection: close\r\n\r\n";
        feed_all(&mut reader, &mut recv, &[data]);
        let summary: Vec<_> = recv
            .seen
            .iter()
            .map(|seen| (seen.start.as_str(), seen.content.as_slice(), seen.keep_alive))
            .collect();
        assert_eq!(
            summary,
            [
                ("POST /a", b"abc".as_slice(), true),
                ("GET /b", b"".as_slice(), false),
                ("GET /c", b"".as_slice(), false),
            ]
        );
    }

    #[test]
    fn test_keep_alive() {
        let test_cases = vec![
            ("HTTP/1.1", "", true),
            ("HTTP/1.1", "Connection: close\r\n", false),
            ("HTTP/1.0", "", false),
            ("HTTP/1.0", "Connection: Keep-Alive\r\n", true),
        ];
        for (version, header, expected) in test_cases {
            let data = format!("GET / {version}\r\n{header}\r\n");
            let mut reader = Reader::default();
            let mut recv = Collect::default();
            reader.feed(data.as_bytes(), &mut recv).unwrap();
            assert_eq!(recv.seen[0].keep_alive, expected, "Failed for {data:?}");
        }
    }

    #[test]
    fn test_percent_decoding() {
        let test_cases = vec![
            ("/a%20b?x=%20", "/a b", Some("x=%20"), true),
            ("/plain", "/plain", None, true),
            ("/bad%FF", "/bad%FF", None, false),
        ];
        for (target, path, query, decoded) in test_cases {
            let data = format!("GET {target} HTTP/1.1\r\n\r\n");
            let mut seen = None;
            let mut recv = |message: &mut Message| -> Result<Flow> {
                seen = Some((
                    message.path().to_string(),
                    message.query().map(str::to_string),
                    message.is_percent_decoded(),
                ));
                Ok(Flow::Continue)
            };
            Reader::default().feed(data.as_bytes(), &mut recv).unwrap();
            assert_eq!(
                seen,
                Some((path.to_string(), query.map(str::to_string), decoded)),
                "Failed for {target:?}"
            );
        }
    }

    #[test]
    fn test_response_until_eof() {
        let mut reader = Reader::new(Options::response());
        let mut recv = Collect::default();
        feed_all(&mut reader, &mut recv, &[b"HTTP/1.1 200 OK\r\n\r\nsome", b" data"]);
        assert!(recv.seen.is_empty());
        reader.eof(&mut recv).unwrap();
        assert_eq!(recv.seen.len(), 1);
        assert_eq!(recv.seen[0].start, "200 OK");
        assert_eq!(recv.seen[0].content, b"some data");
        assert!(!recv.seen[0].keep_alive);
    }

    #[test]
    fn test_response_without_content() {
        let test_cases = vec![
            ("HTTP/1.1 204 No Content\r\nContent-Length: 5\r\n\r\n", false),
            ("HTTP/1.1 304 Not Modified\r\n\r\n", false),
            ("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n", true),
        ];
        for (data, head) in test_cases {
            let mut reader = Reader::new(Options::response());
            let mut recv = Collect::default();
            reader.answering_head(head);
            reader.feed(data.as_bytes(), &mut recv).unwrap();
            assert_eq!(recv.seen.len(), 1, "Failed for {data:?}");
            assert!(recv.seen[0].content.is_empty(), "Failed for {data:?}");
            assert!(reader.is_clean(), "Failed for {data:?}");
        }
    }

    #[test]
    fn test_upgrade_returns_remainder() {
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        let data = b"GET /ws HTTP/1.1\r\n\
            Connection: Upgrade\r\n\
            Upgrade: websocket\r\n\
            \r\n\
            \x81\x05hello";
        let left = reader.feed(data, &mut recv).unwrap();
        assert_eq!(left, 7);
        assert_eq!(recv.seen.len(), 1);
        assert_eq!(reader.phase(), Phase::Switched);
        assert_eq!(reader.feed(b"more", &mut recv).unwrap(), 4);
    }

    #[test]
    fn test_connect_returns_remainder() {
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        let data = b"CONNECT example.com:443 HTTP/1.1\r\n\r\n\x16\x03";
        assert_eq!(reader.feed(data, &mut recv).unwrap(), 2);
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut reader = Reader::default();
        let mut recv = Collect { suspend_on_head: true, ..Collect::default() };
        let data = b"POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nabGET /b HTTP/1.1\r\n\r\n";
        assert_eq!(reader.feed(data, &mut recv).unwrap(), 0);
        assert!(reader.is_suspended());
        assert_eq!((recv.heads, recv.seen.len()), (1, 0));

        // Further input is buffered without callbacks
        reader.feed(b"GET /c HTTP/1.1\r\n\r\n", &mut recv).unwrap();
        assert_eq!((recv.heads, recv.seen.len()), (1, 0));

        // Resuming continues with the buffered input
        recv.suspend_on_head = false;
        assert!(reader.resume(&mut recv).unwrap().is_empty());
        let starts: Vec<_> = recv.seen.iter().map(|seen| seen.start.as_str()).collect();
        assert_eq!(starts, ["POST /a", "GET /b", "GET /c"]);
        assert_eq!(recv.seen[0].content, b"ab");
        assert!(reader.is_clean());
    }

    #[test]
    fn test_eof_while_suspended_applies_on_resume() {
        let mut reader = Reader::new(Options::response());
        let mut recv = Collect::default();
        reader.feed(b"HTTP/1.1 200 OK\r\n\r\nabc", &mut recv).unwrap();
        reader.suspend();
        reader.feed(b"def", &mut recv).unwrap();
        reader.eof(&mut recv).unwrap();
        assert!(recv.seen.is_empty());
        reader.resume(&mut recv).unwrap();
        assert_eq!(recv.seen.len(), 1);
        assert_eq!(recv.seen[0].content, b"abcdef");
    }

    #[test]
    fn test_dummy_discards_input() {
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        reader.feed(b"GET /a HTTP/1.1\r\nHost", &mut recv).unwrap();
        reader.dummify();
        reader.feed(b": x\r\n\r\nGET /b HTTP/1.1\r\n\r\n", &mut recv).unwrap();
        reader.eof(&mut recv).unwrap();
        assert_eq!((recv.peeks, recv.seen.len()), (1, 0));
    }

    #[test]
    fn test_discarded_content_is_still_framed() {
        struct Discard(Vec<(String, usize)>);

        impl Recv for Discard {
            fn head(&mut self, message: &mut Message) -> Result<Flow> {
                message.discard();
                Ok(Flow::Continue)
            }

            fn poke(&mut self, message: &mut Message) -> Result<Flow> {
                self.0.push((message.path().to_string(), message.content().len()));
                Ok(Flow::Continue)
            }
        }

        let mut reader = Reader::default();
        let mut recv = Discard(Vec::new());
        let data = b"POST /a HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcdGET /b HTTP/1.1\r\n\r\n";
        reader.feed(data, &mut recv).unwrap();
        assert_eq!(recv.0, [("/a".to_string(), 0), ("/b".to_string(), 0)]);
    }

    #[test]
    fn test_errors() {
        let long = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(9000));
        let many = format!("GET / HTTP/1.1\r\n{}\r\n", "X-A: 1\r\n".repeat(101));
        let test_cases: Vec<(Vec<u8>, Error)> = vec![
            (b"GET /\r\n\r\n".to_vec(), Error::BadInitialLine),
            (b"GET / HTTP/2.0\r\n\r\n".to_vec(), Error::BadInitialLine),
            (b"GET / HTTP/1.1\r\nNo Colon\r\n\r\n".to_vec(), Error::BadHeader),
            (b"GET / HTTP/1.1\r\n folded\r\n\r\n".to_vec(), Error::BadHeader),
            (
                b"POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\n".to_vec(),
                Error::BadHeader,
            ),
            (b"POST / HTTP/1.1\r\nContent-Length: +1\r\n\r\n".to_vec(), Error::BadHeader),
            (
                b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n".to_vec(),
                Error::BadHeader,
            ),
            (
                b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n".to_vec(),
                Error::BadChunk,
            ),
            (
                b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\r\n".to_vec(),
                Error::BadChunk,
            ),
            (
                b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\nab\r\n".to_vec(),
                Error::BadChunk,
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: 99999999999\r\n\r\n".to_vec(),
                Error::TooLarge,
            ),
            (long.into_bytes(), Error::TooLarge),
            (many.into_bytes(), Error::TooLarge),
        ];
        for (data, expected) in test_cases {
            let mut reader = Reader::default();
            let mut recv = Collect::default();
            let err = reader.feed(&data, &mut recv).unwrap_err();
            assert_eq!(
                err.to_string(),
                expected.to_string(),
                "Failed for {:?}",
                String::from_utf8_lossy(&data)
            );
            assert!(reader.is_dead());
            assert!(matches!(reader.feed(b"x", &mut recv), Err(Error::Dead)));
        }
    }

    #[test]
    fn test_strict_crlf() {
        let data = b"GET / HTTP/1.1\nHost: x\n\n";
        let mut recv = Collect::default();
        Reader::default().feed(data, &mut recv).unwrap();
        assert_eq!(recv.seen.len(), 1);

        let mut reader = Reader::new(Options { strict_crlf: true, ..Options::default() });
        let err = reader.feed(data, &mut recv).unwrap_err();
        assert!(matches!(err, Error::BadInitialLine));
    }

    #[test]
    fn test_truncated_at_eof() {
        let test_cases: Vec<&[u8]> = vec![
            b"GET / HT",
            b"GET / HTTP/1.1\r\nHost: x\r\n",
            b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab",
        ];
        for data in test_cases {
            let mut reader = Reader::default();
            let mut recv = Collect::default();
            reader.feed(data, &mut recv).unwrap();
            let err = reader.eof(&mut recv).unwrap_err();
            assert!(matches!(err, Error::Truncated), "Failed for {data:?}");
        }

        // End of input between messages is fine
        let mut reader = Reader::default();
        let mut recv = Collect::default();
        reader.feed(b"GET / HTTP/1.1\r\n\r\n\r\n", &mut recv).unwrap();
        reader.eof(&mut recv).unwrap();
    }

    #[test]
    fn test_abort_kills_reader() {
        let mut recv = |_: &mut Message| -> Result<Flow> { Ok(Flow::Abort) };
        let mut reader = Reader::default();
        let err = reader.feed(b"GET / HTTP/1.1\r\n\r\n", &mut recv).unwrap_err();
        assert!(matches!(err, Error::Aborted));
        assert!(reader.is_dead());
    }
}
