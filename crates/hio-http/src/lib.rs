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

//! Incremental HTTP/1.x reader and server on top of hio.
//!
//! The [`Reader`] parses HTTP/1.x messages from byte streams of arbitrary
//! fragmentation, handing each [`Message`] to a receiver once its initial
//! line, its headers and its content are complete. Message boundaries never
//! need to align with read boundaries, and pipelined messages are parsed one
//! after another from the same input.
//!
//! The [`Server`][] builds on the reader: it serves requests on hio loops,
//! answering each of them through a [`Service`][], and optionally spreads
//! connections over worker loops running on dedicated threads.
//!
//! [`Server`]: crate::server::Server
//! [`Service`]: crate::service::Service

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]

mod component;
mod connection;
mod error;
mod headers;
mod message;
pub mod reader;
mod response;
pub mod server;
pub mod service;

pub use component::{Header, Method, Status, Version};
pub use connection::Connection;
pub use error::{Error, Result};
pub use headers::Headers;
pub use message::Message;
pub use reader::Reader;
pub use response::Response;
