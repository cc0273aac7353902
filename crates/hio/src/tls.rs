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

//! TLS transport contract.
//!
//! The loop does not implement TLS itself. Instead, stream devices can carry
//! a [`TlsSession`], which the loop drives through the handshake window and
//! then uses for every send and receive on the device. Any TLS library can
//! be plugged in by implementing this trait on top of a non-blocking socket.

use mio::net::TcpStream;
use std::io;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Outcome of a single handshake step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handshake {
    /// Step must be retried once the socket is readable.
    WantRead,
    /// Step must be retried once the socket is writable.
    WantWrite,
    /// Handshake completed.
    Done,
    /// Handshake failed.
    Failed,
}

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// TLS session bound to a stream device.
///
/// All methods operate on non-blocking sockets, and must report would-block
/// conditions as [`io::ErrorKind::WouldBlock`], so the loop can wait for the
/// next readiness event.
pub trait TlsSession {
    /// Advances the handshake as far as possible.
    fn handshake_step(&mut self, socket: &mut TcpStream) -> Handshake;

    /// Encrypts and sends data, returning how many plaintext bytes were taken.
    fn encrypt_send(
        &mut self, socket: &mut TcpStream, data: &[u8],
    ) -> io::Result<usize>;

    /// Receives and decrypts data into the buffer, returning its length.
    ///
    /// A return value of zero signals the end of the stream.
    fn decrypt_recv(
        &mut self, socket: &mut TcpStream, buffer: &mut [u8],
    ) -> io::Result<usize>;
}
