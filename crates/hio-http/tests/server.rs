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

//! Server tests over loopback sockets.

use crossbeam::channel;
use hio::{Remote, Stop};
use hio_http::reader::{Flow, Options};
use hio_http::server::{Builder, Server};
use hio_http::service::{Service, Text};
use hio_http::{Header, Message, Reader, Response};
use std::collections::VecDeque;
use std::io::{Read as _, Write as _};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Running server.
struct Running {
    addr: SocketAddr,
    remote: Remote,
    handle: JoinHandle<()>,
}

impl Running {
    /// Starts a server on its own thread.
    fn start(builder: Builder) -> Self {
        let (sender, receiver) = channel::bounded(1);
        let handle = thread::spawn(move || {
            let server = builder.bind("127.0.0.1:0").unwrap().listen().unwrap();
            let addr = server.local_addrs().unwrap()[0];
            sender.send((addr, server.remote())).unwrap();
            server.run().unwrap();
        });
        let (addr, remote) = receiver.recv().unwrap();
        Self { addr, remote, handle }
    }

    /// Stops the server and waits for it.
    fn stop(self) {
        self.remote.stop(Stop::Terminate);
        self.handle.join().unwrap();
    }
}

/// Client reading responses with a reader in response mode.
struct Client {
    stream: TcpStream,
    reader: Reader,
    messages: VecDeque<Message>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self {
            stream,
            reader: Reader::new(Options::response()),
            messages: VecDeque::new(),
        }
    }

    fn send(&mut self, data: &[u8]) {
        self.stream.write_all(data).unwrap();
    }

    /// Returns the next response, or nothing once the server closed.
    fn receive(&mut self) -> Option<Message> {
        let mut buffer = [0; 4096];
        while self.messages.is_empty() {
            let n = self.stream.read(&mut buffer).unwrap();
            let messages = &mut self.messages;
            let mut recv = |message: &mut Message| -> hio_http::Result<Flow> {
                messages.push_back(message.clone());
                Ok(Flow::Continue)
            };
            if n == 0 {
                self.reader.eof(&mut recv).unwrap();
                break;
            }
            self.reader.feed(&buffer[..n], &mut recv).unwrap();
        }
        self.messages.pop_front()
    }
}

fn text() -> Builder {
    Server::builder(Text::new("/txt/", "hello, world"))
}

fn echo() -> impl Service {
    |message: &Message| {
        let content = String::from_utf8_lossy(message.content());
        Response::from_text(content.into_owned())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_text_keep_alive() {
    init();
    let server = Running::start(text());
    let mut client = Client::connect(server.addr);

    // Both requests are answered on the same connection
    for _ in 0..2 {
        client.send(b"GET /txt/hello HTTP/1.1\r\nHost: x\r\n\r\n");
        let res = client.receive().unwrap();
        assert_eq!(res.code(), 200);
        assert_eq!(res.content(), b"hello, world");
        assert_eq!(res.headers().get(Header::Connection), None);
        assert!(res.headers().contains(Header::Date));
    }
    server.stop();
}

#[test]
fn test_not_found() {
    init();
    let server = Running::start(text());
    let mut client = Client::connect(server.addr);
    client.send(b"GET /other HTTP/1.1\r\nHost: x\r\n\r\n");
    let res = client.receive().unwrap();
    assert_eq!(res.code(), 404);
    assert_eq!(res.content(), b"Not Found");
    server.stop();
}

#[test]
fn test_pipelined() {
    init();
    let server = Running::start(text());
    let mut client = Client::connect(server.addr);
    client.send(
        b"GET /txt/a HTTP/1.1\r\nHost: x\r\n\r\n\
          GET /b HTTP/1.1\r\nHost: x\r\n\r\n",
    );
    assert_eq!(client.receive().unwrap().code(), 200);
    assert_eq!(client.receive().unwrap().code(), 404);
    server.stop();
}

#[test]
fn test_connection_close() {
    init();
    let test_cases = vec![
        "GET /txt/a HTTP/1.0\r\n\r\n",
        "GET /txt/a HTTP/1.1\r\nConnection: close\r\n\r\n",
    ];
    let server = Running::start(text());
    for request in test_cases {
        let mut client = Client::connect(server.addr);
        client.send(request.as_bytes());
        let res = client.receive().unwrap();
        assert_eq!(res.code(), 200, "Failed for {request:?}");
        assert_eq!(
            res.headers().get(Header::Connection),
            Some("close"),
            "Failed for {request:?}"
        );
        assert!(client.receive().is_none(), "Failed for {request:?}");
    }
    server.stop();
}

#[test]
fn test_http10_keep_alive() {
    init();
    let server = Running::start(text());
    let mut client = Client::connect(server.addr);
    for _ in 0..2 {
        client.send(b"GET /txt/a HTTP/1.0\r\nConnection: keep-alive\r\n\r\n");
        let res = client.receive().unwrap();
        assert_eq!(res.code(), 200);
        assert_eq!(res.headers().get(Header::Connection), Some("keep-alive"));
    }
    server.stop();
}

#[test]
fn test_head() {
    init();
    let server = Running::start(text());
    let mut client = Client::connect(server.addr);
    client.send(b"HEAD /txt/a HTTP/1.1\r\nHost: x\r\n\r\n");
    client.reader.answering_head(true);
    let res = client.receive().unwrap();
    assert_eq!(res.code(), 200);
    assert_eq!(res.headers().get(Header::ContentLength), Some("12"));
    assert!(res.content().is_empty());

    // The connection stays usable after the response without content
    client.send(b"GET /txt/a HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(client.receive().unwrap().content(), b"hello, world");
    server.stop();
}

#[test]
fn test_bad_request() {
    init();
    let server = Running::start(text());
    let mut client = Client::connect(server.addr);
    client.send(b"BROKEN\r\n\r\nGET /txt/a HTTP/1.1\r\n\r\n");
    let res = client.receive().unwrap();
    assert_eq!(res.code(), 400);
    assert_eq!(res.headers().get(Header::Connection), Some("close"));
    assert!(client.receive().is_none());
    server.stop();
}

#[test]
fn test_too_large() {
    init();
    let options = Options { max_content: 4, ..Options::request() };
    let server = Running::start(Server::builder(echo()).options(options));
    let mut client = Client::connect(server.addr);
    client.send(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789");
    let res = client.receive().unwrap();
    assert_eq!(res.code(), 413);
    assert!(client.receive().is_none());
    server.stop();
}

#[test]
fn test_expect_continue() {
    init();
    let server = Running::start(Server::builder(echo()));
    let mut client = Client::connect(server.addr);
    client.send(
        b"POST / HTTP/1.1\r\nHost: x\r\n\
          Expect: 100-continue\r\nContent-Length: 5\r\n\r\n",
    );
    assert_eq!(client.receive().unwrap().code(), 100);

    // Content is only sent after the interim response
    client.send(b"hello");
    let res = client.receive().unwrap();
    assert_eq!(res.code(), 200);
    assert_eq!(res.content(), b"hello");
    server.stop();
}

#[test]
fn test_chunked_request() {
    init();
    let server = Running::start(Server::builder(echo()));
    let mut client = Client::connect(server.addr);
    let request = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
        5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n";

    // Send request in small pieces, so reads never align with chunks
    for piece in request.chunks(3) {
        client.send(piece);
    }
    let res = client.receive().unwrap();
    assert_eq!(res.code(), 200);
    assert_eq!(res.content(), b"hello, world");
    server.stop();
}

#[test]
fn test_idle_timeout() {
    init();
    let builder = text().idle_timeout(Duration::from_millis(50));
    let server = Running::start(builder);
    let mut client = Client::connect(server.addr);
    assert!(client.receive().is_none());
    server.stop();
}

#[test]
fn test_workers() {
    init();
    let server = Running::start(text().workers(2));
    for n in 0..4 {
        let mut client = Client::connect(server.addr);
        client.send(b"GET /txt/a HTTP/1.1\r\nHost: x\r\n\r\n");
        let res = client.receive().unwrap();
        assert_eq!(res.code(), 200, "Failed for client {n}");
        assert_eq!(res.content(), b"hello, world", "Failed for client {n}");
    }
    server.stop();
}
