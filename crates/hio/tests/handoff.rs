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

//! Hand-off tests over loopback sockets.

use crossbeam::channel;
use hio::{
    Context, Dispatcher, Handler, Loop, Next, Read, Result, Stats, Stop,
};
use std::io::{Read as _, Write as _};
use std::net::{self, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Overload response.
const OVERLOAD: &[u8] =
    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n";

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn local() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

struct Echo;

impl Handler for Echo {
    fn on_read(&mut self, cx: &mut Context, read: Read) -> Result<Next> {
        match read {
            Read::Data(data) => cx.write(data.to_vec(), 0)?,
            _ => cx.halt()?,
        }
        Ok(Next::Again)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_hand_off_to_worker() {
    init();
    let (sender, receiver) = channel::bounded(1);
    let worker = thread::spawn(move || {
        let mut lp = Loop::new().unwrap();
        lp.accept_remote(|_: SocketAddr| Box::new(Echo) as Box<dyn Handler>);
        sender.send(lp.remote()).unwrap();
        lp.run().unwrap();
        lp.stats()
    });
    let remote = receiver.recv().unwrap();

    // Accept on this loop, and serve on the worker
    let mut lp = Loop::new().unwrap();
    let dispatcher = Dispatcher::new(vec![remote.clone()], OVERLOAD);
    let listener = lp.listen_raw(local(), Arc::new(dispatcher)).unwrap();
    let addr = lp.local_addr(listener).unwrap();

    let client = thread::spawn(move || {
        let mut stream = net::TcpStream::connect(addr).unwrap();
        stream.write_all(b"ping").unwrap();
        let mut buffer = [0; 4];
        stream.read_exact(&mut buffer).unwrap();
        buffer
    });
    for _ in 0..1000 {
        if client.is_finished() {
            break;
        }
        lp.poll(Some(Duration::from_millis(10))).unwrap();
    }
    assert_eq!(&client.join().unwrap(), b"ping");

    // Stop worker from this thread
    remote.stop(Stop::Terminate);
    assert_eq!(worker.join().unwrap().devices, 0);
    assert_eq!(lp.stats().handoffs, 0);
}

#[test]
fn test_saturated_target_sheds_connection() {
    init();

    // Target never runs, so its rendezvous inbox is always full
    let target = Loop::builder().handoff_capacity(0).build().unwrap();
    let mut lp = Loop::builder()
        .handoff_retry(Duration::from_millis(1), 3)
        .build()
        .unwrap();
    let dispatcher = Dispatcher::new(vec![target.remote()], OVERLOAD);
    let listener = lp.listen_raw(local(), Arc::new(dispatcher)).unwrap();
    let addr = lp.local_addr(listener).unwrap();

    let client = thread::spawn(move || {
        let mut stream = net::TcpStream::connect(addr).unwrap();
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).unwrap();
        buffer
    });
    for _ in 0..1000 {
        if client.is_finished() && lp.stats().handoffs == 0 {
            break;
        }
        lp.poll(Some(Duration::from_millis(10))).unwrap();
    }

    // Connection received the overload response, and nothing leaked
    let response = client.join().unwrap();
    assert!(response.starts_with(b"HTTP/1.1 503"));
    assert_eq!(
        lp.stats(),
        Stats { devices: 1, timers: 0, tasks: 0, handoffs: 0 }
    );
    assert_eq!(target.stats().devices, 0);
}

#[test]
fn test_gone_target_sheds_connection() {
    init();
    let target = Loop::new().unwrap();
    let remote = target.remote();
    drop(target);

    let mut lp = Loop::new().unwrap();
    let dispatcher = Dispatcher::new(vec![remote], OVERLOAD);
    let listener = lp.listen_raw(local(), dispatcher).unwrap();
    let addr = lp.local_addr(listener).unwrap();

    let client = thread::spawn(move || {
        let mut stream = net::TcpStream::connect(addr).unwrap();
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).unwrap();
        buffer
    });
    for _ in 0..1000 {
        if client.is_finished() {
            break;
        }
        lp.poll(Some(Duration::from_millis(10))).unwrap();
    }
    assert_eq!(client.join().unwrap(), OVERLOAD);
    assert_eq!(lp.stats().handoffs, 0);
}

#[test]
fn test_draining_target_sheds_connection() {
    init();
    let mut target = Loop::new().unwrap();
    target.accept_remote(|_: SocketAddr| Box::new(Echo) as Box<dyn Handler>);

    let mut lp = Loop::new().unwrap();
    let dispatcher = Dispatcher::new(vec![target.remote()], OVERLOAD);
    let listener = lp.listen_raw(local(), dispatcher).unwrap();
    let addr = lp.local_addr(listener).unwrap();

    let client = thread::spawn(move || {
        let mut stream = net::TcpStream::connect(addr).unwrap();
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).unwrap();
        buffer
    });

    // Target keeps draining, so it no longer takes connections
    for _ in 0..1000 {
        if client.is_finished() {
            break;
        }
        lp.poll(Some(Duration::from_millis(10))).unwrap();
        target.stop(Stop::Drain);
        target.run().unwrap();
    }
    assert_eq!(client.join().unwrap(), OVERLOAD);
    assert_eq!(target.stats().devices, 0);
    assert_eq!(lp.stats().handoffs, 0);
}
