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

//! Datagram device tests over loopback sockets.

use hio::{Context, Handler, Loop, Next, Read, Result, Written};
use std::cell::RefCell;
use std::net::{SocketAddr, UdpSocket};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_datagram_echo() {
    struct Echo(Rc<RefCell<Vec<Written>>>);

    impl Handler for Echo {
        fn on_read(&mut self, cx: &mut Context, read: Read) -> Result<Next> {
            if let Read::Datagram(data, from) = read {
                cx.write_to(data.to_vec(), 0, from)?;
            }
            Ok(Next::Again)
        }

        fn on_write(
            &mut self, cx: &mut Context, written: Written, _: usize,
        ) -> Result {
            self.0.borrow_mut().push(written);
            cx.halt()
        }
    }

    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut lp = Loop::new().unwrap();
    let local: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let id = lp.bind_udp(local, Echo(log.clone())).unwrap();
    let addr = lp.local_addr(id).unwrap();

    let client = thread::spawn(move || {
        let socket = UdpSocket::bind(local).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        socket.send_to(b"ping", addr).unwrap();
        let mut buffer = [0; 16];
        let (n, from) = socket.recv_from(&mut buffer).unwrap();
        (buffer[..n].to_vec(), from)
    });
    lp.run().unwrap();

    let (data, from) = client.join().unwrap();
    assert_eq!(data, b"ping");
    assert_eq!(from, addr);
    assert_eq!(*log.borrow(), [Written::Sent(4)]);
}
