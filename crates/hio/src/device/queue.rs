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

//! Write queue.

use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::timer::TimerId;
use crate::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Pending write.
#[derive(Debug)]
pub(crate) struct Node {
    /// Node identifier, unique per device.
    pub id: u64,
    /// Data to send, empty for a half-close.
    pub data: Vec<u8>,
    /// Bytes already sent.
    pub offset: usize,
    /// Completion tag handed back to the handler.
    pub tag: usize,
    /// Destination for datagram sends.
    pub dest: Option<SocketAddr>,
    /// Pending deadline.
    pub timer: Option<TimerId>,
}

/// Write queue.
///
/// Nodes complete strictly in the order they were pushed. A node without data
/// requests a half-close. Nodes pushed behind it are still accepted, but they
/// complete as closed without being sent. Once the half-close has completed,
/// further pushes are rejected.
#[derive(Debug, Default)]
pub(crate) struct Queue {
    /// Pending nodes.
    nodes: VecDeque<Node>,
    /// Next node identifier.
    next: u64,
    /// Whether the write side was shut down.
    closed: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Node {
    /// Returns whether this node requests a half-close.
    ///
    /// Datagrams may be empty, so only stream nodes can be half-closes.
    #[inline]
    pub fn is_close(&self) -> bool {
        self.data.is_empty() && self.dest.is_none()
    }

    /// Returns the bytes that are still to be sent.
    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.offset..]
    }
}

impl Queue {
    /// Creates a write queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a write, returning its identifier.
    pub fn push(
        &mut self, data: Vec<u8>, tag: usize, dest: Option<SocketAddr>,
    ) -> Result<u64> {
        if self.closed {
            return Err(Error::WriteClosed);
        }
        self.nodes.try_reserve(1)?;

        // Assign identifier and enqueue
        let id = self.next;
        self.next += 1;
        self.nodes.push_back(Node {
            id,
            data,
            offset: 0,
            tag,
            dest,
            timer: None,
        });
        Ok(id)
    }

    /// Returns a mutable reference to the node with the given identifier.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Removes the node with the given identifier.
    pub fn remove(&mut self, id: u64) -> Option<Node> {
        let n = self.nodes.iter().position(|node| node.id == id)?;
        self.nodes.remove(n)
    }

    /// Returns a mutable reference to the head node.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut Node> {
        self.nodes.front_mut()
    }

    /// Removes the head node.
    #[inline]
    pub fn pop(&mut self) -> Option<Node> {
        self.nodes.pop_front()
    }

    /// Marks the write side as shut down.
    #[inline]
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns whether the write side was shut down.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Removes all nodes, returning them in order.
    pub fn drain(&mut self) -> impl Iterator<Item = Node> + '_ {
        self.nodes.drain(..)
    }

    /// Returns whether there are no pending nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_increasing_ids() {
        let mut queue = Queue::new();
        let a = queue.push(vec![1], 0, None).unwrap();
        let b = queue.push(vec![2], 0, None).unwrap();
        assert!(a < b);
        assert_eq!(queue.drain().count(), 2);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = Queue::new();
        let ids = (0..3)
            .map(|n| queue.push(vec![n], usize::from(n), None).unwrap())
            .collect::<Vec<_>>();

        let removed = queue.remove(ids[1]).unwrap();
        assert_eq!(removed.tag, 1);
        let tags = queue.drain().map(|node| node.tag).collect::<Vec<_>>();
        assert_eq!(tags, [0, 2]);
    }

    #[test]
    fn test_closed_queue_rejects_push() {
        let mut queue = Queue::new();
        queue.push(Vec::new(), 0, None).unwrap();
        assert!(queue.pop().unwrap().is_close());
        queue.close();
        assert!(matches!(
            queue.push(vec![1], 0, None),
            Err(Error::WriteClosed)
        ));
    }

    #[test]
    fn test_remaining_tracks_offset() {
        let mut queue = Queue::new();
        queue.push(b"hello".to_vec(), 0, None).unwrap();
        let node = queue.front_mut().unwrap();
        node.offset = 2;
        assert_eq!(node.remaining(), b"llo");
    }
}
