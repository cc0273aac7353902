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

//! Shared resources.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Shared resource with a kill hook.
///
/// Resources are used by protocol layers to share state between a device and
/// the code built on top of it. Every clone is an owner, and a resource can be
/// attached to a device, which keeps it alive until the device is reaped. Once
/// the last owner is dropped, the kill hook runs exactly once.
///
/// # Examples
///
/// ```
/// use hio::Resource;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// // Create resource with kill hook
/// let killed = Rc::new(Cell::new(false));
/// let resource = Resource::with_kill(42, {
///     let killed = killed.clone();
///     move |_| killed.set(true)
/// });
///
/// // Kill hook runs once the last owner is gone
/// let clone = resource.clone();
/// drop(resource);
/// assert!(!killed.get());
/// drop(clone);
/// assert!(killed.get());
/// ```
pub struct Resource<T> {
    /// Shared state.
    inner: Rc<Inner<T>>,
}

/// Shared state of a resource.
struct Inner<T> {
    /// Value.
    value: T,
    /// Kill hook.
    kill: Cell<Option<Box<dyn FnOnce(&T)>>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<T> Resource<T> {
    /// Creates a resource without a kill hook.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Inner { value, kill: Cell::new(None) }),
        }
    }

    /// Creates a resource with a kill hook.
    pub fn with_kill<F>(value: T, f: F) -> Self
    where
        F: FnOnce(&T) + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                value,
                kill: Cell::new(Some(Box::new(f))),
            }),
        }
    }

    /// Returns the number of owners.
    #[inline]
    #[must_use]
    pub fn owners(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<T> Clone for Resource<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T> Deref for Resource<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner.value
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(kill) = self.kill.take() {
            kill(&self.value);
        }
    }
}

impl<T> fmt::Debug for Resource<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resource")
            .field("value", &self.inner.value)
            .field("owners", &self.owners())
            .finish()
    }
}
