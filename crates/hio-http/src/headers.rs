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

//! HTTP header table.

use std::fmt;

use super::error::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP header table.
///
/// Headers keep the order in which their names first appeared. A name may
/// carry multiple values, which are kept in the order they were added. Names
/// are compared without regard to ASCII case, and all methods accept either
/// a [`Header`][] or a plain string.
///
/// [`Header`]: crate::Header
///
/// # Examples
///
/// ```
/// use hio_http::{Header, Headers};
///
/// // Create header table and add values
/// let mut headers = Headers::new();
/// headers.append("Accept", "text/plain");
/// headers.append(Header::Accept, "text/html");
///
/// // Obtain values
/// assert_eq!(headers.get("accept"), Some("text/plain"));
/// assert_eq!(headers.get_all(Header::Accept).count(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    /// Entries in order of first appearance.
    entries: Vec<Entry>,
    /// Entry that received the most recent value.
    last: Option<usize>,
}

/// Header entry.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    /// Name as received.
    name: String,
    /// Values in order of appearance.
    values: Vec<String>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Headers {
    /// Creates a header table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value for the given name.
    #[must_use]
    pub fn get<N>(&self, name: N) -> Option<&str>
    where
        N: AsRef<str>,
    {
        self.entry(name.as_ref())
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// Returns an iterator over all values for the given name.
    pub fn get_all<N>(&self, name: N) -> impl Iterator<Item = &str>
    where
        N: AsRef<str>,
    {
        self.entry(name.as_ref())
            .into_iter()
            .flat_map(|entry| entry.values.iter().map(String::as_str))
    }

    /// Returns whether any value in the comma-separated lists of the given
    /// name equals the given token, ignoring ASCII case.
    ///
    /// # Examples
    ///
    /// ```
    /// use hio_http::{Header, Headers};
    ///
    /// // Create header table and add value
    /// let mut headers = Headers::new();
    /// headers.append(Header::Connection, "keep-alive, Upgrade");
    ///
    /// // Check for token
    /// assert!(headers.has_token(Header::Connection, "upgrade"));
    /// ```
    #[must_use]
    pub fn has_token<N>(&self, name: N, token: &str) -> bool
    where
        N: AsRef<str>,
    {
        self.get_all(name)
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    /// Returns whether the given name is contained.
    #[inline]
    #[must_use]
    pub fn contains<N>(&self, name: N) -> bool
    where
        N: AsRef<str>,
    {
        self.entry(name.as_ref()).is_some()
    }

    /// Adds a value for the given name, after all existing values.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        let name = name.as_ref();
        let n = match self.position(name) {
            Some(n) => {
                self.entries[n].values.push(value.into());
                n
            }
            None => {
                self.entries.push(Entry {
                    name: name.to_string(),
                    values: vec![value.into()],
                });
                self.entries.len() - 1
            }
        };
        self.last = Some(n);
    }

    /// Replaces all values for the given name.
    #[allow(clippy::needless_pass_by_value)]
    pub fn set<N, V>(&mut self, name: N, value: V)
    where
        N: AsRef<str>,
        V: ToString,
    {
        let name = name.as_ref();
        let n = match self.position(name) {
            Some(n) => {
                self.entries[n].values = vec![value.to_string()];
                n
            }
            None => {
                self.entries.push(Entry {
                    name: name.to_string(),
                    values: vec![value.to_string()],
                });
                self.entries.len() - 1
            }
        };
        self.last = Some(n);
    }

    /// Removes all values for the given name.
    pub fn remove<N>(&mut self, name: N)
    where
        N: AsRef<str>,
    {
        if let Some(n) = self.position(name.as_ref()) {
            self.entries.remove(n);
            self.last = None;
        }
    }

    /// Folds a continuation line into the most recently added value.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::BadHeader`], if there is no value to
    /// continue yet.
    pub fn fold(&mut self, continuation: &str) -> Result {
        let value = self
            .last
            .and_then(|n| self.entries[n].values.last_mut())
            .ok_or(Error::BadHeader)?;

        // Continuation lines are joined with a single space
        let continuation = continuation.trim();
        if !continuation.is_empty() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(continuation);
        }
        Ok(())
    }

    /// Returns an iterator over all name-value pairs, grouped by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|entry| {
            let name = entry.name.as_str();
            entry.values.iter().map(move |value| (name, value.as_str()))
        })
    }

    /// Removes all entries.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last = None;
    }

    /// Returns the entry for the given name.
    fn entry(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|n| &self.entries[n])
    }

    /// Returns the position of the entry for the given name.
    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

#[allow(clippy::must_use_candidate)]
impl Headers {
    /// Returns the number of distinct names.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether there are any headers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for Headers {
    /// Formats the header table in wire format.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (name, value) in self.iter() {
            f.write_str(name)?;
            f.write_str(": ")?;
            f.write_str(value)?;
            f.write_str("\r\n")?;
        }

        // No errors occurred
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Headers;
    use crate::Header;

    #[test]
    fn test_multiple_values_keep_order() {
        let mut headers = Headers::new();
        headers.append("X-A", "1");
        headers.append("X-B", "2");
        headers.append("x-a", "3");
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, [("X-A", "1"), ("X-A", "3"), ("X-B", "2")]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_set_replaces_values() {
        let mut headers = Headers::new();
        headers.append(Header::ContentLength, "1");
        headers.append(Header::ContentLength, "2");
        headers.set("content-length", 3);
        assert_eq!(headers.get_all(Header::ContentLength).collect::<Vec<_>>(), ["3"]);
    }

    #[test]
    fn test_fold() {
        let mut headers = Headers::new();
        assert!(headers.fold("orphan").is_err());
        headers.append("X-Long", "first");
        headers.append("X-Other", "value");
        headers.append("X-Long", "second");
        headers.fold("  third ").unwrap();
        let values: Vec<_> = headers.get_all("x-long").collect();
        assert_eq!(values, ["first", "second third"]);
    }

    #[test]
    fn test_has_token() {
        let mut headers = Headers::new();
        headers.append(Header::Connection, "Keep-Alive");
        headers.append(Header::Connection, "upgrade, close");
        let test_cases = vec![
            ("keep-alive", true),
            ("close", true),
            ("Upgrade", true),
            ("clos", false),
        ];
        for (token, expected) in test_cases {
            let check = headers.has_token(Header::Connection, token);
            assert_eq!(check, expected, "Failed for {token:?}");
        }
    }
}
