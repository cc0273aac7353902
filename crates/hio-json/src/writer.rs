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

//! JSON writer.

use std::io::{self, Write};

use super::error::{Error, Result};
use super::feeder::token::Number;
use super::feeder::Sink;
use super::instruction::Instruction;

mod options;

pub use options::Options;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Container on the nesting stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    /// Array, and whether it has elements.
    Array { empty: bool },
    /// Object, whether it has members, and whether a key awaits its value.
    Object { empty: bool, key: bool },
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// JSON writer.
///
/// The writer serializes a single document in strict document order, and
/// rejects everything the grammar doesn't allow at the current position.
/// Output is buffered, and handed to the underlying writer whenever the
/// buffer exceeds the flush threshold, as well as on [`Writer::flush`] and
/// [`Writer::finish`].
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use hio_json::Writer;
///
/// // Create writer and write document
/// let mut writer = Writer::new(Vec::new());
/// writer.start_object()?;
/// writer.key("list")?;
/// writer.start_array()?;
/// writer.integer(1)?;
/// writer.string("two")?;
/// writer.null()?;
/// writer.end_array()?;
/// writer.end_object()?;
///
/// // Obtain output
/// let output = writer.finish()?;
/// assert_eq!(output, br#"{"list":[1,"two",null]}"#);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Writer<W>
where
    W: Write,
{
    /// Writer options.
    options: Options,
    /// Underlying writer.
    inner: W,
    /// Output buffer.
    buffer: Vec<u8>,
    /// Nesting stack.
    stack: Vec<Frame>,
    /// Whether the top-level value is complete.
    done: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<W> Writer<W>
where
    W: Write,
{
    /// Creates a writer with default options.
    #[inline]
    pub fn new(inner: W) -> Self {
        Self::with_options(inner, Options::default())
    }

    /// Creates a writer with the given options.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_json::writer::{Options, Writer};
    ///
    /// // Create writer with pretty printing
    /// let options = Options::pretty(2);
    /// let mut writer = Writer::with_options(Vec::new(), options);
    /// writer.start_array()?;
    /// writer.bool(true)?;
    /// writer.end_array()?;
    /// assert_eq!(writer.finish()?, b"[\n  true\n]");
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_options(inner: W, options: Options) -> Self {
        Self {
            options,
            inner,
            buffer: Vec::new(),
            stack: Vec::new(),
            done: false,
        }
    }

    /// Starts an array.
    pub fn start_array(&mut self) -> Result {
        self.reserve(1)?;
        self.before_value()?;
        self.buffer.push(b'[');
        self.stack.push(Frame::Array { empty: true });
        Ok(())
    }

    /// Ends the innermost array.
    pub fn end_array(&mut self) -> Result {
        match self.stack.last() {
            Some(&Frame::Array { empty }) => self.close(empty, b']'),
            _ => Err(Error::Structure("no array to end")),
        }
    }

    /// Starts an object.
    pub fn start_object(&mut self) -> Result {
        self.reserve(1)?;
        self.before_value()?;
        self.buffer.push(b'{');
        self.stack.push(Frame::Object { empty: true, key: false });
        Ok(())
    }

    /// Ends the innermost object.
    pub fn end_object(&mut self) -> Result {
        match self.stack.last() {
            Some(&Frame::Object { key: true, .. }) => {
                Err(Error::Structure("key without value"))
            }
            Some(&Frame::Object { empty, .. }) => self.close(empty, b'}'),
            _ => Err(Error::Structure("no object to end")),
        }
    }

    /// Writes a key of the innermost object.
    pub fn key(&mut self, key: &str) -> Result {
        self.reserve(escaped_len(key).saturating_add(2))?;
        let Some(Frame::Object { empty, key: pending }) = self.stack.last_mut()
        else {
            return Err(Error::Structure("key outside of object"));
        };
        if *pending {
            return Err(Error::Structure("key without value"));
        }

        // Separate from previous member
        let first = *empty;
        *empty = false;
        *pending = true;
        if !first {
            self.buffer.push(b',');
        }
        self.indent(self.stack.len());
        escape(&mut self.buffer, key);
        self.buffer.push(b':');
        if self.options.indent > 0 {
            self.buffer.push(b' ');
        }
        Ok(())
    }

    /// Writes a string.
    pub fn string(&mut self, value: &str) -> Result {
        self.reserve(escaped_len(value))?;
        self.before_value()?;
        escape(&mut self.buffer, value);
        self.after_value()
    }

    /// Writes a number from its textual representation.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Structure`], if the text is not a number.
    pub fn number(&mut self, value: &str) -> Result {
        if !Number::validate(value) {
            return Err(Error::Structure("malformed number"));
        }
        self.raw(value.as_bytes())
    }

    /// Writes a signed integer.
    pub fn integer(&mut self, value: i64) -> Result {
        self.raw(value.to_string().as_bytes())
    }

    /// Writes an unsigned integer.
    pub fn unsigned(&mut self, value: u64) -> Result {
        self.raw(value.to_string().as_bytes())
    }

    /// Writes a floating point number.
    ///
    /// Integral values keep a fraction, so `1.0` is written as `1.0` and
    /// reads back as a float.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Structure`], if the number is infinite or
    /// not a number, which JSON can't represent.
    pub fn float(&mut self, value: f64) -> Result {
        if !value.is_finite() {
            return Err(Error::Structure("non-finite number"));
        }
        let mut text = value.to_string();
        if !text.contains(['.', 'e', 'E']) {
            text.push_str(".0");
        }
        self.raw(text.as_bytes())
    }

    /// Writes a boolean.
    pub fn bool(&mut self, value: bool) -> Result {
        let text: &[u8] = if value { b"true" } else { b"false" };
        self.raw(text)
    }

    /// Writes null.
    pub fn null(&mut self) -> Result {
        self.raw(b"null")
    }

    /// Writes an instruction.
    pub fn instruction(&mut self, instruction: &Instruction) -> Result {
        match instruction {
            Instruction::StartArray => self.start_array(),
            Instruction::EndArray => self.end_array(),
            Instruction::StartObject => self.start_object(),
            Instruction::EndObject => self.end_object(),
            Instruction::Key(key) => self.key(key),
            Instruction::String(value) => self.string(value),
            Instruction::Number(value) => self.number(value),
            Instruction::Nil => self.null(),
            Instruction::True => self.bool(true),
            Instruction::False => self.bool(false),
        }
    }

    /// Hands buffered output to the underlying writer, and flushes it.
    pub fn flush(&mut self) -> Result {
        self.drain()?;
        self.inner.flush().map_err(Into::into)
    }

    /// Finishes the document, and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Structure`], if the document is not
    /// complete, and propagates errors of the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if !self.done {
            return Err(Error::Structure("document not complete"));
        }
        self.flush()?;
        Ok(self.inner)
    }
}

#[allow(clippy::must_use_candidate)]
impl<W> Writer<W>
where
    W: Write,
{
    /// Returns a reference to the underlying writer.
    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the writer options.
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the current nesting depth.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns whether the top-level value is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.done
    }
}

impl<W> Writer<W>
where
    W: Write,
{
    /// Writes a scalar value verbatim.
    fn raw(&mut self, value: &[u8]) -> Result {
        self.reserve(value.len())?;
        self.before_value()?;
        self.buffer.extend_from_slice(value);
        self.after_value()
    }

    /// Prepares the position of a value.
    fn before_value(&mut self) -> Result {
        let depth = self.stack.len();
        match self.stack.last_mut() {
            None if self.done => Err(Error::Structure("document complete")),
            None => Ok(()),
            Some(Frame::Array { empty }) => {
                let first = *empty;
                *empty = false;
                if !first {
                    self.buffer.push(b',');
                }
                self.indent(depth);
                Ok(())
            }
            Some(Frame::Object { key, .. }) if *key => {
                *key = false;
                Ok(())
            }
            Some(Frame::Object { .. }) => {
                Err(Error::Structure("value without key"))
            }
        }
    }

    /// Completes a value, flushing if the buffer grew large enough.
    fn after_value(&mut self) -> Result {
        if self.stack.is_empty() {
            self.done = true;
        }
        if self.buffer.len() >= self.options.flush_threshold {
            self.drain()?;
        }
        Ok(())
    }

    /// Closes the innermost container.
    fn close(&mut self, empty: bool, end: u8) -> Result {
        self.reserve(1)?;
        self.stack.pop();
        if !empty {
            self.indent(self.stack.len());
        }
        self.buffer.push(end);
        self.after_value()
    }

    /// Reserves room for the given number of bytes and what precedes them.
    ///
    /// Everything a single operation appends fits into the reserved room,
    /// so a failed allocation leaves the document unchanged.
    fn reserve(&mut self, additional: usize) -> Result {
        let depth = self.stack.len() + 1;
        let width = self.options.indent.saturating_mul(depth);
        let additional = additional.saturating_add(width).saturating_add(2);
        self.buffer.try_reserve(additional).map_err(Into::into)
    }

    /// Starts a new line at the given depth, if pretty printing.
    fn indent(&mut self, depth: usize) {
        if self.options.indent > 0 {
            self.buffer.push(b'\n');
            let width = self.options.indent * depth;
            self.buffer.resize(self.buffer.len() + width, b' ');
        }
    }

    /// Hands buffered output to the underlying writer.
    fn drain(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<W> Sink for Writer<W>
where
    W: Write,
{
    #[inline]
    fn push(&mut self, instruction: Instruction) -> Result {
        self.instruction(&instruction)
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns an upper bound for the length of a quoted and escaped string.
fn escaped_len(value: &str) -> usize {
    value.len().saturating_mul(6).saturating_add(2)
}

/// Appends a quoted and escaped string.
fn escape(buffer: &mut Vec<u8>, value: &str) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    buffer.push(b'"');
    let mut start = 0;
    for (n, byte) in value.bytes().enumerate() {
        let mut unicode = *b"\\u0000";
        let escaped: &[u8] = match byte {
            b'"' => b"\\\"",
            b'\\' => b"\\\\",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            0x08 => b"\\b",
            0x0C => b"\\f",
            0x00..=0x1F => {
                unicode[4] = HEX[usize::from(byte >> 4)];
                unicode[5] = HEX[usize::from(byte & 0xF)];
                &unicode
            }
            _ => continue,
        };
        buffer.extend_from_slice(&value.as_bytes()[start..n]);
        buffer.extend_from_slice(escaped);
        start = n + 1;
    }
    buffer.extend_from_slice(&value.as_bytes()[start..]);
    buffer.push(b'"');
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Options, Writer};
    use crate::error::{Error, Result};

    fn write<F>(options: Options, f: F) -> Result<String>
    where
        F: FnOnce(&mut Writer<Vec<u8>>) -> Result,
    {
        let mut writer = Writer::with_options(Vec::new(), options);
        f(&mut writer)?;
        let output = writer.finish()?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_compact() {
        let output = write(Options::compact(), |writer| {
            writer.start_object()?;
            writer.key("a")?;
            writer.start_array()?;
            writer.integer(-1)?;
            writer.unsigned(2)?;
            writer.float(0.5)?;
            writer.number("1e3")?;
            writer.end_array()?;
            writer.key("b")?;
            writer.start_object()?;
            writer.end_object()?;
            writer.key("c")?;
            writer.bool(false)?;
            writer.end_object()
        });
        assert_eq!(output.unwrap(), r#"{"a":[-1,2,0.5,1e3],"b":{},"c":false}"#);
    }

    #[test]
    fn test_pretty() {
        let output = write(Options::pretty(4), |writer| {
            writer.start_array()?;
            writer.start_object()?;
            writer.key("k")?;
            writer.null()?;
            writer.end_object()?;
            writer.start_array()?;
            writer.end_array()?;
            writer.end_array()
        });
        assert_eq!(
            output.unwrap(),
            "[\n    {\n        \"k\": null\n    },\n    []\n]"
        );
    }

    #[test]
    fn test_escape() {
        let output = write(Options::compact(), |writer| {
            writer.string("\"\\/\u{08}\u{0C}\n\r\t\u{01}\u{1F}é")
        });
        assert_eq!(
            output.unwrap(),
            r#""\"\\/\b\f\n\r\t\u0001\u001fé""#
        );
    }

    #[test]
    fn test_structure() {
        let test_cases: &[(&str, fn(&mut Writer<Vec<u8>>) -> Result)] = &[
            ("key outside of object", |writer| writer.key("a")),
            ("end without array", |writer| {
                writer.start_object()?;
                writer.end_array()
            }),
            ("end without object", |writer| {
                writer.start_array()?;
                writer.end_object()
            }),
            ("value without key", |writer| {
                writer.start_object()?;
                writer.integer(1)
            }),
            ("key without value", |writer| {
                writer.start_object()?;
                writer.key("a")?;
                writer.end_object()
            }),
            ("two keys", |writer| {
                writer.start_object()?;
                writer.key("a")?;
                writer.key("b")
            }),
            ("second value", |writer| {
                writer.integer(1)?;
                writer.integer(2)
            }),
            ("non-finite number", |writer| writer.float(f64::NAN)),
            ("malformed number", |writer| writer.number("01.")),
        ];
        for (name, f) in test_cases {
            let mut writer = Writer::new(Vec::new());
            let res = f(&mut writer);
            assert!(
                matches!(res, Err(Error::Structure(_))),
                "Failed for {name}"
            );
        }
    }

    #[test]
    fn test_float_keeps_fraction() {
        let test_cases: &[(f64, &str)] = &[
            (1.0, "1.0"),
            (-0.0, "-0.0"),
            (0.5, "0.5"),
            (-2.25, "-2.25"),
            (1e21, "1000000000000000000000.0"),
        ];
        for &(value, expected) in test_cases {
            let output = write(Options::compact(), |writer| writer.float(value));
            assert_eq!(output.unwrap(), expected, "Failed for {value}");
        }
    }

    #[test]
    fn test_incomplete() {
        let mut writer = Writer::new(Vec::new());
        writer.start_array().unwrap();
        let err = writer.finish().unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_flush_threshold() {
        let options = Options { flush_threshold: 4, ..Options::compact() };
        let mut writer = Writer::with_options(Vec::new(), options);
        writer.start_array().unwrap();
        writer.string("ab").unwrap();
        assert_eq!(writer.get_ref(), b"[\"ab\"");

        // Output below the threshold stays buffered
        writer.integer(1).unwrap();
        assert_eq!(writer.get_ref(), b"[\"ab\"");
        writer.end_array().unwrap();
        assert_eq!(writer.finish().unwrap(), b"[\"ab\",1]");
    }
}
