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

//! JSON feeder.
//!
//! The feeder is a push parser: input is fed in fragments of any size, and
//! instructions are emitted to a [`Sink`] as soon as each token is known to
//! be complete. Nesting is tracked on an explicit stack instead of the call
//! stack, so untrusted input can't exhaust it. Its depth is bounded by
//! [`Options::max_depth`], and the length of each token by
//! [`Options::max_token`].

use std::mem;
use tracing::debug;

use super::error::{Error, Result};
use super::instruction::Instruction;

mod options;
pub(crate) mod token;

pub use options::Options;
use token::{is_identifier_start, Bare, Comment, Literal, Number, Scan, Str};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Instruction sink.
///
/// A sink receives the instructions of a document in document order. Sinks
/// may refuse an instruction by returning an error, e.g., [`Error::Rejected`],
/// which stops the feeder for good. Closures taking an [`Instruction`] are
/// sinks as well.
pub trait Sink {
    /// Receives the next instruction.
    fn push(&mut self, instruction: Instruction) -> Result;
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Container on the nesting stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Container {
    /// Array.
    Array,
    /// Object.
    Object,
}

/// What the grammar allows next, outside of tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expect {
    /// Value.
    Value,
    /// Value or end of array, after its start.
    FirstValue,
    /// Key or end of object, after its start.
    FirstKey,
    /// Key, after a comma.
    Key,
    /// Colon, after a key.
    Colon,
    /// Comma or end of container, after a value.
    Comma,
    /// Nothing, as the top-level value is complete.
    Done,
}

/// Token in progress.
#[derive(Debug)]
enum Token {
    /// No token.
    None,
    /// String or quoted key.
    String(Str),
    /// Number.
    Number(Number),
    /// Literal.
    Literal(Literal),
    /// Unquoted key.
    Bare(Bare),
    /// Line comment.
    Comment(Comment),
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// JSON feeder.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use hio_json::{Feeder, Instruction};
///
/// // Create feeder and feed document in two fragments
/// let mut feeder = Feeder::default();
/// let mut instructions = Vec::new();
/// let mut sink = |instruction: Instruction| -> hio_json::Result {
///     instructions.push(instruction);
///     Ok(())
/// };
/// feeder.feed(br#"{"key": [tr"#, false, &mut sink)?;
/// feeder.feed(br#"ue]}"#, false, &mut sink)?;
/// feeder.finish(&mut sink)?;
/// assert_eq!(instructions, [
///     Instruction::StartObject,
///     Instruction::Key("key".into()),
///     Instruction::StartArray,
///     Instruction::True,
///     Instruction::EndArray,
///     Instruction::EndObject,
/// ]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Feeder {
    /// Feeder options.
    options: Options,
    /// Nesting stack.
    stack: Vec<Container>,
    /// What the grammar allows next.
    expect: Expect,
    /// Token in progress.
    token: Token,
    /// Bytes consumed so far.
    offset: u64,
    /// Whether a top-level value was ever completed.
    completed: bool,
    /// Whether the feeder failed.
    dead: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Feeder {
    /// Creates a feeder.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            stack: Vec::new(),
            expect: Expect::Value,
            token: Token::None,
            offset: 0,
            completed: false,
            dead: false,
        }
    }

    /// Feeds data, emitting instructions to the sink.
    ///
    /// Returns the number of bytes left unconsumed at the end of the data.
    /// Unless `stop` is set, all data is consumed, and back-to-back top-level
    /// values are parsed one after another. With `stop` set, parsing stops as
    /// soon as a top-level value has been completed, now or before, and the
    /// rest of the data is left for the caller, e.g., to read a stream of
    /// values with a fresh feeder each. A number at the very end of the data
    /// is only complete once more data or [`Feeder::finish`] ends it.
    ///
    /// # Errors
    ///
    /// This method returns an error, if the data is malformed, nesting is too
    /// deep, or the sink refuses an instruction. The feeder is dead after any
    /// error, and further calls return [`Error::Dead`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_json::{Feeder, Instruction};
    ///
    /// // Create feeder and stop after the first value
    /// let mut feeder = Feeder::default();
    /// let mut sink = |_: Instruction| -> hio_json::Result { Ok(()) };
    /// let left = feeder.feed(b"[1] [2]", true, &mut sink)?;
    /// assert_eq!(left, 4);
    /// # Ok(())
    /// # }
    /// ```
    pub fn feed<S>(
        &mut self, data: &[u8], stop: bool, sink: &mut S,
    ) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        if self.dead {
            return Err(Error::Dead);
        }

        // Steps may consume nothing, in which case the same byte is scanned
        // again in the state the step left behind
        let mut consumed = 0;
        while consumed < data.len() {
            if stop && self.is_done() {
                break;
            }
            match self.step(&data[consumed..], sink) {
                Ok(n) => {
                    consumed += n;
                    self.offset += n as u64;
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
        Ok(data.len() - consumed)
    }

    /// Signals the end of input.
    ///
    /// A pending top-level number is emitted, since nothing else can end it.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Unterminated`], if the input ended inside
    /// a value, or no value was fed at all.
    pub fn finish<S>(&mut self, sink: &mut S) -> Result
    where
        S: Sink + ?Sized,
    {
        if self.dead {
            return Err(Error::Dead);
        }
        self.end(sink).map_err(|err| self.fail(err))
    }

    /// Resets the feeder to read a new document.
    pub fn reset(&mut self) {
        *self = Self::new(mem::take(&mut self.options));
    }
}

#[allow(clippy::must_use_candidate)]
impl Feeder {
    /// Returns the feeder options.
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the current nesting depth.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the number of bytes consumed so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns whether a top-level value was ever completed.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Returns whether the feeder failed.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

impl Feeder {
    /// Scans input outside of or inside a token.
    fn step<S>(&mut self, input: &[u8], sink: &mut S) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        if matches!(self.token, Token::None) {
            return self.structure(input[0], sink);
        }

        // Continue token in progress, and emit it once complete
        let offset = self.offset;
        let scan = match &mut self.token {
            Token::String(string) => string.scan(input, offset)?,
            Token::Number(number) => number.scan(input[0], offset)?,
            Token::Literal(literal) => literal.scan(input[0], offset)?,
            Token::Bare(bare) => bare.scan(input[0])?,
            Token::Comment(comment) => comment.scan(input, offset)?,
            Token::None => Scan::Partial(0),
        };
        match scan {
            Scan::Partial(n) => Ok(n),
            Scan::Done(n) => self.emit(sink).map(|()| n),
        }
    }

    /// Scans a structural byte.
    fn structure<S>(&mut self, byte: u8, sink: &mut S) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' => return Ok(1),
            b'/' if self.options.line_comments => {
                self.token = Token::Comment(Comment::default());
                return Ok(1);
            }
            _ => {}
        }

        // Everything else must be what the grammar allows next
        match self.expect {
            Expect::Done => {
                self.expect = Expect::Value;
                Ok(0)
            }
            Expect::Value => self.value(byte, sink),
            Expect::FirstValue if byte == b']' => {
                self.close(Container::Array, sink)
            }
            Expect::FirstValue => self.value(byte, sink),
            Expect::FirstKey if byte == b'}' => {
                self.close(Container::Object, sink)
            }
            Expect::FirstKey | Expect::Key => self.key(byte),
            Expect::Colon if byte == b':' => {
                self.expect = Expect::Value;
                Ok(1)
            }
            Expect::Colon => Err(Error::syntax(self.offset, "expected ':'")),
            Expect::Comma => self.separator(byte, sink),
        }
    }

    /// Scans the start of a value.
    fn value<S>(&mut self, byte: u8, sink: &mut S) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        match byte {
            b'[' => self.open(Container::Array, sink),
            b'{' => self.open(Container::Object, sink),
            b'"' => {
                let limit = self.options.max_token;
                self.token = Token::String(Str::new(false, limit));
                Ok(1)
            }
            b'-' | b'0'..=b'9' => {
                let limit = self.options.max_token;
                self.token = Token::Number(Number::new(limit));
                Ok(0)
            }
            b't' => self.literal(b"true"),
            b'f' => self.literal(b"false"),
            b'n' => self.literal(b"null"),
            _ => Err(Error::syntax(self.offset, "expected value")),
        }
    }

    /// Scans the start of a key.
    fn key(&mut self, byte: u8) -> Result<usize> {
        if byte == b'"' {
            self.token = Token::String(Str::new(true, self.options.max_token));
            Ok(1)
        } else if self.options.unquoted_keys && is_identifier_start(byte) {
            self.token = Token::Bare(Bare::new(self.options.max_token));
            Ok(0)
        } else {
            Err(Error::syntax(self.offset, "expected key"))
        }
    }

    /// Scans what follows a value inside a container.
    fn separator<S>(&mut self, byte: u8, sink: &mut S) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        let Some(&container) = self.stack.last() else {
            return Err(Error::syntax(self.offset, "expected end of input"));
        };
        match (container, byte) {
            (Container::Array, b',') => {
                self.expect = Expect::Value;
                Ok(1)
            }
            (Container::Object, b',') => {
                self.expect = Expect::Key;
                Ok(1)
            }
            (Container::Array, b']') | (Container::Object, b'}') => {
                self.close(container, sink)
            }
            (Container::Array, _) if self.options.optional_commas => {
                self.value(byte, sink)
            }
            (Container::Object, _) if self.options.optional_commas => {
                self.key(byte)
            }
            (Container::Array, _) => {
                Err(Error::syntax(self.offset, "expected ',' or ']'"))
            }
            (Container::Object, _) => {
                Err(Error::syntax(self.offset, "expected ',' or '}'"))
            }
        }
    }

    /// Starts a literal, which scans the current byte again.
    fn literal(&mut self, word: &'static [u8]) -> Result<usize> {
        self.token = Token::Literal(Literal::new(word));
        Ok(0)
    }

    /// Opens a container.
    fn open<S>(&mut self, container: Container, sink: &mut S) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        if self.stack.len() >= self.options.max_depth {
            return Err(Error::Depth);
        }
        self.stack.push(container);
        let instruction = match container {
            Container::Array => {
                self.expect = Expect::FirstValue;
                Instruction::StartArray
            }
            Container::Object => {
                self.expect = Expect::FirstKey;
                Instruction::StartObject
            }
        };
        sink.push(instruction).map(|()| 1)
    }

    /// Closes the innermost container.
    fn close<S>(&mut self, container: Container, sink: &mut S) -> Result<usize>
    where
        S: Sink + ?Sized,
    {
        self.stack.pop();
        sink.push(match container {
            Container::Array => Instruction::EndArray,
            Container::Object => Instruction::EndObject,
        })?;
        self.complete();
        Ok(1)
    }

    /// Emits the token in progress.
    fn emit<S>(&mut self, sink: &mut S) -> Result
    where
        S: Sink + ?Sized,
    {
        let instruction = match mem::replace(&mut self.token, Token::None) {
            Token::String(string) if string.is_key() => {
                self.expect = Expect::Colon;
                return sink.push(Instruction::Key(string.into_text()?));
            }
            Token::Bare(bare) => {
                self.expect = Expect::Colon;
                return sink.push(Instruction::Key(bare.into_text()));
            }
            Token::String(string) => Instruction::String(string.into_text()?),
            Token::Number(number) => Instruction::Number(number.into_text()),
            Token::Literal(literal) => match literal.word() {
                b"true" => Instruction::True,
                b"false" => Instruction::False,
                _ => Instruction::Nil,
            },
            Token::Comment(_) | Token::None => return Ok(()),
        };
        sink.push(instruction)?;
        self.complete();
        Ok(())
    }

    /// Marks a value as complete.
    fn complete(&mut self) {
        if self.stack.is_empty() {
            self.expect = Expect::Done;
            self.completed = true;
        } else {
            self.expect = Expect::Comma;
        }
    }

    /// Ends the input.
    fn end<S>(&mut self, sink: &mut S) -> Result
    where
        S: Sink + ?Sized,
    {
        let pending = match &self.token {
            Token::None => false,
            Token::Number(number) if number.is_complete() => true,
            Token::Comment(comment) if comment.is_open() => true,
            _ => return Err(Error::Unterminated),
        };
        if pending {
            self.emit(sink)?;
        }
        if self.is_done() {
            Ok(())
        } else {
            Err(Error::Unterminated)
        }
    }

    /// Returns whether the top-level value is complete.
    fn is_done(&self) -> bool {
        self.expect == Expect::Done && matches!(self.token, Token::None)
    }

    /// Marks the feeder as dead.
    fn fail(&mut self, err: Error) -> Error {
        debug!("feeder failed at offset {}: {err}", self.offset);
        self.dead = true;
        err
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Feeder {
    /// Creates a feeder accepting exactly RFC 8259.
    #[inline]
    fn default() -> Self {
        Self::new(Options::default())
    }
}

// ----------------------------------------------------------------------------
// Blanket implementations
// ----------------------------------------------------------------------------

impl<F> Sink for F
where
    F: FnMut(Instruction) -> Result,
{
    #[inline]
    fn push(&mut self, instruction: Instruction) -> Result {
        self(instruction)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Feeder, Options};
    use crate::error::{Error, Result};
    use crate::instruction::Instruction::{self, *};

    const DOCUMENT: &[u8] = br#"{
        "name": "h\u00e9llo \ud83d\ude00",
        "list": [1, -2.5e+3, 0, true, false, null],
        "nested": {"a": [], "b": {}},
        "escapes": "\"\\\/\b\f\n\r\t"
    }"#;

    fn document() -> Vec<Instruction> {
        vec![
            StartObject,
            Key("name".into()),
            String("héllo 😀".into()),
            Key("list".into()),
            StartArray,
            Number("1".into()),
            Number("-2.5e+3".into()),
            Number("0".into()),
            True,
            False,
            Nil,
            EndArray,
            Key("nested".into()),
            StartObject,
            Key("a".into()),
            StartArray,
            EndArray,
            Key("b".into()),
            StartObject,
            EndObject,
            EndObject,
            Key("escapes".into()),
            String("\"\\/\u{08}\u{0C}\n\r\t".into()),
            EndObject,
        ]
    }

    fn collect<'a, I>(chunks: I, options: Options) -> Result<Vec<Instruction>>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut feeder = Feeder::new(options);
        let mut instructions = Vec::new();
        let mut sink = |instruction: Instruction| -> Result {
            instructions.push(instruction);
            Ok(())
        };
        for chunk in chunks {
            feeder.feed(chunk, false, &mut sink)?;
        }
        feeder.finish(&mut sink)?;
        Ok(instructions)
    }

    fn kind(err: &Error) -> &'static str {
        match err {
            Error::Syntax { .. } => "syntax",
            Error::Escape => "escape",
            Error::Utf8 => "utf8",
            Error::Depth => "depth",
            Error::TooLong { .. } => "length",
            Error::Unterminated => "unterminated",
            _ => "other",
        }
    }

    #[test]
    fn test_document() {
        let instructions = collect([DOCUMENT], Options::default()).unwrap();
        assert_eq!(instructions, document());
    }

    #[test]
    fn test_every_split() {
        let expected = document();
        for n in 0..=DOCUMENT.len() {
            let (head, tail) = DOCUMENT.split_at(n);
            let instructions =
                collect([head, tail], Options::default()).unwrap();
            assert_eq!(instructions, expected, "Failed for split at {n}");
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let chunks = DOCUMENT.chunks(1);
        let instructions = collect(chunks, Options::default()).unwrap();
        assert_eq!(instructions, document());
    }

    #[test]
    fn test_surrogate_pair_split() {
        let data = br#""\ud83d\ude00""#;
        for n in 0..=data.len() {
            let (head, tail) = data.split_at(n);
            let instructions =
                collect([head, tail], Options::default()).unwrap();
            assert_eq!(
                instructions,
                [String("\u{1F600}".into())],
                "Failed for split at {n}"
            );
        }
    }

    #[test]
    fn test_multibyte_split() {
        let data = "\"ハロー\"".as_bytes();
        for n in 0..=data.len() {
            let (head, tail) = data.split_at(n);
            let instructions =
                collect([head, tail], Options::default()).unwrap();
            assert_eq!(
                instructions,
                [String("ハロー".into())],
                "Failed for split at {n}"
            );
        }
    }

    #[test]
    fn test_stop() {
        let data = br#"{"a": 1} [2]"#;
        let mut feeder = Feeder::default();
        let mut instructions = Vec::new();
        let mut sink = |instruction: Instruction| -> Result {
            instructions.push(instruction);
            Ok(())
        };
        let left = feeder.feed(data, true, &mut sink).unwrap();
        assert_eq!(left, 4);
        assert!(feeder.is_complete());

        // Once complete, nothing is consumed in stop mode
        assert_eq!(feeder.feed(b"[3]", true, &mut sink).unwrap(), 3);

        // A new value is read after a reset
        feeder.reset();
        let rest = &data[data.len() - left..];
        assert_eq!(feeder.feed(rest, true, &mut sink).unwrap(), 0);
        assert_eq!(instructions, [
            StartObject,
            Key("a".into()),
            Number("1".into()),
            EndObject,
            StartArray,
            Number("2".into()),
            EndArray,
        ]);
    }

    #[test]
    fn test_stop_after_number() {
        let mut feeder = Feeder::default();
        let mut instructions = Vec::new();
        let mut sink = |instruction: Instruction| -> Result {
            instructions.push(instruction);
            Ok(())
        };

        // The delimiter ending the number is left unconsumed
        assert_eq!(feeder.feed(b"12 3", true, &mut sink).unwrap(), 2);
        assert_eq!(instructions, [Number("12".into())]);
    }

    #[test]
    fn test_stream() {
        let instructions =
            collect([b"1 2".as_slice(), b" [3]\n".as_slice()], Options::default());
        assert_eq!(instructions.unwrap(), [
            Number("1".into()),
            Number("2".into()),
            StartArray,
            Number("3".into()),
            EndArray,
        ]);
    }

    #[test]
    fn test_finish_number() {
        let mut feeder = Feeder::default();
        let mut instructions = Vec::new();
        let mut sink = |instruction: Instruction| -> Result {
            instructions.push(instruction);
            Ok(())
        };
        feeder.feed(b"-0.5e1", false, &mut sink).unwrap();
        assert!(!feeder.is_complete());
        feeder.finish(&mut sink).unwrap();
        assert!(feeder.is_complete());
        assert_eq!(instructions, [Number("-0.5e1".into())]);
    }

    #[test]
    fn test_errors() {
        let test_cases: &[(&[u8], &str)] = &[
            (b"[1,]", "syntax"),
            (b"{1: 2}", "syntax"),
            (b"[1 2]", "syntax"),
            (b"[}", "syntax"),
            (b"[1}", "syntax"),
            (b"{\"a\" 1}", "syntax"),
            (b"nulx", "syntax"),
            (b"[1.]", "syntax"),
            (b"[-]", "syntax"),
            (b"[01]", "syntax"),
            (b"-00", "syntax"),
            (b"\"a\x01\"", "syntax"),
            (b"\"\\x\"", "escape"),
            (b"\"\\ud83d\"", "escape"),
            (b"\"\\ud83dx\"", "escape"),
            (b"\"\\ud83d\\n\"", "escape"),
            (b"\"\\ude00\"", "escape"),
            (b"\"\\u12g4\"", "escape"),
            (b"\"\xff\"", "utf8"),
            (b"", "unterminated"),
            (b"-", "unterminated"),
            (b"nul", "unterminated"),
            (b"[1", "unterminated"),
            (b"{\"a\":", "unterminated"),
            (b"\"abc", "unterminated"),
        ];
        for &(data, expected) in test_cases {
            let err = collect([data], Options::default()).unwrap_err();
            assert_eq!(
                kind(&err),
                expected,
                "Failed for {}",
                data.escape_ascii()
            );
        }
    }

    #[test]
    fn test_error_offset() {
        let err = collect([b"[1,]".as_slice()], Options::default());
        assert!(matches!(err, Err(Error::Syntax { offset: 3, .. })));
    }

    #[test]
    fn test_depth() {
        let options = Options { max_depth: 2, ..Options::default() };
        assert!(collect([b"[[1]]".as_slice()], options.clone()).is_ok());
        let err = collect([b"[[[1]]]".as_slice()], options).unwrap_err();
        assert_eq!(kind(&err), "depth");
    }

    #[test]
    fn test_max_token() {
        let options = Options { max_token: 4, ..Options::relaxed() };
        let test_cases: &[(&[u8], bool)] = &[
            (b"\"abcd\"", true),
            (b"\"abcde\"", false),
            (b"\"ab\\ncd\"", false),
            (b"{\"abcde\": 1}", false),
            (b"1234", true),
            (b"-1234", false),
            (b"{abcd: 1}", true),
            (b"{abcde: 1}", false),
        ];
        for &(data, ok) in test_cases {
            for n in 0..=data.len() {
                let (head, tail) = data.split_at(n);
                let result = collect([head, tail], options.clone());
                match result {
                    Ok(_) => assert!(ok, "Failed for {}", data.escape_ascii()),
                    Err(err) => assert_eq!(
                        (ok, kind(&err)),
                        (false, "length"),
                        "Failed for {} split at {n}",
                        data.escape_ascii()
                    ),
                }
            }
        }
    }

    #[test]
    fn test_max_token_error() {
        let options = Options { max_token: 2, ..Options::default() };
        let err = collect([b"\"abc\"".as_slice()], options).unwrap_err();
        assert!(matches!(err, Error::TooLong { limit: 2 }));
        assert_eq!(err.to_string(), "token longer than 2 bytes");
    }

    #[test]
    fn test_leading_zero_without_commas() {
        let test_cases: &[&[u8]] = &[b"[01]", b"[1 -02]", b"{a: 00}"];
        for &data in test_cases {
            let err = collect([data], Options::relaxed()).unwrap_err();
            assert_eq!(
                kind(&err),
                "syntax",
                "Failed for {}",
                data.escape_ascii()
            );
        }

        // A zero followed by a delimiter stays a separate element
        let instructions = collect([b"[0 1]".as_slice()], Options::relaxed());
        assert_eq!(instructions.unwrap(), [
            StartArray,
            Number("0".into()),
            Number("1".into()),
            EndArray,
        ]);
    }

    #[test]
    fn test_dead() {
        let mut feeder = Feeder::default();
        let mut sink = |_: Instruction| -> Result { Ok(()) };
        assert!(feeder.feed(b"[}", false, &mut sink).is_err());
        assert!(feeder.is_dead());
        let err = feeder.feed(b"[]", false, &mut sink).unwrap_err();
        assert!(matches!(err, Error::Dead));
        let err = feeder.finish(&mut sink).unwrap_err();
        assert!(matches!(err, Error::Dead));
    }

    #[test]
    fn test_rejected() {
        let mut feeder = Feeder::default();
        let mut sink = |instruction: Instruction| -> Result {
            if instruction == Key("secret".into()) {
                Err(Error::Rejected)
            } else {
                Ok(())
            }
        };
        let data = br#"{"public": 1, "secret": 2}"#;
        let err = feeder.feed(data, false, &mut sink).unwrap_err();
        assert!(matches!(err, Error::Rejected));
        assert!(feeder.is_dead());
    }

    #[test]
    fn test_relaxed() {
        let data = br#"// leading comment
            {a: 1 b: [1 2] // trailing comment
             c_1: "x", "d": {}}"#;
        for n in 0..=data.len() {
            let (head, tail) = data.split_at(n);
            let instructions = collect([head, tail], Options::relaxed());
            assert_eq!(
                instructions.unwrap(),
                [
                    StartObject,
                    Key("a".into()),
                    Number("1".into()),
                    Key("b".into()),
                    StartArray,
                    Number("1".into()),
                    Number("2".into()),
                    EndArray,
                    Key("c_1".into()),
                    String("x".into()),
                    Key("d".into()),
                    StartObject,
                    EndObject,
                    EndObject,
                ],
                "Failed for split at {n}"
            );
        }
    }

    #[test]
    fn test_strict_rejects_extensions() {
        let test_cases: &[&[u8]] = &[
            b"{a: 1}",
            b"[1 2]",
            b"[1] // comment",
            b"{\"a\": 1 \"b\": 2}",
        ];
        for &data in test_cases {
            let err = collect([data], Options::strict()).unwrap_err();
            assert_eq!(
                kind(&err),
                "syntax",
                "Failed for {}",
                data.escape_ascii()
            );
        }
    }
}
