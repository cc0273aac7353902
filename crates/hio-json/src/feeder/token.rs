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

//! Tokens in progress.
//!
//! Each token keeps its state byte by byte, so feed boundaries may fall
//! anywhere, including inside escape sequences and partial UTF-8.

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Outcome of scanning input into a token.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scan {
    /// Bytes consumed, token continues.
    Partial(usize),
    /// Bytes consumed, token is complete.
    Done(usize),
}

/// Position inside an escape sequence.
#[derive(Clone, Copy, Debug)]
enum Escape {
    /// Outside of an escape sequence.
    None,
    /// After a backslash.
    Backslash,
    /// Inside a `\uXXXX` escape, with the digits seen so far.
    Unicode { digits: u8, value: u32 },
}

/// Position inside a number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    /// Nothing seen yet.
    Start,
    /// After the minus sign.
    Sign,
    /// After a leading zero.
    Zero,
    /// Inside the integer part.
    Int,
    /// After the decimal point.
    Dot,
    /// Inside the fraction.
    Frac,
    /// After the exponent marker.
    Exp,
    /// After the exponent sign.
    ExpSign,
    /// Inside the exponent.
    ExpDigits,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// String in progress, after its opening quote.
#[derive(Debug)]
pub(crate) struct Str {
    /// Whether the string is an object key.
    key: bool,
    /// Maximum number of decoded bytes.
    limit: usize,
    /// Decoded bytes.
    buffer: Vec<u8>,
    /// Position inside an escape sequence.
    escape: Escape,
    /// High surrogate awaiting its low half.
    high: Option<u32>,
}

/// Number in progress.
#[derive(Debug)]
pub(crate) struct Number {
    /// Text of the number.
    text: String,
    /// Maximum length of the text.
    limit: usize,
    /// Position inside the number.
    part: Part,
}

/// Literal in progress.
#[derive(Debug)]
pub(crate) struct Literal {
    /// Expected word.
    word: &'static [u8],
    /// Number of bytes matched.
    matched: usize,
}

/// Unquoted key in progress.
#[derive(Debug)]
pub(crate) struct Bare {
    /// Text of the key.
    text: String,
    /// Maximum length of the text.
    limit: usize,
}

/// Line comment in progress, after its first slash.
#[derive(Debug, Default)]
pub(crate) struct Comment {
    /// Whether the second slash was seen.
    open: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Str {
    /// Creates a string holding at most the given number of bytes.
    pub(crate) fn new(key: bool, limit: usize) -> Self {
        Self {
            key,
            limit,
            buffer: Vec::new(),
            escape: Escape::None,
            high: None,
        }
    }

    /// Returns whether the string is an object key.
    pub(crate) fn is_key(&self) -> bool {
        self.key
    }

    /// Scans input, consuming runs of plain bytes at once.
    pub(crate) fn scan(&mut self, input: &[u8], offset: u64) -> Result<Scan> {
        let byte = input[0];
        match self.escape {
            Escape::None => {
                // A high surrogate must be followed by another escape
                if self.high.is_some() && byte != b'\\' {
                    return Err(Error::Escape);
                }
                match byte {
                    b'"' => Ok(Scan::Done(1)),
                    b'\\' => {
                        self.escape = Escape::Backslash;
                        Ok(Scan::Partial(1))
                    }
                    0..=0x1F => {
                        Err(Error::syntax(offset, "control character in string"))
                    }
                    _ => {
                        let n = input
                            .iter()
                            .position(|&b| b == b'"' || b == b'\\' || b < 0x20)
                            .unwrap_or(input.len());
                        check_limit(self.buffer.len(), n, self.limit)?;
                        self.buffer.try_reserve(n)?;
                        self.buffer.extend_from_slice(&input[..n]);
                        Ok(Scan::Partial(n))
                    }
                }
            }
            Escape::Backslash => {
                let decoded = match byte {
                    b'u' => {
                        self.escape = Escape::Unicode { digits: 0, value: 0 };
                        return Ok(Scan::Partial(1));
                    }
                    _ if self.high.is_some() => return Err(Error::Escape),
                    b'"' => '"',
                    b'\\' => '\\',
                    b'/' => '/',
                    b'b' => '\u{08}',
                    b'f' => '\u{0C}',
                    b'n' => '\n',
                    b'r' => '\r',
                    b't' => '\t',
                    _ => return Err(Error::Escape),
                };
                self.escape = Escape::None;
                self.push(decoded)?;
                Ok(Scan::Partial(1))
            }
            Escape::Unicode { digits, value } => {
                let digit = char::from(byte).to_digit(16).ok_or(Error::Escape)?;
                let value = (value << 4) | digit;
                if digits < 3 {
                    self.escape = Escape::Unicode { digits: digits + 1, value };
                    return Ok(Scan::Partial(1));
                }

                // Escape is complete, so combine surrogates if necessary
                self.escape = Escape::None;
                match (self.high.take(), value) {
                    (None, 0xD800..=0xDBFF) => self.high = Some(value),
                    (Some(high), 0xDC00..=0xDFFF) => {
                        let code = 0x10000 + ((high - 0xD800) << 10);
                        self.decode(code + (value - 0xDC00))?;
                    }
                    (None, 0xDC00..=0xDFFF) | (Some(_), _) => {
                        return Err(Error::Escape);
                    }
                    (None, code) => self.decode(code)?,
                }
                Ok(Scan::Partial(1))
            }
        }
    }

    /// Converts the string into its text, validating UTF-8.
    pub(crate) fn into_text(self) -> Result<String> {
        String::from_utf8(self.buffer).map_err(|_| Error::Utf8)
    }

    /// Appends a decoded code point.
    fn decode(&mut self, code: u32) -> Result {
        let decoded = char::from_u32(code).ok_or(Error::Escape)?;
        self.push(decoded)
    }

    /// Appends a character.
    fn push(&mut self, decoded: char) -> Result {
        let mut bytes = [0; 4];
        let encoded = decoded.encode_utf8(&mut bytes);
        check_limit(self.buffer.len(), encoded.len(), self.limit)?;
        self.buffer.try_reserve(encoded.len())?;
        self.buffer.extend_from_slice(encoded.as_bytes());
        Ok(())
    }
}

// ----------------------------------------------------------------------------

impl Number {
    /// Creates a number of at most the given length.
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            part: Part::Start,
        }
    }

    /// Scans a byte.
    ///
    /// A number is only known to be complete once a byte arrives that can't
    /// be part of it, which is left unconsumed.
    pub(crate) fn scan(&mut self, byte: u8, offset: u64) -> Result<Scan> {
        let next = match (self.part, byte) {
            (Part::Start, b'-') => Some(Part::Sign),
            (Part::Start | Part::Sign, b'0') => Some(Part::Zero),
            (Part::Start | Part::Sign | Part::Int, b'0'..=b'9') => {
                Some(Part::Int)
            }
            (Part::Zero | Part::Int, b'.') => Some(Part::Dot),
            (Part::Dot | Part::Frac, b'0'..=b'9') => Some(Part::Frac),
            (Part::Zero | Part::Int | Part::Frac, b'e' | b'E') => {
                Some(Part::Exp)
            }
            (Part::Exp, b'+' | b'-') => Some(Part::ExpSign),
            (Part::Exp | Part::ExpSign | Part::ExpDigits, b'0'..=b'9') => {
                Some(Part::ExpDigits)
            }
            (Part::Zero, b'0'..=b'9') => {
                return Err(Error::syntax(offset, "leading zero in number"));
            }
            _ => None,
        };
        match next {
            Some(part) => {
                check_limit(self.text.len(), 1, self.limit)?;
                self.text.try_reserve(1)?;
                self.part = part;
                self.text.push(char::from(byte));
                Ok(Scan::Partial(1))
            }
            None if self.is_complete() => Ok(Scan::Done(0)),
            None => Err(Error::syntax(offset, "malformed number")),
        }
    }

    /// Returns whether the number could end here.
    pub(crate) fn is_complete(&self) -> bool {
        matches!(
            self.part,
            Part::Zero | Part::Int | Part::Frac | Part::ExpDigits
        )
    }

    /// Converts the number into its text.
    pub(crate) fn into_text(self) -> String {
        self.text
    }

    /// Returns whether the given text is a number.
    pub(crate) fn validate(text: &str) -> bool {
        let mut number = Number::new(usize::MAX);
        let scanned = text.bytes().all(|byte| {
            matches!(number.scan(byte, 0), Ok(Scan::Partial(_)))
        });
        scanned && number.is_complete()
    }
}

// ----------------------------------------------------------------------------

impl Literal {
    /// Creates a literal expecting the given word.
    pub(crate) fn new(word: &'static [u8]) -> Self {
        Self { word, matched: 0 }
    }

    /// Scans a byte.
    pub(crate) fn scan(&mut self, byte: u8, offset: u64) -> Result<Scan> {
        if self.word.get(self.matched) != Some(&byte) {
            return Err(Error::syntax(offset, "invalid literal"));
        }
        self.matched += 1;
        if self.matched == self.word.len() {
            Ok(Scan::Done(1))
        } else {
            Ok(Scan::Partial(1))
        }
    }

    /// Returns the expected word.
    pub(crate) fn word(&self) -> &'static [u8] {
        self.word
    }
}

// ----------------------------------------------------------------------------

impl Bare {
    /// Creates an unquoted key of at most the given length.
    pub(crate) fn new(limit: usize) -> Self {
        Self { text: String::new(), limit }
    }

    /// Scans a byte, leaving the first byte after the key unconsumed.
    pub(crate) fn scan(&mut self, byte: u8) -> Result<Scan> {
        if is_identifier(byte) {
            check_limit(self.text.len(), 1, self.limit)?;
            self.text.try_reserve(1)?;
            self.text.push(char::from(byte));
            Ok(Scan::Partial(1))
        } else {
            Ok(Scan::Done(0))
        }
    }

    /// Converts the key into its text.
    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

// ----------------------------------------------------------------------------

impl Comment {
    /// Scans input, consuming everything up to and including the newline.
    pub(crate) fn scan(&mut self, input: &[u8], offset: u64) -> Result<Scan> {
        if !self.open {
            return if input[0] == b'/' {
                self.open = true;
                Ok(Scan::Partial(1))
            } else {
                Err(Error::syntax(offset, "expected '/'"))
            };
        }
        match input.iter().position(|&b| b == b'\n') {
            Some(n) => Ok(Scan::Done(n + 1)),
            None => Ok(Scan::Partial(input.len())),
        }
    }

    /// Returns whether the comment may end here.
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns whether the byte can start an unquoted key.
pub(crate) fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$'
}

/// Returns whether the byte can continue an unquoted key.
fn is_identifier(byte: u8) -> bool {
    is_identifier_start(byte) || byte.is_ascii_digit()
}

/// Checks whether a token of the given length may grow as requested.
fn check_limit(len: usize, additional: usize, limit: usize) -> Result {
    if len.saturating_add(additional) > limit {
        Err(Error::TooLong { limit })
    } else {
        Ok(())
    }
}
