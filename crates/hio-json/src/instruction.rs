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

//! JSON instruction.

use std::fmt;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// JSON instruction.
///
/// Instructions are the structural events of a document, in document order.
/// The [`Feeder`][] emits them while parsing, and the [`Writer`][] accepts
/// them to serialize a document, so both can be chained.
///
/// Numbers are kept as their textual representation, so no precision is lost
/// before the consumer decides how to interpret them.
///
/// [`Feeder`]: crate::Feeder
/// [`Writer`]: crate::Writer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Start of array.
    StartArray,
    /// End of array.
    EndArray,
    /// Start of object.
    StartObject,
    /// End of object.
    EndObject,
    /// Object key.
    Key(String),
    /// String value.
    String(String),
    /// Number value.
    Number(String),
    /// Null.
    Nil,
    /// True.
    True,
    /// False.
    False,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Instruction {
    /// Returns whether the instruction opens a container.
    #[inline]
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Instruction::StartArray | Instruction::StartObject)
    }

    /// Returns whether the instruction closes a container.
    #[inline]
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Instruction::EndArray | Instruction::EndObject)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for Instruction {
    /// Formats the instruction for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::StartArray => f.write_str("START_ARRAY"),
            Instruction::EndArray => f.write_str("END_ARRAY"),
            Instruction::StartObject => f.write_str("START_OBJECT"),
            Instruction::EndObject => f.write_str("END_OBJECT"),
            Instruction::Key(key) => write!(f, "KEY {key:?}"),
            Instruction::String(value) => write!(f, "STRING {value:?}"),
            Instruction::Number(value) => write!(f, "NUMBER {value}"),
            Instruction::Nil => f.write_str("NIL"),
            Instruction::True => f.write_str("TRUE"),
            Instruction::False => f.write_str("FALSE"),
        }
    }
}
