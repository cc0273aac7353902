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

//! Incremental JSON feeder and writer.
//!
//! The [`Feeder`] parses JSON from fragments of arbitrary size, emitting an
//! [`Instruction`] per structural event as soon as it's complete, and keeps
//! everything it needs to resume between fragments, including escape
//! sequences cut in half. The [`Writer`] is its counterpart, serializing
//! instructions or typed values in document order.
//!
//! # Examples
//!
//! ```
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use hio_json::writer::Options;
//! use hio_json::{Feeder, Writer};
//!
//! // Pretty print a document fed in fragments
//! let mut feeder = Feeder::default();
//! let mut writer = Writer::with_options(Vec::new(), Options::pretty(2));
//! for fragment in [br#"{"a": [1,"#.as_slice(), br#" 2]}"#.as_slice()] {
//!     feeder.feed(fragment, false, &mut writer)?;
//! }
//! feeder.finish(&mut writer)?;
//! assert_eq!(
//!     String::from_utf8(writer.finish()?)?,
//!     "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
//! );
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

mod error;
pub mod feeder;
mod instruction;
pub mod writer;

pub use error::{Error, Result};
pub use feeder::{Feeder, Options, Sink};
pub use instruction::Instruction;
pub use writer::{Options as WriterOptions, Writer};
