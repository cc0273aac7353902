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

//! HTTP header.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl AsRef<str> for Header {
    #[inline]
    fn as_ref(&self) -> &str {
        self.name()
    }
}

// ----------------------------------------------------------------------------

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------

impl FromStr for Header {
    type Err = Error;

    /// Parses a header name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Header`] for names without a variant.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_http::Header;
    ///
    /// // Parse header from name
    /// let header: Header = "content-length".parse()?;
    /// assert_eq!(header, Header::ContentLength);
    /// # Ok(())
    /// # }
    /// ```
    fn from_str(value: &str) -> Result<Self> {
        Header::ALL
            .iter()
            .find(|header| header.name().eq_ignore_ascii_case(value))
            .copied()
            .ok_or_else(|| Error::Header(value.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

/// Defines the known headers, along with their canonical names.
macro_rules! headers {
    ($($name:ident => $text:literal),+ $(,)?) => {
        /// HTTP header.
        ///
        /// Header tables store names as received, and look them up without
        /// regard to case, so this enum only names the headers that framing
        /// and connection management rely on. Every method of [`Headers`][]
        /// accepts both a [`Header`] and a plain string.
        ///
        /// [`Headers`]: crate::Headers
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
        pub enum Header {
            $(
                #[doc = concat!("`", $text, "`")]
                $name,
            )+
        }

        impl Header {
            /// All known headers.
            pub const ALL: &'static [Header] = &[$(Header::$name),+];

            /// Returns the canonical header name.
            ///
            /// # Examples
            ///
            /// ```
            /// use hio_http::Header;
            ///
            /// // Obtain canonical header name
            /// assert_eq!(Header::TransferEncoding.name(), "Transfer-Encoding");
            /// ```
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(Header::$name => $text,)+
                }
            }
        }
    };
}

headers! {
    Accept => "Accept",
    Connection => "Connection",
    ContentLength => "Content-Length",
    ContentType => "Content-Type",
    Date => "Date",
    Expect => "Expect",
    Host => "Host",
    KeepAlive => "Keep-Alive",
    Location => "Location",
    Server => "Server",
    Trailer => "Trailer",
    TransferEncoding => "Transfer-Encoding",
    Upgrade => "Upgrade",
    UserAgent => "User-Agent",
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Header;

    #[test]
    fn test_from_str() {
        let test_cases = vec![
            ("Content-Length", Some(Header::ContentLength)),
            ("transfer-encoding", Some(Header::TransferEncoding)),
            ("HOST", Some(Header::Host)),
            ("X-Custom", None),
        ];
        for (value, expected) in test_cases {
            let header = value.parse::<Header>().ok();
            assert_eq!(header, expected, "Failed for {value:?}");
        }
    }
}
