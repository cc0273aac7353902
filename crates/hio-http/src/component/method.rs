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

//! HTTP method.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Method {
    /// Returns whether the method establishes a tunnel.
    #[inline]
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Method::Connect)
    }

    /// Returns whether responses to the method never carry content.
    #[inline]
    #[must_use]
    pub const fn is_head(&self) -> bool {
        matches!(self, Method::Head)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl AsRef<str> for Method {
    #[inline]
    fn as_ref(&self) -> &str {
        self.name()
    }
}

// ----------------------------------------------------------------------------

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

/// Defines the known methods, along with their tokens.
macro_rules! methods {
    ($($name:ident => $token:literal),+ $(,)?) => {
        /// HTTP method.
        ///
        /// Messages keep the method as it was received, since extension
        /// methods are valid tokens, so this enum only covers the methods
        /// the reader and connection need to tell apart.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
        pub enum Method {
            $(
                #[doc = concat!("`", $token, "`")]
                $name,
            )+
        }

        impl Method {
            /// All known methods.
            pub const ALL: &'static [Method] = &[$(Method::$name),+];

            /// Returns the method token.
            ///
            /// # Examples
            ///
            /// ```
            /// use hio_http::Method;
            ///
            /// // Obtain method token
            /// assert_eq!(Method::Get.name(), "GET");
            /// ```
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(Method::$name => $token,)+
                }
            }
        }
    };
}

methods! {
    Get => "GET",
    Head => "HEAD",
    Post => "POST",
    Put => "PUT",
    Delete => "DELETE",
    Connect => "CONNECT",
    Options => "OPTIONS",
    Trace => "TRACE",
    Patch => "PATCH",
}

// ----------------------------------------------------------------------------

impl FromStr for Method {
    type Err = Error;

    /// Parses a method token, which is case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Method`] for tokens of extension methods.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use hio_http::Method;
    ///
    /// // Parse method from token
    /// let method: Method = "HEAD".parse()?;
    /// assert!(method.is_head());
    /// # Ok(())
    /// # }
    /// ```
    fn from_str(value: &str) -> Result<Self> {
        Method::ALL
            .iter()
            .find(|method| method.name() == value)
            .copied()
            .ok_or_else(|| Error::Method(value.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Method;

    #[test]
    fn test_from_str() {
        let test_cases = vec![
            ("GET", Some(Method::Get)),
            ("CONNECT", Some(Method::Connect)),
            ("get", None),
            ("BREW", None),
        ];
        for (value, expected) in test_cases {
            let method = value.parse::<Method>().ok();
            assert_eq!(method, expected, "Failed for {value:?}");
        }
    }

    #[test]
    fn test_predicates() {
        let test_cases = vec![
            (Method::Connect, (true, false)),
            (Method::Head, (false, true)),
            (Method::Get, (false, false)),
        ];
        for (method, expected) in test_cases {
            let actual = (method.is_connect(), method.is_head());
            assert_eq!(actual, expected, "Failed for {method}");
        }
    }

    #[test]
    fn test_name_parses_back() {
        for &method in Method::ALL {
            assert_eq!(method.name().parse::<Method>().ok(), Some(method));
        }
    }
}
