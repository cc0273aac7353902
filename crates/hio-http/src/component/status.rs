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

//! HTTP status.

use std::fmt;

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Status {
    /// Returns the status code.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Returns whether responses with the status never carry content.
    ///
    /// This holds for informational responses, as well as for `204` and
    /// `304`, no matter which framing headers they carry.
    ///
    /// # Examples
    ///
    /// ```
    /// use hio_http::Status;
    ///
    /// // Check whether responses may carry content
    /// assert!(Status::NoContent.is_bodiless());
    /// assert!(!Status::Ok.is_bodiless());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_bodiless(&self) -> bool {
        is_bodiless(self.code())
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl AsRef<str> for Status {
    #[inline]
    fn as_ref(&self) -> &str {
        self.name()
    }
}

// ----------------------------------------------------------------------------

impl fmt::Display for Status {
    /// Formats the status as it appears in a status line.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.name())
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns whether responses with the given code never carry content.
#[inline]
#[must_use]
pub(crate) const fn is_bodiless(code: u16) -> bool {
    matches!(code, 100..=199 | 204 | 304)
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

/// Defines the known statuses, along with their codes and reason phrases.
macro_rules! statuses {
    ($($code:literal $name:ident $reason:literal),+ $(,)?) => {
        /// HTTP status.
        #[allow(clippy::enum_variant_names)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum Status {
            $(
                #[doc = concat!("`", $code, " ", $reason, "`")]
                $name = $code,
            )+
        }

        impl Status {
            /// Returns the reason phrase.
            ///
            /// # Examples
            ///
            /// ```
            /// use hio_http::Status;
            ///
            /// // Obtain reason phrase
            /// let status = Status::ServiceUnavailable;
            /// assert_eq!(status.name(), "Service Unavailable");
            /// ```
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(Status::$name => $reason,)+
                }
            }

            /// Returns the status for the given code, if known.
            ///
            /// # Examples
            ///
            /// ```
            /// use hio_http::Status;
            ///
            /// // Look up status by code
            /// assert_eq!(Status::from_code(404), Some(Status::NotFound));
            /// assert_eq!(Status::from_code(299), None);
            /// ```
            #[must_use]
            pub const fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Status::$name),)+
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    // Informational
    100 Continue "Continue",
    101 SwitchingProtocols "Switching Protocols",

    // Success
    200 Ok "OK",
    201 Created "Created",
    202 Accepted "Accepted",
    204 NoContent "No Content",
    206 PartialContent "Partial Content",

    // Redirection
    301 MovedPermanently "Moved Permanently",
    302 Found "Found",
    304 NotModified "Not Modified",
    307 TemporaryRedirect "Temporary Redirect",
    308 PermanentRedirect "Permanent Redirect",

    // Client errors
    400 BadRequest "Bad Request",
    403 Forbidden "Forbidden",
    404 NotFound "Not Found",
    405 MethodNotAllowed "Method Not Allowed",
    408 RequestTimeout "Request Timeout",
    411 LengthRequired "Length Required",
    413 PayloadTooLarge "Payload Too Large",
    414 UriTooLong "URI Too Long",
    417 ExpectationFailed "Expectation Failed",
    426 UpgradeRequired "Upgrade Required",
    431 RequestHeaderFieldsTooLarge "Request Header Fields Too Large",

    // Server errors
    500 InternalServerError "Internal Server Error",
    501 NotImplemented "Not Implemented",
    503 ServiceUnavailable "Service Unavailable",
    505 HttpVersionNotSupported "HTTP Version Not Supported",
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn test_display() {
        let test_cases = vec![
            (Status::Ok, "200 OK"),
            (Status::ServiceUnavailable, "503 Service Unavailable"),
        ];
        for (status, expected) in test_cases {
            assert_eq!(status.to_string(), expected, "Failed for {status:?}");
        }
    }

    #[test]
    fn test_is_bodiless() {
        let test_cases = vec![
            (Status::Continue, true),
            (Status::NoContent, true),
            (Status::NotModified, true),
            (Status::Ok, false),
            (Status::NotFound, false),
        ];
        for (status, expected) in test_cases {
            assert_eq!(status.is_bodiless(), expected, "Failed for {status:?}");
        }
    }
}
