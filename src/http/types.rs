#![allow(rustdoc::bare_urls)]

//! Core HTTP protocol types: status codes, protocol version, and the URI
//! parser (design §4.1, §4.2).

use std::ops::Range;

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// VERSION

/// HTTP protocol version, parsed as a major/minor pair (design §4.2).
///
/// Unlike a closed `Http09`/`Http10`/`Http11` enum, the wire format allows
/// any single-byte major/minor pair; this type stores exactly what the
/// version parser extracted, compared as a 16-bit composite against the
/// server's configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    /// The value produced when no `HTTP/x.y` token is present at all.
    pub const HTTP_09: Version = Version { major: 0, minor: 9 };

    /// Parses an `HTTP/major.minor` token. Any malformed component — missing
    /// `HTTP/` prefix, missing `.`, non-digit component — yields
    /// [`Version::HTTP_09`], matching `fnet_http_version_parse`.
    pub(crate) fn parse(src: &[u8]) -> Version {
        const PREFIX: &[u8] = b"HTTP/";

        let Some(pos) = memchr::memmem::find(src, PREFIX) else {
            return Version::HTTP_09;
        };
        let rest = &src[pos + PREFIX.len()..];

        let Some(dot) = memchr::memchr(b'.', rest) else {
            return Version::HTTP_09;
        };
        let (major_str, minor_str) = (&rest[..dot], &rest[dot + 1..]);

        let Some(major) = parse_u8(major_str) else {
            return Version::HTTP_09;
        };
        let Some(minor) = parse_u8(minor_str) else {
            return Version::HTTP_09;
        };

        Version { major, minor }
    }

    /// Caps this version at `max`, the server's highest supported version.
    pub(crate) fn capped_at(self, max: Version) -> Version {
        if self > max {
            max
        } else {
            self
        }
    }

    /// `true` for HTTP/0.x — the no-headers, no-status-line wire format.
    pub(crate) fn is_http09(self) -> bool {
        self.major == 0
    }
}

fn parse_u8(src: &[u8]) -> Option<u8> {
    // Stop at the first non-digit, like `fnet_strtoul`: trailing garbage
    // (e.g. the space before the CRLF) does not invalidate the number.
    let digits_end = src.iter().position(|b| !b.is_ascii_digit()).unwrap_or(src.len());
    let digits = &src[..digits_end];
    if digits.is_empty() {
        return None;
    }
    slice_to_usize(digits).and_then(|v| u8::try_from(v).ok())
}

// STATUS CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// HTTP status codes this registry is required to support
        /// (design §6 — the MUST-support list).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            pub(crate) const fn code(self) -> u16 {
                match self { $( StatusCode::$name => $num, )+ }
            }

            pub(crate) const fn reason_phrase(self) -> &'static str {
                match self { $( StatusCode::$name => $str, )+ }
            }

            /// Linear lookup by numeric code, as the status table in
            /// `fnet_http_tx_status_line` does; unknown codes have no
            /// phrase (empty string), matching the original's fallback.
            pub(crate) fn from_code(code: u16) -> Option<StatusCode> {
                match code { $( $num => Some(StatusCode::$name), )+ _ => None }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.2)]
    Created = (201, "Created");
    /// [[RFC9110, Section 15.3.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.3)]
    Accepted = (202, "Accepted");
    /// [[RFC9110, Section 15.3.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.5)]
    NoContent = (204, "No Content");
    /// [[RFC9110, Section 15.4.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.2)]
    MovedPermanently = (301, "Moved Permanently");
    /// Historical "Moved Temporarily" phrasing (RFC 9110 calls 302 "Found").
    MovedTemporarily = (302, "Moved Temporarily");
    /// [[RFC9110, Section 15.4.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.5)]
    NotModified = (304, "Not Modified");
    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.2)]
    Unauthorized = (401, "Unauthorized");
    /// [[RFC9110, Section 15.5.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.4)]
    Forbidden = (403, "Forbidden");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.2)]
    NotImplemented = (501, "Not Implemented");
    /// [[RFC9110, Section 15.6.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.3)]
    BadGateway = (502, "Bad Gateway");
    /// [[RFC9110, Section 15.6.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.4)]
    ServiceUnavailable = (503, "Service Unavailable");
}

// URI PARSER (design §4.1)

/// A parsed request-target, stored as byte ranges into the owning buffer
/// rather than borrowed slices.
///
/// The buffer this indexes is reused for every subsequent header line once
/// the request line has been dispatched, so a `Url` only remains meaningful
/// for the duration of the dispatch call that consumes it — callers resolve
/// [`Url::path`]/[`Url::query`]/[`Url::extension`] against the buffer
/// immediately, the same way `fnet_http_default_handle` consumes
/// `uri->path` synchronously inside `method->handle` before the buffer is
/// reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    path: Range<usize>,
    query: Option<Range<usize>>,
    extension: Range<usize>,
}

impl Url {
    /// An empty `Url`, used to reset a [`crate::http::request::Request`]
    /// between connections without reallocating.
    pub(crate) const fn empty() -> Url {
        Url {
            path: 0..0,
            query: None,
            extension: 0..0,
        }
    }

    /// Parses a request-target starting at `start` in `buf`, terminated by
    /// a space or the end of the slice. Returns the parsed `Url` and the
    /// index just past the terminator, so the caller (the version parser)
    /// can continue from there.
    ///
    /// Grounded on `fnet_http_uri_parse` (`fnet_http.c`): leading spaces are
    /// skipped, `?` starts the query and ends the path, a space ends
    /// whichever of path/query is open, and the extension is the substring
    /// after the last `.` in the path (or empty when there is none).
    pub(crate) fn parse(buf: &[u8], start: usize) -> (Url, usize) {
        let mut cur = start;
        while cur < buf.len() && buf[cur] == b' ' {
            cur += 1;
        }
        let path_start = cur;
        let mut path_end = buf.len();
        let mut query: Option<Range<usize>> = None;

        while cur < buf.len() {
            match buf[cur] {
                b' ' => {
                    path_end = cur;
                    break;
                }
                b'?' => {
                    path_end = cur;
                    let query_start = cur + 1;
                    let mut query_end = buf.len();
                    let mut q = query_start;
                    while q < buf.len() {
                        if buf[q] == b' ' {
                            query_end = q;
                            cur = q;
                            break;
                        }
                        q += 1;
                    }
                    if q == buf.len() {
                        cur = buf.len();
                    }
                    query = Some(query_start..query_end);
                    break;
                }
                _ => cur += 1,
            }
        }
        if cur == buf.len() {
            path_end = path_end.min(buf.len());
        }

        let path = path_start..path_end;
        let extension = match memchr::memrchr(b'.', &buf[path.clone()]) {
            Some(dot) => (path_start + dot + 1)..path_end,
            None => path_end..path_end,
        };

        (
            Url {
                path,
                query,
                extension,
            },
            cur,
        )
    }

    /// Resolves the path substring against `buf`.
    pub fn path<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.path.clone()]
    }

    /// Resolves the raw (still percent-encoded) query substring against
    /// `buf`, or `None` if the request-target had no `?`.
    pub fn query<'b>(&self, buf: &'b [u8]) -> Option<&'b [u8]> {
        self.query.clone().map(|r| &buf[r])
    }

    /// Resolves the extension substring (the bytes after the last `.` in
    /// the path, or empty when there is none) against `buf`.
    pub fn extension<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.extension.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::str_op;

    fn parse(s: &str) -> (Url, usize) {
        Url::parse(s.as_bytes(), 0)
    }

    #[test]
    fn path_only() {
        let (url, end) = parse("/api/users HTTP/1.0");
        assert_eq!(str_op(url.path(b"/api/users HTTP/1.0")), "/api/users");
        assert_eq!(url.query(b"/api/users HTTP/1.0"), None);
        assert_eq!(end, 10);
    }

    #[test]
    fn path_with_query() {
        let buf = b"/search?q=rust HTTP/1.1";
        let (url, _) = Url::parse(buf, 0);
        assert_eq!(str_op(url.path(buf)), "/search");
        assert_eq!(str_op(url.query(buf).unwrap()), "q=rust");
    }

    #[test]
    fn extension_from_last_dot() {
        let buf = b"/style.min.css HTTP/1.0";
        let (url, _) = Url::parse(buf, 0);
        assert_eq!(str_op(url.extension(buf)), "css");
    }

    #[test]
    fn no_extension_is_empty() {
        let buf = b"/private HTTP/1.0";
        let (url, _) = Url::parse(buf, 0);
        assert_eq!(url.extension(buf), b"");
    }

    #[test]
    fn root_path_has_no_extension() {
        let buf = b"/ HTTP/1.0";
        let (url, _) = Url::parse(buf, 0);
        assert_eq!(str_op(url.path(buf)), "/");
        assert_eq!(url.extension(buf), b"");
    }

    #[test]
    fn version_defaults_to_http09_without_token() {
        assert_eq!(Version::parse(b"garbage"), Version::HTTP_09);
    }

    #[test]
    fn version_parses_major_minor() {
        assert_eq!(
            Version::parse(b"HTTP/1.1"),
            Version { major: 1, minor: 1 }
        );
        assert_eq!(
            Version::parse(b"HTTP/1.0"),
            Version { major: 1, minor: 0 }
        );
    }

    #[test]
    fn version_malformed_minor_falls_back() {
        assert_eq!(Version::parse(b"HTTP/1."), Version::HTTP_09);
    }

    #[test]
    fn version_caps_at_server_max() {
        let max = Version { major: 1, minor: 1 };
        let requested = Version { major: 2, minor: 0 };
        assert_eq!(requested.capped_at(max), max);
    }

    #[test]
    fn status_code_round_trips() {
        assert_eq!(StatusCode::from_code(404), Some(StatusCode::NotFound));
        assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
        assert_eq!(StatusCode::from_code(999), None);
    }
}
