//! Incremental request-line/header-line parsing (design §3, §4.2).
//!
//! Unlike a server that buffers a whole request before parsing it,
//! [`Request`] is fed one line at a time by the connection state machine
//! as each line arrives — matching `fnet_http_state_machine`'s per-LF
//! dispatch. Each parse call consumes a line already split out of the
//! connection's scratch buffer and copies whatever must survive past that
//! line (the request line itself, and the two recognized header values)
//! into `Request`'s own fixed-size storage, since the scratch buffer is
//! reused for every subsequent line.

use crate::{
    errors::ErrorKind,
    http::types::{self, Url, Version},
    limits::ReqLimits,
};
use memchr::memchr;

/// One parsed request, reused for the lifetime of a [`crate::ServerInstance`]
/// across every connection it serves.
#[derive(Debug)]
pub struct Request {
    line: Box<[u8]>,
    line_len: usize,
    method: std::ops::Range<usize>,
    url: Url,
    version: Version,
    auth: Box<[u8]>,
    auth_len: usize,
    content_length: Option<usize>,
}

/// What a single header line turned out to be, for the connection state
/// machine to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderLine {
    Authorization,
    ContentLength,
    Other,
    /// The blank line that terminates the header block.
    End,
}

impl Request {
    pub(crate) fn new(limits: &ReqLimits) -> Request {
        let buffer_size = limits.buffer_size();
        Request {
            line: vec![0; buffer_size].into_boxed_slice(),
            line_len: 0,
            method: 0..0,
            url: Url::empty(),
            version: Version::HTTP_09,
            auth: vec![0; buffer_size].into_boxed_slice(),
            auth_len: 0,
            content_length: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.line_len = 0;
        self.method = 0..0;
        self.url = Url::empty();
        self.version = Version::HTTP_09;
        self.auth_len = 0;
        self.content_length = None;
    }

    /// Parses the request line (`METHOD SP request-target [SP HTTP-version]`),
    /// capped at `max_version`.
    ///
    /// Grounded on `fnet_http_state_machine`'s request-line branch: the
    /// method token runs up to the first space, the request-target is
    /// parsed by [`Url::parse`], and a missing or malformed version token
    /// yields HTTP/0.9 rather than an error (`fnet_http_version_parse`'s
    /// `goto EXIT` fallback).
    pub(crate) fn parse_request_line(
        &mut self,
        src: &[u8],
        max_version: Version,
    ) -> Result<(), ErrorKind> {
        if src.len() > self.line.len() {
            return Err(ErrorKind::RequestLineTooLarge);
        }
        self.line[..src.len()].copy_from_slice(src);
        self.line_len = src.len();
        let buf = &self.line[..self.line_len];

        let space = memchr(b' ', buf).ok_or(ErrorKind::MalformedRequestLine)?;
        if space == 0 {
            return Err(ErrorKind::MalformedRequestLine);
        }
        self.method = 0..space;

        let (url, end) = Url::parse(buf, space + 1);
        if url.path(buf).is_empty() {
            return Err(ErrorKind::MalformedRequestLine);
        }
        self.url = url;

        let version_src = buf.get(end..).unwrap_or(b"");
        self.version = Version::parse(version_src).capped_at(max_version);

        Ok(())
    }

    /// Classifies and (for the two recognized headers) records `line`, a
    /// single header line with any trailing CR/LF already stripped by the
    /// caller. An empty `line` means the header block ended.
    pub(crate) fn parse_header_line(&mut self, line: &[u8]) -> HeaderLine {
        const AUTHORIZATION: &[u8] = b"Authorization:";
        const CONTENT_LENGTH: &[u8] = b"Content-Length:";

        if line.is_empty() {
            return HeaderLine::End;
        }

        if let Some(rest) = strip_prefix(line, AUTHORIZATION) {
            let value = trim_leading_space(rest);
            let n = value.len().min(self.auth.len());
            self.auth[..n].copy_from_slice(&value[..n]);
            self.auth_len = n;
            HeaderLine::Authorization
        } else if let Some(rest) = strip_prefix(line, CONTENT_LENGTH) {
            let value = trim_leading_space(rest);
            self.content_length = types::slice_to_usize(value);
            HeaderLine::ContentLength
        } else {
            HeaderLine::Other
        }
    }
}

// Public API
impl Request {
    /// The request line's method token (e.g. `b"GET"`), exactly as received
    /// — matched against the method table byte-for-byte.
    #[inline]
    pub fn method(&self) -> &[u8] {
        &self.line[self.method.clone()]
    }

    /// The request-target's path.
    #[inline]
    pub fn path(&self) -> &[u8] {
        self.url.path(&self.line[..self.line_len])
    }

    /// The raw (still percent-encoded) query string, if the request-target
    /// had a `?`.
    #[inline]
    pub fn query(&self) -> Option<&[u8]> {
        self.url.query(&self.line[..self.line_len])
    }

    /// The file extension used to key the content-type and file-handler
    /// tables (the substring after the last `.` in the path, or empty).
    #[inline]
    pub fn extension(&self) -> &[u8] {
        self.url.extension(&self.line[..self.line_len])
    }

    /// The negotiated protocol version (already capped at the server's
    /// configured maximum).
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// The raw `Authorization` header value, if one was sent.
    #[inline]
    pub fn authorization(&self) -> Option<&[u8]> {
        (self.auth_len > 0).then(|| &self.auth[..self.auth_len])
    }

    /// The parsed `Content-Length` value, if the header was present and
    /// well-formed.
    #[inline]
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }
}

fn strip_prefix<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    line.starts_with(prefix).then(|| &line[prefix.len()..])
}

fn trim_leading_space(value: &[u8]) -> &[u8] {
    match value.first() {
        Some(b' ') => &value[1..],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> Result<Request, ErrorKind> {
        let limits = ReqLimits::default();
        let mut req = Request::new(&limits);
        req.parse_request_line(line.as_bytes(), Version { major: 1, minor: 1 })?;
        Ok(req)
    }

    #[test]
    fn parses_http11_request_line() {
        let req = parsed("GET /api/users HTTP/1.1").unwrap();
        assert_eq!(req.method(), b"GET");
        assert_eq!(req.path(), b"/api/users");
        assert_eq!(req.version(), Version { major: 1, minor: 1 });
    }

    #[test]
    fn parses_request_line_with_query_and_extension() {
        let req = parsed("GET /style.css?v=2 HTTP/1.0").unwrap();
        assert_eq!(req.path(), b"/style.css");
        assert_eq!(req.query(), Some(b"v=2".as_slice()));
        assert_eq!(req.extension(), b"css");
        assert_eq!(req.version(), Version { major: 1, minor: 0 });
    }

    #[test]
    fn missing_version_token_is_http09() {
        let req = parsed("GET /index.html").unwrap();
        assert_eq!(req.version(), Version::HTTP_09);
    }

    #[test]
    fn version_caps_at_server_max() {
        let limits = ReqLimits::default();
        let mut req = Request::new(&limits);
        req.parse_request_line(b"GET / HTTP/9.9", Version { major: 1, minor: 1 })
            .unwrap();
        assert_eq!(req.version(), Version { major: 1, minor: 1 });
    }

    #[test]
    fn empty_path_is_malformed() {
        let limits = ReqLimits::default();
        let mut req = Request::new(&limits);
        assert_eq!(
            req.parse_request_line(b"GET ", Version { major: 1, minor: 1 }),
            Err(ErrorKind::MalformedRequestLine)
        );
    }

    #[test]
    fn oversized_request_line_is_rejected() {
        let limits = ReqLimits {
            buffer_size: 8,
            ..ReqLimits::default()
        };
        let mut req = Request::new(&limits);
        assert_eq!(
            req.parse_request_line(b"GET /too/long HTTP/1.1", Version { major: 1, minor: 1 }),
            Err(ErrorKind::RequestLineTooLarge)
        );
    }

    #[test]
    fn header_lines_are_classified() {
        let limits = ReqLimits::default();
        let mut req = Request::new(&limits);

        assert_eq!(
            req.parse_header_line(b"Authorization: Basic dXNlcjpwYXNz"),
            HeaderLine::Authorization
        );
        assert_eq!(req.authorization(), Some(b"Basic dXNlcjpwYXNz".as_slice()));

        assert_eq!(
            req.parse_header_line(b"Content-Length: 42"),
            HeaderLine::ContentLength
        );
        assert_eq!(req.content_length(), Some(42));

        assert_eq!(req.parse_header_line(b"Host: example.com"), HeaderLine::Other);
        assert_eq!(req.parse_header_line(b""), HeaderLine::End);
    }

    #[test]
    fn header_name_match_is_case_sensitive() {
        let limits = ReqLimits::default();
        let mut req = Request::new(&limits);
        assert_eq!(
            req.parse_header_line(b"authorization: Basic x"),
            HeaderLine::Other
        );
        assert_eq!(req.authorization(), None);
    }

    #[test]
    fn reset_clears_parsed_state() {
        let limits = ReqLimits::default();
        let mut req = Request::new(&limits);
        req.parse_request_line(b"GET /a HTTP/1.1", Version { major: 1, minor: 1 })
            .unwrap();
        req.parse_header_line(b"Authorization: Basic x");
        req.reset();

        assert_eq!(req.method(), b"");
        assert_eq!(req.path(), b"");
        assert_eq!(req.authorization(), None);
        assert_eq!(req.content_length(), None);
        assert_eq!(req.version(), Version::HTTP_09);
    }
}
