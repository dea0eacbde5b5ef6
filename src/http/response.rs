//! Bounded-chunk response emission: the five-sub-state status-line emitter
//! (design §4.4) plus the zero-allocation [`WriteBuffer`]/[`BodyWriter`]
//! formatting helpers a [`BodyProducer`] uses to fill each chunk.
//!
//! Unlike a server that assembles a whole response into a growable buffer
//! before sending it, this module only ever writes into the slice the
//! connection state machine hands it — one call at a time, bounded by
//! whatever of `BUF` is left for a given tick.

use crate::http::types::{StatusCode, Version};

/// Produces the next chunk of a response body on demand.
///
/// Implementors track their own position; a call returning `0` signals
/// completion. [`StaticBody`] adapts an in-memory byte slice (used for
/// generated error bodies); `src/filesystem.rs` adapts an open file the
/// same way for the default file handler.
pub trait BodyProducer {
    /// Writes as much of the remaining body as fits in `out`, returning the
    /// number of bytes written. `0` means the body is exhausted.
    fn produce(&mut self, out: &mut [u8]) -> usize;
}

/// A body that is already fully in memory.
pub struct StaticBody<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StaticBody<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        StaticBody { data, pos: 0 }
    }
}

impl BodyProducer for StaticBody<'_> {
    fn produce(&mut self, out: &mut [u8]) -> usize {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        n
    }
}

/// The status-line/header block of a response, emitted in up to five
/// sub-states: status line, `WWW-Authenticate`, `Content-Length`,
/// `Content-Type`, and the blank line terminating the header block.
///
/// Grounded on `fnet_http_tx_status_line` (`fnet_http.c` lines 760-860):
/// each sub-state is composed in full, then appended to the caller's
/// buffer only if it fits in the room left; a sub-state that doesn't fit is
/// dropped rather than split across it, except sub-state 0 (the status
/// line itself), which is never dropped — if it would overflow, a bare
/// `\r\n` is force-written instead so the connection can still close
/// cleanly.
#[derive(Debug)]
pub(crate) struct Response {
    status: StatusCode,
    version: Version,
    content_type: Option<&'static str>,
    content_length: Option<usize>,
    www_authenticate: Option<&'static str>,
    substate: u8,
}

const SUBSTATE_DONE: u8 = 5;

impl Response {
    pub(crate) fn new() -> Response {
        Response {
            status: StatusCode::Ok,
            version: Version::HTTP_09,
            content_type: None,
            content_length: None,
            www_authenticate: None,
            substate: SUBSTATE_DONE,
        }
    }

    /// Starts a new status-line/header block. Call the `set_*` methods
    /// before the first [`Response::advance_status_line`] call.
    pub(crate) fn begin(&mut self, status: StatusCode, version: Version) {
        self.status = status;
        self.version = version;
        self.content_type = None;
        self.content_length = None;
        self.www_authenticate = None;
        self.substate = 0;
    }

    pub(crate) fn set_content_type(&mut self, content_type: &'static str) {
        self.content_type = Some(content_type);
    }

    pub(crate) fn set_content_length(&mut self, len: usize) {
        self.content_length = Some(len);
    }

    pub(crate) fn set_www_authenticate(&mut self, realm: &'static str) {
        self.www_authenticate = Some(realm);
    }

    /// Overrides the status code of a header block already begun via
    /// [`Response::begin`], without touching any header already set —
    /// used when a `POST` body's `receive` callback fails partway through
    /// `RX` and the response must surface that status instead of 200.
    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.substate >= SUBSTATE_DONE
    }

    /// Appends as much of the remaining header block as fits into
    /// `out[*cursor..]`, advancing `*cursor` and the internal sub-state.
    /// Call repeatedly (the connection's `TX` state does this once per
    /// tick) until [`Response::is_complete`] returns `true`.
    pub(crate) fn advance_status_line(&mut self, out: &mut [u8], cursor: &mut usize) {
        while self.substate < SUBSTATE_DONE {
            let mut scratch = [0u8; 256];
            let piece_len = match self.format_piece(self.substate, &mut scratch) {
                Some(len) => len,
                None => {
                    self.substate += 1;
                    continue;
                }
            };

            let remaining = out.len().saturating_sub(*cursor);
            if piece_len <= remaining {
                out[*cursor..*cursor + piece_len].copy_from_slice(&scratch[..piece_len]);
                *cursor += piece_len;
            } else if self.substate == 0 && *cursor == 0 && out.len() >= 2 {
                out[0] = b'\r';
                out[1] = b'\n';
                *cursor = 2;
            }
            // Otherwise the buffer has no room left for this piece: drop it
            // and move on, matching the original's buffer-overload discard.

            self.substate += 1;
        }
    }

    fn format_piece(&self, substate: u8, scratch: &mut [u8; 256]) -> Option<usize> {
        let mut pos = 0;
        match substate {
            0 => {
                push(scratch, &mut pos, b"HTTP/");
                push_decimal(scratch, &mut pos, self.version.major as u64);
                push(scratch, &mut pos, b".");
                push_decimal(scratch, &mut pos, self.version.minor as u64);
                push(scratch, &mut pos, b" ");
                push_decimal(scratch, &mut pos, self.status.code() as u64);
                push(scratch, &mut pos, b" ");
                push(scratch, &mut pos, self.status.reason_phrase().as_bytes());
                push(scratch, &mut pos, b"\r\n");
                Some(pos)
            }
            1 => {
                let realm = self.www_authenticate?;
                push(scratch, &mut pos, b"WWW-Authenticate: Basic realm=\"");
                push(scratch, &mut pos, realm.as_bytes());
                push(scratch, &mut pos, b"\"\r\n");
                Some(pos)
            }
            2 => {
                let len = self.content_length?;
                push(scratch, &mut pos, b"Content-Length: ");
                push_decimal(scratch, &mut pos, len as u64);
                push(scratch, &mut pos, b"\r\n");
                Some(pos)
            }
            3 => {
                let content_type = self.content_type?;
                push(scratch, &mut pos, b"Content-Type: ");
                push(scratch, &mut pos, content_type.as_bytes());
                push(scratch, &mut pos, b"\r\n");
                Some(pos)
            }
            4 => {
                push(scratch, &mut pos, b"\r\n");
                Some(pos)
            }
            _ => None,
        }
    }
}

fn push(buf: &mut [u8], pos: &mut usize, bytes: &[u8]) {
    let end = (*pos + bytes.len()).min(buf.len());
    let n = end - *pos;
    buf[*pos..end].copy_from_slice(&bytes[..n]);
    *pos = end;
}

fn push_decimal(buf: &mut [u8], pos: &mut usize, mut n: u64) {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    if n == 0 {
        i -= 1;
        digits[i] = b'0';
    }
    while n > 0 {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    push(buf, pos, &digits[i..]);
}

pub mod write {
    use std::{
        borrow::Cow,
        rc::Rc,
        sync::Arc,
    };

    /// Bounded writer for body content, filling a single connection-buffer
    /// slice. Used by [`super::BodyProducer`] implementations to emit a body
    /// without knowing the connection's chunk size in advance.
    #[derive(Debug)]
    pub struct BodyWriter<'a> {
        buf: &'a mut [u8],
        pos: usize,
    }

    impl<'a> BodyWriter<'a> {
        pub(crate) fn new(buf: &'a mut [u8]) -> Self {
            BodyWriter { buf, pos: 0 }
        }

        pub(crate) fn written(&self) -> usize {
            self.pos
        }

        fn push(&mut self, bytes: &[u8]) {
            let end = (self.pos + bytes.len()).min(self.buf.len());
            let n = end - self.pos;
            self.buf[self.pos..end].copy_from_slice(&bytes[..n]);
            self.pos = end;
        }

        /// Writes `value`'s zero-allocation byte representation, truncating
        /// silently if it doesn't fit in the remaining chunk.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) -> &mut Self {
            value.write_to(self);
            self
        }
    }

    impl std::io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let before = self.pos;
            self.push(buf);
            Ok(self.pos - before)
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Trait for writing data into a [`BodyWriter`] chunk without an
    /// intermediate allocation.
    pub trait WriteBuffer {
        fn write_to(&self, buffer: &mut BodyWriter<'_>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut BodyWriter<'_>) {
                    let closure = $conn;
                    closure(self, buffer);
                }
            })*
        };
        (number($type:ty), $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut BodyWriter<'_>) {
                    $conn(*self as $type, buffer);
                }
            })*
        };
    }

    impl<T: WriteBuffer> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut BodyWriter<'_>) {
            T::write_to(*self, buffer);
        }
    }
    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut BodyWriter<'_>| {
            buffer.push(value.as_bytes());
        } => &str, String, Box<str>, Cow<'_, str>,
        Arc<str>, Rc<str>, Arc<String>, Rc<String>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut BodyWriter<'_>| {
            buffer.push(value);
        } => &[u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>,
        Arc<[u8]>, Rc<[u8]>, Arc<Vec<u8>>, Rc<Vec<u8>>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut BodyWriter<'_>) {
            buffer.push(self);
        }
    }
    impl_write_buffer! {
        number(u128), impl_write_buffer_u128 => u8, u16, u32, u64, u128, usize
    }
    impl_write_buffer! {
        number(i128), impl_write_buffer_i128 => i8, i16, i32, i64, i128, isize
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut BodyWriter<'_>) {
            buffer.push(match self {
                true => b"true",
                false => b"false",
            });
        }
    }

    fn impl_write_buffer_u128(mut value: u128, buffer: &mut BodyWriter<'_>) {
        let mut digits = [0u8; 39];
        let mut i = digits.len();
        if value == 0 {
            i -= 1;
            digits[i] = b'0';
        }
        while value > 0 {
            i -= 1;
            digits[i] = b'0' + (value % 10) as u8;
            value /= 10;
        }
        buffer.push(&digits[i..]);
    }

    fn impl_write_buffer_i128(value: i128, buffer: &mut BodyWriter<'_>) {
        if value < 0 {
            buffer.push(b"-");
        }
        impl_write_buffer_u128(value.unsigned_abs(), buffer);
    }
}

pub use write::{BodyWriter, WriteBuffer};

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_all(resp: &mut Response, chunk_size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        while !resp.is_complete() {
            let mut chunk = vec![0u8; chunk_size];
            let mut cursor = 0;
            resp.advance_status_line(&mut chunk, &mut cursor);
            out.extend_from_slice(&chunk[..cursor]);
            if cursor == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn status_line_only() {
        let mut resp = Response::new();
        resp.begin(StatusCode::NotFound, Version { major: 1, minor: 1 });

        let mut out = [0u8; 64];
        let mut cursor = 0;
        resp.advance_status_line(&mut out, &mut cursor);

        assert!(resp.is_complete());
        assert_eq!(&out[..cursor], b"HTTP/1.1 404 Not Found\r\n\r\n");
    }

    #[test]
    fn full_header_block() {
        let mut resp = Response::new();
        resp.begin(StatusCode::Ok, Version { major: 1, minor: 0 });
        resp.set_content_type("text/plain");
        resp.set_content_length(11);

        let mut out = [0u8; 128];
        let mut cursor = 0;
        resp.advance_status_line(&mut out, &mut cursor);

        assert_eq!(
            &out[..cursor],
            b"HTTP/1.0 200 OK\r\nContent-Length: 11\r\nContent-Type: text/plain\r\n\r\n"
        );
    }

    #[test]
    fn www_authenticate_challenge() {
        let mut resp = Response::new();
        resp.begin(StatusCode::Unauthorized, Version { major: 1, minor: 1 });
        resp.set_www_authenticate("device");

        let mut out = [0u8; 128];
        let mut cursor = 0;
        resp.advance_status_line(&mut out, &mut cursor);

        assert_eq!(
            &out[..cursor],
            b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"device\"\r\n\r\n"
        );
    }

    #[test]
    fn overloaded_buffer_forces_bare_crlf() {
        let mut resp = Response::new();
        resp.begin(StatusCode::Ok, Version { major: 1, minor: 1 });

        let mut out = [0u8; 4];
        let mut cursor = 0;
        resp.advance_status_line(&mut out, &mut cursor);

        assert!(resp.is_complete());
        assert_eq!(&out[..cursor], b"\r\n");
    }

    #[test]
    fn oversized_header_is_dropped_not_truncated() {
        let mut resp = Response::new();
        resp.begin(StatusCode::Ok, Version { major: 1, minor: 1 });
        resp.set_content_type("text/plain");

        // Room for the status line, but not enough left for Content-Type.
        let mut out = [0u8; 20];
        let mut cursor = 0;
        resp.advance_status_line(&mut out, &mut cursor);

        assert!(resp.is_complete());
        assert_eq!(&out[..cursor], b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn static_body_streams_in_chunks() {
        let mut body = StaticBody::new(b"Hello, world!");
        let mut out = [0u8; 5];

        assert_eq!(body.produce(&mut out), 5);
        assert_eq!(&out, b"Hello");
        assert_eq!(body.produce(&mut out), 5);
        assert_eq!(&out, b", wor");
        assert_eq!(body.produce(&mut out), 3);
        assert_eq!(&out[..3], b"ld!");
        assert_eq!(body.produce(&mut out), 0);
    }

    #[test]
    fn body_writer_composes_mixed_values() {
        let mut buf = [0u8; 32];
        {
            let mut w = BodyWriter::new(&mut buf);
            w.write("id=").write(42u32).write(" ok=").write(true);
            assert_eq!(w.written(), 13);
        }
        assert_eq!(&buf[..13], b"id=42 ok=true");
    }

    #[test]
    fn chunked_emission_matches_full_emission() {
        let mut whole = Response::new();
        whole.begin(StatusCode::NotFound, Version { major: 1, minor: 1 });
        whole.set_content_type("text/plain");
        let mut whole_out = [0u8; 128];
        let mut whole_cursor = 0;
        whole.advance_status_line(&mut whole_out, &mut whole_cursor);

        let mut chunked = Response::new();
        chunked.begin(StatusCode::NotFound, Version { major: 1, minor: 1 });
        chunked.set_content_type("text/plain");
        let chunked_out = emit_all(&mut chunked, 8);

        assert_eq!(&whole_out[..whole_cursor], chunked_out.as_slice());
    }
}
