//! Error surfaces named by the error-handling design (see crate docs).
//!
//! Two distinct error types exist, for the two places this design draws a
//! line between "reported back to the caller" and "handled entirely inside
//! the state machine":
//!
//! - [`InitError`] — Server Instance Table construction failures. These are
//!   the Rust realization of the "invalid-descriptor sentinel" the original
//!   design returns from its init routine; here they are a real `Result`.
//! - [`ErrorKind`] — per-connection error surfaces. These never leave the
//!   state machine: every variant but [`ErrorKind::HandlerRefused`] is
//!   constructed directly in `src/server/connection.rs` and turned into
//!   either a status-only response or an immediate `CLOSING` transition,
//!   never propagated to the scheduler. `HandlerRefused` is reserved for a
//!   handler that can fail with an arbitrary status; this core's only
//!   handler (the default static-file handler) only ever fails with 404,
//!   which is [`ErrorKind::ResourceMissing`] instead.

use crate::http::types::StatusCode;
use std::{error, fmt, io};

/// Failure reported by [`crate::ServerBuilder::build`].
///
/// Mirrors the original design's "reject invalid params, unwind what was
/// acquired" init discipline, expressed as `Result` instead of a sentinel
/// descriptor.
#[derive(Debug)]
pub enum InitError {
    /// The Server Instance Table has no free slot (`max_instances` reached).
    NoFreeSlot,
    /// No handler registry was registered before `build()`.
    MissingHandler,
    /// No listener was registered before `build()`.
    MissingListener,
    /// Binding/configuring the listening socket failed.
    Socket(io::Error),
    /// Opening the root directory or the index file failed.
    Filesystem(io::Error),
}

impl error::Error for InitError {}
impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::NoFreeSlot => write!(f, "server instance table has no free slot"),
            InitError::MissingHandler => write!(f, "no handler registered"),
            InitError::MissingListener => write!(f, "no listener registered"),
            InitError::Socket(err) => write!(f, "socket setup failed: {err}"),
            InitError::Filesystem(err) => write!(f, "filesystem setup failed: {err}"),
        }
    }
}

/// Per-connection error surfaces (design §7).
///
/// Every variant carries the information needed to finish the response (a
/// status code to surface) except the two that bypass status emission
/// entirely (`SocketError`, `IdleDeadline`): a socket error at any point
/// transitions straight to `CLOSING` without emitting a status line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum ErrorKind {
    /// Unknown method, or unparseable request line.
    MalformedRequestLine,
    /// `method.handle` returned a non-2xx status (or the generic error
    /// sentinel, mapped to 500).
    HandlerRefused(StatusCode),
    /// Auth table matched the URI and no valid credentials arrived.
    AuthRequired,
    /// Default file handler could not open the requested resource.
    ResourceMissing,
    /// The request line itself did not fit in `BUF` before it could be
    /// parsed at all.
    RequestLineTooLarge,
    /// A socket call returned the error sentinel. No status is emitted.
    SocketError,
    /// `RX_TIMEOUT_MS`/`TX_TIMEOUT_MS` exceeded with no forward progress.
    /// No status is emitted.
    IdleDeadline,
}

impl ErrorKind {
    /// The status code this error surfaces to the client, or `None` when
    /// the connection is torn down without sending a status line at all.
    pub(crate) fn status_code(self) -> Option<StatusCode> {
        match self {
            ErrorKind::MalformedRequestLine => Some(StatusCode::NotImplemented),
            ErrorKind::HandlerRefused(code) => Some(code),
            ErrorKind::AuthRequired => Some(StatusCode::Unauthorized),
            ErrorKind::ResourceMissing => Some(StatusCode::NotFound),
            ErrorKind::RequestLineTooLarge => Some(StatusCode::InternalServerError),
            ErrorKind::SocketError | ErrorKind::IdleDeadline => None,
        }
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_and_idle_errors_emit_no_status() {
        assert_eq!(ErrorKind::SocketError.status_code(), None);
        assert_eq!(ErrorKind::IdleDeadline.status_code(), None);
    }

    #[test]
    fn malformed_request_line_maps_to_501() {
        assert_eq!(
            ErrorKind::MalformedRequestLine.status_code(),
            Some(StatusCode::NotImplemented)
        );
    }

    #[test]
    fn handler_refused_passes_through_code() {
        assert_eq!(
            ErrorKind::HandlerRefused(StatusCode::Forbidden).status_code(),
            Some(StatusCode::Forbidden)
        );
    }
}
