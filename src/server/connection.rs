//! The per-connection state machine: `LISTENING → RX_REQUEST → [RX] → TX →
//! CLOSING → LISTENING` (design §3, §4.4).
//!
//! Grounded line-for-line on `fnet_http_state_machine` (`fnet_http.c` lines
//! 171-566) for the state transitions themselves. `ServerInstance::tick` is a
//! plain synchronous method an external scheduler calls repeatedly, doing a
//! few iterations of non-blocking work and returning, the way
//! `fnet_http_state_machine` does `FNET_HTTP_ITERATION_NUMBER` iterations of
//! its `switch` per call.

use std::{io, ops::Range, time::{Duration, Instant}};

use memchr::memchr;
use tokio::net::{TcpListener, TcpStream};

use crate::{
    auth::{self, AuthEntry, AuthTable},
    errors::ErrorKind,
    filesystem::{FileBody, FileHandle, RootDir},
    http::{
        request::{HeaderLine, Request},
        response::{BodyProducer, Response},
        types::{StatusCode, Version},
    },
    limits::{ConnLimits, ReqLimits},
    registry::{resolve_file, FileResolution, HandlerRegistry},
};

/// The highest version this server negotiates down to —
/// `FNET_HTTP_VERSION_MAJOR`/`_MINOR`'s counterpart.
pub(crate) const MAX_VERSION: Version = Version { major: 1, minor: 1 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Listening,
    RxRequest,
    RxHeaders,
    RxBody,
    Tx,
    Closing,
}

/// What to stream as the response body once the header block (if any) is
/// flushed. Deliberately a closed enum rather than `Box<dyn BodyProducer>`:
/// the three cases are exhaustive for this core and staying enum-dispatched
/// keeps `tick()` allocation-free. Error responses carry no body at all
/// (`None`) — they are status-line only.
enum TxBody<H> {
    None,
    Index,
    Opened(FileBody<H>),
}

/// A single server instance: one listening socket, at most one accepted
/// connection at a time, driven entirely by [`ServerInstance::tick`].
///
/// A slot in the Server Instance Table (`src/server/server_impl.rs`) is
/// `DISABLED` simply by not holding a `ServerInstance` at all (`Option::None`)
/// rather than by an explicit state tag — once constructed, an instance is
/// always at least `LISTENING`.
pub(crate) struct ServerInstance<R: RootDir> {
    listener: TcpListener,
    socket: Option<TcpStream>,
    state: State,

    buf: Box<[u8]>,
    filled: usize,
    consumed: usize,

    tx_buf: Box<[u8]>,
    tx_len: usize,
    tx_sent: usize,
    header_done: bool,
    send_max: usize,

    deadline: Instant,
    rx_timeout: Duration,
    tx_timeout: Duration,

    header_count_limit: usize,
    header_lines_seen: usize,

    request: Request,
    response: Response,
    body: TxBody<R::Handle>,

    registry: &'static HandlerRegistry,
    auth: &'static AuthTable,
    root: R,
    index_file: R::Handle,
    index_content_type: Option<&'static str>,

    pending_auth: Option<&'static AuthEntry>,
    pending_content_type: Option<&'static str>,
    pending_content_length: Option<u64>,

    method_receive: Option<fn(&[u8]) -> Result<(), StatusCode>>,
    rx_body_remaining: u64,
}

impl<R: RootDir> ServerInstance<R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        listener: TcpListener,
        root: R,
        index_file: R::Handle,
        index_content_type: Option<&'static str>,
        registry: &'static HandlerRegistry,
        auth: &'static AuthTable,
        req_limits: &ReqLimits,
        conn_limits: &ConnLimits,
        send_max: usize,
    ) -> Self {
        let buffer_size = req_limits.buffer_size();
        ServerInstance {
            listener,
            socket: None,
            state: State::Listening,

            buf: vec![0; buffer_size].into_boxed_slice(),
            filled: 0,
            consumed: 0,

            tx_buf: vec![0; buffer_size].into_boxed_slice(),
            tx_len: 0,
            tx_sent: 0,
            header_done: true,
            send_max,

            deadline: Instant::now(),
            rx_timeout: conn_limits.rx_timeout,
            tx_timeout: conn_limits.tx_timeout,

            header_count_limit: req_limits.header_count,
            header_lines_seen: 0,

            request: Request::new(req_limits),
            response: Response::new(),
            body: TxBody::None,

            registry,
            auth,
            root,
            index_file,
            index_content_type,

            pending_auth: None,
            pending_content_type: None,
            pending_content_length: None,

            method_receive: None,
            rx_body_remaining: 0,
        }
    }

    /// Performs a few non-blocking iterations and returns; never blocks.
    /// Grounded on `fnet_http_state_machine`'s `for(iteration = 0;
    /// iteration < FNET_HTTP_ITERATION_NUMBER; iteration++)` loop.
    pub(crate) fn tick(&mut self, iterations: u8) {
        for _ in 0..iterations {
            self.step();
        }
    }

    fn step(&mut self) {
        match self.state {
            State::Listening => self.step_listening(),
            State::RxRequest => self.step_rx_request(),
            State::RxHeaders => self.step_rx_headers(),
            State::RxBody => self.step_rx_body(),
            State::Tx => self.step_tx(),
            State::Closing => self.step_closing(),
        }
    }

    fn step_listening(&mut self) {
        match self.listener.try_accept() {
            Ok((socket, _addr)) => {
                self.socket = Some(socket);
                self.reset_for_new_connection();
                self.deadline = Instant::now() + self.rx_timeout;
                self.state = State::RxRequest;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => {}
        }
    }

    fn reset_for_new_connection(&mut self) {
        self.filled = 0;
        self.consumed = 0;
        self.tx_len = 0;
        self.tx_sent = 0;
        self.header_done = true;
        self.header_lines_seen = 0;
        self.request.reset();
        self.body = TxBody::None;
        self.pending_auth = None;
        self.pending_content_type = None;
        self.pending_content_length = None;
        self.method_receive = None;
        self.rx_body_remaining = 0;
    }

    fn is_past_deadline(&self) -> bool {
        Instant::now() > self.deadline
    }

    fn step_rx_request(&mut self) {
        if self.is_past_deadline() {
            self.begin_error(ErrorKind::IdleDeadline, self.request.version());
            return;
        }
        match self.next_line() {
            Some(line) => self.process_request_line(line),
            None => self.pull_more_rx(true),
        }
    }

    fn step_rx_headers(&mut self) {
        if self.is_past_deadline() {
            self.begin_error(ErrorKind::IdleDeadline, self.request.version());
            return;
        }
        match self.next_line() {
            Some(line) => {
                self.header_lines_seen += 1;
                if self.header_lines_seen > self.header_count_limit {
                    // Header block has gone on too long: stop inspecting
                    // lines and settle the response as if it had ended,
                    // per `ReqLimits::header_count`.
                    self.finish_headers();
                } else {
                    self.process_header_line(line);
                }
            }
            None => self.pull_more_rx(false),
        }
    }

    /// Scans already-received bytes for a line terminator, returning the
    /// line with any trailing CR stripped and advancing `consumed` past the
    /// LF. Mirrors `fnet_http_state_machine`'s per-byte `if(*ch == '\n')`
    /// line dispatch, just scanning a whole chunk at once via `memchr`.
    fn next_line(&mut self) -> Option<Range<usize>> {
        let scan = &self.buf[self.consumed..self.filled];
        let lf = memchr(b'\n', scan)?;
        let lf_index = self.consumed + lf;
        let mut line_end = lf_index;
        if line_end > self.consumed && self.buf[line_end - 1] == b'\r' {
            line_end -= 1;
        }
        let line = self.consumed..line_end;
        self.consumed = lf_index + 1;
        Some(line)
    }

    /// Reads more bytes into `buf`. `request_line` selects the overflow
    /// policy: the request line is critical (oversized → error + close),
    /// while an oversized header line is just dropped and parsing
    /// continues, per §7.
    fn pull_more_rx(&mut self, request_line: bool) {
        if self.filled == self.buf.len() {
            if self.consumed > 0 {
                self.buf.copy_within(self.consumed..self.filled, 0);
                self.filled -= self.consumed;
                self.consumed = 0;
            } else if request_line {
                self.begin_error(ErrorKind::RequestLineTooLarge, self.request.version());
                return;
            } else {
                // Header line too long: discard what we have and keep going.
                self.filled = 0;
                self.consumed = 0;
            }
        }

        let socket = self.socket.as_mut().expect("RX state without a socket");
        match socket.try_read(&mut self.buf[self.filled..]) {
            Ok(0) => self.state = State::Closing,
            Ok(n) => self.filled += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => self.begin_error(ErrorKind::SocketError, self.request.version()),
        }
    }

    fn process_request_line(&mut self, line: Range<usize>) {
        if let Err(kind) = self.request.parse_request_line(&self.buf[line], MAX_VERSION) {
            self.begin_error(kind, self.request.version());
            return;
        }

        let version = self.request.version();
        let method = match self.registry.find_method(self.request.method()) {
            Some(method) => method,
            None => {
                self.begin_error(ErrorKind::MalformedRequestLine, version);
                return;
            }
        };
        self.method_receive = method.receive;

        if !version.is_http09() {
            self.pending_auth = self.auth.find(self.request.path());
            self.pending_content_type = if self.request.path() == b"/" {
                self.index_content_type
            } else {
                self.registry.find_content_type(self.request.extension())
            };
        }

        match self.method_handle() {
            Ok(FileResolution::Index) => {
                self.index_file.rewind();
                let size = self.index_file.size();
                self.body = TxBody::Index;
                self.begin_success_or_continue_headers(version, Some(size));
            }
            Ok(FileResolution::Opened { handle, size }) => {
                self.body = TxBody::Opened(FileBody(handle));
                self.begin_success_or_continue_headers(version, Some(size));
            }
            Err(kind) => {
                self.body = TxBody::None;
                self.begin_error(kind, version);
            }
        }
    }

    /// The matched method's `handle` slot (design §4.3). Consults the
    /// file-handler table by extension — in this core every entry resolves
    /// to the same default static-file behavior, since SSI/CGI payload
    /// handling is an external collaborator's concern (see crate docs), but
    /// the table is consulted for real so a host-registered entry is
    /// visible to future handler kinds.
    fn method_handle(&mut self) -> Result<FileResolution<R::Handle>, ErrorKind> {
        let _handler = self.registry.find_file_handler(self.request.extension());
        resolve_file(&self.root, self.request.path())
    }

    /// HTTP/0.9 has no headers at all: a successful dispatch goes straight
    /// to streaming the body with no status line. HTTP/1.x continues into
    /// `RX_HEADERS` (still the header-line branch of `RX_REQUEST`); the
    /// final status (200 vs 401) is only
    /// settled once the header block ends, since `Authorization:` may still
    /// arrive (`fnet_http_state_machine` lines 261-377).
    fn begin_success_or_continue_headers(&mut self, version: Version, content_length: Option<u64>) {
        if version.is_http09() {
            self.header_done = true;
            self.state = State::Tx;
            self.deadline = Instant::now() + self.tx_timeout;
        } else {
            self.pending_content_length = content_length;
            self.state = State::RxHeaders;
        }
    }

    fn process_header_line(&mut self, line: Range<usize>) {
        match self.request.parse_header_line(&self.buf[line]) {
            HeaderLine::End => self.finish_headers(),
            HeaderLine::Authorization => {
                if let Some(entry) = self.pending_auth {
                    if let Some(value) = self.request.authorization() {
                        if auth::validate_credentials(entry, value) {
                            self.pending_auth = None;
                        }
                    }
                }
            }
            HeaderLine::ContentLength | HeaderLine::Other => {}
        }
    }

    /// Settles the response status (§4.4 "empty line ends the header
    /// section") and decides whether a `POST` body follows: a method with a
    /// `receive` slot and a positive `Content-Length` enters `RX_BODY`;
    /// everything else goes straight to `TX`.
    fn finish_headers(&mut self) {
        let version = self.request.version();
        if self.pending_auth.is_some() {
            self.body = TxBody::None;
            self.response.begin(
                ErrorKind::AuthRequired.status_code().expect("auth required carries a status"),
                version,
            );
            if let Some(entry) = self.pending_auth {
                self.response.set_www_authenticate(auth::challenge_realm(entry));
            }
            self.header_done = false;
            self.state = State::Tx;
            self.deadline = Instant::now() + self.tx_timeout;
            return;
        }

        self.response.begin(StatusCode::Ok, version);
        if let Some(len) = self.pending_content_length {
            self.response.set_content_length(len as usize);
        }
        if let Some(mime) = self.pending_content_type {
            self.response.set_content_type(mime);
        }

        let body_remaining = self
            .method_receive
            .and_then(|_| self.request.content_length())
            .filter(|&n| n > 0);

        match body_remaining {
            Some(n) => {
                self.rx_body_remaining = n as u64;
                self.state = State::RxBody;
                self.deadline = Instant::now() + self.rx_timeout;
            }
            None => {
                self.header_done = false;
                self.state = State::Tx;
                self.deadline = Instant::now() + self.tx_timeout;
            }
        }
    }

    /// The `RX` (POST body) state (design §4.4): drains up to one buffer's
    /// worth of body bytes per tick, invoking the matched method's
    /// `receive` slot and decrementing the tracked remaining length.
    fn step_rx_body(&mut self) {
        if self.is_past_deadline() {
            self.begin_error(ErrorKind::IdleDeadline, self.request.version());
            return;
        }
        if self.rx_body_remaining == 0 {
            self.header_done = false;
            self.state = State::Tx;
            self.deadline = Instant::now() + self.tx_timeout;
            return;
        }

        let cap = self.rx_body_remaining.min(self.buf.len() as u64) as usize;
        let socket = self.socket.as_mut().expect("RX_BODY state without a socket");
        match socket.try_read(&mut self.buf[..cap]) {
            Ok(0) => self.state = State::Closing,
            Ok(n) => {
                let receive = self
                    .method_receive
                    .expect("RX_BODY state without a receive callback");
                match receive(&self.buf[..n]) {
                    Ok(()) => {
                        self.rx_body_remaining = self.rx_body_remaining.saturating_sub(n as u64);
                    }
                    Err(status) => {
                        self.response.set_status(status);
                        self.rx_body_remaining = 0;
                    }
                }
                self.deadline = Instant::now() + self.rx_timeout;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => self.begin_error(ErrorKind::SocketError, self.request.version()),
        }
    }

    /// Rewrites the response into a status-only reply and moves to `TX`,
    /// or (for error kinds that emit no status, `SocketError`/`IdleDeadline`)
    /// straight to `CLOSING`.
    fn begin_error(&mut self, kind: ErrorKind, version: Version) {
        match kind.status_code() {
            Some(status) => {
                self.body = TxBody::None;
                self.response.begin(status, version);
                self.header_done = false;
                self.state = State::Tx;
                self.deadline = Instant::now() + self.tx_timeout;
            }
            None => {
                self.state = State::Closing;
            }
        }
    }

    fn step_tx(&mut self) {
        if Instant::now() > self.deadline {
            self.state = State::Closing;
            return;
        }

        if self.tx_sent < self.tx_len {
            self.flush_tx_buf();
            return;
        }

        if !self.header_done {
            let mut cursor = 0;
            self.response.advance_status_line(&mut self.tx_buf, &mut cursor);
            self.tx_len = cursor;
            self.tx_sent = 0;
            if self.response.is_complete() {
                self.header_done = true;
            }
            return;
        }

        // The matched method's `send` slot: produces one chunk of response
        // body. Every method in this core shares the same body producer
        // (the file resolved by `method_handle`), since only the default
        // file handler is implemented. Destructured to borrow `tx_buf`
        // disjointly from `body`/`index_file`.
        let n = {
            let ServerInstance { body, index_file, tx_buf, .. } = self;
            match body {
                TxBody::None => 0,
                TxBody::Index => index_file.read(tx_buf),
                TxBody::Opened(f) => f.produce(tx_buf),
            }
        };
        if n == 0 {
            self.state = State::Closing;
        } else {
            self.tx_len = n;
            self.tx_sent = 0;
        }
    }

    fn flush_tx_buf(&mut self) {
        let remaining = self.tx_len - self.tx_sent;
        let cap = remaining.min(self.send_max).max(1);
        let end = self.tx_sent + cap.min(remaining);
        let socket = self.socket.as_mut().expect("TX state without a socket");
        match socket.try_write(&self.tx_buf[self.tx_sent..end]) {
            Ok(n) => self.tx_sent += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => self.begin_error(ErrorKind::SocketError, self.request.version()),
        }
    }

    fn step_closing(&mut self) {
        // The matched method's `close` slot: dropping `socket` closes it;
        // `method_close` drops any freshly opened file (never the shared
        // index file), matching `fnet_http_default_close` never closing
        // `index_file`.
        self.method_close();
        self.socket = None;
        self.state = State::Listening;
    }

    fn method_close(&mut self) {
        self.body = TxBody::None;
    }
}
