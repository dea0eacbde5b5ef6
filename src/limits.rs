//! Server configuration limits and timeouts
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Memory overflows
//! - Slowloris attacks
//! - Header flooding
//!
//! # Memory Consumption
//!
//! Each configured server instance consumes memory according to:
//!
//! `Total` = [`Request Buffer`](crate::limits::ReqLimits#memory-allocation-strategy)
//!           + `Response/Request scratch (Request, Response, SendParam)`
//!           + `Runtime Overhead`
//!
//! Unlike a connection-pool server, an instance here never grows its buffer:
//! one `BUF`-sized allocation is made once, at construction, and reused for
//! the lifetime of the instance across every accepted connection.
//!
//! # Examples
//!
//! ```no_run
//! use embedded_httpd::{
//!     Server,
//!     filesystem::FsRootDir,
//!     registry::HandlerRegistry,
//!     limits::{ConnLimits, ReqLimits, ServerLimits},
//! };
//! use tokio::net::TcpListener;
//!
//! static REGISTRY: HandlerRegistry = HandlerRegistry::default_get_only();
//!
//! #[tokio::main]
//! async fn main() {
//!     let root = FsRootDir::new("./www").unwrap();
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .root_dir(root)
//!         .index_file("index.html")
//!         .registry(&REGISTRY)
//!         .server_limits(ServerLimits {
//!             max_instances: 4,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             rx_timeout: std::time::Duration::from_millis(15_000),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             header_count: 18,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .unwrap()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls the size and scheduling behavior of the Server Instance Table.
///
/// Unlike a connection-pooled server, each instance here is a fully
/// independent state machine owning its own listening socket and, at most,
/// one in-flight foreign connection at a time. `max_instances` therefore
/// bounds how many independent listeners this process can run concurrently,
/// not how many simultaneous clients it serves.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of server instances the table can hold (default: `16`).
    ///
    /// Each [`crate::Server::builder`] call consumes one free slot. Once all
    /// slots are occupied, construction fails with
    /// [`crate::errors::InitError::NoFreeSlot`].
    pub max_instances: usize,

    /// Per-tick inner state iterations (default: `2`).
    ///
    /// The number of internal state transitions a single call to
    /// [`crate::server::connection::ServerInstance::tick`] is allowed to
    /// perform before returning control to the scheduler. This amortizes
    /// latency (one state transition per call would be too slow to drain a
    /// buffered request) without letting one instance monopolize the poll
    /// loop.
    pub iterations_per_tick: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_instances: 16,
            iterations_per_tick: 2,
            _priv: (),
        }
    }
}

/// Connection-level limits and timeouts.
///
/// Controls per-instance deadlines and the TCP listen backlog. Defaults
/// match the reference values this crate's design is pinned to; only change
/// these if you understand the consequences for slow-client resilience.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum idle duration while waiting for request bytes (default: `15_000 ms`).
    ///
    /// Checked on every tick that receives zero bytes while in `RX_REQUEST`
    /// or `RX`. If exceeded, the instance transitions to `CLOSING`.
    pub rx_timeout: Duration,

    /// Maximum idle duration while waiting to drain a response chunk
    /// (default: `10_000 ms`).
    ///
    /// Checked on every tick in `TX` that makes no forward progress. If
    /// exceeded, the instance transitions to `CLOSING`.
    pub tx_timeout: Duration,

    /// TCP listen backlog passed to the socket layer (default: `1`).
    ///
    /// Each instance handles exactly one foreign connection at a time;
    /// a backlog larger than 1 would only let the OS queue connections
    /// this instance cannot service any faster.
    pub backlog: u32,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            rx_timeout: Duration::from_millis(15_000),
            tx_timeout: Duration::from_millis(10_000),
            backlog: 1,
            _priv: (),
        }
    }
}

/// HTTP request parsing limits and buffer pre-allocation strategy.
///
/// ⚠️ **SECURITY-FIRST DEFAULTS**
///
/// These limits are intentionally conservative for low-memory embedded
/// targets. They work well for:
/// - Status/config pages on network devices
/// - Single-purpose control-plane APIs
/// - Low-memory environments
///
/// 🔧 **You MAY need to increase these if you see:**
/// - URI truncation for normal request-targets
/// - Legitimate header lines abandoned because `header_count` was reached
///   before the two recognized headers arrived
///
/// # Memory Allocation Strategy
///
/// Unlike a per-connection-growable buffer, this crate allocates exactly one
/// buffer of `buffer_size()` bytes per server instance, once, at
/// construction, and never grows it — mirroring the fixed-size `B` the
/// specification requires.
///
/// # Example
/// ```
/// use embedded_httpd::limits::ReqLimits;
///
/// let limits = ReqLimits::default();
/// println!("Each instance needs {} bytes for its line buffer", limits.buffer_size());
/// ```
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Size in bytes of the single fixed line buffer `B` (default: `512 B`).
    ///
    /// Typical embedded deployments use 256-1024 bytes. This single buffer
    /// holds the request line, each header line in turn, the POST body in
    /// chunks, and outgoing response chunks — never more than one of these
    /// roles at a time.
    pub buffer_size: usize,

    /// Maximum number of header lines inspected per request before the rest
    /// of the header block is skipped regardless of content (default: `32`).
    ///
    /// This does not bound memory (headers are never stored, only scanned
    /// for the two recognized prefixes) — it bounds how many RX iterations
    /// a single request's header block may consume before the connection
    /// gives up on it and proceeds straight to `TX` as if the header block
    /// had ended, enforced by `ServerInstance::step_rx_headers`.
    pub header_count: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            buffer_size: 512,
            header_count: 32,
        }
    }
}

impl ReqLimits {
    /// Returns the buffer capacity `BUF` this configuration allocates per
    /// server instance.
    #[inline(always)]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_buffer_size_matches_spec_range() {
        let limits = ReqLimits::default();
        assert!(limits.buffer_size() >= 256 && limits.buffer_size() <= 1024);
    }

    #[test]
    fn default_timeouts_match_spec_constants() {
        let limits = ConnLimits::default();
        assert_eq!(limits.rx_timeout, Duration::from_millis(15_000));
        assert_eq!(limits.tx_timeout, Duration::from_millis(10_000));
        assert_eq!(limits.backlog, 1);
    }

    #[test]
    fn default_iterations_per_tick_is_two() {
        assert_eq!(ServerLimits::default().iterations_per_tick, 2);
    }
}
