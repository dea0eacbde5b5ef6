//! embedded_httpd - a cooperative, non-blocking HTTP/0.9+HTTP/1.x server core
//! for small long-running network devices.
//!
//! Unlike a thread- or task-per-connection server, a [`Server`] is a fixed
//! table of independent state machines: each slot owns one listening socket
//! and services at most one foreign connection at a time, driven entirely by
//! repeated, non-blocking ticks from a single cooperative scheduler loop.
//! There is no persistent connection, chunked transfer, pipelining, or
//! per-connection task — each accepted connection is a single
//! request/response exchange before the instance returns to listening.
//!
//! # Protocol Support
//!
//! - **HTTP/0.9**: request-line-only, body-only response, no headers at all.
//! - **HTTP/1.0-style single exchange**: status line, optional
//!   `Content-Type`/`Content-Length`/`WWW-Authenticate`, one body, then close.
//!
//! # Features
//!
//! - **Fixed-size buffers only** — one line/chunk buffer is allocated per
//!   instance at construction and reused for the lifetime of the process.
//! - **Function-table dispatch** — [`registry::HandlerRegistry`] is a small
//!   `&'static` slice of method and content-type entries, not a `dyn Trait`
//!   hierarchy.
//! - **Per-URI HTTP Basic authentication** via [`auth::AuthTable`].
//! - **Pluggable filesystem** via [`filesystem::RootDir`], with a
//!   `std::fs`-backed [`filesystem::FsRootDir`] default.
//!
//! # Quick Start
//!
//! ```no_run
//! use embedded_httpd::{Server, filesystem::FsRootDir, registry::HandlerRegistry, auth::AuthTable};
//! use tokio::net::TcpListener;
//!
//! static REGISTRY: HandlerRegistry = HandlerRegistry::default_get_only();
//! static AUTH: AuthTable = AuthTable::empty();
//!
//! #[tokio::main]
//! async fn main() {
//!     let root = FsRootDir::new("./www").unwrap();
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .root_dir(root)
//!         .index_file("index.html")
//!         .registry(&REGISTRY)
//!         .auth_table(&AUTH)
//!         .build()
//!         .unwrap()
//!         .launch()
//!         .await
//! }
//! ```
pub(crate) mod http {
    pub(crate) mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub mod auth;
pub mod errors;
pub mod filesystem;
pub mod limits;
pub mod registry;

pub use crate::server::server_impl::{Server, ServerBuilder};

#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str(value: Option<&[u8]>) -> Option<&str> {
        Some(from_utf8(value?).unwrap())
    }

    #[inline]
    pub(crate) fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }
}
