//! Handler Registry: the method table, file-handler table, and content-type
//! table (design §4.3), plus the default static-file handler.
//!
//! Grounded on `fnet_http_find_handler`/`fnet_http_find_content_type`/
//! `fnet_http_default_handle`/`fnet_http_default_send`/`fnet_http_default_close`
//! (`fnet_http.c` lines 864-993). All three tables are plain linear-scan
//! arrays, matching the original's `while(*handler) { ... handler++; }`
//! loops over a small, statically-sized list — realistic for the handful of
//! entries an embedded deployment configures.

use crate::{errors::ErrorKind, filesystem::RootDir, http::types::StatusCode};

/// Which built-in request-initial behavior a method dispatches to.
///
/// The original method table's `handle`/`send`/`close` slots are genuine
/// function pointers, but here they would have to be generic over
/// [`RootDir`]'s associated handle type to touch a file at all, which rules
/// out a `'static` function-pointer table. A tag selecting between method
/// behaviors is the design note's explicitly sanctioned alternative ("prefer
/// a tagged or table-of-function-pointers design"); `GET` and `POST` both
/// resolve to the same default file-serving behavior in this core (the
/// method-level distinction that matters is `receive`, below), so the tag
/// only needs two variants today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Get,
    Post,
}

/// An accepted request method. At minimum `GET` must be registered;
/// `POST` (or any other token) may be added. `receive`, when present, is
/// invoked once per received POST-body chunk while `request.content_length`
/// remains positive (design §4.3, §4.4 `RX`); its absence is what tells the
/// connection state machine to skip the `RX` state entirely and go straight
/// to `TX` once headers end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodEntry {
    pub token: &'static [u8],
    pub kind: MethodKind,
    pub receive: Option<fn(chunk: &[u8]) -> Result<(), StatusCode>>,
}

/// Default `receive` for a registered `POST` with no application-level
/// payload handler supplied: discards every chunk. The actual POST body
/// content is an external collaborator's concern (see crate docs); this
/// core only guarantees the bytes are drained and `content_length` reaches
/// zero.
fn discard_post_body(_chunk: &[u8]) -> Result<(), StatusCode> {
    Ok(())
}

pub const GET: MethodEntry = MethodEntry {
    token: b"GET",
    kind: MethodKind::Get,
    receive: None,
};

pub const POST: MethodEntry = MethodEntry {
    token: b"POST",
    kind: MethodKind::Post,
    receive: Some(discard_post_body),
};

/// An extension → MIME type mapping, `fnet_http_content_type_list`'s
/// counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTypeEntry {
    pub extension: &'static str,
    pub mime: &'static str,
}

/// The defaults `fnet_http.c` ships (`fnet_http_content_css/_jpg/_gif/_js`).
pub const DEFAULT_CONTENT_TYPES: &[ContentTypeEntry] = &[
    ContentTypeEntry {
        extension: "css",
        mime: "text/css",
    },
    ContentTypeEntry {
        extension: "jpg",
        mime: "image/jpeg",
    },
    ContentTypeEntry {
        extension: "gif",
        mime: "image/gif",
    },
    ContentTypeEntry {
        extension: "js",
        mime: "application/javascript",
    },
];

/// A file-handler table entry, matched against `URI.extension` (design §4.3).
///
/// The empty extension (`""`) is the default handler, used whenever no
/// other entry's extension matches — every [`HandlerRegistry`] falls back to
/// it even if the caller's table doesn't list it explicitly. Concrete SSI or
/// CGI handlers are an application-level payload this core doesn't
/// implement (see crate docs' scope note), so every entry this core ever
/// resolves to behaves as the default static-file handler; the table still
/// exists and is consulted for real so a host can see which extension would
/// be dispatched, and so a future handler kind has a table to register into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandlerEntry {
    pub extension: &'static str,
}

/// `fnet_http_default_handler`'s counterpart: the file-handler table's
/// always-present fallback entry.
pub const DEFAULT_FILE_HANDLER: FileHandlerEntry = FileHandlerEntry { extension: "" };

/// Non-owning lookup tables shared by every connection an instance serves.
#[derive(Debug, Clone, Copy)]
pub struct HandlerRegistry {
    methods: &'static [MethodEntry],
    file_handlers: &'static [FileHandlerEntry],
    content_types: &'static [ContentTypeEntry],
}

impl HandlerRegistry {
    pub const fn new(
        methods: &'static [MethodEntry],
        file_handlers: &'static [FileHandlerEntry],
        content_types: &'static [ContentTypeEntry],
    ) -> Self {
        HandlerRegistry {
            methods,
            file_handlers,
            content_types,
        }
    }

    pub const fn default_get_only() -> Self {
        HandlerRegistry {
            methods: &[GET],
            file_handlers: &[],
            content_types: DEFAULT_CONTENT_TYPES,
        }
    }

    /// Matches a request-line method token byte-for-byte,
    /// `fnet_http_method_list`'s linear scan.
    pub(crate) fn find_method(&self, token: &[u8]) -> Option<&'static MethodEntry> {
        self.methods.iter().find(|m| m.token == token)
    }

    /// Matches `extension` against the file-handler table,
    /// `fnet_http_find_handler`'s linear scan; falls back to
    /// [`DEFAULT_FILE_HANDLER`] on miss.
    pub(crate) fn find_file_handler(&self, extension: &[u8]) -> &'static FileHandlerEntry {
        let extension = std::str::from_utf8(extension).unwrap_or("");
        self.file_handlers
            .iter()
            .find(|entry| entry.extension == extension)
            .unwrap_or(&DEFAULT_FILE_HANDLER)
    }

    /// Matches `extension` against the content-type table,
    /// `fnet_http_find_content_type`. A path of exactly `/` uses the
    /// pre-resolved index content type instead (resolved once at init time,
    /// see `src/server/server_impl.rs`).
    pub(crate) fn find_content_type(&self, extension: &[u8]) -> Option<&'static str> {
        let extension = std::str::from_utf8(extension).ok()?;
        self.content_types
            .iter()
            .find(|entry| entry.extension == extension)
            .map(|entry| entry.mime)
    }
}

/// What [`resolve_file`] found for a request path.
///
/// `Index` carries no handle: the server instance already owns the shared
/// index file (`fnet_http_if::index_file`, always open) and is the one
/// that rewinds and reads it in `src/server/connection.rs`; only a freshly
/// opened path file is handed back here, matching `fnet_http_default_close`
/// never closing `index_file`.
pub(crate) enum FileResolution<H> {
    Index,
    Opened { handle: H, size: u64 },
}

/// Resolves `path` against `root`, special-casing `/` to the server's
/// always-open index file — `fnet_http_find_handler`'s
/// `!fnet_strcmp(uri->path, "/")` check, and `fnet_http_default_handle`'s
/// identical one layer down. Returns `Err(ErrorKind::ResourceMissing)` on a
/// failed open, `fnet_http_default_handle`'s `FNET_ERR` branch.
///
/// The default (and, in this core, only implemented) file-handler entry's
/// `handle` slot — see [`HandlerRegistry::find_file_handler`].
pub(crate) fn resolve_file<R: RootDir>(
    root: &R,
    path: &[u8],
) -> Result<FileResolution<R::Handle>, ErrorKind> {
    if path == b"/" {
        return Ok(FileResolution::Index);
    }

    match root.open(path) {
        Some(handle) => {
            let size = handle.size();
            Ok(FileResolution::Opened { handle, size })
        }
        None => Err(ErrorKind::ResourceMissing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_registered_method() {
        let registry = HandlerRegistry::new(&[GET, POST], &[], DEFAULT_CONTENT_TYPES);
        assert_eq!(registry.find_method(b"GET"), Some(&GET));
        assert_eq!(registry.find_method(b"POST").map(|m| m.receive.is_some()), Some(true));
        assert_eq!(registry.find_method(b"DELETE"), None);
    }

    #[test]
    fn finds_file_handler_by_extension_falls_back_to_default() {
        const CGI: FileHandlerEntry = FileHandlerEntry { extension: "cgi" };
        let registry = HandlerRegistry::new(&[GET], &[CGI], DEFAULT_CONTENT_TYPES);
        assert_eq!(registry.find_file_handler(b"cgi"), &CGI);
        assert_eq!(registry.find_file_handler(b"html"), &DEFAULT_FILE_HANDLER);
    }

    #[test]
    fn default_get_only_file_handler_table_is_empty_and_falls_back() {
        let registry = HandlerRegistry::default_get_only();
        assert_eq!(registry.find_file_handler(b"html"), &DEFAULT_FILE_HANDLER);
    }

    #[test]
    fn finds_content_type_by_extension() {
        let registry = HandlerRegistry::default_get_only();
        assert_eq!(registry.find_content_type(b"css"), Some("text/css"));
        assert_eq!(registry.find_content_type(b"unknown"), None);
    }

    #[test]
    fn get_only_rejects_post() {
        let registry = HandlerRegistry::default_get_only();
        assert_eq!(registry.find_method(b"POST"), None);
    }

    #[test]
    fn resolve_file_root_path_uses_index() {
        use crate::filesystem::FsRootDir;

        let mut dir = std::env::temp_dir();
        dir.push(format!("embedded_httpd_registry_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let root = FsRootDir::new(&dir).unwrap();

        assert!(matches!(resolve_file(&root, b"/"), Ok(FileResolution::Index)));
    }

    #[test]
    fn resolve_file_missing_path_is_not_found() {
        use crate::filesystem::FsRootDir;

        let mut dir = std::env::temp_dir();
        dir.push(format!("embedded_httpd_registry_test2_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let root = FsRootDir::new(&dir).unwrap();

        assert!(matches!(
            resolve_file(&root, b"/nope.html"),
            Err(ErrorKind::ResourceMissing)
        ));
    }
}
