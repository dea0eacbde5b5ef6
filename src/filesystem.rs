//! The filesystem external collaborator: resolving a request path to a
//! readable file rooted under a configured directory.
//!
//! Grounded on the `fnet_fs_*` call sites `fnet_http_init` and the default
//! file handler use (`fnet_fs_opendir`, `fnet_fs_fopen_re`, `fnet_fs_fread`,
//! `fnet_fs_rewind`, `fnet_fs_finfo`, `fnet_fs_fclose`) — one trait method
//! per call site, with a `std::fs`-backed default for hosted targets.

use std::{
    fs,
    io::{self, Read, Seek, SeekFrom},
    path::PathBuf,
};

use crate::http::response::BodyProducer;

/// A directory a [`crate::Server`] serves files from.
///
/// `open` must reject any path that would escape the root (`..` traversal);
/// the default implementation does this by joining onto the root and then
/// checking the resolved path is still prefixed by it, matching
/// `fnet_fs_fopen_re`'s "relative to" contract.
pub trait RootDir {
    type Handle: FileHandle;

    /// Opens `path` (as received in the request target, always starting
    /// with `/`) for reading. Returns `None` if it doesn't exist, isn't a
    /// regular file, or would resolve outside the root.
    fn open(&self, path: &[u8]) -> Option<Self::Handle>;
}

/// An open file: readable, rewindable, and sized up front for
/// `Content-Length` — the three things `fnet_http_default_handle`/`_send`
/// need from `http->send_param.file_desc`.
pub trait FileHandle {
    fn size(&self) -> u64;
    fn rewind(&mut self);
    fn read(&mut self, out: &mut [u8]) -> usize;
}

/// `BodyProducer` adapter over any [`FileHandle`], used by
/// `fnet_http_default_send`'s Rust counterpart in `src/registry.rs`.
pub struct FileBody<H: FileHandle>(pub H);

impl<H: FileHandle> BodyProducer for FileBody<H> {
    fn produce(&mut self, out: &mut [u8]) -> usize {
        self.0.read(out)
    }
}

/// `std::fs`-backed [`RootDir`], the default for hosted (non-embedded)
/// targets this crate is built and tested on.
#[derive(Debug, Clone)]
pub struct FsRootDir {
    root: PathBuf,
}

impl FsRootDir {
    /// `root` must already exist and be a directory — `fnet_fs_opendir`'s
    /// construction-time failure mode.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<FsRootDir> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "root directory does not exist",
            ));
        }
        Ok(FsRootDir {
            root: root.canonicalize()?,
        })
    }

    fn resolve(&self, path: &[u8]) -> Option<PathBuf> {
        let path = std::str::from_utf8(path).ok()?;
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let joined = self.root.join(relative);
        // Reject traversal: the resolved path must still live under root.
        // `components()` rejects `..` without touching the filesystem for
        // paths that don't exist yet, matching `fnet_fs_fopen_re`'s refusal
        // to open anything outside its root regardless of existence.
        if joined
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return None;
        }
        Some(joined)
    }
}

impl RootDir for FsRootDir {
    type Handle = FsFileHandle;

    fn open(&self, path: &[u8]) -> Option<FsFileHandle> {
        let resolved = self.resolve(path)?;
        let file = fs::File::open(&resolved).ok()?;
        let metadata = file.metadata().ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(FsFileHandle {
            file,
            size: metadata.len(),
        })
    }
}

#[derive(Debug)]
pub struct FsFileHandle {
    file: fs::File,
    size: u64,
}

impl FileHandle for FsFileHandle {
    fn size(&self) -> u64 {
        self.size
    }

    fn rewind(&mut self) {
        let _ = self.file.seek(SeekFrom::Start(0));
    }

    fn read(&mut self, out: &mut [u8]) -> usize {
        self.file.read(out).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tmp_root() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "embedded_httpd_fs_test_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn opens_file_under_root() {
        let root = tmp_root();
        fs::write(root.join("index.html"), b"hello").unwrap();

        let fs_root = FsRootDir::new(&root).unwrap();
        let mut handle = fs_root.open(b"/index.html").unwrap();
        assert_eq!(handle.size(), 5);

        let mut buf = [0u8; 16];
        let n = handle.read(&mut buf);
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn rejects_path_traversal() {
        let root = tmp_root();
        let fs_root = FsRootDir::new(&root).unwrap();
        assert!(fs_root.open(b"/../etc/passwd").is_none());
    }

    #[test]
    fn missing_file_is_none() {
        let root = tmp_root();
        let fs_root = FsRootDir::new(&root).unwrap();
        assert!(fs_root.open(b"/nope.html").is_none());
    }

    #[test]
    fn rewind_allows_rereading() {
        let root = tmp_root();
        let mut f = fs::File::create(root.join("a.txt")).unwrap();
        f.write_all(b"abc").unwrap();
        drop(f);

        let fs_root = FsRootDir::new(&root).unwrap();
        let mut handle = fs_root.open(b"/a.txt").unwrap();
        let mut buf = [0u8; 3];
        handle.read(&mut buf);
        handle.rewind();
        let n = handle.read(&mut buf);
        assert_eq!(&buf[..n], b"abc");
    }
}
