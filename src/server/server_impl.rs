//! Server construction and the Server Instance Table (design §4.5).
//!
//! Generalized from an ordered-builder, per-connection worker-pool pattern
//! to `fnet_http_init`'s instance-table discipline: each `build()`/
//! [`Server::add_instance`] call claims one table slot, configures it from
//! the caller's params (tables, root dir, index path, listener), and hands
//! back a [`ServerInstance`] already in `LISTENING`. [`Server::launch`] is
//! the cooperative round-robin scheduler that ticks every slot forever,
//! mirroring `fnet_poll_service`'s loop over registered callbacks.

use std::time::Duration;

use tokio::{net::TcpListener, task::yield_now, time::sleep as tokio_sleep};

use crate::{
    auth::AuthTable,
    errors::InitError,
    filesystem::RootDir,
    limits::{ConnLimits, ReqLimits, ServerLimits},
    registry::HandlerRegistry,
    server::connection::ServerInstance,
};

/// The Server Instance Table: a fixed-capacity collection of independent
/// [`ServerInstance`]s, each owning its own listening socket and at most one
/// foreign connection at a time.
///
/// # Examples
///
/// ```no_run
/// use embedded_httpd::{Server, filesystem::FsRootDir, registry::HandlerRegistry, auth::AuthTable};
/// use tokio::net::TcpListener;
///
/// static REGISTRY: HandlerRegistry = HandlerRegistry::default_get_only();
/// static AUTH: AuthTable = AuthTable::empty();
///
/// #[tokio::main]
/// async fn main() {
///     let root = FsRootDir::new("./www").unwrap();
///     Server::builder()
///         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
///         .root_dir(root)
///         .index_file("index.html")
///         .registry(&REGISTRY)
///         .auth_table(&AUTH)
///         .build()
///         .unwrap()
///         .launch()
///         .await
/// }
/// ```
pub struct Server<R: RootDir> {
    instances: Vec<ServerInstance<R>>,
    max_instances: usize,
    iterations_per_tick: u8,
}

impl<R: RootDir> Server<R> {
    /// Creates a new builder for configuring the first instance in the
    /// table.
    #[inline]
    pub fn builder() -> ServerBuilder<R> {
        ServerBuilder::new()
    }

    /// Claims another table slot for `builder`'s configuration.
    ///
    /// Fails with [`InitError::NoFreeSlot`] once `max_instances` (fixed by
    /// whichever builder first called [`ServerBuilder::build`]) is reached.
    pub fn add_instance(mut self, builder: ServerBuilder<R>) -> Result<Self, InitError> {
        if self.instances.len() >= self.max_instances {
            return Err(InitError::NoFreeSlot);
        }
        let instance = builder.into_instance()?;
        self.instances.push(instance);
        Ok(self)
    }

    /// Runs the cooperative scheduler forever: each instance's
    /// [`ServerInstance::tick`] is called in round-robin, then the task
    /// yields to the runtime before the next round.
    ///
    /// Mirrors `fnet_poll_service`'s "visit every registered callback, never
    /// block" loop; a short yield (rather than a busy spin) keeps an idle
    /// table from pegging a CPU core.
    pub async fn launch(mut self) {
        loop {
            for instance in &mut self.instances {
                instance.tick(self.iterations_per_tick);
            }
            yield_now().await;
        }
    }

    /// Identical to [`Server::launch`], but sleeps `idle_wait` between
    /// rounds instead of yielding — the lower-CPU alternative for
    /// deployments where a small amount of added latency is acceptable.
    pub async fn launch_with_idle_wait(mut self, idle_wait: Duration) {
        loop {
            for instance in &mut self.instances {
                instance.tick(self.iterations_per_tick);
            }
            tokio_sleep(idle_wait).await;
        }
    }
}

/// Builder for configuring and claiming one [`ServerInstance`] slot.
///
/// # Required
///
/// [`listener`](Self::listener), [`root_dir`](Self::root_dir),
/// [`index_file`](Self::index_file), and [`registry`](Self::registry) must
/// all be set before [`build`](Self::build)/
/// [`into_instance`](Self::into_instance); everything else defaults.
pub struct ServerBuilder<R: RootDir> {
    listener: Option<TcpListener>,
    root: Option<R>,
    index_path: Option<Vec<u8>>,
    registry: Option<&'static HandlerRegistry>,
    auth: Option<&'static AuthTable>,

    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
    connection_limits: Option<ConnLimits>,
}

static EMPTY_AUTH: AuthTable = AuthTable::empty();

impl<R: RootDir> ServerBuilder<R> {
    #[inline]
    fn new() -> Self {
        ServerBuilder {
            listener: None,
            root: None,
            index_path: None,
            registry: None,
            auth: None,
            server_limits: None,
            request_limits: None,
            connection_limits: None,
        }
    }

    /// Sets the TCP listener this instance accepts connections from.
    ///
    /// **Required.**
    #[inline]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the root directory this instance serves files from.
    ///
    /// **Required.**
    #[inline]
    pub fn root_dir(mut self, root: R) -> Self {
        self.root = Some(root);
        self
    }

    /// Sets the request-target this instance opens (via [`root_dir`](Self::root_dir))
    /// whenever a request targets `/`.
    ///
    /// **Required.**
    #[inline]
    pub fn index_file(mut self, path: impl AsRef<[u8]>) -> Self {
        let mut bytes = path.as_ref().to_vec();
        if !bytes.starts_with(b"/") {
            bytes.insert(0, b'/');
        }
        self.index_path = Some(bytes);
        self
    }

    /// Sets the method/content-type tables this instance dispatches with.
    ///
    /// **Required.**
    #[inline]
    pub fn registry(mut self, registry: &'static HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the per-URI HTTP Basic auth table. Defaults to
    /// [`AuthTable::empty`] (no path requires authentication).
    #[inline]
    pub fn auth_table(mut self, auth: &'static AuthTable) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Configures the Server Instance Table's capacity and per-tick
    /// scheduling. Only meaningful on the builder that calls
    /// [`build`](Self::build); a later [`Server::add_instance`] ignores this
    /// field.
    #[inline]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures this instance's fixed line/chunk buffer size and header
    /// scan limit.
    #[inline]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures this instance's RX/TX idle deadlines and listen backlog.
    #[inline]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs the first [`Server`] instance.
    ///
    /// # Errors
    ///
    /// [`InitError::MissingListener`]/[`InitError::MissingHandler`] if a
    /// required field was not set; [`InitError::Socket`]/
    /// [`InitError::Filesystem`] if configuring the listener or opening the
    /// root directory/index file fails.
    pub fn build(self) -> Result<Server<R>, InitError> {
        let server_limits = self.server_limits.clone().unwrap_or_default();
        let max_instances = server_limits.max_instances;
        let iterations_per_tick = server_limits.iterations_per_tick as u8;

        let instance = self.into_instance()?;
        let mut instances = Vec::with_capacity(max_instances);
        instances.push(instance);

        Ok(Server {
            instances,
            max_instances,
            iterations_per_tick,
        })
    }

    /// Consumes the builder into a configured, `LISTENING` [`ServerInstance`]
    /// without wrapping it in a [`Server`] — used by both [`build`](Self::build)
    /// and [`Server::add_instance`].
    fn into_instance(self) -> Result<ServerInstance<R>, InitError> {
        let listener = self.listener.ok_or(InitError::MissingListener)?;
        let root = self.root.ok_or(InitError::MissingHandler)?;
        let index_path = self.index_path.ok_or(InitError::MissingHandler)?;
        let registry = self.registry.ok_or(InitError::MissingHandler)?;
        let auth = self.auth.unwrap_or(&EMPTY_AUTH);

        let request_limits = self.request_limits.unwrap_or_default();
        let connection_limits = self.connection_limits.unwrap_or_default();

        let socket_ref = socket2::SockRef::from(&listener);
        let _ = socket_ref.set_linger(Some(Duration::from_secs(4)));
        let _ = socket_ref.listen(connection_limits.backlog as i32);
        let send_max = socket_ref
            .send_buffer_size()
            .unwrap_or_else(|_| request_limits.buffer_size());

        let index_file = root.open(&index_path).ok_or_else(|| {
            InitError::Filesystem(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "index file not found under root directory",
            ))
        })?;
        let index_content_type = registry.find_content_type(extension_of(&index_path));

        Ok(ServerInstance::new(
            listener,
            root,
            index_file,
            index_content_type,
            registry,
            auth,
            &request_limits,
            &connection_limits,
            send_max,
        ))
    }
}

/// The substring after the last `.` in the last path segment, or empty —
/// `Url::extension`'s counterpart for a raw configured path that has no
/// `Url` of its own to ask.
fn extension_of(path: &[u8]) -> &[u8] {
    let segment = match path.iter().rposition(|&b| b == b'/') {
        Some(slash) => &path[slash + 1..],
        None => path,
    };
    match segment.iter().rposition(|&b| b == b'.') {
        Some(dot) => &segment[dot + 1..],
        None => b"",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filesystem::FsRootDir, registry::HandlerRegistry};
    use std::path::PathBuf;

    static REGISTRY: HandlerRegistry = HandlerRegistry::default_get_only();

    fn tmp_root(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("embedded_httpd_server_impl_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), b"hello").unwrap();
        dir
    }

    async fn bound_listener() -> TcpListener {
        TcpListener::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn build_fails_without_listener() {
        let root = FsRootDir::new(tmp_root("no_listener")).unwrap();
        let err = ServerBuilder::<FsRootDir>::new()
            .root_dir(root)
            .index_file("index.html")
            .registry(&REGISTRY)
            .build()
            .unwrap_err();
        assert!(matches!(err, InitError::MissingListener));
    }

    #[tokio::test]
    async fn build_fails_without_root_dir() {
        let listener = bound_listener().await;
        let err = ServerBuilder::<FsRootDir>::new()
            .listener(listener)
            .index_file("index.html")
            .registry(&REGISTRY)
            .build()
            .unwrap_err();
        assert!(matches!(err, InitError::MissingHandler));
    }

    #[tokio::test]
    async fn build_fails_when_index_file_missing_under_root() {
        let listener = bound_listener().await;
        let root = FsRootDir::new(tmp_root("missing_index")).unwrap();
        let err = ServerBuilder::<FsRootDir>::new()
            .listener(listener)
            .root_dir(root)
            .index_file("does-not-exist.html")
            .registry(&REGISTRY)
            .build()
            .unwrap_err();
        assert!(matches!(err, InitError::Filesystem(_)));
    }

    #[tokio::test]
    async fn build_succeeds_and_claims_one_slot() {
        let listener = bound_listener().await;
        let root = FsRootDir::new(tmp_root("build_ok")).unwrap();
        let server = ServerBuilder::<FsRootDir>::new()
            .listener(listener)
            .root_dir(root)
            .index_file("index.html")
            .registry(&REGISTRY)
            .build()
            .unwrap();
        assert_eq!(server.instances.len(), 1);
        assert_eq!(server.max_instances, ServerLimits::default().max_instances);
    }

    #[tokio::test]
    async fn add_instance_claims_additional_slots_up_to_capacity() {
        let listener = bound_listener().await;
        let root = FsRootDir::new(tmp_root("add_instance_ok")).unwrap();
        let server = ServerBuilder::<FsRootDir>::new()
            .listener(listener)
            .root_dir(root)
            .index_file("index.html")
            .registry(&REGISTRY)
            .server_limits(ServerLimits {
                max_instances: 2,
                ..ServerLimits::default()
            })
            .build()
            .unwrap();
        assert_eq!(server.instances.len(), 1);

        let second_listener = bound_listener().await;
        let second_root = FsRootDir::new(tmp_root("add_instance_ok_2")).unwrap();
        let server = server
            .add_instance(
                ServerBuilder::<FsRootDir>::new()
                    .listener(second_listener)
                    .root_dir(second_root)
                    .index_file("index.html")
                    .registry(&REGISTRY),
            )
            .unwrap();
        assert_eq!(server.instances.len(), 2);
    }

    #[tokio::test]
    async fn add_instance_fails_once_table_is_full() {
        let listener = bound_listener().await;
        let root = FsRootDir::new(tmp_root("no_free_slot")).unwrap();
        let server = ServerBuilder::<FsRootDir>::new()
            .listener(listener)
            .root_dir(root)
            .index_file("index.html")
            .registry(&REGISTRY)
            .server_limits(ServerLimits {
                max_instances: 1,
                ..ServerLimits::default()
            })
            .build()
            .unwrap();

        let second_listener = bound_listener().await;
        let second_root = FsRootDir::new(tmp_root("no_free_slot_2")).unwrap();
        let err = server
            .add_instance(
                ServerBuilder::<FsRootDir>::new()
                    .listener(second_listener)
                    .root_dir(second_root)
                    .index_file("index.html")
                    .registry(&REGISTRY),
            )
            .unwrap_err();
        assert!(matches!(err, InitError::NoFreeSlot));
    }

    #[test]
    fn index_file_path_is_prefixed_with_slash() {
        let builder = ServerBuilder::<FsRootDir>::new().index_file("index.html");
        assert_eq!(builder.index_path.as_deref(), Some(b"/index.html".as_slice()));
    }
}
