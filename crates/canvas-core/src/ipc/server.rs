//! IPC server for a canvas
//!
//! Listens on `<socket_dir>/<id>.sock`, accepts any number of concurrent
//! controller connections and answers each request line with one response
//! line, dispatched against the currently registered model.

use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ServerError;
use crate::ipc::address::{socket_dir, socket_path_in};
use crate::ipc::dispatch::{dispatch, failure_code, ModelRegistry};
use crate::ipc::protocol::{decode, encode, ErrorCode, Message};
use crate::model::CanvasModel;

/// IPC server owning one canvas socket
pub struct CanvasServer {
    id: String,
    socket_path: PathBuf,
    /// `(dev, ino)` of the socket file this server created
    socket_inode: Option<(u64, u64)>,
    registry: ModelRegistry,
    /// Bound listener, taken by `start()`
    listener: Option<StdUnixListener>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl CanvasServer {
    /// Bind the socket for `id` in the default socket directory
    pub fn bind(id: &str) -> Result<Self, ServerError> {
        Self::bind_in(&socket_dir(), id)
    }

    /// Bind the socket for `id` in `dir`
    ///
    /// The directory and the socket are restricted to the owner (0o700).
    /// A leftover socket file at the address is removed first; failing to
    /// remove it is not fatal, but the bind that follows will report it.
    pub fn bind_in(dir: &Path, id: &str) -> Result<Self, ServerError> {
        ensure_socket_dir(dir).map_err(|source| ServerError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let socket_path = socket_path_in(dir, id);
        remove_stale_socket(&socket_path);

        let listener = StdUnixListener::bind(&socket_path)
            .and_then(|l| l.set_nonblocking(true).map(|_| l))
            .and_then(|l| {
                std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                    .map(|_| l)
            })
            .map_err(|source| ServerError::Bind {
                path: socket_path.clone(),
                source,
            })?;
        let socket_inode = std::fs::symlink_metadata(&socket_path)
            .ok()
            .map(|m| (m.dev(), m.ino()));

        let (shutdown_tx, _) = watch::channel(false);

        tracing::debug!("canvas {} bound on {}", id, socket_path.display());
        Ok(Self {
            id: id.to_string(),
            socket_path,
            socket_inode,
            registry: ModelRegistry::new(),
            listener: Some(listener),
            shutdown_tx,
            accept_task: None,
            stopped: false,
        })
    }

    /// Replace the registered model
    ///
    /// Requests already being handled keep the model they started with.
    pub fn set_model(&self, model: CanvasModel) {
        self.registry.replace(model);
    }

    /// Set the callback invoked when a controller sends `close`
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.registry.set_on_close(f);
    }

    /// Get a handle to the model slot, for replacing the model from elsewhere
    pub fn registry(&self) -> ModelRegistry {
        self.registry.clone()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Start accepting connections on a background task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let listener = self.listener.take().ok_or(ServerError::AlreadyStarted)?;
        let listener = UnixListener::from_std(listener)?;

        let registry = self.registry.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let id = self.id.clone();
        self.accept_task = Some(tokio::spawn(async move {
            Self::accept_loop(listener, registry, shutdown_rx).await;
            tracing::debug!("canvas {} accept loop stopped", id);
        }));

        tracing::info!(
            "canvas server {} started on {}",
            self.id,
            self.socket_path.display()
        );
        Ok(())
    }

    /// Stop accepting, close the listener and remove the socket file
    ///
    /// Connections already accepted are not interrupted; they finish when
    /// their controller disconnects.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                tracing::warn!("canvas {} accept loop failed: {}", self.id, e);
            }
        }
        self.listener = None;
        self.remove_socket();
        self.stopped = true;
        tracing::info!("canvas server {} stopped", self.id);
    }

    /// Emit an asynchronous event to connected controllers
    ///
    /// There is no registry of live connections, so events are never
    /// delivered: the event is validated and encoded, then dropped, and the
    /// number of recipients (always zero) is returned.
    pub fn emit(&self, event: Message) -> Result<usize, ServerError> {
        if !event.kind.is_event() {
            return Err(ServerError::NotAnEvent(event.kind));
        }
        encode(&event)?;
        tracing::debug!(
            "canvas {} event {} not delivered: no connection registry",
            self.id,
            event.kind
        );
        Ok(0)
    }

    /// Accept loop for incoming controller connections
    async fn accept_loop(
        listener: UnixListener,
        registry: ModelRegistry,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let registry = registry.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, registry).await {
                                tracing::debug!("canvas connection ended: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!("canvas accept error: {}", e);
                    }
                },
            }
        }
    }

    /// Handle a single controller connection
    ///
    /// Reads newline-terminated requests until EOF or a transport error. A
    /// line that fails to decode is answered with `parse_error` and the loop
    /// carries on.
    async fn handle_connection(
        stream: UnixStream,
        registry: ModelRegistry,
    ) -> Result<(), ServerError> {
        let (reader, mut writer) = stream.into_split();
        let mut buf_reader = BufReader::new(reader);
        let mut line_buf = Vec::new();

        loop {
            line_buf.clear();
            let n = buf_reader.read_until(b'\n', &mut line_buf).await?;
            // EOF, or a trailing fragment without its newline
            if n == 0 || line_buf.last() != Some(&b'\n') {
                break;
            }

            let response = match decode(&line_buf) {
                Ok(request) => Self::respond(&registry, request).await,
                Err(e) => {
                    tracing::debug!("canvas request parse error: {}", e);
                    Message::error(ErrorCode::ParseError, e.to_string())
                }
            };

            writer.write_all(&encode(&response)?).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    /// Dispatch a request against a snapshot of the registered model
    ///
    /// Model callbacks may block, so they run on the blocking pool.
    async fn respond(registry: &ModelRegistry, request: Message) -> Message {
        let registration = registry.snapshot();
        let code = failure_code(&request.kind);
        tracing::debug!("canvas request: {}", request.kind);

        match tokio::task::spawn_blocking(move || dispatch(&registration, &request)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("canvas handler task failed: {}", e);
                Message::error(code, format!("handler failed: {}", e))
            }
        }
    }

    /// Unlink the socket file, unless another server has since rebound the
    /// same address
    fn remove_socket(&self) {
        let current = std::fs::symlink_metadata(&self.socket_path)
            .ok()
            .map(|m| (m.dev(), m.ino()));
        if current.is_none() {
            return;
        }
        if current != self.socket_inode {
            tracing::debug!(
                "socket {} was rebound by another server, leaving it",
                self.socket_path.display()
            );
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "failed to remove socket {}: {}",
                    self.socket_path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for CanvasServer {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        self.remove_socket();
    }
}

/// Create the socket directory and restrict it to the owner
fn ensure_socket_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let metadata = std::fs::metadata(dir)?;
    if !metadata.is_dir() {
        return Err(std::io::Error::other(format!(
            "not a directory: {}",
            dir.display()
        )));
    }
    if metadata.permissions().mode() & 0o777 != 0o700 {
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Best-effort removal of a leftover socket file
fn remove_stale_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("removed stale socket {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("could not remove stale socket {}: {}", path.display(), e),
    }
}
