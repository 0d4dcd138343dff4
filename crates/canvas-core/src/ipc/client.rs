//! IPC client for controllers
//!
//! Each call opens a fresh connection to the canvas socket, writes one
//! request line, reads one response line and closes. Dialing and the
//! write+read exchange are each bounded by a deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::Settings;
use crate::error::ClientError;
use crate::ipc::address::{socket_path, socket_path_in};
use crate::ipc::protocol::{
    decode, encode, ErrorPayload, InputPayload, KeyPayload, Message, MessageType, StatePayload,
    ViewPayload,
};

/// Default bound on dialing the canvas socket
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on writing the request and reading the response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one canvas (stateless, one connection per call)
#[derive(Debug, Clone)]
pub struct CanvasClient {
    socket_path: PathBuf,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl CanvasClient {
    /// Create a client for a canvas id in the default socket directory
    pub fn new(id: &str) -> Self {
        Self::with_socket(socket_path(id))
    }

    /// Create a client for a custom socket path
    pub fn with_socket(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create a client using the socket directory and timeouts from settings
    pub fn from_settings(id: &str, settings: &Settings) -> Self {
        Self::with_socket(socket_path_in(&settings.socket_dir(), id)).with_timeouts(
            settings.client.connect_timeout(),
            settings.client.request_timeout(),
        )
    }

    /// Override the connect and request deadlines
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Query the canvas state
    pub async fn state(&self) -> Result<StatePayload, ClientError> {
        let response = self
            .call(Message::empty(MessageType::GetState), MessageType::State)
            .await?;
        Ok(response.parse_payload()?)
    }

    /// Query the rendered view
    pub async fn view(&self) -> Result<ViewPayload, ClientError> {
        let response = self
            .call(Message::empty(MessageType::GetView), MessageType::View)
            .await?;
        Ok(response.parse_payload()?)
    }

    /// Send a named key press (e.g. "enter", "tab", "ctrl+c")
    pub async fn send_key(&self, key: &str) -> Result<(), ClientError> {
        self.send_key_payload(&KeyPayload::named(key)).await
    }

    /// Send a key press with an optional literal character
    pub async fn send_key_payload(&self, key: &KeyPayload) -> Result<(), ClientError> {
        let request = Message::new(MessageType::SendKey, key)?;
        self.call(request, MessageType::Ack).await?;
        Ok(())
    }

    /// Send literal text input
    pub async fn send_input(&self, text: &str) -> Result<(), ClientError> {
        let payload = InputPayload {
            text: text.to_string(),
        };
        let request = Message::new(MessageType::SendInput, &payload)?;
        self.call(request, MessageType::Ack).await?;
        Ok(())
    }

    /// Ask the canvas to close
    pub async fn close(&self) -> Result<(), ClientError> {
        self.call(Message::empty(MessageType::Close), MessageType::Ack)
            .await?;
        Ok(())
    }

    /// Check whether the canvas answers a state query
    ///
    /// This is a full `state()` call, not a lightweight probe: a running
    /// canvas whose model has no state provider reports `false`.
    pub async fn ping(&self) -> bool {
        match self.state().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("canvas ping {} failed: {}", self.socket_path.display(), e);
                false
            }
        }
    }

    /// Send one request and return the raw response, whatever its type
    pub async fn request(&self, request: &Message) -> Result<Message, ClientError> {
        let stream = match timeout(self.connect_timeout, UnixStream::connect(&self.socket_path))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ClientError::Connect {
                    path: self.socket_path.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ClientError::ConnectTimeout {
                    path: self.socket_path.clone(),
                    timeout: self.connect_timeout,
                })
            }
        };

        let line = encode(request)?;
        timeout(self.request_timeout, Self::exchange(stream, &line))
            .await
            .map_err(|_| ClientError::Timeout(self.request_timeout))?
    }

    /// Send a request and check the response type, turning `error`
    /// responses into [`ClientError::Remote`]
    async fn call(&self, request: Message, expected: MessageType) -> Result<Message, ClientError> {
        let response = self.request(&request).await?;

        if response.kind == MessageType::Error {
            let err: ErrorPayload = response.parse_payload()?;
            return Err(ClientError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        if response.kind != expected {
            return Err(ClientError::UnexpectedResponse(response.kind));
        }
        Ok(response)
    }

    /// Write one request line and read one response line
    async fn exchange(stream: UnixStream, line: &[u8]) -> Result<Message, ClientError> {
        let (reader, mut writer) = stream.into_split();

        writer.write_all(line).await?;
        writer.flush().await?;

        let mut buf_reader = BufReader::new(reader);
        let mut response = Vec::new();
        let n = buf_reader.read_until(b'\n', &mut response).await?;
        if n == 0 || response.last() != Some(&b'\n') {
            return Err(ClientError::NoResponse);
        }

        Ok(decode(&response)?)
    }
}
