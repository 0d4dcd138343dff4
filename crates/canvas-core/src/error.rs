//! Error types shared by the canvas protocol, server and client.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ipc::protocol::MessageType;

/// Failure to encode or decode a protocol message
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not a well-formed `{type, payload}` envelope
    #[error("malformed message: {0}")]
    Framing(#[source] serde_json::Error),

    /// The envelope is fine but its payload does not match the expected shape
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },

    /// A payload or envelope could not be serialized
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure while setting up or operating a canvas server
#[derive(Debug, Error)]
pub enum ServerError {
    /// The socket directory could not be created
    #[error("failed to create socket dir {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binding the listening socket failed
    #[error("failed to listen on socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called on a server whose accept loop already runs
    #[error("canvas server already started")]
    AlreadyStarted,

    /// Only event types may be emitted
    #[error("{0} is not an event type")]
    NotAnEvent(MessageType),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single client request
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dialing the canvas socket failed (missing socket, refused, ...)
    #[error("failed to connect to canvas at {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dialing did not complete within the connect timeout
    #[error("timed out after {timeout:?} connecting to canvas at {}", path.display())]
    ConnectTimeout { path: PathBuf, timeout: Duration },

    /// Writing the request or reading the response exceeded the deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The canvas closed the connection without answering
    #[error("connection closed before a response was received")]
    NoResponse,

    /// Write or read failure on an established connection
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The canvas answered with an `error` message
    #[error("{code}: {message}")]
    Remote { code: String, message: String },

    /// The canvas answered with a message type the call does not expect
    #[error("unexpected response type: {0}")]
    UnexpectedResponse(MessageType),
}

impl ClientError {
    /// True for connect and request deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::Timeout(_))
    }

    /// True when the failure happened below the protocol (dial, read, write, deadline)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::Timeout(_)
                | Self::NoResponse
                | Self::Io(_)
        )
    }

    /// Error code sent by the canvas, if this is a remote error
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }
}
