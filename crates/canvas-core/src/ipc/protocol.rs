//! IPC protocol definitions for controller ↔ canvas communication
//!
//! Every message is a `{type, payload}` envelope sent as one line of
//! newline-delimited JSON (ndjson). The payload stays opaque until the
//! receiver asks for a concrete shape with [`Message::parse_payload`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Type tag of a message
///
/// Unknown tags decode into [`MessageType::Other`] so the envelope can be
/// read without knowing every type up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    // Requests (controller -> canvas)
    GetState,
    GetView,
    SendKey,
    SendInput,
    Close,

    // Responses (canvas -> controller)
    State,
    View,
    Ack,
    Error,

    // Events (canvas -> controller, declared but never delivered)
    Ready,
    Updated,
    Selected,
    Cancelled,

    /// Any tag outside the catalogue
    Other(String),
}

impl MessageType {
    /// Every catalogued message type
    pub const CATALOGUE: [MessageType; 13] = [
        MessageType::GetState,
        MessageType::GetView,
        MessageType::SendKey,
        MessageType::SendInput,
        MessageType::Close,
        MessageType::State,
        MessageType::View,
        MessageType::Ack,
        MessageType::Error,
        MessageType::Ready,
        MessageType::Updated,
        MessageType::Selected,
        MessageType::Cancelled,
    ];

    /// Wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::GetState => "get_state",
            MessageType::GetView => "get_view",
            MessageType::SendKey => "send_key",
            MessageType::SendInput => "send_input",
            MessageType::Close => "close",
            MessageType::State => "state",
            MessageType::View => "view",
            MessageType::Ack => "ack",
            MessageType::Error => "error",
            MessageType::Ready => "ready",
            MessageType::Updated => "updated",
            MessageType::Selected => "selected",
            MessageType::Cancelled => "cancelled",
            MessageType::Other(s) => s,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageType::GetState
                | MessageType::GetView
                | MessageType::SendKey
                | MessageType::SendInput
                | MessageType::Close
        )
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            MessageType::State | MessageType::View | MessageType::Ack | MessageType::Error
        )
    }

    pub fn is_event(&self) -> bool {
        matches!(
            self,
            MessageType::Ready
                | MessageType::Updated
                | MessageType::Selected
                | MessageType::Cancelled
        )
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "get_state" => MessageType::GetState,
            "get_view" => MessageType::GetView,
            "send_key" => MessageType::SendKey,
            "send_input" => MessageType::SendInput,
            "close" => MessageType::Close,
            "state" => MessageType::State,
            "view" => MessageType::View,
            "ack" => MessageType::Ack,
            "error" => MessageType::Error,
            "ready" => MessageType::Ready,
            "updated" => MessageType::Updated,
            "selected" => MessageType::Selected,
            "cancelled" => MessageType::Cancelled,
            _ => MessageType::Other(s),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error codes carried in [`ErrorPayload::code`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request line was not a valid envelope
    ParseError,
    /// The registered model lacks the required capability
    NotSupported,
    /// The key handler rejected the key
    KeyError,
    /// The input handler rejected the text
    InputError,
    /// The state provider panicked
    StateError,
    /// The view provider panicked
    ViewError,
    /// The close callback panicked
    CloseError,
    /// The request type is not handled
    UnknownType,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "parse_error",
            ErrorCode::NotSupported => "not_supported",
            ErrorCode::KeyError => "key_error",
            ErrorCode::InputError => "input_error",
            ErrorCode::StateError => "state_error",
            ErrorCode::ViewError => "view_error",
            ErrorCode::CloseError => "close_error",
            ErrorCode::UnknownType => "unknown_type",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope for every message on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    /// Create a message without payload
    pub fn empty(kind: MessageType) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Create a message carrying a serialized payload
    pub fn new<T: Serialize>(kind: MessageType, payload: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            kind,
            payload: Some(payload),
        })
    }

    /// Create an `error` response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let payload = ErrorPayload {
            code: code.as_str().to_string(),
            message: message.into(),
        };
        Self {
            kind: MessageType::Error,
            payload: Some(payload.into_value()),
        }
    }

    /// Deserialize the payload into `T`
    ///
    /// An absent payload yields `T::default()`, so optional-payload requests
    /// parse uniformly.
    pub fn parse_payload<T: DeserializeOwned + Default>(&self) -> Result<T, ProtocolError> {
        match &self.payload {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => {
                T::deserialize(value).map_err(|source| ProtocolError::Payload {
                    kind: self.kind.clone(),
                    source,
                })
            }
        }
    }
}

/// Snapshot of a canvas' state
///
/// Every field is optional and omitted from the wire when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    /// Custom fields from the wrapped program's model
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
    /// Mode label (e.g. "normal", "insert")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Current input text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Cursor position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<usize>,
}

impl StatePayload {
    /// Set a custom field
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>, cursor: usize) -> Self {
        self.input = Some(input.into());
        self.cursor = Some(cursor);
        self
    }

    pub fn with_focus(mut self, focused: bool) -> Self {
        self.focused = Some(focused);
        self
    }
}

/// Rendered view of a canvas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPayload {
    pub content: String,
    /// True if `content` contains ANSI escape sequences
    pub ansi: bool,
}

/// A key press to deliver to a canvas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPayload {
    /// Symbolic key name, e.g. "enter", "tab", "ctrl+c"
    pub key: String,
    /// Literal character for character input, sent as a code point
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "codepoint"
    )]
    pub rune: Option<char>,
}

impl KeyPayload {
    pub fn named(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rune: None,
        }
    }
}

/// Literal text input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPayload {
    pub text: String,
}

/// Payload of an `error` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    fn into_value(self) -> Value {
        serde_json::json!({ "code": self.code, "message": self.message })
    }
}

/// `Option<char>` as a numeric code point; zero means "no character"
mod codepoint {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(rune: &Option<char>, s: S) -> Result<S::Ok, S::Error> {
        match rune {
            Some(c) => s.serialize_u32(u32::from(*c)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<char>, D::Error> {
        match Option::<u32>::deserialize(d)? {
            None | Some(0) => Ok(None),
            Some(n) => char::from_u32(n)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid code point: {n}"))),
        }
    }
}

/// Encode a message as ndjson (JSON + newline)
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut json = serde_json::to_vec(msg).map_err(ProtocolError::Encode)?;
    json.push(b'\n');
    Ok(json)
}

/// Decode a message envelope from a JSON line
pub fn decode(line: &[u8]) -> Result<Message, ProtocolError> {
    serde_json::from_slice(line.trim_ascii_end()).map_err(ProtocolError::Framing)
}
