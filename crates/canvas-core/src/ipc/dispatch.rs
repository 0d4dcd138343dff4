//! Request dispatch against the registered model
//!
//! Pure request → response mapping, no I/O. Model callbacks run inside
//! `catch_unwind` so a panicking model turns into an error response.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ipc::protocol::{
    ErrorCode, InputPayload, KeyPayload, Message, MessageType, ViewPayload,
};
use crate::model::{CanvasModel, Capability};

/// Callback run when a controller sends `close`
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// What a connection sees when it takes a snapshot of the server
#[derive(Clone, Default)]
pub struct Registration {
    pub model: Arc<CanvasModel>,
    pub on_close: Option<CloseCallback>,
}

/// Shared, swappable slot holding the registered model
///
/// The lock is only held to copy or replace the `Arc`s inside; handlers run
/// against a snapshot, so a replacement is visible to the next request but
/// not to one already executing.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    inner: Arc<RwLock<Registration>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered model
    pub fn replace(&self, model: CanvasModel) {
        self.inner.write().model = Arc::new(model);
    }

    /// Set the callback invoked on `close`
    pub fn set_on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.write().on_close = Some(Arc::new(f));
    }

    /// Copy the current registration
    pub fn snapshot(&self) -> Registration {
        self.inner.read().clone()
    }
}

/// Map one request to its response
pub fn dispatch(registration: &Registration, request: &Message) -> Message {
    let model = &registration.model;

    match &request.kind {
        MessageType::GetState => {
            let Some(provider) = model.state_provider() else {
                return not_supported(Capability::StateProvider);
            };
            match call_model(ErrorCode::StateError, || provider()) {
                Ok(state) => Message::new(MessageType::State, &state)
                    .unwrap_or_else(|e| Message::error(ErrorCode::StateError, e.to_string())),
                Err(response) => response,
            }
        }

        MessageType::GetView => {
            let Some(provider) = model.view_provider() else {
                return not_supported(Capability::ViewProvider);
            };
            match call_model(ErrorCode::ViewError, || provider()) {
                Ok(content) => {
                    let view = ViewPayload {
                        content,
                        ansi: true,
                    };
                    Message::new(MessageType::View, &view)
                        .unwrap_or_else(|e| Message::error(ErrorCode::ViewError, e.to_string()))
                }
                Err(response) => response,
            }
        }

        MessageType::SendKey => {
            let Some(handler) = model.key_handler() else {
                return not_supported(Capability::KeyHandler);
            };
            let payload: KeyPayload = match request.parse_payload() {
                Ok(p) => p,
                Err(e) => return Message::error(ErrorCode::ParseError, e.to_string()),
            };
            match call_model(ErrorCode::KeyError, || handler(&payload.key, payload.rune)) {
                Ok(Ok(())) => Message::empty(MessageType::Ack),
                Ok(Err(e)) => Message::error(ErrorCode::KeyError, e.to_string()),
                Err(response) => response,
            }
        }

        MessageType::SendInput => {
            let Some(handler) = model.input_handler() else {
                return not_supported(Capability::InputHandler);
            };
            let payload: InputPayload = match request.parse_payload() {
                Ok(p) => p,
                Err(e) => return Message::error(ErrorCode::ParseError, e.to_string()),
            };
            match call_model(ErrorCode::InputError, || handler(&payload.text)) {
                Ok(Ok(())) => Message::empty(MessageType::Ack),
                Ok(Err(e)) => Message::error(ErrorCode::InputError, e.to_string()),
                Err(response) => response,
            }
        }

        MessageType::Close => {
            if let Some(on_close) = &registration.on_close {
                if let Err(response) = call_model(ErrorCode::CloseError, || on_close()) {
                    return response;
                }
            }
            Message::empty(MessageType::Ack)
        }

        other => Message::error(
            ErrorCode::UnknownType,
            format!("unknown message type: {}", other),
        ),
    }
}

/// Error code used when the handler for `kind` fails outside the model
pub fn failure_code(kind: &MessageType) -> ErrorCode {
    match kind {
        MessageType::GetState => ErrorCode::StateError,
        MessageType::GetView => ErrorCode::ViewError,
        MessageType::SendKey => ErrorCode::KeyError,
        MessageType::SendInput => ErrorCode::InputError,
        MessageType::Close => ErrorCode::CloseError,
        _ => ErrorCode::UnknownType,
    }
}

fn not_supported(capability: Capability) -> Message {
    Message::error(
        ErrorCode::NotSupported,
        format!("model does not implement {}", capability),
    )
}

/// Run model code, converting a panic into an error response
fn call_model<T>(code: ErrorCode, f: impl FnOnce() -> T) -> Result<T, Message> {
    // The model is an external collaborator; the snapshot it runs against is
    // discarded after the call, so a broken invariant inside it cannot leak.
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| {
        let reason = panic_message(panic.as_ref());
        tracing::warn!("canvas model panicked ({}): {}", code, reason);
        Message::error(code, format!("model panicked: {}", reason))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::{ErrorPayload, StatePayload};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registration(model: CanvasModel) -> Registration {
        Registration {
            model: Arc::new(model),
            on_close: None,
        }
    }

    fn error_of(response: &Message) -> ErrorPayload {
        assert_eq!(response.kind, MessageType::Error);
        response.parse_payload().unwrap()
    }

    fn state_only() -> CanvasModel {
        CanvasModel::new().with_state(|| StatePayload::default().with_mode("test"))
    }

    #[test]
    fn test_get_state() {
        let reg = registration(state_only());
        let response = dispatch(&reg, &Message::empty(MessageType::GetState));
        assert_eq!(response.kind, MessageType::State);
        let state: StatePayload = response.parse_payload().unwrap();
        assert_eq!(state.mode.as_deref(), Some("test"));
    }

    #[test]
    fn test_state_only_model_rejects_other_capabilities() {
        let reg = registration(state_only());
        let cases = [
            (MessageType::GetView, "ViewProvider"),
            (MessageType::SendKey, "KeyHandler"),
            (MessageType::SendInput, "InputHandler"),
        ];
        for (kind, capability) in cases {
            let err = error_of(&dispatch(&reg, &Message::empty(kind)));
            assert_eq!(err.code, "not_supported");
            assert_eq!(err.message, format!("model does not implement {capability}"));
        }
    }

    #[test]
    fn test_empty_registration_rejects_get_state() {
        let err = error_of(&dispatch(
            &Registration::default(),
            &Message::empty(MessageType::GetState),
        ));
        assert_eq!(err.code, "not_supported");
        assert_eq!(err.message, "model does not implement StateProvider");
    }

    #[test]
    fn test_get_view_sets_ansi() {
        let reg = registration(CanvasModel::new().with_view(|| "\x1b[1mhi\x1b[0m".to_string()));
        let response = dispatch(&reg, &Message::empty(MessageType::GetView));
        let view: ViewPayload = response.parse_payload().unwrap();
        assert_eq!(view.content, "\x1b[1mhi\x1b[0m");
        assert!(view.ansi);
    }

    #[test]
    fn test_send_key_forwards_payload() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reg = registration(CanvasModel::new().with_key_handler(move |key, rune| {
            sink.lock().push((key.to_string(), rune));
            Ok(())
        }));
        let request = Message::new(
            MessageType::SendKey,
            &KeyPayload {
                key: "rune".to_string(),
                rune: Some('q'),
            },
        )
        .unwrap();
        let response = dispatch(&reg, &request);
        assert_eq!(response, Message::empty(MessageType::Ack));
        assert_eq!(*seen.lock(), vec![("rune".to_string(), Some('q'))]);
    }

    #[test]
    fn test_send_key_handler_error() {
        let reg = registration(
            CanvasModel::new().with_key_handler(|key, _| anyhow::bail!("unsupported key: {key}")),
        );
        let request = Message::new(MessageType::SendKey, &KeyPayload::named("f13")).unwrap();
        let err = error_of(&dispatch(&reg, &request));
        assert_eq!(err.code, "key_error");
        assert_eq!(err.message, "unsupported key: f13");
    }

    #[test]
    fn test_send_input_without_payload_uses_empty_text() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = seen.clone();
        let reg = registration(CanvasModel::new().with_input_handler(move |text| {
            *sink.lock() = Some(text.to_string());
            Ok(())
        }));
        let response = dispatch(&reg, &Message::empty(MessageType::SendInput));
        assert_eq!(response.kind, MessageType::Ack);
        assert_eq!(seen.lock().as_deref(), Some(""));
    }

    #[test]
    fn test_send_input_handler_error() {
        let reg = registration(
            CanvasModel::new().with_input_handler(|_| Err(anyhow::anyhow!("read-only field"))),
        );
        let request = Message::new(
            MessageType::SendInput,
            &InputPayload {
                text: "hello".to_string(),
            },
        )
        .unwrap();
        let err = error_of(&dispatch(&reg, &request));
        assert_eq!(err.code, "input_error");
        assert_eq!(err.message, "read-only field");
    }

    #[test]
    fn test_malformed_payload_is_parse_error() {
        let reg = registration(CanvasModel::new().with_input_handler(|_| Ok(())));
        let request = Message {
            kind: MessageType::SendInput,
            payload: Some(serde_json::json!({"text": ["not", "text"]})),
        };
        let err = error_of(&dispatch(&reg, &request));
        assert_eq!(err.code, "parse_error");
    }

    #[test]
    fn test_close_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = ModelRegistry::new();
        registry.set_on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let response = dispatch(&registry.snapshot(), &Message::empty(MessageType::Close));
        assert_eq!(response, Message::empty(MessageType::Ack));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_without_callback_acks() {
        let response = dispatch(&Registration::default(), &Message::empty(MessageType::Close));
        assert_eq!(response.kind, MessageType::Ack);
    }

    #[test]
    fn test_unknown_type() {
        let reg = registration(state_only());
        let request = Message::empty(MessageType::Other("subscribe".to_string()));
        let err = error_of(&dispatch(&reg, &request));
        assert_eq!(err.code, "unknown_type");
        assert_eq!(err.message, "unknown message type: subscribe");

        // Response and event types are not requests
        let err = error_of(&dispatch(&reg, &Message::empty(MessageType::Ready)));
        assert_eq!(err.message, "unknown message type: ready");
    }

    #[test]
    fn test_panicking_model_is_contained() {
        let reg = registration(
            CanvasModel::new()
                .with_state(|| panic!("state exploded"))
                .with_key_handler(|_, _| panic!("key exploded")),
        );
        let err = error_of(&dispatch(&reg, &Message::empty(MessageType::GetState)));
        assert_eq!(err.code, "state_error");
        assert_eq!(err.message, "model panicked: state exploded");

        let request = Message::new(MessageType::SendKey, &KeyPayload::named("enter")).unwrap();
        let err = error_of(&dispatch(&reg, &request));
        assert_eq!(err.code, "key_error");
    }

    #[test]
    fn test_registry_replace_does_not_affect_snapshot() {
        let registry = ModelRegistry::new();
        registry.replace(state_only());
        let before = registry.snapshot();
        registry.replace(CanvasModel::new());

        let response = dispatch(&before, &Message::empty(MessageType::GetState));
        assert_eq!(response.kind, MessageType::State);

        let response = dispatch(&registry.snapshot(), &Message::empty(MessageType::GetState));
        assert_eq!(error_of(&response).code, "not_supported");
    }

    #[test]
    fn test_failure_code() {
        assert_eq!(failure_code(&MessageType::SendInput), ErrorCode::InputError);
        assert_eq!(failure_code(&MessageType::Ack), ErrorCode::UnknownType);
    }
}
