//! Capability descriptor for a wrapped program's model
//!
//! A [`CanvasModel`] declares which of the four optional behaviors the
//! program supports, each backed by a callback. The server dispatches on
//! the declared set; a missing callback answers `not_supported`.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::ipc::protocol::StatePayload;

type StateFn = dyn Fn() -> StatePayload + Send + Sync;
type ViewFn = dyn Fn() -> String + Send + Sync;
type KeyFn = dyn Fn(&str, Option<char>) -> Result<()> + Send + Sync;
type InputFn = dyn Fn(&str) -> Result<()> + Send + Sync;

/// One optional behavior of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    StateProvider,
    ViewProvider,
    KeyHandler,
    InputHandler,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::StateProvider => "StateProvider",
            Capability::ViewProvider => "ViewProvider",
            Capability::KeyHandler => "KeyHandler",
            Capability::InputHandler => "InputHandler",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A model registered on a canvas server
///
/// Built once with the `with_*` methods and replaced as a whole via
/// `CanvasServer::set_model`. Cloning is cheap.
#[derive(Clone, Default)]
pub struct CanvasModel {
    state: Option<Arc<StateFn>>,
    view: Option<Arc<ViewFn>>,
    key: Option<Arc<KeyFn>>,
    input: Option<Arc<InputFn>>,
}

impl CanvasModel {
    /// A model with no capabilities
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose state snapshots
    pub fn with_state<F>(mut self, f: F) -> Self
    where
        F: Fn() -> StatePayload + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(f));
        self
    }

    /// Expose the rendered view
    pub fn with_view<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(f));
        self
    }

    /// Accept key presses; an `Err` is forwarded to the controller as `key_error`
    pub fn with_key_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<char>) -> Result<()> + Send + Sync + 'static,
    {
        self.key = Some(Arc::new(f));
        self
    }

    /// Accept text input; an `Err` is forwarded to the controller as `input_error`
    pub fn with_input_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.input = Some(Arc::new(f));
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::StateProvider => self.state.is_some(),
            Capability::ViewProvider => self.view.is_some(),
            Capability::KeyHandler => self.key.is_some(),
            Capability::InputHandler => self.input.is_some(),
        }
    }

    /// Declared capabilities, in a fixed order
    pub fn capabilities(&self) -> Vec<Capability> {
        [
            Capability::StateProvider,
            Capability::ViewProvider,
            Capability::KeyHandler,
            Capability::InputHandler,
        ]
        .into_iter()
        .filter(|c| self.supports(*c))
        .collect()
    }

    pub(crate) fn state_provider(&self) -> Option<&StateFn> {
        self.state.as_deref()
    }

    pub(crate) fn view_provider(&self) -> Option<&ViewFn> {
        self.view.as_deref()
    }

    pub(crate) fn key_handler(&self) -> Option<&KeyFn> {
        self.key.as_deref()
    }

    pub(crate) fn input_handler(&self) -> Option<&InputFn> {
        self.input.as_deref()
    }
}

impl fmt::Debug for CanvasModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasModel")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
