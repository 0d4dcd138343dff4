//! Lets a controller process inspect and drive a running terminal program
//! over a Unix socket.
//!
//! A wrapped program binds a [`CanvasServer`] and registers a
//! [`CanvasModel`] describing what it can do; controllers talk to it with a
//! [`CanvasClient`].

pub mod config;
pub mod error;
pub mod ipc;
pub mod model;

pub use error::{ClientError, ProtocolError, ServerError};
pub use ipc::{CanvasClient, CanvasServer};
pub use model::{CanvasModel, Capability};
