//! IPC module for communication between controllers and canvases
//!
//! Uses Unix domain sockets with newline-delimited JSON (ndjson), one
//! request and one response per line.

pub mod address;
pub mod client;
pub mod discovery;
pub mod dispatch;
pub mod protocol;
pub mod server;

pub use client::CanvasClient;
pub use discovery::{list_canvases, list_canvases_in, CanvasEntry, CanvasStatus};
pub use dispatch::ModelRegistry;
pub use server::CanvasServer;
