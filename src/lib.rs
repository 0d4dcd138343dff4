//! Demo canvas built on `canvas-core`.

pub mod config;
pub mod demo;
