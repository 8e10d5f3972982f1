//! The HTTP surface: page serving and the audio stream relay.
//!
//! This module provides an axum-based HTTP server that:
//! 1. Serves the embedded scope page on the root path
//! 2. Relays a per-request encoder process as a live `audio/mpeg` stream
//!
//! Routing is purely path-based; any other path is a 404.

pub mod page;
mod scope;

pub use scope::ScopeServer;
