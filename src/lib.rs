//! SoundNet - a minimal local web server exposing a live microphone capture
//! as an in-browser waveform scope with a volume control.
//!
//! The server owns exactly two resources: a fixed HTML/JS page embedded into
//! the binary, and an `audio/mpeg` byte stream relayed from an external
//! capture-and-encode process spawned per request.

pub mod config;
pub mod encoder;
pub mod server;

pub use config::AppConfig;
pub use encoder::EncoderStream;
pub use server::ScopeServer;
