//! m3u8dl - Download m3u8 playlists through ffmpeg, one at a time
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod progress;
pub mod queue;
pub mod transcode;
