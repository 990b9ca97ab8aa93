//! m3u8dl-common: shared types and helpers.
//!
//! This crate provides the pieces every m3u8dl component leans on:
//!
//! - **Error Handling**: the unified [`Error`] type and [`Result`] alias
//! - **Failure Reports**: [`FailureReport`], built from a failed transcoder run
//! - **Timecodes**: centisecond conversion and `HH:MM:SS` / throughput formatting
//! - **Path Utilities**: output filename derivation from a playlist URL
//!
//! # Examples
//!
//! ```
//! use m3u8dl_common::timecode::{centiseconds, format_clock};
//! use m3u8dl_common::paths::output_name;
//!
//! assert_eq!(centiseconds("00:01:02.50"), Some(6350));
//! assert_eq!(format_clock(3725.0), "01:02:05");
//! assert_eq!(output_name("http://host/live/show.m3u8", "ts"), "show.ts");
//! ```

pub mod error;
pub mod paths;
pub mod report;
pub mod timecode;

pub use error::{Error, Result};
pub use report::FailureReport;
