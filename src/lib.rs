//! `cuecast`: narrated audio tracks built from subtitles.
//!
//! This crate provides:
//! - SRT parsing that tolerates malformed blocks
//! - A pluggable speech renderer interface (external TTS command, offline tone)
//! - Compress-only time fitting of each rendered clip into its cue's window
//! - Additive timeline compositing at cue timestamps
//! - WAV and zip-bundle export
//!
//! Rendering runs in parallel; placement is single-writer and ordered by cue index, so the
//! same input always produces the same buffer.

// High-level API (most consumers should start here).
pub mod narrator;
pub mod opts;

// Errors.
pub mod error;

// Subtitle input.
pub mod cue;
pub mod srt;

// Speech rendering.
pub mod backends;
pub mod renderer;
pub mod voice;

// Rendered audio: decoding, time fitting, compositing.
pub mod clip;
pub mod decoder;
pub mod stretch;
pub mod timeline;

mod audio_pipeline;
mod media;

// Export and per-cue reporting.
pub mod export;
pub mod json_array_encoder;
pub mod report;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use audio_pipeline::DEFAULT_SAMPLE_RATE;
pub use cue::Cue;
pub use error::{Error, ErrorKind, RenderError, Result};
pub use export::{ExportFormat, export_to_path};
pub use narrator::{CueFailure, Narration, Narrator};
pub use opts::{DEFAULT_MAX_TIMELINE_MS, FailurePolicy, Mode, Opts};
pub use renderer::Renderer;
pub use timeline::Timeline;
pub use voice::{Voice, VoiceId};
