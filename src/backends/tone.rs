use std::f32::consts::PI;

use crate::clip::{RenderedClip, ms_to_frames};
use crate::error::RenderError;
use crate::renderer::Renderer;
use crate::voice::VoiceId;

/// How long a [`ToneRenderer`] clip lasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneLength {
    /// Every clip lasts exactly this many milliseconds.
    Fixed { ms: u64 },

    /// Clip length grows with the number of characters in the text.
    PerChar { ms: u64 },
}

/// Configuration for [`ToneRenderer`].
#[derive(Debug, Clone)]
pub struct ToneConfig {
    pub sample_rate: u32,
    pub frequency_hz: f32,
    pub amplitude: f32,
    pub length: ToneLength,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::audio_pipeline::DEFAULT_SAMPLE_RATE,
            frequency_hz: 440.0,
            amplitude: 0.3,
            length: ToneLength::PerChar { ms: 60 },
        }
    }
}

/// Offline renderer that "speaks" a sine tone.
///
/// Useful for dry runs and for checking alignment by ear without a TTS backend: every cue
/// becomes an audible beep at its timestamp. Output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ToneRenderer {
    config: ToneConfig,
}

impl ToneRenderer {
    pub fn new(config: ToneConfig) -> Self {
        Self { config }
    }

    /// A renderer whose clips all last `ms` milliseconds.
    pub fn fixed(sample_rate: u32, ms: u64) -> Self {
        Self::new(ToneConfig {
            sample_rate,
            length: ToneLength::Fixed { ms },
            ..ToneConfig::default()
        })
    }

    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    fn duration_ms(&self, text: &str) -> u64 {
        match self.config.length {
            ToneLength::Fixed { ms } => ms,
            ToneLength::PerChar { ms } => ms * text.chars().count() as u64,
        }
    }
}

impl Renderer for ToneRenderer {
    fn render(&self, text: &str, _voice: &VoiceId) -> Result<RenderedClip, RenderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RenderError::BadText("empty text".to_owned()));
        }

        let rate = self.config.sample_rate;
        let frames = ms_to_frames(self.duration_ms(text), rate);
        let step = 2.0 * PI * self.config.frequency_hz / rate as f32;
        let samples = (0..frames)
            .map(|i| (step * i as f32).sin() * self.config.amplitude)
            .collect();

        Ok(RenderedClip::new(samples, rate))
    }
}
