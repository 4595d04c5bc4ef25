/// Mono speech audio produced by a renderer.
///
/// Samples are `f32` in roughly `[-1.0, 1.0]`. Ownership moves from the renderer to the
/// adjuster; clips are never shared between stages.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RenderedClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn native_duration_ms(&self) -> u64 {
        frames_to_ms(self.samples.len(), self.sample_rate)
    }
}

/// A clip after the compress-only speed policy has been applied.
///
/// Its duration never exceeds the native duration of the clip it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedClip {
    clip: RenderedClip,
    compressed: bool,
}

impl AdjustedClip {
    pub(crate) fn untouched(clip: RenderedClip) -> Self {
        Self {
            clip,
            compressed: false,
        }
    }

    pub(crate) fn compressed(clip: RenderedClip) -> Self {
        Self {
            clip,
            compressed: true,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.clip.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.clip.sample_rate
    }

    pub fn len(&self) -> usize {
        self.clip.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clip.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.clip.native_duration_ms()
    }

    /// Whether the adjuster had to speed this clip up.
    pub fn was_compressed(&self) -> bool {
        self.compressed
    }

    pub fn into_inner(self) -> RenderedClip {
        self.clip
    }
}

pub(crate) fn frames_to_ms(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (frames as u128 * 1_000 / sample_rate as u128) as u64
}

/// Milliseconds to a frame count at `sample_rate`, rounded to the nearest frame.
pub(crate) fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    ((ms as u128 * sample_rate as u128 + 500) / 1_000) as usize
}
