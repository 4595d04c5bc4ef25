//! The shared output buffer and the placement rules that fill it.
//!
//! Placement rules, applied per clip in the order clips are handed in:
//! 1. a timed clip starting past the current end pads the buffer with silence up to its start
//! 2. the clip is mixed additively from its start, growing the buffer when it runs past the end
//! 3. an untimed clip is appended at the current end
//!
//! Overlapping clips are summed sample-for-sample. No gain correction is applied, so loud
//! overlaps can exceed `[-1.0, 1.0]`; the export sink clamps at encode time.
//!
//! Out-of-order timestamps are placed in the order given. A clip whose start lies before the
//! current end is simply mixed over whatever is already there.
//!
//! A placement is rejected, leaving the timeline untouched, when the clip's sample rate differs
//! from the timeline's or when the clip would end past the timeline's ceiling.

use serde::Serialize;

use crate::clip::{AdjustedClip, frames_to_ms, ms_to_frames};
use crate::error::{Error, Result};
use crate::opts::DEFAULT_MAX_TIMELINE_MS;

/// Where one cue's samples landed.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub index: u32,
    pub start_sample: usize,
    pub len: usize,
    /// `true` when the cue had no usable start and was appended sequentially.
    pub sequential: bool,
}

impl Placement {
    pub fn end_sample(&self) -> usize {
        self.start_sample + self.len
    }
}

/// A growing mono sample buffer.
#[derive(Debug, Clone)]
pub struct Timeline {
    samples: Vec<f32>,
    sample_rate: u32,
    max_ms: u64,
    placements: Vec<Placement>,
}

impl Timeline {
    /// An empty timeline capped at [`DEFAULT_MAX_TIMELINE_MS`].
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            max_ms: DEFAULT_MAX_TIMELINE_MS,
            placements: Vec::new(),
        }
    }

    pub fn with_max_ms(mut self, max_ms: u64) -> Self {
        self.max_ms = max_ms;
        self
    }

    /// Place every `(index, start_ms, clip)` in iteration order, stopping at the first
    /// rejected placement.
    pub fn place_all<I>(sample_rate: u32, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, Option<u64>, AdjustedClip)>,
    {
        let mut timeline = Self::new(sample_rate);
        for (index, start_ms, clip) in items {
            timeline.place(index, start_ms, &clip)?;
        }
        Ok(timeline)
    }

    /// Place one clip and return where it landed.
    ///
    /// Fails with [`Error::SampleRateMismatch`] or [`Error::TimelineLimit`]; in both cases the
    /// timeline is left as it was.
    pub fn place(
        &mut self,
        index: u32,
        start_ms: Option<u64>,
        clip: &AdjustedClip,
    ) -> Result<Placement> {
        if clip.sample_rate() != self.sample_rate {
            return Err(Error::SampleRateMismatch {
                index,
                clip_rate: clip.sample_rate(),
                timeline_rate: self.sample_rate,
            });
        }

        let end_ms = match start_ms {
            Some(ms) => ms.saturating_add(clip.duration_ms()),
            None => frames_to_ms(self.samples.len() + clip.len(), self.sample_rate),
        };
        if end_ms > self.max_ms {
            return Err(Error::TimelineLimit {
                index,
                end_ms,
                limit_ms: self.max_ms,
            });
        }

        let (start, sequential) = match start_ms {
            Some(ms) => (ms_to_frames(ms, self.sample_rate), false),
            None => (self.samples.len(), true),
        };

        if start > self.samples.len() {
            self.samples.resize(start, 0.0);
        }

        let end = start + clip.len();
        if end > self.samples.len() {
            self.samples.resize(end, 0.0);
        }

        for (dst, src) in self.samples[start..end].iter_mut().zip(clip.samples()) {
            *dst += *src;
        }

        let placement = Placement {
            index,
            start_sample: start,
            len: clip.len(),
            sequential,
        };
        self.placements.push(placement);
        Ok(placement)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        frames_to_ms(self.samples.len(), self.sample_rate)
    }

    /// Placements in the order they were applied.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Hand the finished buffer over (to an export sink, typically).
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
