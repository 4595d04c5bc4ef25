use serde::Serialize;

/// A single subtitle entry.
///
/// Timing is optional: a cue whose timing line was missing or unparsable keeps its text but
/// is placed sequentially instead of at a timestamp.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 1-based index from the caption block.
    pub index: u32,
    /// Start offset in milliseconds.
    pub start_ms: Option<u64>,
    /// End offset in milliseconds (always greater than `start_ms` when both are set).
    pub end_ms: Option<u64>,
    /// Caption text, multi-line captions joined with a single space.
    pub text: String,
}

impl Cue {
    pub fn timed(index: u32, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
            text: text.into(),
        }
    }

    pub fn untimed(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms: None,
            end_ms: None,
            text: text.into(),
        }
    }

    /// `end - start`, or `None` for a duration-less cue.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) if end > start => Some(end - start),
            _ => None,
        }
    }
}
