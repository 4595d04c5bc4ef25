use std::error::Error as StdError;

use thiserror::Error;

/// Cuecast's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Cuecast's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
///
/// `Display` gives the single human-readable message; [`Error::kind`] gives the
/// machine-distinguishable category.
#[derive(Debug, Error)]
pub enum Error {
    /// A caption block lacks required lines. The parser skips these; they only surface
    /// through diagnostics.
    #[error("malformed caption block #{block}: {reason}")]
    MalformedCue { block: usize, reason: &'static str },

    /// A timing line was present but could not be parsed.
    #[error("cue {index}: unparsable timing line '{line}'")]
    TimingParse { index: u32, line: String },

    /// Every caption block was dropped (or the input was empty).
    #[error("subtitle input contains no usable cues")]
    EmptyInput,

    /// The renderer does not accept the requested voice.
    #[error("voice '{0}' is not supported by the configured renderer")]
    UnsupportedVoice(String),

    /// Speech rendering failed for a cue.
    #[error("speech synthesis failed for cue {index}: {source}")]
    Synthesis {
        index: u32,
        #[source]
        source: RenderError,
    },

    /// Speech rendering failed for the concatenated full-track text.
    #[error("speech synthesis failed for full track: {0}")]
    FullTrackSynthesis(#[source] RenderError),

    /// A clip was placed on a timeline running at a different sample rate.
    #[error("cue {index}: clip is {clip_rate} Hz but the timeline runs at {timeline_rate} Hz")]
    SampleRateMismatch {
        index: u32,
        clip_rate: u32,
        timeline_rate: u32,
    },

    /// Placing a cue would grow the timeline past its configured ceiling.
    #[error("cue {index} ends at {end_ms} ms, past the {limit_ms} ms timeline limit")]
    TimelineLimit { index: u32, end_ms: u64, limit_ms: u64 },

    /// Rendered audio could not be decoded into samples.
    #[error("failed to decode rendered audio: {0}")]
    Decode(String),

    /// The final buffer could not be encoded or written.
    #[error("export failed: {0}")]
    Export(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Machine-readable category for an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedCue,
    TimingParse,
    EmptyInput,
    Synthesis,
    Timeline,
    Decode,
    Export,
    Other,
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn export(message: impl Into<String>) -> Self {
        Self::Export(message.into())
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedCue { .. } => ErrorKind::MalformedCue,
            Self::TimingParse { .. } => ErrorKind::TimingParse,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::UnsupportedVoice(_) | Self::Synthesis { .. } | Self::FullTrackSynthesis(_) => {
                ErrorKind::Synthesis
            }
            Self::SampleRateMismatch { .. } | Self::TimelineLimit { .. } => ErrorKind::Timeline,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Export(_) => ErrorKind::Export,
            Self::Message(_) | Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Index of the cue this error refers to, when there is one.
    pub fn cue_index(&self) -> Option<u32> {
        match self {
            Self::TimingParse { index, .. }
            | Self::Synthesis { index, .. }
            | Self::SampleRateMismatch { index, .. }
            | Self::TimelineLimit { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Failure reported by a [`crate::renderer::Renderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("text rejected by backend: {0}")]
    BadText(String),

    #[error("unknown voice '{0}'")]
    UnsupportedVoice(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("could not decode backend output: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Self::Export(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Export(err.to_string())
    }
}
