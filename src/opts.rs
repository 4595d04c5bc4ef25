use crate::audio_pipeline::DEFAULT_SAMPLE_RATE;
use crate::voice::{Voice, VoiceId};

/// Default ceiling on narration length: four hours.
pub const DEFAULT_MAX_TIMELINE_MS: u64 = 4 * 60 * 60 * 1_000;

/// How cues are turned into audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Mode {
    /// One render per cue, each placed at its cue's timestamp.
    #[default]
    Aligned,

    /// One render of all cue texts joined with spaces, with no timestamp alignment.
    FullTrack,
}

/// What a single failed render means for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The first failure aborts the job and no narration is produced.
    #[default]
    FailFast,

    /// Failed cues are left silent and reported in [`crate::Narration::failures`].
    /// The job still fails if every cue fails.
    Partial,
}

/// Options that control a narration job.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that other frontends
/// (tests, batch jobs) can construct options programmatically.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Backend voice identifier passed to the renderer unchanged.
    pub voice: VoiceId,

    pub mode: Mode,

    pub failure_policy: FailurePolicy,

    /// Maximum number of renders in flight at once.
    ///
    /// Keep this low for rate-limited network backends. Values below 1 are treated as 1.
    pub concurrency: usize,

    /// Timeline sample rate (Hz). Rendered clips must arrive at this rate.
    pub sample_rate: u32,

    /// Longest timeline the job may build, in milliseconds.
    ///
    /// Cues ending past this are rejected before anything is rendered, so a stray
    /// `99:00:00,000` timestamp cannot allocate hours of silence.
    pub max_timeline_ms: u64,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            voice: VoiceId::from(Voice::default()),
            mode: Mode::default(),
            failure_policy: FailurePolicy::default(),
            concurrency: default_concurrency(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_timeline_ms: DEFAULT_MAX_TIMELINE_MS,
        }
    }
}

impl Opts {
    pub fn with_voice(mut self, voice: impl Into<VoiceId>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_max_timeline_ms(mut self, max_timeline_ms: u64) -> Self {
        self.max_timeline_ms = max_timeline_ms;
        self
    }
}

/// Number of CPUs, capped at 8 so network backends aren't flooded by default.
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}
