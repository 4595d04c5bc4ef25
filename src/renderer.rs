use crate::clip::RenderedClip;
use crate::error::RenderError;
use crate::voice::VoiceId;

/// Pluggable speech-synthesis backend used by [`crate::Narrator`].
///
/// A renderer turns `(text, voice)` into mono speech samples. Calls may block for a long time
/// (network-bound backends) and may fail; the narrator decides what a failure means for the job.
///
/// Renderers are shared across worker threads, so implementations must be `Sync`. Distinct
/// calls must not depend on each other.
pub trait Renderer: Sync {
    /// Render `text` with `voice`.
    ///
    /// The returned clip may use any sample rate; the narrator rejects clips whose rate differs
    /// from the timeline's.
    fn render(&self, text: &str, voice: &VoiceId) -> Result<RenderedClip, RenderError>;

    /// Whether this renderer accepts `voice`. Checked once per job before any rendering starts.
    fn supports_voice(&self, voice: &VoiceId) -> bool {
        let _ = voice;
        true
    }
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, text: &str, voice: &VoiceId) -> Result<RenderedClip, RenderError> {
        (**self).render(text, voice)
    }

    fn supports_voice(&self, voice: &VoiceId) -> bool {
        (**self).supports_voice(voice)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, text: &str, voice: &VoiceId) -> Result<RenderedClip, RenderError> {
        (**self).render(text, voice)
    }

    fn supports_voice(&self, voice: &VoiceId) -> bool {
        (**self).supports_voice(voice)
    }
}
