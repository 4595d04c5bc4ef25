use serde::Serialize;

use crate::Result;

/// Per-cue outcome of a narration job.
///
/// One record per cue: where its audio landed, whether it had to be sped up, or why it failed.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CueReport {
    pub index: u32,
    pub text: String,
    /// Source timestamps (absent for cues whose timing couldn't be parsed).
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    /// Where the clip actually starts on the timeline.
    pub placed_at_ms: Option<u64>,
    /// Length of the placed clip.
    pub clip_ms: Option<u64>,
    pub compressed: bool,
    pub sequential: bool,
    /// Archive entry name for this cue's clip, in bundle exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Streams [`CueReport`]s to some output format.
pub trait ReportEncoder {
    fn write_report(&mut self, report: &CueReport) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Write every report, then close the encoder. The close still runs when a write fails.
pub fn write_reports(encoder: &mut dyn ReportEncoder, reports: &[CueReport]) -> Result<()> {
    let run_res = reports.iter().try_for_each(|r| encoder.write_report(r));
    let close_res = encoder.close();
    run_res.and(close_res)
}
