//! High-level API for narrating subtitles.
//!
//! `Narrator` wires parse → render → adjust → composite:
//! - rendering (plus the compress-only adjustment) runs on a bounded pool of scoped workers
//! - finished clips flow over a channel to the calling thread, which is the only writer of the
//!   `Timeline`
//! - clips are placed in ascending cue index order no matter which render finishes first, so
//!   additive mixing is reproducible run to run
//!
//! A failed render aborts the job under `FailurePolicy::FailFast` (the default). With
//! `FailurePolicy::Partial` the failed cue stays silent and shows up in `Narration::failures`.
//! A rejected placement (see [`Timeline::place`]) aborts the job under either policy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use tracing::{Span, debug, error, info, info_span, warn};

use crate::clip::{AdjustedClip, RenderedClip, frames_to_ms};
use crate::cue::Cue;
use crate::error::{Error, RenderError, Result};
use crate::opts::{FailurePolicy, Mode, Opts};
use crate::renderer::Renderer;
use crate::report::CueReport;
use crate::srt;
use crate::stretch::adjust;
use crate::timeline::{Placement, Timeline};

/// Index recorded for the single placement of a full-track narration.
pub const FULL_TRACK_INDEX: u32 = 0;

/// A cue together with the adjusted clip that was placed for it.
#[derive(Debug, Clone)]
pub struct CueClip {
    pub cue: Cue,
    pub clip: AdjustedClip,
}

/// A cue whose render failed under [`FailurePolicy::Partial`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueFailure {
    pub index: u32,
    pub message: String,
}

/// The outcome of a narration job.
#[derive(Debug, Clone)]
pub struct Narration {
    mode: Mode,
    cues: Vec<Cue>,
    timeline: Timeline,
    clips: Vec<CueClip>,
    failures: Vec<CueFailure>,
}

impl Narration {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The cues this narration was built from, in input order.
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    /// Where the cue with this index landed, if it was placed.
    pub fn placement(&self, index: u32) -> Option<Placement> {
        self.timeline
            .placements()
            .iter()
            .copied()
            .find(|p| p.index == index)
    }

    /// Per-cue clips in placement order. Empty in full-track mode.
    pub fn clips(&self) -> &[CueClip] {
        &self.clips
    }

    /// Cues that failed to render (only ever non-empty under `FailurePolicy::Partial`).
    pub fn failures(&self) -> &[CueFailure] {
        &self.failures
    }

    /// One report per cue, in placement order, failures included.
    pub fn reports(&self) -> Vec<CueReport> {
        let rate = self.timeline.sample_rate();
        let mut reports: Vec<(u32, CueReport)> = Vec::with_capacity(self.cues.len());
        // Clips and placements are pushed together, so they line up one to one.
        for (cc, placement) in self.clips.iter().zip(self.timeline.placements()) {
            reports.push((
                cc.cue.index,
                CueReport {
                    index: cc.cue.index,
                    text: cc.cue.text.clone(),
                    start_ms: cc.cue.start_ms,
                    end_ms: cc.cue.end_ms,
                    placed_at_ms: Some(frames_to_ms(placement.start_sample, rate)),
                    clip_ms: Some(cc.clip.duration_ms()),
                    compressed: cc.clip.was_compressed(),
                    sequential: placement.sequential,
                    file: None,
                    error: None,
                },
            ));
        }

        for failure in &self.failures {
            let cue = self.cues.iter().find(|c| c.index == failure.index);
            reports.push((
                failure.index,
                CueReport {
                    index: failure.index,
                    text: cue.map(|c| c.text.clone()).unwrap_or_default(),
                    start_ms: cue.and_then(|c| c.start_ms),
                    end_ms: cue.and_then(|c| c.end_ms),
                    placed_at_ms: None,
                    clip_ms: None,
                    compressed: false,
                    sequential: false,
                    file: None,
                    error: Some(failure.message.clone()),
                },
            ));
        }

        // Stable: equal indices keep placement order.
        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, r)| r).collect()
    }
}

/// The main narration entry point.
///
/// Construct once with a renderer, then narrate any number of subtitle documents.
pub struct Narrator<R: Renderer> {
    renderer: R,
}

impl<R: Renderer> Narrator<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Parse subtitle text and narrate it.
    pub fn narrate(&self, subtitles: &str, opts: &Opts) -> Result<Narration> {
        let cues = srt::parse_all(subtitles)?;
        self.narrate_cues(cues, opts)
    }

    /// Narrate already-parsed cues.
    pub fn narrate_cues(&self, cues: Vec<Cue>, opts: &Opts) -> Result<Narration> {
        if cues.is_empty() {
            return Err(Error::EmptyInput);
        }
        if !self.renderer.supports_voice(&opts.voice) {
            return Err(Error::UnsupportedVoice(opts.voice.to_string()));
        }

        let span = info_span!("narrate", cues = cues.len(), mode = ?opts.mode, voice = %opts.voice);
        let _guard = span.enter();

        if opts.mode == Mode::Aligned {
            check_timeline_limit(&cues, opts.max_timeline_ms)?;
        }

        let narration = match opts.mode {
            Mode::Aligned => self.narrate_aligned(cues, opts)?,
            Mode::FullTrack => self.narrate_full_track(cues, opts)?,
        };

        info!(
            placed = narration.timeline.placements().len(),
            failed = narration.failures.len(),
            duration_ms = narration.timeline.duration_ms(),
            "narration complete"
        );
        Ok(narration)
    }

    fn narrate_full_track(&self, cues: Vec<Cue>, opts: &Opts) -> Result<Narration> {
        let text = cues
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let clip = self
            .renderer
            .render(&text, &opts.voice)
            .and_then(|clip| check_rate(clip, opts.sample_rate))
            .map_err(Error::FullTrackSynthesis)?;

        let clip = adjust(clip, None)?;
        let mut timeline = Timeline::new(opts.sample_rate).with_max_ms(opts.max_timeline_ms);
        timeline.place(FULL_TRACK_INDEX, None, &clip)?;

        Ok(Narration {
            mode: Mode::FullTrack,
            cues,
            timeline,
            clips: Vec::new(),
            failures: Vec::new(),
        })
    }

    fn narrate_aligned(&self, cues: Vec<Cue>, opts: &Opts) -> Result<Narration> {
        let fail_fast = opts.failure_policy == FailurePolicy::FailFast;
        let workers = opts.concurrency.clamp(1, cues.len());

        // Placement order: ascending cue index, input order for ties.
        let mut order: Vec<usize> = (0..cues.len()).collect();
        order.sort_by_key(|&slot| cues[slot].index);

        let cursor = AtomicUsize::new(0);
        let cancel = AtomicBool::new(false);
        let (tx, rx) = mpsc::sync_channel::<(usize, Result<AdjustedClip>)>(workers * 2);

        let mut timeline = Timeline::new(opts.sample_rate).with_max_ms(opts.max_timeline_ms);
        let mut clips: Vec<CueClip> = Vec::with_capacity(cues.len());
        let mut failures: Vec<CueFailure> = Vec::new();
        let mut first_error: Option<(usize, Error)> = None;
        let mut placement_error: Option<Error> = None;

        debug!(workers, "starting render workers");
        let job_span = Span::current();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let (cues, order, cursor, cancel) = (&cues, &order, &cursor, &cancel);
                let job_span = &job_span;
                scope.spawn(move || {
                    let _job = job_span.enter();
                    loop {
                        if cancel.load(Ordering::Acquire) {
                            break;
                        }
                        // Work is handed out in placement order, so when a render fails every
                        // lower-ranked cue has already been picked up and will report back.
                        let pos = cursor.fetch_add(1, Ordering::AcqRel);
                        let Some(&slot) = order.get(pos) else {
                            break;
                        };

                        let result = self.render_cue(&cues[slot], opts);
                        if result.is_err() && fail_fast {
                            cancel.store(true, Ordering::Release);
                        }
                        if tx.send((pos, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Single writer: only this loop touches the timeline.
            let mut pending: BTreeMap<usize, Result<AdjustedClip>> = BTreeMap::new();
            let mut next = 0usize;
            for (pos, result) in rx {
                if let Err(err) = &result {
                    let cue = &cues[order[pos]];
                    if fail_fast {
                        error!(index = cue.index, error = %err, "render failed, aborting narration");
                    } else {
                        warn!(index = cue.index, error = %err, "render failed, leaving cue silent");
                    }
                }
                pending.insert(pos, result);

                while let Some(result) = pending.remove(&next) {
                    let pos = next;
                    next += 1;
                    let cue = &cues[order[pos]];
                    match result {
                        Ok(clip) => {
                            if placement_error.is_some() || (fail_fast && first_error.is_some()) {
                                continue;
                            }
                            if let Err(err) = timeline.place(cue.index, cue.start_ms, &clip) {
                                error!(index = cue.index, error = %err, "placement rejected, aborting narration");
                                cancel.store(true, Ordering::Release);
                                placement_error = Some(err);
                                continue;
                            }
                            clips.push(CueClip {
                                cue: cue.clone(),
                                clip,
                            });
                        }
                        Err(err) => {
                            if !fail_fast {
                                failures.push(CueFailure {
                                    index: cue.index,
                                    message: err.to_string(),
                                });
                            }
                            if first_error.is_none() {
                                first_error = Some((pos, err));
                            }
                        }
                    }
                }
            }
        });

        // Everything below a rejected placement rendered and was placed.
        if let Some(err) = placement_error {
            return Err(err);
        }
        if let Some((_, err)) = first_error {
            if fail_fast || clips.is_empty() {
                return Err(err);
            }
        }

        Ok(Narration {
            mode: Mode::Aligned,
            cues,
            timeline,
            clips,
            failures,
        })
    }

    fn render_cue(&self, cue: &Cue, opts: &Opts) -> Result<AdjustedClip> {
        let span = info_span!("render_cue", index = cue.index);
        let _guard = span.enter();

        let clip = self
            .renderer
            .render(&cue.text, &opts.voice)
            .and_then(|clip| check_rate(clip, opts.sample_rate))
            .map_err(|source| Error::Synthesis {
                index: cue.index,
                source,
            })?;

        debug!(
            native_ms = clip.native_duration_ms(),
            target_ms = ?cue.duration_ms(),
            "rendered cue"
        );
        adjust(clip, cue.duration_ms())
    }
}

/// Reject the job up front when a cue would stretch the timeline past `limit_ms`.
fn check_timeline_limit(cues: &[Cue], limit_ms: u64) -> Result<()> {
    for cue in cues {
        let Some(end_ms) = cue.end_ms.or(cue.start_ms) else {
            continue;
        };
        if end_ms > limit_ms {
            warn!(index = cue.index, end_ms, limit_ms, "cue ends past the timeline limit");
            return Err(Error::TimelineLimit {
                index: cue.index,
                end_ms,
                limit_ms,
            });
        }
    }
    Ok(())
}

fn check_rate(clip: RenderedClip, expected: u32) -> std::result::Result<RenderedClip, RenderError> {
    if clip.sample_rate != expected {
        return Err(RenderError::Backend(format!(
            "clip rendered at {} Hz but the timeline runs at {} Hz",
            clip.sample_rate, expected
        )));
    }
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::tone::ToneRenderer;
    use crate::error::ErrorKind;
    use crate::voice::VoiceId;
    use std::sync::Mutex;
    use std::time::Duration;

    const RATE: u32 = 1_000;

    fn opts() -> Opts {
        Opts::default().with_sample_rate(RATE).with_concurrency(4)
    }

    /// Tone renderer that fails on chosen texts and sleeps to shuffle completion order.
    struct Flaky {
        inner: ToneRenderer,
        fail_on: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl Renderer for Flaky {
        fn render(&self, text: &str, voice: &VoiceId) -> std::result::Result<RenderedClip, RenderError> {
            self.calls.lock().expect("lock").push(text.to_owned());
            // Earlier cues take longer, so they finish last.
            let delay = 40u64.saturating_sub(text.len() as u64 * 5);
            thread::sleep(Duration::from_millis(delay));
            if self.fail_on.contains(&text) {
                return Err(RenderError::Backend(format!("cannot say {text}")));
            }
            self.inner.render(text, voice)
        }
    }

    fn flaky(fail_on: Vec<&'static str>) -> Flaky {
        Flaky {
            inner: ToneRenderer::fixed(RATE, 100),
            fail_on,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn cues(n: u32) -> Vec<Cue> {
        (1..=n)
            .map(|i| {
                let start = (i as u64 - 1) * 1_000;
                Cue::timed(i, start, start + 500, "x".repeat(i as usize))
            })
            .collect()
    }

    #[test]
    fn places_in_index_order_regardless_of_completion_order() -> anyhow::Result<()> {
        let narrator = Narrator::new(flaky(vec![]));
        let narration = narrator.narrate_cues(cues(6), &opts())?;

        let order: Vec<u32> = narration.timeline().placements().iter().map(|p| p.index).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(narration.timeline().len(), 5_100);
        Ok(())
    }

    #[test]
    fn fail_fast_reports_the_failing_cue() {
        let narrator = Narrator::new(flaky(vec!["xxx"]));
        let err = narrator.narrate_cues(cues(5), &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert_eq!(err.cue_index(), Some(3));
    }

    #[test]
    fn partial_policy_places_successes_and_lists_failures() -> anyhow::Result<()> {
        let narrator = Narrator::new(flaky(vec!["xx", "xxxx"]));
        let opts = opts().with_failure_policy(FailurePolicy::Partial);
        let narration = narrator.narrate_cues(cues(5), &opts)?;

        let placed: Vec<u32> = narration.clips().iter().map(|c| c.cue.index).collect();
        assert_eq!(placed, vec![1, 3, 5]);
        let failed: Vec<u32> = narration.failures().iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![2, 4]);

        // Failed cues leave silence behind.
        let tl = narration.timeline();
        assert!(tl.samples()[1_000..2_000].iter().all(|s| *s == 0.0));

        let reports = narration.reports();
        assert_eq!(reports.len(), 5);
        assert!(reports[1].error.is_some());
        assert_eq!(reports[2].placed_at_ms, Some(2_000));
        Ok(())
    }

    #[test]
    fn partial_policy_still_fails_when_nothing_renders() {
        let narrator = Narrator::new(flaky(vec!["x", "xx"]));
        let opts = opts().with_failure_policy(FailurePolicy::Partial);
        let err = narrator.narrate_cues(cues(2), &opts).unwrap_err();
        assert_eq!(err.cue_index(), Some(1));
    }

    #[test]
    fn full_track_renders_joined_text_once() -> anyhow::Result<()> {
        let narrator = Narrator::new(flaky(vec![]));
        let opts = opts().with_mode(Mode::FullTrack);
        let narration = narrator.narrate_cues(cues(3), &opts)?;

        let calls = narrator.renderer().calls.lock().expect("lock").clone();
        assert_eq!(calls, vec!["x xx xxx".to_owned()]);
        assert_eq!(narration.timeline().len(), 100);
        assert!(narration.clips().is_empty());
        assert_eq!(
            narration.placement(FULL_TRACK_INDEX).map(|p| p.sequential),
            Some(true)
        );
        Ok(())
    }

    #[test]
    fn mismatched_sample_rate_is_a_synthesis_error() {
        let narrator = Narrator::new(ToneRenderer::fixed(8_000, 100));
        let err = narrator.narrate_cues(cues(1), &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert!(err.to_string().contains("8000 Hz"));
    }

    #[test]
    fn far_future_cue_is_rejected_before_rendering() {
        let narrator = Narrator::new(flaky(vec![]));
        let mut input = cues(2);
        input.push(Cue::timed(3, 356_400_000, 356_401_000, "late"));

        let err = narrator.narrate_cues(input, &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeline);
        assert_eq!(err.cue_index(), Some(3));
        assert!(narrator.renderer().calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn timeline_limit_is_configurable() -> anyhow::Result<()> {
        let narrator = Narrator::new(flaky(vec![]));

        let err = narrator
            .narrate_cues(cues(3), &opts().with_max_timeline_ms(2_000))
            .unwrap_err();
        assert_eq!(err.cue_index(), Some(3));

        let narration = narrator.narrate_cues(cues(3), &opts().with_max_timeline_ms(2_500))?;
        assert_eq!(narration.timeline().len(), 2_100);
        Ok(())
    }

    #[test]
    fn untimed_cue_growing_past_the_limit_aborts_even_when_partial() {
        // Timed cues pass the up-front check; the appended one only fails at placement.
        let narrator = Narrator::new(flaky(vec![]));
        let input = vec![
            Cue::timed(1, 0, 100, "x"),
            Cue::timed(2, 1_000, 1_100, "xx"),
            Cue::untimed(3, "xxx"),
        ];
        let opts = opts()
            .with_failure_policy(FailurePolicy::Partial)
            .with_max_timeline_ms(1_150);

        let err = narrator.narrate_cues(input, &opts).unwrap_err();
        assert!(matches!(err, Error::TimelineLimit { index: 3, end_ms: 1_200, .. }));
    }

    #[test]
    fn empty_cue_list_is_empty_input() {
        let narrator = Narrator::new(ToneRenderer::default());
        let err = narrator.narrate_cues(Vec::new(), &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn long_renders_are_compressed_into_their_cue() -> anyhow::Result<()> {
        // Every render lasts 800 ms; cues last 500 ms.
        let narrator = Narrator::new(ToneRenderer::fixed(RATE, 800));
        let narration = narrator.narrate_cues(cues(2), &opts())?;
        for cc in narration.clips() {
            assert!(cc.clip.was_compressed());
            assert!(cc.clip.len().abs_diff(500) <= 1);
        }
        Ok(())
    }
}
