//! Compress-only time adjustment for rendered clips.
//!
//! Speech that runs longer than its cue is sped up (a plain playback-rate change, pitch is
//! not preserved) so it ends when the cue ends. Speech that already fits is left alone:
//! under-filling a slot leaves silence, over-filling would spill into the next cue.
//!
//! There is no lower bound on the compression ratio. A long render squeezed into a tiny cue
//! is compressed as far as it takes.

use anyhow::{Context, anyhow, bail};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::Result;
use crate::clip::{AdjustedClip, RenderedClip, ms_to_frames};

/// Source frames fed to rubato per `process()` call.
const CHUNK_FRAMES: usize = 1024;

/// Upper bound on flush calls once input is exhausted.
const MAX_FLUSH_CALLS: usize = 64;

/// Fit `clip` into `target_ms`.
///
/// - `None` target: passthrough.
/// - clip fits (ratio `native / target <= 1`): passthrough, sample-for-sample.
/// - clip too long: compressed to exactly `target_ms` worth of frames.
pub fn adjust(clip: RenderedClip, target_ms: Option<u64>) -> Result<AdjustedClip> {
    let Some(target_ms) = target_ms else {
        return Ok(AdjustedClip::untouched(clip));
    };

    let target_frames = ms_to_frames(target_ms, clip.sample_rate);
    if clip.len() <= target_frames {
        return Ok(AdjustedClip::untouched(clip));
    }

    debug!(
        native_frames = clip.len(),
        target_frames,
        ratio = clip.len() as f64 / target_frames.max(1) as f64,
        "compressing clip"
    );

    let samples = compress(&clip.samples, target_frames)?;
    Ok(AdjustedClip::compressed(RenderedClip::new(
        samples,
        clip.sample_rate,
    )))
}

/// Resample `input` so it spans exactly `target_frames` frames at the same sample rate.
fn compress(input: &[f32], target_frames: usize) -> anyhow::Result<Vec<f32>> {
    if target_frames == 0 || input.is_empty() {
        return Ok(Vec::new());
    }

    let ratio = target_frames as f64 / input.len() as f64;
    let mut rs = SincFixedIn::<f32>::new(
        ratio,
        1.0,
        SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        },
        CHUNK_FRAMES,
        1, // mono
    )
    .map_err(|e| anyhow!(e))
    .context("failed to init time-stretch resampler")?;

    // `SincFixedIn` output is already aligned with its input; nothing to trim at the front.
    let mut out: Vec<f32> = Vec::with_capacity(target_frames + CHUNK_FRAMES);

    let mut pos = 0;
    while input.len() - pos >= rs.input_frames_next() {
        let n = rs.input_frames_next();
        let block = [&input[pos..pos + n]];
        let chunk = rs
            .process(&block, None)
            .map_err(|e| anyhow!(e))
            .context("time-stretch resampler process failed")?;
        append_mono(&mut out, chunk)?;
        pos += n;
    }

    if pos < input.len() {
        let block = [&input[pos..]];
        let chunk = rs
            .process_partial(Some(&block[..]), None)
            .map_err(|e| anyhow!(e))
            .context("time-stretch resampler failed on tail")?;
        append_mono(&mut out, chunk)?;
    }

    // Drain the filter until the output covers the whole target.
    let mut flushes = 0;
    while out.len() < target_frames && flushes < MAX_FLUSH_CALLS {
        let chunk = rs
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| anyhow!(e))
            .context("time-stretch resampler failed to flush")?;
        append_mono(&mut out, chunk)?;
        flushes += 1;
    }

    out.resize(target_frames, 0.0);
    Ok(out)
}

fn append_mono(out: &mut Vec<f32>, mut chunk: Vec<Vec<f32>>) -> anyhow::Result<()> {
    if chunk.len() != 1 {
        bail!("expected mono output from resampler");
    }
    out.append(&mut chunk[0]);
    Ok(())
}
