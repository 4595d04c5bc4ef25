//! Audio normalization pipeline for rendered speech.
//!
//! Responsibilities:
//! - Convert Symphonia-decoded PCM into interleaved `f32`
//! - Downmix to mono
//! - Resample to the timeline's sample rate (when needed)
//! - Emit fixed-size chunks via a callback (incremental consumption)
//!
//! Notes:
//! - `finalize()` should be called at end-of-stream to flush any remaining resampler input.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Default timeline sample rate (Hz). Edge neural voices render at 24 kHz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// A small stateful pipeline that converts decoded audio into mono `f32` chunks at a fixed rate.
pub struct AudioPipeline {
    target_rate: u32,

    // Scratch buffer used to copy decoded PCM into an interleaved `Vec<f32>`.
    sample_buf_f32: Option<SampleBuffer<f32>>,

    // Lazily initialized resampler (only needed when the source rate != target rate).
    resampler: Option<SincFixedIn<f32>>,

    // Accumulator for mono source samples before feeding full blocks into rubato.
    mono_src_acc: Vec<f32>,

    // Source rate seen by the resampler, and frame counts in/out, so `finalize()` can trim
    // block padding back off the tail.
    src_rate: u32,
    src_frames: usize,
    out_frames: usize,
}

impl AudioPipeline {
    /// Create a pipeline that emits mono samples at `target_rate`.
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            sample_buf_f32: None,
            resampler: None,
            mono_src_acc: Vec::new(),
            src_rate: 0,
            src_frames: 0,
            out_frames: 0,
        }
    }

    /// Push a decoded Symphonia buffer through the pipeline and emit mono chunks.
    ///
    /// Returning `Ok(false)` from `emit` signals “stop early”.
    pub fn push_decoded_and_emit(
        &mut self,
        decoded: &AudioBufferRef<'_>,
        target_chunk_frames: usize,
        mut emit: impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        let (interleaved, src_rate, channels) =
            decoded_to_interleaved_f32(decoded, &mut self.sample_buf_f32)?;

        let mono_src = downmix_to_mono(&interleaved, channels);

        // Fast path: already at the target sample rate.
        if src_rate == self.target_rate {
            emit_mono_chunks(&mono_src, target_chunk_frames, &mut emit)?;
            return Ok(());
        }

        self.ensure_resampler(src_rate)?;
        self.push_and_flush_resampler(&mono_src, target_chunk_frames, &mut emit)?;
        Ok(())
    }

    /// Flush remaining buffered samples at end-of-stream.
    ///
    /// If resampling was never needed, this is a no-op.
    pub fn finalize(
        &mut self,
        target_chunk_frames: usize,
        mut emit: impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        let Some(rs) = self.resampler.as_mut() else {
            return Ok(());
        };

        // rubato expects exact block sizes; pad the remainder with zeros, plus one block of
        // silence so the last source frames reach the output.
        let in_max = rs.input_frames_max();
        let rem = self.mono_src_acc.len() % in_max;
        if rem != 0 {
            self.mono_src_acc
                .resize(self.mono_src_acc.len() + (in_max - rem), 0.0);
        }
        self.mono_src_acc
            .resize(self.mono_src_acc.len() + in_max, 0.0);

        let expected =
            (self.src_frames as u64 * self.target_rate as u64).div_ceil(self.src_rate as u64);
        let expected = expected as usize;

        while !self.mono_src_acc.is_empty() {
            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let mut out = self.resample_block(&block)?;
            let room = expected.saturating_sub(self.out_frames);
            out.truncate(room);
            self.out_frames += out.len();
            emit_mono_chunks(&out, target_chunk_frames, &mut emit)?;
        }

        Ok(())
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        // How many source frames we feed rubato per `process()` call.
        let in_chunk_src_frames = 2048;

        let rs = SincFixedIn::<f32>::new(
            self.target_rate as f64 / src_rate as f64,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            in_chunk_src_frames,
            1, // mono
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.src_rate = src_rate;
        self.resampler = Some(rs);
        Ok(())
    }

    fn push_and_flush_resampler(
        &mut self,
        mono_src: &[f32],
        target_chunk_frames: usize,
        emit: &mut impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        self.mono_src_acc.extend_from_slice(mono_src);
        self.src_frames += mono_src.len();

        loop {
            let rs = self
                .resampler
                .as_ref()
                .ok_or_else(|| anyhow!("resampler not initialized"))?;
            let in_max = rs.input_frames_max();

            if self.mono_src_acc.len() < in_max {
                break;
            }

            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let out = self.resample_block(&block)?;
            self.out_frames += out.len();

            for chunk in out.chunks(target_chunk_frames) {
                if !emit(chunk)? {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Resample one mono block.
    fn resample_block(&mut self, mono_src_block: &[f32]) -> Result<Vec<f32>> {
        let rs = self
            .resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler not initialized"))?;

        let input = [mono_src_block];
        let mut out = rs
            .process(&input, None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        if out.len() != 1 {
            bail!("expected mono output from resampler");
        }

        Ok(std::mem::take(&mut out[0]))
    }
}

fn decoded_to_interleaved_f32(
    decoded: &AudioBufferRef<'_>,
    sample_buf_f32: &mut Option<SampleBuffer<f32>>,
) -> Result<(Vec<f32>, u32, usize)> {
    ensure_sample_buffer(decoded, sample_buf_f32);

    let buf = sample_buf_f32
        .as_mut()
        .ok_or_else(|| anyhow!("sample buffer not initialized"))?;

    buf.copy_interleaved_ref(decoded.clone());

    let src_rate = decoded.spec().rate;
    let channels = decoded.spec().channels.count();
    if channels == 0 {
        bail!("decoded audio had zero channels");
    }

    Ok((buf.samples().to_vec(), src_rate, channels))
}

fn ensure_sample_buffer(
    decoded: &AudioBufferRef<'_>,
    sample_buf_f32: &mut Option<SampleBuffer<f32>>,
) {
    // Packets can grow (e.g. an MP3 stream switching frame sizes); reallocate when needed.
    let needed = decoded.capacity() * decoded.spec().channels.count();
    if let Some(buf) = sample_buf_f32.as_ref() {
        if buf.capacity() >= needed {
            return;
        }
    }

    let spec = *decoded.spec();
    let duration = decoded.capacity() as u64;
    *sample_buf_f32 = Some(SampleBuffer::<f32>::new(duration, spec));
}

/// Downmix interleaved samples into mono by averaging channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Emit mono samples to the callback in fixed-size chunks.
fn emit_mono_chunks(
    mono: &[f32],
    chunk_frames: usize,
    emit: &mut impl FnMut(&[f32]) -> Result<bool>,
) -> Result<()> {
    for chunk in mono.chunks(chunk_frames) {
        if !emit(chunk)? {
            break;
        }
    }
    Ok(())
}
