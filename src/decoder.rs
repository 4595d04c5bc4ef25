//! Decode rendered speech (any container Symphonia understands) into mono `f32` at the
//! timeline's sample rate.
//!
//! `media` probes and decodes; `audio_pipeline` downmixes, resamples and chunks.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use symphonia::core::io::{MediaSource, ReadOnlySource};

use crate::audio_pipeline::AudioPipeline;
use crate::clip::RenderedClip;
use crate::error::Error;
use crate::media::SpeechReader;

/// Consumer callback for decoded samples.
///
/// The sink receives **mono** `f32` samples at the pipeline's target rate.
/// Returning `Ok(false)` signals "stop decoding early".
pub trait SamplesSink {
    fn on_samples(&mut self, samples_mono: &[f32]) -> Result<bool>;
}

/// Decode configuration.
#[derive(Debug, Clone)]
pub struct DecodeOpts {
    /// Output sample rate (Hz).
    pub target_rate: u32,

    /// Chunk size handed to the sink, in output frames.
    pub target_chunk_frames: usize,

    /// Optional container hint (e.g. "mp3", "wav", "ogg").
    pub hint_extension: Option<String>,
}

impl DecodeOpts {
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            target_chunk_frames: 4096,
            hint_extension: None,
        }
    }
}

/// Decode a file on disk into a mono clip.
///
/// The file extension is used as a probe hint when present. Failures surface as
/// [`Error::Decode`].
pub fn decode_file_to_clip(path: &Path, target_rate: u32) -> crate::Result<RenderedClip> {
    let file = File::open(path)
        .with_context(|| format!("failed to open rendered audio '{}'", path.display()))
        .map_err(decode_error)?;

    let mut opts = DecodeOpts::new(target_rate);
    opts.hint_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_owned);

    let mut samples = Vec::new();
    let mut sink = VecSamplesSink::new(&mut samples);
    decode_impl(Box::new(file), &opts, &mut sink).map_err(decode_error)?;
    Ok(RenderedClip::new(samples, target_rate))
}

/// Decode an unseekable byte stream into a mono clip.
///
/// Failures surface as [`Error::Decode`].
pub fn decode_read_to_clip<R>(reader: R, opts: &DecodeOpts) -> crate::Result<RenderedClip>
where
    R: Read + Send + 'static,
{
    let mut samples = Vec::new();
    let mut sink = VecSamplesSink::new(&mut samples);
    decode_to_stream_from_read(reader, opts, &mut sink).map_err(decode_error)?;
    Ok(RenderedClip::new(samples, opts.target_rate))
}

fn decode_error(err: anyhow::Error) -> Error {
    Error::Decode(format!("{err:#}"))
}

/// Decode an unseekable input stream and emit normalized chunks into `sink`.
pub fn decode_to_stream_from_read<R>(
    reader: R,
    opts: &DecodeOpts,
    sink: &mut dyn SamplesSink,
) -> Result<()>
where
    R: Read + Send + 'static,
{
    // Symphonia's `MediaSource` is `Read + Send + Sync`. We only need to *move* the reader,
    // so we wrap it in a mutex to satisfy `Sync`.
    let source = ReadOnlySource::new(LockedRead::new(reader));
    decode_impl(Box::new(source), opts, sink)
}

/// Shared implementation that takes an abstract Symphonia `MediaSource`.
fn decode_impl(
    source: Box<dyn MediaSource>,
    opts: &DecodeOpts,
    sink: &mut dyn SamplesSink,
) -> Result<()> {
    let mut reader = SpeechReader::open(source, opts.hint_extension.as_deref())?;
    let mut pipeline = AudioPipeline::new(opts.target_rate);

    loop {
        let more = reader.next_buffer(|decoded| {
            pipeline
                .push_decoded_and_emit(&decoded, opts.target_chunk_frames, |chunk| {
                    sink.on_samples(chunk)
                })
                .context("audio pipeline failed while processing decoded samples")
        })?;
        if !more {
            break;
        }
    }

    pipeline
        .finalize(opts.target_chunk_frames, |chunk| sink.on_samples(chunk))
        .context("audio pipeline failed during finalize")?;

    Ok(())
}

/// Appends decoded chunks into a `Vec<f32>`.
struct VecSamplesSink<'a> {
    out: &'a mut Vec<f32>,
}

impl<'a> VecSamplesSink<'a> {
    fn new(out: &'a mut Vec<f32>) -> Self {
        Self { out }
    }
}

impl SamplesSink for VecSamplesSink<'_> {
    fn on_samples(&mut self, samples_mono: &[f32]) -> Result<bool> {
        self.out.extend_from_slice(samples_mono);
        Ok(true)
    }
}

struct LockedRead<R> {
    inner: Mutex<R>,
}

impl<R> LockedRead<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl<R: Read> Read for LockedRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| std::io::Error::other("decoder input mutex poisoned"))?
            .read(buf)
    }
}
