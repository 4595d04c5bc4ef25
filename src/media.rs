//! Container and codec access for rendered speech, built on Symphonia.
//!
//! [`SpeechReader`] probes a source, picks the first decodable audio track, and hands decoded
//! buffers to a callback one packet at a time.
//!
//! Error policy:
//! - a corrupt frame is skipped, the rest of the clip still decodes
//! - an IO error while reading packets ends the stream (truncated downloads, closed pipes)
//! - anything else is fatal

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Probe buffer size. Symphonia wants a power of two above 32 KiB.
const PROBE_BUFFER_LEN: usize = 64 * 1024;

pub(crate) struct SpeechReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
}

impl SpeechReader {
    /// Probe `source` and prepare a decoder for its first audio track with a known rate.
    pub(crate) fn open(source: Box<dyn MediaSource>, hint_extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(
            source,
            MediaSourceStreamOptions {
                buffer_len: PROBE_BUFFER_LEN,
            },
        );

        let mut hint = Hint::new();
        if let Some(ext) = hint_extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| anyhow!(e))
            .context("failed to probe rendered audio")?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(|| anyhow!("rendered audio has no decodable track"))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| anyhow!(e))
            .context("no decoder for rendered audio codec")?;
        let track_id = track.id;

        Ok(Self {
            format,
            decoder,
            track_id,
        })
    }

    /// Decode the next packet of the selected track and pass the PCM to `on_decoded`.
    ///
    /// Returns `Ok(false)` at end of stream. Packets from other tracks and corrupt frames are
    /// skipped without invoking the callback.
    pub(crate) fn next_buffer(
        &mut self,
        mut on_decoded: impl FnMut(AudioBufferRef<'_>) -> Result<()>,
    ) -> Result<bool> {
        let packet = match self.format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => return Ok(false),
            Err(e) => return Err(anyhow!(e)).context("failed reading packet"),
        };

        if packet.track_id() != self.track_id {
            return Ok(true);
        }

        match self.decoder.decode(&packet) {
            Ok(buf) => on_decoded(buf)?,
            Err(SymphoniaError::DecodeError(_)) | Err(SymphoniaError::IoError(_)) => {}
            Err(e) => return Err(anyhow!(e)).context("decoder failure"),
        }
        Ok(true)
    }
}
