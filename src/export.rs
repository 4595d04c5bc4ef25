//! Writing a finished [`Narration`] out.
//!
//! Two artifacts are supported:
//! - `Wav`: the composited timeline as 16-bit mono PCM
//! - `Bundle`: a zip holding `full.wav`, one `<index>.wav` per placed cue, and `manifest.json`
//!   with a [`CueReport`] per cue
//!
//! [`export_to_path`] never leaves a partial file at the destination: output goes to a
//! temporary file next to it and is renamed into place only once complete.

use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::Result;
use crate::error::Error;
use crate::json_array_encoder::JsonArrayEncoder;
use crate::narrator::Narration;
use crate::report::write_reports;

/// Archive entry holding the full timeline.
pub const FULL_TRACK_ENTRY: &str = "full.wav";

/// Archive entry holding the per-cue manifest.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Supported export artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ExportFormat {
    /// A single mono WAV file.
    #[default]
    Wav,

    /// A zip archive with the full track, per-cue clips, and a JSON manifest.
    Bundle,
}

impl ExportFormat {
    /// Infer the format from a file extension (`.wav`, `.zip`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("wav") {
            Some(Self::Wav)
        } else if ext.eq_ignore_ascii_case("zip") {
            Some(Self::Bundle)
        } else {
            None
        }
    }
}

/// A destination for a finished narration.
pub trait ExportSink {
    fn export(&mut self, narration: &Narration) -> Result<()>;
}

/// Writes the composited timeline as one WAV stream.
pub struct WavSink<W: Write + Seek> {
    w: W,
}

impl<W: Write + Seek> WavSink<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write + Seek> ExportSink for WavSink<W> {
    fn export(&mut self, narration: &Narration) -> Result<()> {
        let timeline = narration.timeline();
        write_wav(&mut self.w, timeline.samples(), timeline.sample_rate())
    }
}

/// Writes a zip bundle: full track, per-cue clips, manifest.
pub struct BundleSink<W: Write + Seek> {
    w: Option<W>,
}

impl<W: Write + Seek> BundleSink<W> {
    pub fn new(w: W) -> Self {
        Self { w: Some(w) }
    }

    /// Give back the writer. `None` once an export has consumed it.
    pub fn into_inner(self) -> Option<W> {
        self.w
    }
}

impl<W: Write + Seek> ExportSink for BundleSink<W> {
    fn export(&mut self, narration: &Narration) -> Result<()> {
        let w = self
            .w
            .take()
            .ok_or_else(|| Error::export("bundle sink already used"))?;

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = zip::ZipWriter::new(w);
        let timeline = narration.timeline();

        zip.start_file(FULL_TRACK_ENTRY, options)?;
        zip.write_all(&wav_bytes(timeline.samples(), timeline.sample_rate())?)?;

        let mut reports = narration.reports();
        let mut written = HashSet::new();
        for cc in narration.clips() {
            let index = cc.cue.index;
            // Duplicate indices would collide inside the archive; the first clip wins.
            if !written.insert(index) {
                continue;
            }
            let name = format!("{index}.wav");
            if let Some(report) = reports
                .iter_mut()
                .find(|r| r.index == index && r.error.is_none())
            {
                report.file = Some(name.clone());
            }
            zip.start_file(name, options)?;
            zip.write_all(&wav_bytes(cc.clip.samples(), cc.clip.sample_rate())?)?;
        }

        zip.start_file(MANIFEST_ENTRY, options)?;
        let mut manifest = JsonArrayEncoder::new(&mut zip);
        write_reports(&mut manifest, &reports)?;

        zip.finish()?;
        debug!(clips = narration.clips().len(), "bundle written");
        Ok(())
    }
}

/// Export `narration` to `path`, atomically.
///
/// The destination either ends up holding the complete artifact or is left untouched.
pub fn export_to_path(path: &Path, format: ExportFormat, narration: &Narration) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".cuecast-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| Error::export(format!("cannot create file in {}: {e}", parent.display())))?;

    match format {
        ExportFormat::Wav => WavSink::new(tmp.as_file_mut()).export(narration)?,
        ExportFormat::Bundle => BundleSink::new(tmp.as_file_mut()).export(narration)?,
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path)
        .map_err(|e| Error::export(format!("cannot write {}: {}", path.display(), e.error)))?;

    info!(path = %path.display(), ?format, "narration exported");
    Ok(())
}

fn wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    write_wav(&mut buf, samples, sample_rate)?;
    Ok(buf.into_inner())
}

fn write_wav<W: Write + Seek>(w: W, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::new(w, spec)?;
    for &s in samples {
        // Overlapping cues can sum past full scale.
        let s = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::tone::ToneRenderer;
    use crate::cue::Cue;
    use crate::narrator::Narrator;
    use crate::opts::Opts;
    use std::io::Read;

    const RATE: u32 = 8_000;

    fn narration() -> anyhow::Result<Narration> {
        let narrator = Narrator::new(ToneRenderer::fixed(RATE, 200));
        let cues = vec![
            Cue::timed(1, 0, 1_000, "Hello"),
            Cue::timed(2, 1_500, 2_500, "World"),
        ];
        Ok(narrator.narrate_cues(cues, &Opts::default().with_sample_rate(RATE))?)
    }

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a/out.WAV")), Some(ExportFormat::Wav));
        assert_eq!(ExportFormat::from_path(Path::new("out.zip")), Some(ExportFormat::Bundle));
        assert_eq!(ExportFormat::from_path(Path::new("out.mp3")), None);
        assert_eq!(ExportFormat::from_path(Path::new("out")), None);
    }

    #[test]
    fn wav_sink_writes_the_full_timeline() -> anyhow::Result<()> {
        let narration = narration()?;
        let mut sink = WavSink::new(Cursor::new(Vec::new()));
        sink.export(&narration)?;

        let bytes = sink.into_inner().into_inner();
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, RATE);
        // Cue 2 starts at 1.5 s and lasts 0.2 s.
        assert_eq!(reader.duration(), 13_600);
        Ok(())
    }

    #[test]
    fn clipping_is_clamped_on_export() -> anyhow::Result<()> {
        let bytes = wav_bytes(&[2.0, -2.0, 0.0], RATE)?;
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        assert_eq!(samples, vec![i16::MAX, -i16::MAX, 0]);
        Ok(())
    }

    #[test]
    fn bundle_contains_full_track_clips_and_manifest() -> anyhow::Result<()> {
        let narration = narration()?;
        let mut sink = BundleSink::new(Cursor::new(Vec::new()));
        sink.export(&narration)?;
        let bytes = sink.into_inner().expect("writer").into_inner();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, vec!["1.wav", "2.wav", "full.wav", "manifest.json"]);

        let mut manifest = String::new();
        archive.by_name(MANIFEST_ENTRY)?.read_to_string(&mut manifest)?;
        let parsed: serde_json::Value = serde_json::from_str(&manifest)?;
        let arr = parsed.as_array().expect("array");
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[1]["file"], "2.wav");
        assert_eq!(arr[1]["placed_at_ms"], 1_500);
        Ok(())
    }

    #[test]
    fn bundle_sink_is_single_use() -> anyhow::Result<()> {
        let narration = narration()?;
        let mut sink = BundleSink::new(Cursor::new(Vec::new()));
        sink.export(&narration)?;
        let err = sink.export(&narration).unwrap_err();
        assert!(err.to_string().contains("already used"));
        Ok(())
    }

    #[test]
    fn export_to_path_replaces_destination_atomically() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("narration.wav");
        std::fs::write(&out, b"stale")?;

        export_to_path(&out, ExportFormat::Wav, &narration()?)?;

        let reader = hound::WavReader::open(&out)?;
        assert_eq!(reader.spec().sample_rate, RATE);
        let leftovers = std::fs::read_dir(dir.path())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }

    #[test]
    fn export_into_missing_directory_fails_cleanly() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("missing").join("narration.wav");
        let err = export_to_path(&out, ExportFormat::Wav, &narration()?).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Export);
        assert!(!out.exists());
        Ok(())
    }
}
