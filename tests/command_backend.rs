#![cfg(unix)]

use std::path::Path;

use cuecast::backends::command::{CommandRenderer, CommandRendererConfig};
use cuecast::{ErrorKind, ExportFormat, FailurePolicy, Narrator, Opts, export_to_path};

const RATE: u32 = 24_000;

const FIVE_CUES: &str = "\
1
00:00:00,000 --> 00:00:01,000
One

2
00:00:01,000 --> 00:00:02,000
Two

3
00:00:02,000 --> 00:00:03,000
Three

4
00:00:03,000 --> 00:00:04,000
Four

5
00:00:04,000 --> 00:00:05,000
Five
";

fn write_fixture(path: &Path, ms: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..(RATE * ms / 1_000) {
        let s = ((i as f32 * 0.1).sin() * 8_000.0) as i16;
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// A stand-in TTS program: copies `fixture` to `{output}`, except for `fail_on`, which exits 3.
fn fake_tts(fixture: &Path, fail_on: &str, scratch: &Path) -> CommandRenderer {
    let script = format!(
        "case \"$1\" in {fail_on}) echo 'rate limited' >&2; exit 3;; esac; cp \"$0\" \"$2\""
    );
    CommandRenderer::new(CommandRendererConfig {
        program: "sh".to_owned(),
        args: vec![
            "-c".to_owned(),
            script,
            fixture.to_string_lossy().into_owned(),
            "{text}".to_owned(),
            "{output}".to_owned(),
        ],
        output_extension: "wav".to_owned(),
        sample_rate: RATE,
        voices: None,
        temp_dir: Some(scratch.to_path_buf()),
    })
}

#[test]
fn fail_fast_leaves_no_artifact_and_no_scratch_files() -> anyhow::Result<()> {
    let fixtures = tempfile::tempdir()?;
    let scratch = tempfile::tempdir()?;
    let out_dir = tempfile::tempdir()?;

    let fixture = fixtures.path().join("speech.wav");
    write_fixture(&fixture, 400)?;
    let out = out_dir.path().join("narration.wav");

    let narrator = Narrator::new(fake_tts(&fixture, "Three", scratch.path()));
    let opts = Opts::default().with_sample_rate(RATE).with_concurrency(2);
    let err = narrator
        .narrate(FIVE_CUES, &opts)
        .and_then(|n| export_to_path(&out, ExportFormat::Wav, &n))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Synthesis);
    assert_eq!(err.cue_index(), Some(3));
    assert!(err.to_string().contains("rate limited"));

    assert!(!out.exists());
    assert_eq!(std::fs::read_dir(out_dir.path())?.count(), 0);
    assert_eq!(std::fs::read_dir(scratch.path())?.count(), 0);
    Ok(())
}

#[test]
fn partial_run_exports_a_bundle_and_cleans_up() -> anyhow::Result<()> {
    let fixtures = tempfile::tempdir()?;
    let scratch = tempfile::tempdir()?;
    let out_dir = tempfile::tempdir()?;

    let fixture = fixtures.path().join("speech.wav");
    write_fixture(&fixture, 400)?;
    let out = out_dir.path().join("narration.zip");

    let narrator = Narrator::new(fake_tts(&fixture, "Three", scratch.path()));
    let opts = Opts::default()
        .with_sample_rate(RATE)
        .with_failure_policy(FailurePolicy::Partial);
    let narration = narrator.narrate(FIVE_CUES, &opts)?;
    let format = ExportFormat::from_path(&out).expect("zip extension");
    export_to_path(&out, format, &narration)?;

    let archive = zip::ZipArchive::new(std::fs::File::open(&out)?)?;
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(
        names,
        vec!["1.wav", "2.wav", "4.wav", "5.wav", "full.wav", "manifest.json"]
    );

    assert_eq!(std::fs::read_dir(out_dir.path())?.count(), 1);
    assert_eq!(std::fs::read_dir(scratch.path())?.count(), 0);
    Ok(())
}
