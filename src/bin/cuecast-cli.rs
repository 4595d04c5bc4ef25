use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cuecast::backends::command::{CommandRenderer, CommandRendererConfig};
use cuecast::backends::tone::{ToneConfig, ToneRenderer};
use cuecast::opts::default_concurrency;
use cuecast::{
    ExportFormat, FailurePolicy, Mode, Narrator, Opts, Renderer, Voice, VoiceId, export_to_path,
    logging,
};

fn main() -> Result<()> {
    logging::init();
    let params = Params::parse();

    if params.list_voices {
        for voice in Voice::ALL {
            println!("{}\t{}", voice.backend_id(), voice.label());
        }
        return Ok(());
    }

    let (Some(subtitles), Some(out)) = (&params.subtitles, &params.out) else {
        bail!("--subtitles and --out are required");
    };

    let format = match params.format {
        Some(format) => format,
        None => ExportFormat::from_path(out).with_context(|| {
            format!(
                "cannot infer the output format from '{}'; pass --format",
                out.display()
            )
        })?,
    };

    let text = read_subtitles(subtitles)?;
    let opts = opts_from_params(&params);
    let renderer = renderer_from_params(&params);

    let narration = Narrator::new(renderer).narrate(&text, &opts)?;
    for failure in narration.failures() {
        eprintln!("cue {} left silent: {}", failure.index, failure.message);
    }

    export_to_path(out, format, &narration)?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "cuecast")]
#[command(about = "Narrate subtitles into an audio track aligned to cue timestamps")]
struct Params {
    /// Subtitle file (SRT). `-` reads stdin.
    #[arg(short = 's', long = "subtitles", required_unless_present = "list_voices")]
    pub subtitles: Option<String>,

    /// Output path (`.wav` or `.zip`).
    #[arg(short = 'o', long = "out", required_unless_present = "list_voices")]
    pub out: Option<PathBuf>,

    /// Output format. Inferred from the output extension when omitted.
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<ExportFormat>,

    /// Catalog voice.
    #[arg(short = 'v', long = "voice", value_enum, default_value_t = Voice::ZhCnXiaoxiao)]
    pub voice: Voice,

    /// Raw backend voice id; overrides `--voice`.
    #[arg(long = "voice-id")]
    pub voice_id: Option<String>,

    #[arg(short = 'm', long = "mode", value_enum, default_value_t = Mode::Aligned)]
    pub mode: Mode,

    /// Maximum renders in flight.
    #[arg(short = 'j', long = "jobs", default_value_t = default_concurrency())]
    pub jobs: usize,

    /// Keep going when individual cues fail; failed cues stay silent.
    #[arg(long = "partial", default_value_t = false)]
    pub partial: bool,

    #[arg(long = "sample-rate", default_value_t = cuecast::DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Reject subtitles whose cues end later than this many milliseconds.
    #[arg(long = "max-timeline-ms", default_value_t = cuecast::DEFAULT_MAX_TIMELINE_MS)]
    pub max_timeline_ms: u64,

    #[arg(short = 'r', long = "renderer", value_enum, default_value_t = RendererKind::Command)]
    pub renderer: RendererKind,

    /// TTS program run by the command renderer.
    #[arg(long = "tts-program")]
    pub tts_program: Option<String>,

    /// Argument template for the TTS program (repeatable). Supports `{text}`, `{text_file}`,
    /// `{voice}` and `{output}`.
    #[arg(long = "tts-arg", allow_hyphen_values = true)]
    pub tts_args: Vec<String>,

    /// Extension of the audio the TTS program writes.
    #[arg(long = "tts-ext")]
    pub tts_ext: Option<String>,

    /// Print the voice catalog and exit.
    #[arg(long = "list-voices", default_value_t = false)]
    pub list_voices: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RendererKind {
    /// External TTS program (edge-tts by default).
    Command,

    /// Offline sine tone, one beep per cue.
    Tone,
}

fn opts_from_params(params: &Params) -> Opts {
    let voice = match &params.voice_id {
        Some(id) => VoiceId::new(id.as_str()),
        None => VoiceId::from(params.voice),
    };
    let policy = if params.partial {
        FailurePolicy::Partial
    } else {
        FailurePolicy::FailFast
    };

    Opts::default()
        .with_voice(voice)
        .with_mode(params.mode)
        .with_failure_policy(policy)
        .with_concurrency(params.jobs)
        .with_sample_rate(params.sample_rate)
        .with_max_timeline_ms(params.max_timeline_ms)
}

fn renderer_from_params(params: &Params) -> Box<dyn Renderer> {
    match params.renderer {
        RendererKind::Tone => Box::new(ToneRenderer::new(ToneConfig {
            sample_rate: params.sample_rate,
            ..ToneConfig::default()
        })),
        RendererKind::Command => {
            let mut config = CommandRendererConfig {
                sample_rate: params.sample_rate,
                ..CommandRendererConfig::default()
            };
            if let Some(program) = &params.tts_program {
                config.program = program.clone();
            }
            if !params.tts_args.is_empty() {
                config.args = params.tts_args.clone();
            }
            if let Some(ext) = &params.tts_ext {
                config.output_extension = ext.clone();
            }
            Box::new(CommandRenderer::new(config))
        }
    }
}

fn read_subtitles(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read subtitles from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(source).with_context(|| format!("failed to read subtitles from '{source}'"))
}
