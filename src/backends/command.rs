use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::audio_pipeline::DEFAULT_SAMPLE_RATE;
use crate::clip::RenderedClip;
use crate::decoder::decode_file_to_clip;
use crate::error::RenderError;
use crate::renderer::Renderer;
use crate::voice::VoiceId;

/// Placeholder replaced by the cue text.
pub const TEXT_PLACEHOLDER: &str = "{text}";
/// Placeholder replaced by a path to a UTF-8 file holding the cue text.
pub const TEXT_FILE_PLACEHOLDER: &str = "{text_file}";
/// Placeholder replaced by the backend voice id.
pub const VOICE_PLACEHOLDER: &str = "{voice}";
/// Placeholder replaced by the path the program must write audio to.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Configuration for [`CommandRenderer`].
#[derive(Debug, Clone)]
pub struct CommandRendererConfig {
    /// Program to run (looked up on `PATH`).
    pub program: String,

    /// Argument template. Each argument may contain any of the placeholders above.
    pub args: Vec<String>,

    /// Extension of the audio file the program writes (used as a decode hint).
    pub output_extension: String,

    /// Rate the decoded audio is normalized to. Must match the timeline rate.
    pub sample_rate: u32,

    /// Voices the program accepts. `None` accepts any non-empty id.
    pub voices: Option<Vec<VoiceId>>,

    /// Where per-cue scratch directories go. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl Default for CommandRendererConfig {
    /// `edge-tts --voice {voice} --file {text_file} --write-media {output}`
    fn default() -> Self {
        Self {
            program: "edge-tts".to_owned(),
            args: vec![
                "--voice".to_owned(),
                VOICE_PLACEHOLDER.to_owned(),
                "--file".to_owned(),
                TEXT_FILE_PLACEHOLDER.to_owned(),
                "--write-media".to_owned(),
                OUTPUT_PLACEHOLDER.to_owned(),
            ],
            output_extension: "mp3".to_owned(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            voices: None,
            temp_dir: None,
        }
    }
}

/// Renderer that shells out to an external TTS program.
///
/// Each call gets its own scratch directory holding the program's output (and the text file,
/// when the template asks for one). The directory is removed when the call returns, whether
/// rendering succeeded or not.
#[derive(Debug, Clone, Default)]
pub struct CommandRenderer {
    config: CommandRendererConfig,
}

impl CommandRenderer {
    pub fn new(config: CommandRendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandRendererConfig {
        &self.config
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cuecast-");
        match &self.config.temp_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }

    fn build_args(&self, text: &str, voice: &VoiceId, text_file: &Path, output: &Path) -> Vec<String> {
        let text_file = text_file.to_string_lossy();
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace(TEXT_FILE_PLACEHOLDER, &text_file)
                    .replace(VOICE_PLACEHOLDER, voice.as_str())
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(TEXT_PLACEHOLDER, text)
            })
            .collect()
    }

    fn wants_text_file(&self) -> bool {
        self.config
            .args
            .iter()
            .any(|arg| arg.contains(TEXT_FILE_PLACEHOLDER))
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, text: &str, voice: &VoiceId) -> Result<RenderedClip, RenderError> {
        if text.trim().is_empty() {
            return Err(RenderError::BadText("empty text".to_owned()));
        }
        if !self.supports_voice(voice) {
            return Err(RenderError::UnsupportedVoice(voice.to_string()));
        }

        let scratch = self.scratch_dir()?;
        let output = scratch
            .path()
            .join(format!("speech.{}", self.config.output_extension));
        let text_file = scratch.path().join("text.txt");
        if self.wants_text_file() {
            fs::write(&text_file, text)?;
        }

        let args = self.build_args(text, voice, &text_file, &output);
        debug!(program = %self.config.program, voice = %voice, "running tts command");
        trace!(?args, "tts command arguments");

        let result = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let out = match result {
            Ok(out) => out,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RenderError::Backend(format!(
                    "tts program '{}' not found",
                    self.config.program
                )));
            }
            Err(err) => return Err(RenderError::Io(err)),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let detail = stderr.trim().lines().last().unwrap_or("no output");
            return Err(RenderError::Backend(format!(
                "'{}' exited with {}: {}",
                self.config.program, out.status, detail
            )));
        }

        match fs::metadata(&output) {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                return Err(RenderError::Backend(format!(
                    "'{}' produced no audio",
                    self.config.program
                )));
            }
        }

        let clip = decode_file_to_clip(&output, self.config.sample_rate)
            .map_err(|err| RenderError::Decode(err.to_string()))?;

        // `scratch` drops here and takes the rendered file with it.
        Ok(clip)
    }

    fn supports_voice(&self, voice: &VoiceId) -> bool {
        if voice.as_str().trim().is_empty() {
            return false;
        }
        match &self.config.voices {
            Some(allowed) => allowed.contains(voice),
            None => true,
        }
    }
}
