/// Renderer that shells out to an external TTS program (edge-tts by default).
pub mod command;

/// Deterministic offline renderer producing sine tones.
pub mod tone;
