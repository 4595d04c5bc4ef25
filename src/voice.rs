use std::fmt;

use serde::Serialize;

/// Opaque backend voice identifier, passed through unchanged to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VoiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Voice> for VoiceId {
    fn from(voice: Voice) -> Self {
        Self::new(voice.backend_id())
    }
}

/// The built-in voice catalog.
///
/// Each variant maps a display label to a backend identifier understood by Edge neural TTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Voice {
    /// Chinese (Mainland).
    #[default]
    ZhCnXiaoxiao,

    /// Chinese (Taiwan).
    ZhTwHsiaoYu,

    /// English (US).
    EnUsAria,

    /// English (UK).
    EnGbSonia,
}

impl Voice {
    pub const ALL: [Voice; 4] = [
        Voice::ZhCnXiaoxiao,
        Voice::ZhTwHsiaoYu,
        Voice::EnUsAria,
        Voice::EnGbSonia,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Voice::ZhCnXiaoxiao => "Chinese (Mainland)",
            Voice::ZhTwHsiaoYu => "Chinese (Taiwan)",
            Voice::EnUsAria => "English (US)",
            Voice::EnGbSonia => "English (UK)",
        }
    }

    pub fn backend_id(self) -> &'static str {
        match self {
            Voice::ZhCnXiaoxiao => "zh-CN-XiaoxiaoNeural",
            Voice::ZhTwHsiaoYu => "zh-TW-HsiaoYuNeural",
            Voice::EnUsAria => "en-US-AriaNeural",
            Voice::EnGbSonia => "en-GB-SoniaNeural",
        }
    }

    /// Look up a catalog entry by its display label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Voice> {
        Self::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Look up a catalog entry by its backend identifier.
    pub fn from_backend_id(id: &str) -> Option<Voice> {
        Self::ALL.into_iter().find(|v| v.backend_id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_pass_through_unchanged() {
        for voice in Voice::ALL {
            let id = VoiceId::from(voice);
            assert_eq!(id.as_str(), voice.backend_id());
            assert_eq!(Voice::from_backend_id(id.as_str()), Some(voice));
        }
    }

    #[test]
    fn label_lookup_is_case_insensitive() {
        assert_eq!(Voice::from_label("english (uk)"), Some(Voice::EnGbSonia));
        assert_eq!(Voice::from_label("Klingon"), None);
    }
}
