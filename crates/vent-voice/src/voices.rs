//! Voice catalog entries and the selection policy applied whenever the catalog changes.

use serde::{Deserialize, Serialize};

/// Affinity list used when no configuration overrides it.
pub const DEFAULT_VOICE_AFFINITY: &[&str] = &["female", "Samantha", "Siri"];

/// One voice offered by the output channel's platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Platform default voice.
    #[serde(default)]
    pub is_default: bool,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: None,
            is_default: false,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Pick a voice from `catalog`.
///
/// The first voice, in catalog order, whose name contains any affinity entry
/// (case-insensitive substring), then the platform default, then the first entry.
/// Empty catalog yields `None`.
pub fn select_voice<S: AsRef<str>>(
    catalog: &[VoiceDescriptor],
    affinity: &[S],
) -> Option<VoiceDescriptor> {
    let wanted: Vec<String> = affinity
        .iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    let by_affinity = catalog.iter().find(|v| {
        let name = v.name.to_lowercase();
        wanted.iter().any(|w| name.contains(w.as_str()))
    });

    by_affinity
        .or_else(|| catalog.iter().find(|v| v.is_default))
        .or_else(|| catalog.first())
        .cloned()
}

/// Find a voice by exact name.
pub fn find_voice<'a>(catalog: &'a [VoiceDescriptor], name: &str) -> Option<&'a VoiceDescriptor> {
    catalog.iter().find(|v| v.name == name)
}
