//! Voice session configuration loaded from `.env` or a TOML file.
//!
//! Everything here is optional: unset or invalid values fall back to the defaults below.

use crate::capture::CaptureSettings;
use crate::error::VoiceResult;
use crate::voices::DEFAULT_VOICE_AFFINITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const RATE_RANGE: (f32, f32) = (0.1, 10.0);
pub const PITCH_RANGE: (f32, f32) = (0.0, 2.0);
pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);

/// Numeric speech parameters handed to the output channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceOptions {
    /// Speed of speech (0.1 to 10)
    pub rate: f32,
    /// Pitch of voice (0 to 2)
    pub pitch: f32,
    /// Volume (0 to 1)
    pub volume: f32,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl VoiceOptions {
    /// Bound every field to its valid range. Non-finite values take the default.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            rate: clamp_or(self.rate, RATE_RANGE, d.rate),
            pitch: clamp_or(self.pitch, PITCH_RANGE, d.pitch),
            volume: clamp_or(self.volume, VOLUME_RANGE, d.volume),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.clamped() == *self
    }
}

fn clamp_or(value: f32, (lo, hi): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

fn default_true() -> bool {
    true
}

fn default_restart_delay_ms() -> u64 {
    500
}

fn default_transcript_cooldown_ms() -> u64 {
    1000
}

fn default_affinity() -> Vec<String> {
    DEFAULT_VOICE_AFFINITY.iter().map(|s| s.to_string()).collect()
}

/// Voice session configuration.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | VENT_VOICE_ENABLED | true | Start with voice mode on. |
/// | VENT_VOICE_RESTART_DELAY_MS | 500 | Delay before capture restarts after a run or |
/// | | | an utterance ends. |
/// | VENT_VOICE_TRANSCRIPT_COOLDOWN_MS | 1000 | Drop transcripts arriving this soon after |
/// | | | the last one (0 = off). |
/// | VENT_VOICE_AFFINITY | female,Samantha,Siri | Comma-separated voice name fragments. |
/// | VENT_VOICE_RATE / _PITCH / _VOLUME | 1.0 | Speech parameters (clamped). |
/// | VENT_VOICE_LANG | en-US | Recognition language. |
/// | VENT_VOICE_CONTINUOUS | false | Keep a capture run alive across utterances. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_transcript_cooldown_ms")]
    pub transcript_cooldown_ms: u64,
    #[serde(default = "default_affinity")]
    pub voice_affinity: Vec<String>,
    #[serde(default)]
    pub options: VoiceOptions,
    #[serde(default)]
    pub capture: CaptureSettings,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            restart_delay_ms: default_restart_delay_ms(),
            transcript_cooldown_ms: default_transcript_cooldown_ms(),
            voice_affinity: default_affinity(),
            options: VoiceOptions::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl VoiceConfig {
    /// Load from environment. Unset or invalid => defaults (see struct docs).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let options = VoiceOptions {
            rate: env_f32("VENT_VOICE_RATE", defaults.options.rate),
            pitch: env_f32("VENT_VOICE_PITCH", defaults.options.pitch),
            volume: env_f32("VENT_VOICE_VOLUME", defaults.options.volume),
        }
        .clamped();
        let mut capture = defaults.capture.clone();
        if let Some(lang) = env_opt_string("VENT_VOICE_LANG") {
            capture.lang = lang;
        }
        capture.continuous = env_bool("VENT_VOICE_CONTINUOUS", capture.continuous);
        Self {
            enabled: env_bool("VENT_VOICE_ENABLED", defaults.enabled),
            restart_delay_ms: env_u64("VENT_VOICE_RESTART_DELAY_MS", defaults.restart_delay_ms),
            transcript_cooldown_ms: env_u64(
                "VENT_VOICE_TRANSCRIPT_COOLDOWN_MS",
                defaults.transcript_cooldown_ms,
            ),
            voice_affinity: env_opt_string("VENT_VOICE_AFFINITY")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.voice_affinity),
            options,
            capture,
        }
    }

    pub fn from_toml_str(s: &str) -> VoiceResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> VoiceResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn transcript_cooldown(&self) -> Duration {
        Duration::from_millis(self.transcript_cooldown_ms)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                default
            } else {
                v.eq_ignore_ascii_case("true") || v == "1"
            }
        }
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
