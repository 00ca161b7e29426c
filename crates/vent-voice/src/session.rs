//! Per-mount voice session state owned by the coordinator.

use crate::config::VoiceOptions;
use crate::events::Generation;
use crate::voices::VoiceDescriptor;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Observed channel activity. Listening and speaking share one enum so both can never
/// be active at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    Listening,
    Speaking,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceSession {
    /// Host-controlled master switch.
    pub enabled: bool,
    /// Set by a manual stop; blocks automatic capture restarts until a manual resume.
    pub paused_by_user: bool,
    pub activity: Activity,
    /// Text of the utterance in progress.
    pub pending_text: Option<String>,
    pub selected_voice: Option<VoiceDescriptor>,
    pub voice_options: VoiceOptions,
    /// Generation of the live capture run, if any.
    pub capture_generation: Option<Generation>,
    /// Generation of the live utterance, if any.
    pub output_generation: Option<Generation>,
}

impl VoiceSession {
    pub fn listening(&self) -> bool {
        self.activity == Activity::Listening
    }

    pub fn speaking(&self) -> bool {
        self.activity == Activity::Speaking
    }

    /// The pause flag only counts while enabled.
    pub fn is_paused(&self) -> bool {
        self.enabled && self.paused_by_user
    }

    /// Whether capture may be (re)started automatically right now.
    pub fn may_auto_listen(&self) -> bool {
        self.enabled && !self.is_paused() && !self.speaking()
    }
}

/// A delayed capture restart. Replaced or dropped by any superseding transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRestart {
    pub due: Instant,
    pub token: Generation,
}

/// Serializable snapshot for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceStatus {
    pub enabled: bool,
    pub paused_by_user: bool,
    pub listening: bool,
    pub speaking: bool,
    /// Both capabilities present.
    pub supported: bool,
    pub selected_voice: Option<VoiceDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_flag_ignored_while_disabled() {
        let session = VoiceSession {
            enabled: false,
            paused_by_user: true,
            ..Default::default()
        };
        assert!(!session.is_paused());
        assert!(!session.may_auto_listen());
    }

    #[test]
    fn speaking_blocks_auto_listen() {
        let session = VoiceSession {
            enabled: true,
            activity: Activity::Speaking,
            ..Default::default()
        };
        assert!(session.speaking());
        assert!(!session.listening());
        assert!(!session.may_auto_listen());
    }
}
