//! # Vent Voice - voice interaction coordination
//!
//! Arbitrates continuous speech capture ("listening") and speech output ("speaking")
//! for a chat host, honouring manual pause/resume and the host's enable switch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Host (chat UI)                        │
//! │   configure / speak / toggles          transcripts / state    │
//! └──────────────┬───────────────────────────────────▲───────────┘
//!                ↓ VoiceCommand                       │ HostEvent
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Voice Coordinator                        │
//! │   Idle ⇄ Listening ⇄ Speaking   (output preempts capture)     │
//! │   generation tokens · delayed auto-restart · pause flag       │
//! └───────┬──────────────────▲──────────────┬──────────▲─────────┘
//!         ↓ start/stop       │ tagged events ↓ speak/cancel │
//! ┌──────────────────┐       │       ┌──────────────────┐ │
//! │  Capture Channel │───────┘       │  Output Channel  │─┘
//! │   (speech→text)  │               │   (text→speech)  │
//! └──────────────────┘               └──────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod output;
pub mod runtime;
pub mod session;
#[cfg(feature = "speaker")]
pub mod speaker;
pub mod voices;

pub use capture::{CaptureChannel, CaptureEvent, CaptureSettings, CaptureSink, TextCapture};
pub use config::{VoiceConfig, VoiceOptions};
pub use coordinator::{CoordinatorInbox, VoiceCoordinator};
pub use error::{VoiceError, VoiceResult};
pub use events::{ChannelEvent, ChannelSource, Generation, HostEvent, Tagged};
pub use output::{OutputChannel, OutputEvent, OutputSink, PacedOutput, SpeechRequest, VoiceCatalog};
pub use runtime::{spawn_coordinator, VoiceCommand, VoiceHandle};
pub use session::{Activity, VoiceSession, VoiceStatus};
#[cfg(feature = "speaker")]
pub use speaker::{HttpTts, SpeakerOutput, TtsBackend};
pub use voices::{select_voice, VoiceDescriptor};
