//! Event types flowing into the coordinator (from channels) and out of it (to the host).

use crate::capture::CaptureEvent;
use crate::output::OutputEvent;
use crate::voices::VoiceDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token for one channel run. Events carrying an older token are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Which physical channel an event or error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSource {
    Capture,
    Output,
}

impl fmt::Display for ChannelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSource::Capture => f.write_str("capture"),
            ChannelSource::Output => f.write_str("output"),
        }
    }
}

/// A channel event tagged with the generation of the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<E> {
    pub generation: Generation,
    pub event: E,
}

/// Everything a channel adapter can send to the coordinator's inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Capture(Tagged<CaptureEvent>),
    Output(Tagged<OutputEvent>),
    /// The output platform's voice catalog changed. Not tied to any run.
    VoicesChanged,
}

/// Notifications for the host application (UI, chat pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A non-empty, trimmed transcript from the capture channel.
    Transcript { text: String, at: DateTime<Utc> },
    /// The observed activity changed. Never both true.
    StateChanged { listening: bool, speaking: bool },
    Error { source: ChannelSource, reason: String },
    VoiceSelected { voice: Option<VoiceDescriptor> },
    /// The capability behind `source` is missing; show the unsupported notice.
    Unsupported { source: ChannelSource },
}
