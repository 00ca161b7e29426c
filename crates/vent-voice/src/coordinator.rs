//! Voice Coordinator - arbitrates the microphone and the speaker
//!
//! Capture and output are independent, asynchronous and mutually interfering. The
//! coordinator owns both channels and is the only thing that calls them. Rules:
//!
//! - output always wins: a speak request stops capture before speaking
//! - capture restarts on its own (after `restart_delay`) only while enabled, not paused
//!   by the user and not speaking
//! - every channel run gets a fresh `Generation`; events from any other run are ignored
//!
//! All methods are synchronous and apply one input each. Time only enters through
//! [`VoiceCoordinator::restart_deadline`] and [`VoiceCoordinator::poll_restart`], so the
//! async driver in `runtime` (or a test) decides when the restart delay has elapsed.

use crate::capture::{CaptureChannel, CaptureEvent, CaptureSink};
use crate::config::{VoiceConfig, VoiceOptions};
use crate::error::VoiceError;
use crate::events::{ChannelEvent, ChannelSource, Generation, HostEvent, Tagged};
use crate::output::{OutputChannel, OutputEvent, OutputSink, SpeechRequest};
use crate::session::{Activity, PendingRestart, VoiceSession, VoiceStatus};
use crate::voices::{find_voice, select_voice, VoiceDescriptor};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Receivers created alongside a coordinator.
pub struct CoordinatorInbox {
    /// Tagged events from both channel adapters. Feed them to `handle_channel_event`.
    pub channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    /// Notifications for the host.
    pub host_events: mpsc::UnboundedReceiver<HostEvent>,
}

pub struct VoiceCoordinator<C: CaptureChannel, O: OutputChannel> {
    capture: C,
    output: O,
    session: VoiceSession,

    restart_delay: Duration,
    transcript_cooldown: Duration,
    voice_affinity: Vec<String>,

    next_generation: u64,
    pending_restart: Option<PendingRestart>,
    /// Capture run we asked to stop whose `Ended` has not arrived yet.
    stopping_capture: Option<Generation>,
    last_transcript_at: Option<Instant>,
    /// Set when the host picked a voice by name.
    voice_pinned: bool,

    capture_supported: bool,
    output_supported: bool,

    reported: (bool, bool),
    host_tx: mpsc::UnboundedSender<HostEvent>,
}

impl<C: CaptureChannel, O: OutputChannel> VoiceCoordinator<C, O> {
    /// Take ownership of both channels and subscribe to them. The session starts disabled;
    /// call [`configure`](Self::configure) to turn it on.
    pub fn new(mut capture: C, mut output: O, config: &VoiceConfig) -> (Self, CoordinatorInbox) {
        let (event_tx, channel_events) = mpsc::unbounded_channel();
        let (host_tx, host_events) = mpsc::unbounded_channel();

        capture.subscribe(CaptureSink::new(event_tx.clone()));
        output.subscribe(OutputSink::new(event_tx));

        let capture_supported = capture.is_available();
        let output_supported = output.is_available();

        let mut coordinator = Self {
            capture,
            output,
            session: VoiceSession {
                voice_options: config.options.clamped(),
                ..Default::default()
            },
            restart_delay: config.restart_delay(),
            transcript_cooldown: config.transcript_cooldown(),
            voice_affinity: config.voice_affinity.clone(),
            next_generation: 0,
            pending_restart: None,
            stopping_capture: None,
            last_transcript_at: None,
            voice_pinned: false,
            capture_supported,
            output_supported,
            reported: (false, false),
            host_tx,
        };

        info!(
            target: "vent::voice",
            "Voice coordinator ready (capture: {}, output: {}, restart delay {:?})",
            capture_supported, output_supported, coordinator.restart_delay
        );
        if !capture_supported {
            coordinator.emit(HostEvent::Unsupported {
                source: ChannelSource::Capture,
            });
        }
        if !output_supported {
            coordinator.emit(HostEvent::Unsupported {
                source: ChannelSource::Output,
            });
        }
        coordinator.refresh_voices();

        (
            coordinator,
            CoordinatorInbox {
                channel_events,
                host_events,
            },
        )
    }

    // ------------------------------------------------------------------
    // Host contract
    // ------------------------------------------------------------------

    /// Apply the host's enable switch and speech parameters.
    pub fn configure(&mut self, enabled: bool, options: VoiceOptions) {
        let clamped = options.clamped();
        if clamped != options {
            warn!(
                target: "vent::voice",
                "Voice options out of range, clamped {:?} -> {:?}", options, clamped
            );
        }
        self.session.voice_options = clamped;

        match (self.session.enabled, enabled) {
            (false, true) => {
                info!(target: "vent::voice", "Voice mode enabled");
                self.session.enabled = true;
                self.session.paused_by_user = false;
                self.start_capture("enabled");
            }
            (true, false) => {
                info!(target: "vent::voice", "Voice mode disabled");
                self.halt();
            }
            _ => {}
        }
        self.publish_state();
    }

    /// Speak `text`, preempting capture. Latest request wins.
    pub fn submit_text_to_speak(&mut self, text: &str) {
        if !self.session.enabled {
            debug!(target: "vent::voice", "Speak request dropped: voice mode disabled");
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.output_supported {
            debug!(target: "vent::voice", "Speak request dropped: output unsupported");
            return;
        }

        self.cancel_restart();
        if self.session.listening() {
            self.stop_capture();
        }

        let generation = self.next_generation();
        let request = SpeechRequest {
            text: text.to_string(),
            options: self.session.voice_options,
            voice: self.session.selected_voice.clone(),
        };
        match self.output.speak(generation, request) {
            Ok(()) => {
                if let Some(prior) = self.session.output_generation.replace(generation) {
                    debug!(
                        target: "vent::voice",
                        "Utterance {} superseded by {}", prior, generation
                    );
                }
                self.session.pending_text = Some(text.to_string());
                self.session.activity = Activity::Speaking;
                info!(target: "vent::voice", "Speaking ({})", generation);
            }
            Err(err) => {
                self.report_output_failure(err);
                self.output_finished();
            }
        }
        self.publish_state();
    }

    /// Microphone button: stop and pause while listening, resume while idle.
    pub fn manual_toggle_listening(&mut self) {
        match self.session.activity {
            Activity::Listening => {
                info!(target: "vent::voice", "Listening paused by user");
                self.session.paused_by_user = true;
                self.cancel_restart();
                self.stop_capture();
            }
            Activity::Speaking => {
                debug!(target: "vent::voice", "Listening toggle ignored while speaking");
            }
            Activity::Idle => {
                if !self.session.enabled {
                    debug!(target: "vent::voice", "Listening toggle ignored: voice mode disabled");
                    return;
                }
                info!(target: "vent::voice", "Listening resumed by user");
                self.session.paused_by_user = false;
                self.start_capture("manual resume");
            }
        }
        self.publish_state();
    }

    /// Speaker button: cut the current utterance short. No-op unless speaking.
    pub fn manual_toggle_speaking(&mut self) {
        if !self.session.speaking() {
            return;
        }
        info!(target: "vent::voice", "Speech cancelled by user");
        if let Err(err) = self.output.cancel() {
            self.report_output_failure(err);
        }
        self.output_finished();
        self.publish_state();
    }

    /// Choose a catalog voice by exact name. It sticks across catalog refreshes while
    /// the platform still offers it.
    pub fn select_voice_by_name(&mut self, name: &str) {
        let catalog = self.output.voices();
        match find_voice(&catalog, name) {
            Some(voice) => {
                self.voice_pinned = true;
                self.set_voice(Some(voice.clone()));
            }
            None => warn!(target: "vent::voice", "Unknown voice '{}', keeping current", name),
        }
    }

    /// Stop everything and leave the session idle and disabled.
    pub fn shutdown(&mut self) {
        info!(target: "vent::voice", "Voice session shutting down");
        self.halt();
        self.publish_state();
    }

    // ------------------------------------------------------------------
    // Channel events and timers
    // ------------------------------------------------------------------

    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Capture(tagged) => self.on_capture_event(tagged),
            ChannelEvent::Output(tagged) => self.on_output_event(tagged),
            ChannelEvent::VoicesChanged => self.refresh_voices(),
        }
        self.publish_state();
    }

    /// When the pending capture restart is due, if any.
    pub fn restart_deadline(&self) -> Option<Instant> {
        self.pending_restart.map(|p| p.due)
    }

    /// Fire the pending restart if it is due at `now`. Returns true if it fired.
    pub fn poll_restart(&mut self, now: Instant) -> bool {
        let due = match self.pending_restart {
            Some(pending) if pending.due <= now => pending,
            _ => return false,
        };
        self.pending_restart = None;
        debug!(target: "vent::voice", "Restart {} due", due.token);
        self.start_capture("auto-restart");
        self.publish_state();
        true
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn session(&self) -> &VoiceSession {
        &self.session
    }

    pub fn status(&self) -> VoiceStatus {
        VoiceStatus {
            enabled: self.session.enabled,
            paused_by_user: self.session.is_paused(),
            listening: self.session.listening(),
            speaking: self.session.speaking(),
            supported: self.capture_supported && self.output_supported,
            selected_voice: self.session.selected_voice.clone(),
        }
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn on_capture_event(&mut self, Tagged { generation, event }: Tagged<CaptureEvent>) {
        if self.session.capture_generation != Some(generation) {
            if self.stopping_capture == Some(generation) && event == CaptureEvent::Ended {
                self.stopping_capture = None;
            }
            debug!(target: "vent::voice", "Stale capture event {:?} from {}", event, generation);
            return;
        }

        match event {
            CaptureEvent::Started => {
                debug!(target: "vent::voice", "Capture {} started", generation);
            }
            CaptureEvent::Result(text) => self.deliver_transcript(&text),
            CaptureEvent::Ended => {
                debug!(target: "vent::voice", "Capture {} ended", generation);
                self.capture_finished();
            }
            CaptureEvent::Error(reason) => {
                warn!(target: "vent::voice", "Capture {} error: {}", generation, reason);
                self.emit(HostEvent::Error {
                    source: ChannelSource::Capture,
                    reason,
                });
                // The run still owes us an `Ended`; swallow it.
                self.stopping_capture = Some(generation);
                self.capture_finished();
            }
        }
    }

    fn on_output_event(&mut self, Tagged { generation, event }: Tagged<OutputEvent>) {
        if self.session.output_generation != Some(generation) {
            debug!(target: "vent::voice", "Stale output event {:?} from {}", event, generation);
            return;
        }

        match event {
            OutputEvent::Started => {
                debug!(target: "vent::voice", "Utterance {} started", generation);
            }
            OutputEvent::Ended => {
                debug!(target: "vent::voice", "Utterance {} ended", generation);
                self.output_finished();
            }
            OutputEvent::Error(reason) => {
                warn!(target: "vent::voice", "Utterance {} error: {}", generation, reason);
                self.emit(HostEvent::Error {
                    source: ChannelSource::Output,
                    reason,
                });
                self.output_finished();
            }
        }
    }

    /// Capture run over (ended or failed): go idle, then restart after the delay.
    fn capture_finished(&mut self) {
        self.session.capture_generation = None;
        if self.session.listening() {
            self.session.activity = Activity::Idle;
        }
        if self.session.may_auto_listen() {
            self.schedule_restart();
        }
    }

    /// Utterance over (ended, failed or cancelled): go idle, then resume listening after
    /// the delay if allowed.
    fn output_finished(&mut self) {
        self.session.output_generation = None;
        self.session.pending_text = None;
        if self.session.speaking() {
            self.session.activity = Activity::Idle;
        }
        if self.session.may_auto_listen() {
            self.schedule_restart();
        }
    }

    fn start_capture(&mut self, reason: &str) {
        if !self.session.may_auto_listen() || self.session.activity != Activity::Idle {
            return;
        }
        if !self.capture_supported {
            debug!(target: "vent::voice", "Capture unsupported, not starting ({})", reason);
            return;
        }
        self.cancel_restart();

        let generation = self.next_generation();
        match self.capture.start(generation) {
            Ok(()) => {
                info!(target: "vent::voice", "Listening ({}, {})", generation, reason);
                self.session.capture_generation = Some(generation);
                self.session.activity = Activity::Listening;
            }
            Err(VoiceError::AlreadyActive) => match self.stopping_capture.take() {
                Some(previous) => {
                    debug!(
                        target: "vent::voice",
                        "Capture still active, adopting {}", previous
                    );
                    self.session.capture_generation = Some(previous);
                    self.session.activity = Activity::Listening;
                }
                None => {
                    debug!(target: "vent::voice", "Capture already active, retrying later");
                    self.schedule_restart();
                }
            },
            Err(err) if err.is_unavailable() => {
                warn!(target: "vent::voice", "Capture unavailable: {}", err);
                self.capture_supported = false;
                self.emit(HostEvent::Unsupported {
                    source: ChannelSource::Capture,
                });
            }
            Err(err) => {
                error!(target: "vent::voice", "Capture start failed: {}", err);
                self.emit(HostEvent::Error {
                    source: ChannelSource::Capture,
                    reason: err.to_string(),
                });
            }
        }
    }

    fn stop_capture(&mut self) {
        if let Some(generation) = self.session.capture_generation.take() {
            self.stopping_capture = Some(generation);
            if let Err(err) = self.capture.stop() {
                warn!(target: "vent::voice", "Capture stop failed: {}", err);
                self.emit(HostEvent::Error {
                    source: ChannelSource::Capture,
                    reason: err.to_string(),
                });
            }
        }
        if self.session.listening() {
            self.session.activity = Activity::Idle;
        }
    }

    /// Disable: everything stops now, whatever the channels report later is stale.
    fn halt(&mut self) {
        self.cancel_restart();
        self.stop_capture();
        if self.session.output_generation.take().is_some() {
            if let Err(err) = self.output.cancel() {
                self.report_output_failure(err);
            }
        }
        self.session.pending_text = None;
        self.session.activity = Activity::Idle;
        self.session.enabled = false;
        self.session.paused_by_user = false;
    }

    fn schedule_restart(&mut self) {
        let token = self.next_generation();
        let due = Instant::now() + self.restart_delay;
        if let Some(prior) = self.pending_restart.replace(PendingRestart { due, token }) {
            debug!(target: "vent::voice", "Restart {} replaced by {}", prior.token, token);
        }
        debug!(
            target: "vent::voice",
            "Capture restart {} scheduled in {:?}", token, self.restart_delay
        );
    }

    fn cancel_restart(&mut self) {
        if let Some(pending) = self.pending_restart.take() {
            debug!(target: "vent::voice", "Restart {} cancelled", pending.token);
        }
    }

    fn deliver_transcript(&mut self, raw: &str) {
        let text = raw.trim();
        if text.is_empty() {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_transcript_at {
            if !self.transcript_cooldown.is_zero()
                && now.duration_since(last) < self.transcript_cooldown
            {
                debug!(target: "vent::voice", "Transcript dropped inside cooldown: {:?}", text);
                return;
            }
        }
        self.last_transcript_at = Some(now);
        info!(target: "vent::voice", "Heard: {}", text);
        self.emit(HostEvent::Transcript {
            text: text.to_string(),
            at: Utc::now(),
        });
    }

    fn refresh_voices(&mut self) {
        let catalog = self.output.voices();
        if self.voice_pinned {
            let still_offered = self
                .session
                .selected_voice
                .as_ref()
                .is_some_and(|v| find_voice(&catalog, &v.name).is_some());
            if still_offered {
                return;
            }
            self.voice_pinned = false;
        }
        let voice = select_voice(&catalog, &self.voice_affinity);
        self.set_voice(voice);
    }

    fn set_voice(&mut self, voice: Option<VoiceDescriptor>) {
        if self.session.selected_voice == voice {
            return;
        }
        info!(
            target: "vent::voice",
            "Voice: {}",
            voice.as_ref().map(|v| v.name.as_str()).unwrap_or("platform default")
        );
        self.session.selected_voice = voice.clone();
        self.emit(HostEvent::VoiceSelected { voice });
    }

    fn report_output_failure(&mut self, err: VoiceError) {
        if err.is_unavailable() {
            warn!(target: "vent::voice", "Output unavailable: {}", err);
            self.output_supported = false;
            self.emit(HostEvent::Unsupported {
                source: ChannelSource::Output,
            });
        } else if !err.is_benign() {
            error!(target: "vent::voice", "Output failure: {}", err);
            self.emit(HostEvent::Error {
                source: ChannelSource::Output,
                reason: err.to_string(),
            });
        }
    }

    fn next_generation(&mut self) -> Generation {
        self.next_generation += 1;
        Generation(self.next_generation)
    }

    fn publish_state(&mut self) {
        let now = (self.session.listening(), self.session.speaking());
        if now != self.reported {
            self.reported = now;
            self.emit(HostEvent::StateChanged {
                listening: now.0,
                speaking: now.1,
            });
        }
    }

    fn emit(&self, event: HostEvent) {
        if self.host_tx.send(event).is_err() {
            debug!(target: "vent::voice", "Host event dropped: host gone");
        }
    }
}

impl<C: CaptureChannel, O: OutputChannel> Drop for VoiceCoordinator<C, O> {
    fn drop(&mut self) {
        // Release the microphone and speaker even if the host never called shutdown.
        self.cancel_restart();
        self.stop_capture();
        if self.session.output_generation.take().is_some() {
            let _ = self.output.cancel();
        }
    }
}
