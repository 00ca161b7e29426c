//! **SpeakerOutput**: real text-to-speech output, HTTP synthesis plus `rodio` playback.
//!
//! `rodio::OutputStream` is not `Send` on every platform, so playback lives on a dedicated
//! thread that owns the stream. The channel talks to it over a std mpsc queue and the
//! thread reports `Started`/`Ended`/`Error` through the `OutputSink`. A fresh `Sink` is
//! built per utterance; cancelling stops and drops it.

use crate::config::VoiceOptions;
use crate::error::{VoiceError, VoiceResult};
use crate::events::Generation;
use crate::output::{OutputChannel, OutputEvent, OutputSink, SpeechRequest};
use crate::voices::VoiceDescriptor;
use rodio::{OutputStream, Sink, Source};
use std::io::Cursor;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the playback thread checks whether the current sink drained.
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Turns text into encoded audio (WAV/MP3).
pub trait TtsBackend: Send + Sync {
    /// Return empty bytes to skip playback.
    fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceDescriptor>,
        options: &VoiceOptions,
    ) -> VoiceResult<Vec<u8>>;

    /// Voices this backend can render.
    fn voices(&self) -> Vec<VoiceDescriptor>;
}

/// Voices offered by OpenAI-compatible `/audio/speech` endpoints.
pub fn openai_voices() -> Vec<VoiceDescriptor> {
    ["alloy", "echo", "fable", "onyx", "nova", "shimmer"]
        .into_iter()
        .map(|name| {
            let voice = VoiceDescriptor::new(name);
            if name == "alloy" {
                voice.as_default()
            } else {
                voice
            }
        })
        .collect()
}

/// OpenAI-compatible HTTP synthesis (OpenAI, OpenRouter, local servers).
///
/// Reads `TTS_API_URL` (default https://api.openai.com/v1), `TTS_API_KEY`,
/// `TTS_MODEL` (default tts-1) and `TTS_VOICE` (used when no voice is selected).
#[derive(Debug, Clone)]
pub struct HttpTts {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub fallback_voice: String,
    client: reqwest::blocking::Client,
}

impl HttpTts {
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let fallback_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        Self::new(base_url, api_key, model, fallback_voice)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        fallback_voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            fallback_voice: fallback_voice.into(),
            client,
        })
    }

    fn request_body(
        &self,
        text: &str,
        voice: Option<&VoiceDescriptor>,
        options: &VoiceOptions,
    ) -> serde_json::Value {
        let voice = voice
            .map(|v| v.name.as_str())
            .unwrap_or(self.fallback_voice.as_str());
        serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            // The endpoint accepts 0.25..=4.0.
            "speed": options.rate.clamp(0.25, 4.0),
        })
    }
}

impl TtsBackend for HttpTts {
    fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceDescriptor>,
        options: &VoiceOptions,
    ) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text, voice, options))
            .send()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Synthesis(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        openai_voices()
    }
}

enum PlaybackCommand {
    Speak {
        generation: Generation,
        request: SpeechRequest,
    },
    Cancel,
}

/// Output channel backed by a [`TtsBackend`] and the default audio output device.
pub struct SpeakerOutput {
    tts: Arc<dyn TtsBackend>,
    commands: Option<mpsc::Sender<PlaybackCommand>>,
    available: bool,
}

impl SpeakerOutput {
    pub fn new(tts: Arc<dyn TtsBackend>) -> Self {
        Self {
            tts,
            commands: None,
            available: true,
        }
    }

    fn send(&mut self, command: PlaybackCommand) -> VoiceResult<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| VoiceError::PlatformUnavailable("no audio output device".to_string()))?;
        commands
            .send(command)
            .map_err(|_| VoiceError::Playback("playback thread stopped".to_string()))
    }
}

impl OutputChannel for SpeakerOutput {
    fn subscribe(&mut self, sink: OutputSink) {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let tts = Arc::clone(&self.tts);
        let spawned = thread::Builder::new()
            .name("vent-voice-playback".to_string())
            .spawn(move || playback_loop(tts, rx, sink, ready_tx));
        if let Err(e) = spawned {
            warn!("SpeakerOutput: playback thread spawn failed: {}", e);
            self.available = false;
            return;
        }
        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("SpeakerOutput: audio output ready");
                self.commands = Some(tx);
            }
            Ok(Err(reason)) => {
                warn!("SpeakerOutput: {}", reason);
                self.available = false;
            }
            Err(_) => self.available = false,
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.tts.voices()
    }

    fn speak(&mut self, generation: Generation, request: SpeechRequest) -> VoiceResult<()> {
        self.send(PlaybackCommand::Speak {
            generation,
            request,
        })
    }

    fn cancel(&mut self) -> VoiceResult<()> {
        let Some(commands) = self.commands.as_ref() else {
            return Ok(());
        };
        commands
            .send(PlaybackCommand::Cancel)
            .map_err(|_| VoiceError::StopFailed("playback thread stopped".to_string()))
    }
}

fn playback_loop(
    tts: Arc<dyn TtsBackend>,
    commands: mpsc::Receiver<PlaybackCommand>,
    events: OutputSink,
    ready: mpsc::Sender<Result<(), String>>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(format!("no audio output device: {}", e)));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut current: Option<(Generation, Sink)> = None;
    let finish = |current: &mut Option<(Generation, Sink)>| {
        if let Some((generation, sink)) = current.take() {
            sink.stop();
            events.emit(generation, OutputEvent::Ended);
        }
    };

    loop {
        match commands.recv_timeout(DRAIN_POLL) {
            Ok(PlaybackCommand::Speak {
                generation,
                request,
            }) => {
                finish(&mut current);
                let audio =
                    match tts.synthesize(&request.text, request.voice.as_ref(), &request.options) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            events.emit(generation, OutputEvent::Error(e.to_string()));
                            continue;
                        }
                    };
                events.emit(generation, OutputEvent::Started);
                if audio.is_empty() {
                    events.emit(generation, OutputEvent::Ended);
                    continue;
                }
                match play(&handle, audio, &request.options) {
                    Ok(sink) => current = Some((generation, sink)),
                    Err(e) => {
                        events.emit(generation, OutputEvent::Error(e.to_string()));
                    }
                }
            }
            Ok(PlaybackCommand::Cancel) => finish(&mut current),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                finish(&mut current);
                debug!("SpeakerOutput: channel dropped, playback thread exiting");
                return;
            }
        }

        let drained = current.as_ref().is_some_and(|(_, sink)| sink.empty());
        if drained {
            if let Some((generation, _)) = current.take() {
                events.emit(generation, OutputEvent::Ended);
            }
        }
    }
}

fn play(
    handle: &rodio::OutputStreamHandle,
    audio: Vec<u8>,
    options: &VoiceOptions,
) -> VoiceResult<Sink> {
    let sink = Sink::try_new(handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
    let source = rodio::Decoder::new(Cursor::new(audio))
        .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
    if (options.pitch - 1.0).abs() > f32::EPSILON {
        debug!("SpeakerOutput: pitch {} not supported, ignored", options.pitch);
    }
    sink.set_volume(options.volume);
    sink.append(source.convert_samples::<f32>());
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    struct SilentTts;

    impl TtsBackend for SilentTts {
        fn synthesize(
            &self,
            _text: &str,
            _voice: Option<&VoiceDescriptor>,
            _options: &VoiceOptions,
        ) -> VoiceResult<Vec<u8>> {
            Ok(Vec::new())
        }

        fn voices(&self) -> Vec<VoiceDescriptor> {
            openai_voices()
        }
    }

    #[test]
    fn cancel_is_noop_without_device() {
        let mut out = SpeakerOutput::new(Arc::new(SilentTts));
        assert_ok!(out.cancel());
    }

    #[test]
    fn cancel_after_playback_thread_died_is_stop_failure() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut out = SpeakerOutput {
            tts: Arc::new(SilentTts),
            commands: Some(tx),
            available: true,
        };
        let err = assert_err!(out.cancel());
        assert!(matches!(err, VoiceError::StopFailed(_)));
    }

    #[test]
    fn openai_catalog_has_one_default() {
        let voices = openai_voices();
        assert_eq!(voices.len(), 6);
        assert_eq!(voices.iter().filter(|v| v.is_default).count(), 1);
    }

    #[test]
    fn request_body_uses_selected_voice_and_bounded_speed() {
        let tts = HttpTts::new("http://localhost:9", "key", "tts-1", "alloy").unwrap();
        let body = tts.request_body(
            "hello",
            Some(&VoiceDescriptor::new("nova")),
            &VoiceOptions {
                rate: 9.0,
                ..Default::default()
            },
        );
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["speed"], 4.0);

        let body = tts.request_body("hello", None, &VoiceOptions::default());
        assert_eq!(body["voice"], "alloy");
    }
}
