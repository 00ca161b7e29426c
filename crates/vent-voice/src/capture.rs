//! **Capture Channel**: the speech-to-text adapter contract and a text-fed implementation.
//!
//! A capture run is fire-and-forget: `start()` returns immediately and the run reports
//! `Started`, zero or more `Result`s, optionally `Error`, and finally `Ended` through the
//! `CaptureSink` it was subscribed with. Every event carries the run's `Generation`.

use crate::error::{VoiceError, VoiceResult};
use crate::events::{ChannelEvent, Generation, Tagged};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

/// Lifecycle and result events of one capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Started,
    Result(String),
    Ended,
    Error(String),
}

/// Recognizer settings. Defaults mirror a single-utterance browser recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// BCP 47 tag the run is recognized in. Logged with every run.
    pub lang: String,
    /// Keep one run alive across utterances instead of ending after the first.
    pub continuous: bool,
    /// End the run after this much silence.
    pub silence_timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            lang: "en-US".to_string(),
            continuous: false,
            silence_timeout_ms: 8000,
        }
    }
}

impl CaptureSettings {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}

/// Handle a capture adapter uses to report events to the coordinator.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl CaptureSink {
    pub fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the coordinator is gone.
    pub fn emit(&self, generation: Generation, event: CaptureEvent) -> bool {
        self.tx
            .send(ChannelEvent::Capture(Tagged { generation, event }))
            .is_ok()
    }
}

/// Contract for a speech-to-text capability. Only the coordinator calls these.
pub trait CaptureChannel: Send {
    /// Called once by the coordinator before any `start`.
    fn subscribe(&mut self, sink: CaptureSink);

    /// Whether the platform capability exists at all.
    fn is_available(&self) -> bool;

    /// Begin a capture run tagged with `generation`.
    ///
    /// Errors: `AlreadyActive` if a run is live, `PlatformUnavailable` if the capability is
    /// missing, `StartFailed` otherwise.
    fn start(&mut self, generation: Generation) -> VoiceResult<()>;

    /// Ask the live run to end. No-op when idle. The run still reports `Ended`.
    fn stop(&mut self) -> VoiceResult<()>;
}

struct ActiveRun {
    generation: Generation,
    /// Taken by the first `stop()`.
    stop_tx: Option<oneshot::Sender<()>>,
    finished: Arc<AtomicBool>,
}

/// Capture channel whose "microphone" is a stream of already-recognized lines.
///
/// Unless `continuous` is set, each run takes at most one utterance and then ends, like a
/// non-continuous recognizer. A stopped run counts as active until its task has finished,
/// so a quick stop/start pair gets `AlreadyActive` and the queued line goes to the next run.
/// The host (or a stdin reader, or a test) pushes utterances into the sender returned by
/// [`TextCapture::new`]. Lines pushed while no run is active wait for the next run.
pub struct TextCapture {
    settings: CaptureSettings,
    source: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    source_closed: Arc<AtomicBool>,
    sink: Option<CaptureSink>,
    active: Option<ActiveRun>,
}

impl TextCapture {
    pub fn new(settings: CaptureSettings) -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let capture = Self {
            settings,
            source: Arc::new(Mutex::new(rx)),
            source_closed: Arc::new(AtomicBool::new(false)),
            sink: None,
            active: None,
        };
        (capture, tx)
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.finished.load(Ordering::SeqCst))
    }
}

impl CaptureChannel for TextCapture {
    fn subscribe(&mut self, sink: CaptureSink) {
        self.sink = Some(sink);
    }

    fn is_available(&self) -> bool {
        !self.source_closed.load(Ordering::SeqCst)
    }

    fn start(&mut self, generation: Generation) -> VoiceResult<()> {
        if !self.is_available() {
            return Err(VoiceError::PlatformUnavailable(
                "transcript source closed".to_string(),
            ));
        }
        if self.is_running() {
            return Err(VoiceError::AlreadyActive);
        }
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| VoiceError::StartFailed("capture channel not subscribed".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::StartFailed(e.to_string()))?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let source = Arc::clone(&self.source);
        let source_closed = Arc::clone(&self.source_closed);
        let silence = self.settings.silence_timeout();
        let continuous = self.settings.continuous;
        let lang = self.settings.lang.clone();
        let run_finished = Arc::clone(&finished);

        runtime.spawn(async move {
            debug!("TextCapture: {} listening ({})", generation, lang);
            sink.emit(generation, CaptureEvent::Started);
            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => {
                        debug!("TextCapture: {} stopped", generation);
                        break;
                    }
                    line = async { source.lock().await.recv().await } => match line {
                        Some(text) => {
                            sink.emit(generation, CaptureEvent::Result(text));
                            if !continuous {
                                break;
                            }
                        }
                        None => {
                            warn!("TextCapture: transcript source closed");
                            source_closed.store(true, Ordering::SeqCst);
                            sink.emit(
                                generation,
                                CaptureEvent::Error("transcript source closed".to_string()),
                            );
                            break;
                        }
                    },
                    _ = tokio::time::sleep(silence) => {
                        debug!("TextCapture: {} silence timeout", generation);
                        break;
                    }
                }
            }
            run_finished.store(true, Ordering::SeqCst);
            sink.emit(generation, CaptureEvent::Ended);
        });

        self.active = Some(ActiveRun {
            generation,
            stop_tx: Some(stop_tx),
            finished,
        });
        Ok(())
    }

    fn stop(&mut self) -> VoiceResult<()> {
        let Some(run) = self.active.as_mut() else {
            return Ok(());
        };
        if run.finished.load(Ordering::SeqCst) {
            self.active = None;
            return Ok(());
        }
        if let Some(stop_tx) = run.stop_tx.take() {
            debug!("TextCapture: stopping {}", run.generation);
            // The run may have finished between the check and the send; nothing to do then.
            let _ = stop_tx.send(());
        }
        Ok(())
    }
}
