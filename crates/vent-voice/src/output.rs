//! **Output Channel**: the text-to-speech adapter contract and a paced, log-only speaker.
//!
//! `speak()` is fire-and-forget and latest-wins: a new request cancels the utterance in
//! progress, which still reports its own `Ended`. Each utterance reports `Started` and
//! then exactly one terminal event (`Ended` or `Error`), tagged with its `Generation`.

use crate::config::VoiceOptions;
use crate::error::{VoiceError, VoiceResult};
use crate::events::{ChannelEvent, Generation, Tagged};
use crate::voices::VoiceDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Lifecycle events of one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Started,
    Ended,
    Error(String),
}

/// What to say and how.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub options: VoiceOptions,
    pub voice: Option<VoiceDescriptor>,
}

/// Handle an output adapter uses to report events to the coordinator.
#[derive(Debug, Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl OutputSink {
    pub fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the coordinator is gone.
    pub fn emit(&self, generation: Generation, event: OutputEvent) -> bool {
        self.tx
            .send(ChannelEvent::Output(Tagged { generation, event }))
            .is_ok()
    }

    pub fn voices_changed(&self) -> bool {
        self.tx.send(ChannelEvent::VoicesChanged).is_ok()
    }
}

/// Contract for a text-to-speech capability. Only the coordinator calls these.
pub trait OutputChannel: Send {
    /// Called once by the coordinator before any `speak`.
    fn subscribe(&mut self, sink: OutputSink);

    fn is_available(&self) -> bool;

    /// Current voice catalog. May be empty until the platform reports it.
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Speak `request`, cancelling any utterance in progress first.
    fn speak(&mut self, generation: Generation, request: SpeechRequest) -> VoiceResult<()>;

    /// Stop the utterance in progress. No-op when idle.
    fn cancel(&mut self) -> VoiceResult<()>;
}

#[derive(Default)]
struct CatalogState {
    voices: Vec<VoiceDescriptor>,
    notify: Option<OutputSink>,
}

/// Shared voice catalog. Platforms often publish voices late; `publish` replaces the list
/// and notifies the subscribed coordinator.
#[derive(Clone, Default)]
pub struct VoiceCatalog {
    inner: Arc<Mutex<CatalogState>>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<VoiceDescriptor>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CatalogState {
                voices,
                notify: None,
            })),
        }
    }

    pub fn voices(&self) -> Vec<VoiceDescriptor> {
        self.lock().voices.clone()
    }

    pub fn publish(&self, voices: Vec<VoiceDescriptor>) {
        let mut state = self.lock();
        state.voices = voices;
        if let Some(ref sink) = state.notify {
            sink.voices_changed();
        }
    }

    fn attach(&self, sink: OutputSink) {
        self.lock().notify = Some(sink);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct ActiveUtterance {
    generation: Generation,
    cancel_tx: oneshot::Sender<()>,
    finished: Arc<AtomicBool>,
}

/// Speaker that "talks" by logging the text and staying busy for a duration derived
/// from word count and rate. Used by the console demo and for headless hosts.
pub struct PacedOutput {
    word_duration: Duration,
    catalog: VoiceCatalog,
    sink: Option<OutputSink>,
    active: Option<ActiveUtterance>,
}

impl PacedOutput {
    pub fn new(word_duration: Duration, catalog: VoiceCatalog) -> Self {
        Self {
            word_duration,
            catalog,
            sink: None,
            active: None,
        }
    }

    /// How long `request` keeps the speaker busy.
    pub fn utterance_duration(&self, request: &SpeechRequest) -> Duration {
        let words = request.text.split_whitespace().count() as f64;
        let rate = request.options.clamped().rate as f64;
        let millis = self.word_duration.as_millis() as f64 * words / rate;
        Duration::from_millis(millis.round() as u64)
    }

    fn cancel_active(&mut self) {
        if let Some(utterance) = self.active.take() {
            if !utterance.finished.load(Ordering::SeqCst) {
                debug!("PacedOutput: cancelling {}", utterance.generation);
                let _ = utterance.cancel_tx.send(());
            }
        }
    }
}

impl OutputChannel for PacedOutput {
    fn subscribe(&mut self, sink: OutputSink) {
        self.catalog.attach(sink.clone());
        self.sink = Some(sink);
    }

    fn is_available(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.catalog.voices()
    }

    fn speak(&mut self, generation: Generation, request: SpeechRequest) -> VoiceResult<()> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| VoiceError::StartFailed("output channel not subscribed".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::StartFailed(e.to_string()))?;

        self.cancel_active();

        let duration = self.utterance_duration(&request);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let run_finished = Arc::clone(&finished);
        let voice = request
            .voice
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_else(|| "default".to_string());

        runtime.spawn(async move {
            sink.emit(generation, OutputEvent::Started);
            info!("🔊 [{}] {}", voice, request.text);
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = &mut cancel_rx => debug!("PacedOutput: {} cut short", generation),
            }
            run_finished.store(true, Ordering::SeqCst);
            sink.emit(generation, OutputEvent::Ended);
        });

        self.active = Some(ActiveUtterance {
            generation,
            cancel_tx,
            finished,
        });
        Ok(())
    }

    fn cancel(&mut self) -> VoiceResult<()> {
        self.cancel_active();
        Ok(())
    }
}
