//! Recording channel doubles shared by the integration tests.
//!
//! Both doubles append to one call log so tests can assert ordering across the
//! microphone and the speaker (e.g. `Capture.stop()` before `Output.speak()`).

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use vent_voice::{
    CaptureChannel, CaptureSink, Generation, OutputChannel, OutputSink, SpeechRequest,
    VoiceDescriptor, VoiceError, VoiceResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CaptureStart(Generation),
    CaptureStop,
    Speak(Generation, SpeechRequest),
    Cancel,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    start_errors: VecDeque<VoiceError>,
    speak_errors: VecDeque<VoiceError>,
    cancel_errors: VecDeque<VoiceError>,
    voices: Vec<VoiceDescriptor>,
    capture_available: bool,
}

/// Shared view of what the doubles were asked to do.
#[derive(Clone)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                capture_available: true,
                ..Default::default()
            })),
        }
    }

    pub fn channels(&self) -> (RecordingCapture, RecordingOutput) {
        (
            RecordingCapture {
                recorder: self.clone(),
                sink: None,
            },
            RecordingOutput {
                recorder: self.clone(),
                sink: None,
            },
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn capture_starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CaptureStart(_)))
            .count()
    }

    pub fn last_capture_generation(&self) -> Option<Generation> {
        self.calls().iter().rev().find_map(|c| match c {
            Call::CaptureStart(g) => Some(*g),
            _ => None,
        })
    }

    pub fn last_speak(&self) -> Option<(Generation, SpeechRequest)> {
        self.calls().iter().rev().find_map(|c| match c {
            Call::Speak(g, r) => Some((*g, r.clone())),
            _ => None,
        })
    }

    pub fn fail_next_start(&self, err: VoiceError) {
        self.state.lock().unwrap().start_errors.push_back(err);
    }

    pub fn fail_next_speak(&self, err: VoiceError) {
        self.state.lock().unwrap().speak_errors.push_back(err);
    }

    pub fn fail_next_cancel(&self, err: VoiceError) {
        self.state.lock().unwrap().cancel_errors.push_back(err);
    }

    pub fn set_voices(&self, voices: Vec<VoiceDescriptor>) {
        self.state.lock().unwrap().voices = voices;
    }

    pub fn set_capture_available(&self, available: bool) {
        self.state.lock().unwrap().capture_available = available;
    }
}

pub struct RecordingCapture {
    recorder: Recorder,
    sink: Option<CaptureSink>,
}

impl CaptureChannel for RecordingCapture {
    fn subscribe(&mut self, sink: CaptureSink) {
        self.sink = Some(sink);
    }

    fn is_available(&self) -> bool {
        self.recorder.state.lock().unwrap().capture_available
    }

    fn start(&mut self, generation: Generation) -> VoiceResult<()> {
        let mut state = self.recorder.state.lock().unwrap();
        state.calls.push(Call::CaptureStart(generation));
        match state.start_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn stop(&mut self) -> VoiceResult<()> {
        self.recorder.state.lock().unwrap().calls.push(Call::CaptureStop);
        Ok(())
    }
}

pub struct RecordingOutput {
    recorder: Recorder,
    sink: Option<OutputSink>,
}

impl OutputChannel for RecordingOutput {
    fn subscribe(&mut self, sink: OutputSink) {
        self.sink = Some(sink);
    }

    fn is_available(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.recorder.state.lock().unwrap().voices.clone()
    }

    fn speak(&mut self, generation: Generation, request: SpeechRequest) -> VoiceResult<()> {
        let mut state = self.recorder.state.lock().unwrap();
        state.calls.push(Call::Speak(generation, request));
        match state.speak_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn cancel(&mut self) -> VoiceResult<()> {
        let mut state = self.recorder.state.lock().unwrap();
        state.calls.push(Call::Cancel);
        match state.cancel_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
