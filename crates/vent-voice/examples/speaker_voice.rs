//! Speaker Voice Demo: typed lines in, real synthesized speech out.
//!
//! Requires `--features speaker` and `TTS_API_KEY` (OpenAI-compatible `/audio/speech`).
//! Set `TTS_API_URL`, `TTS_MODEL` or `TTS_VOICE` in `.env` to point elsewhere.
//!
//!   cargo run -p vent-voice --features speaker --example speaker_voice

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vent_voice::{
    spawn_coordinator, HostEvent, HttpTts, SpeakerOutput, TextCapture, VoiceConfig,
    VoiceCoordinator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = VoiceConfig::from_env();
    // The blocking HTTP client must not be built on an async worker.
    let tts = tokio::task::spawn_blocking(HttpTts::from_env).await??;

    let (capture, heard_tx) = TextCapture::new(config.capture.clone());
    let output = SpeakerOutput::new(Arc::new(tts));
    let (coordinator, inbox) = VoiceCoordinator::new(capture, output, &config);
    let (handle, mut events) = spawn_coordinator(coordinator, inbox);
    handle.configure(true, config.options)?;

    info!("Type something; it will be echoed back through the speaker. Ctrl+D to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let _ = heard_tx.send(line);
                }
                None => break,
            },
            Some(event) = events.recv() => {
                if let HostEvent::Transcript { text, .. } = event {
                    handle.speak(format!("You said: {}.", text))?;
                } else {
                    info!("{:?}", event);
                }
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}
