//! Console Voice Demo: the coordinator driven from a terminal.
//!
//! Typed lines stand in for recognized speech: they are only "heard" while the
//! coordinator is listening (a line typed while it speaks waits for the next capture run).
//! Replies are spoken by `PacedOutput`, which logs them and stays busy for a while.
//!
//! Commands:
//!   /mic        toggle listening (manual pause / resume)
//!   /hush       cut the current reply short
//!   /off /on    disable / enable voice mode
//!   /voice NAME pick a voice
//!   /status     print the session snapshot
//!   /quit       exit
//!
//! Configuration comes from `VENT_VOICE_*` env vars (see `VoiceConfig`), `.env` included.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vent_voice::{
    spawn_coordinator, HostEvent, PacedOutput, TextCapture, VoiceCatalog, VoiceConfig,
    VoiceCoordinator, VoiceDescriptor,
};

const REPLIES: &[&str] = &[
    "I hear you. Tell me more about that.",
    "That sounds really frustrating.",
    "I'm here to listen. Would you like to elaborate?",
    "How did that make you feel?",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = VoiceConfig::from_env();
    info!("Console voice demo: type to speak, /quit to exit");

    let (capture, heard_tx) = TextCapture::new(config.capture.clone());
    let catalog = VoiceCatalog::default();
    let output = PacedOutput::new(Duration::from_millis(250), catalog.clone());

    let (coordinator, inbox) = VoiceCoordinator::new(capture, output, &config);
    let (handle, mut events) = spawn_coordinator(coordinator, inbox);
    handle.configure(config.enabled, config.options)?;

    // Platforms tend to publish their voice list a moment after start-up.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        catalog.publish(vec![
            VoiceDescriptor::new("Daniel").with_lang("en-GB"),
            VoiceDescriptor::new("Alex").with_lang("en-US").as_default(),
            VoiceDescriptor::new("Samantha").with_lang("en-US"),
        ]);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut enabled = config.enabled;
    let mut replies = REPLIES.iter().cycle();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line {
                    "" => {}
                    "/quit" => break,
                    "/mic" => handle.toggle_listening()?,
                    "/hush" => handle.toggle_speaking()?,
                    "/off" | "/on" => {
                        enabled = line == "/on";
                        handle.configure(enabled, config.options)?;
                    }
                    "/status" => {
                        let status = handle.status().await?;
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    }
                    _ => match line.strip_prefix("/voice ") {
                        Some(name) => handle.select_voice(name.trim())?,
                        None => {
                            // Heard on the next capture run; dropped if the session is gone.
                            let _ = heard_tx.send(line.to_string());
                        }
                    },
                }
            }
            Some(event) = events.recv() => {
                println!("{}", serde_json::to_string(&event)?);
                if let HostEvent::Transcript { text, .. } = event {
                    let reply = replies.next().copied().unwrap_or("I see.");
                    info!("Reply to {:?}: {}", text, reply);
                    handle.speak(reply)?;
                }
            }
        }
    }

    handle.shutdown().await?;
    info!("Goodbye!");
    Ok(())
}
