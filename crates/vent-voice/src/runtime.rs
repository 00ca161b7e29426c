//! Async driver: runs a [`VoiceCoordinator`] on a single tokio task.
//!
//! The task owns the coordinator and processes one input at a time: a host command, a
//! channel event, or the restart timer. Nothing else touches the coordinator, so its
//! transitions never interleave.

use crate::capture::CaptureChannel;
use crate::config::VoiceOptions;
use crate::coordinator::{CoordinatorInbox, VoiceCoordinator};
use crate::error::{VoiceError, VoiceResult};
use crate::events::{ChannelEvent, HostEvent};
use crate::output::OutputChannel;
use crate::session::VoiceStatus;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Host requests, mirroring the coordinator's public methods.
#[derive(Debug)]
pub enum VoiceCommand {
    Configure { enabled: bool, options: VoiceOptions },
    Speak(String),
    ToggleListening,
    ToggleSpeaking,
    SelectVoice(String),
    Status(oneshot::Sender<VoiceStatus>),
    Shutdown,
}

/// Host side of a running voice session.
pub struct VoiceHandle {
    commands: mpsc::UnboundedSender<VoiceCommand>,
    task: JoinHandle<()>,
}

impl VoiceHandle {
    pub fn configure(&self, enabled: bool, options: VoiceOptions) -> VoiceResult<()> {
        self.send(VoiceCommand::Configure { enabled, options })
    }

    pub fn speak(&self, text: impl Into<String>) -> VoiceResult<()> {
        self.send(VoiceCommand::Speak(text.into()))
    }

    pub fn toggle_listening(&self) -> VoiceResult<()> {
        self.send(VoiceCommand::ToggleListening)
    }

    pub fn toggle_speaking(&self) -> VoiceResult<()> {
        self.send(VoiceCommand::ToggleSpeaking)
    }

    pub fn select_voice(&self, name: impl Into<String>) -> VoiceResult<()> {
        self.send(VoiceCommand::SelectVoice(name.into()))
    }

    pub async fn status(&self) -> VoiceResult<VoiceStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(VoiceCommand::Status(tx))?;
        rx.await
            .map_err(|e| VoiceError::ChannelSend(format!("status reply lost: {}", e)))
    }

    /// Stop both channels and wait for the coordinator task to finish.
    pub async fn shutdown(self) -> VoiceResult<()> {
        // The task may already be gone; joining below is what matters.
        let _ = self.commands.send(VoiceCommand::Shutdown);
        self.task
            .await
            .map_err(|e| VoiceError::ChannelSend(format!("coordinator task failed: {}", e)))
    }

    fn send(&self, command: VoiceCommand) -> VoiceResult<()> {
        self.commands.send(command)?;
        Ok(())
    }
}

/// Move `coordinator` onto its own task. Returns the command handle and the host event
/// stream. Dropping the handle's last sender also shuts the session down.
pub fn spawn_coordinator<C, O>(
    coordinator: VoiceCoordinator<C, O>,
    inbox: CoordinatorInbox,
) -> (VoiceHandle, mpsc::UnboundedReceiver<HostEvent>)
where
    C: CaptureChannel + 'static,
    O: OutputChannel + 'static,
{
    let (commands, command_rx) = mpsc::unbounded_channel();
    let CoordinatorInbox {
        channel_events,
        host_events,
    } = inbox;
    let task = tokio::spawn(run_coordinator(coordinator, channel_events, command_rx));
    (VoiceHandle { commands, task }, host_events)
}

async fn run_coordinator<C, O>(
    mut coordinator: VoiceCoordinator<C, O>,
    mut channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    mut commands: mpsc::UnboundedReceiver<VoiceCommand>,
) where
    C: CaptureChannel,
    O: OutputChannel,
{
    info!(target: "vent::voice", "Voice coordinator task started");
    loop {
        let deadline = coordinator.restart_deadline();
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(VoiceCommand::Shutdown) | None => {
                    coordinator.shutdown();
                    break;
                }
                Some(command) => apply(&mut coordinator, command),
            },
            Some(event) = channel_events.recv() => coordinator.handle_channel_event(event),
            _ = wait_for(deadline) => {
                coordinator.poll_restart(Instant::now());
            }
        }
    }
    info!(target: "vent::voice", "Voice coordinator task stopped");
}

fn apply<C: CaptureChannel, O: OutputChannel>(
    coordinator: &mut VoiceCoordinator<C, O>,
    command: VoiceCommand,
) {
    debug!(target: "vent::voice", "Command: {:?}", command);
    match command {
        VoiceCommand::Configure { enabled, options } => coordinator.configure(enabled, options),
        VoiceCommand::Speak(text) => coordinator.submit_text_to_speak(&text),
        VoiceCommand::ToggleListening => coordinator.manual_toggle_listening(),
        VoiceCommand::ToggleSpeaking => coordinator.manual_toggle_speaking(),
        VoiceCommand::SelectVoice(name) => coordinator.select_voice_by_name(&name),
        VoiceCommand::Status(reply) => {
            let _ = reply.send(coordinator.status());
        }
        VoiceCommand::Shutdown => coordinator.shutdown(),
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}
