use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::system::{AudioSystemInterface, FileSystemInterface, HotkeyRegistrar};

use super::switcher::SwitcherService;

/// Quiet period that ends a burst of device change notifications.
pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(150);

/// Work queued for the owner task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCommand {
    DevicesChanged,
    HotkeyPressed(String),
    Refresh,
    Shutdown,
}

/// Cloneable sender side of the owner task's queue. Safe to use from OS
/// callback threads.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    sender: mpsc::UnboundedSender<ServiceCommand>,
}

impl ServiceHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServiceCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue a command; returns false once the service has stopped.
    pub fn send(&self, command: ServiceCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    pub fn devices_changed(&self) {
        self.send(ServiceCommand::DevicesChanged);
    }

    pub fn hotkey_pressed(&self, device_id: String) {
        self.send(ServiceCommand::HotkeyPressed(device_id));
    }

    pub fn refresh(&self) {
        self.send(ServiceCommand::Refresh);
    }

    pub fn shutdown(&self) {
        self.send(ServiceCommand::Shutdown);
    }

    /// Payload-less callback suitable for platform change notifications.
    pub fn device_change_callback(&self) -> Box<dyn Fn() + Send + Sync> {
        let handle = self.clone();
        Box::new(move || handle.devices_changed())
    }
}

enum Debounced {
    Quiet,
    Interrupted(ServiceCommand),
    Closed,
}

/// Absorb further change notifications until the queue has been quiet for
/// [`REFRESH_DEBOUNCE`].
async fn debounce(commands: &mut mpsc::UnboundedReceiver<ServiceCommand>) -> Debounced {
    let mut absorbed = 0usize;
    loop {
        match timeout(REFRESH_DEBOUNCE, commands.recv()).await {
            Err(_) => {
                if absorbed > 0 {
                    debug!("Coalesced {} device change notifications", absorbed + 1);
                }
                return Debounced::Quiet;
            }
            Ok(Some(ServiceCommand::DevicesChanged | ServiceCommand::Refresh)) => absorbed += 1,
            Ok(Some(other)) => return Debounced::Interrupted(other),
            Ok(None) => return Debounced::Closed,
        }
    }
}

/// Owner loop: the only place the service is mutated. Runs an initial
/// refresh, then drains commands until shutdown, Ctrl+C or channel close.
pub async fn run_service<A, F, H>(
    service: &mut SwitcherService<A, F, H>,
    mut commands: mpsc::UnboundedReceiver<ServiceCommand>,
) -> Result<()>
where
    A: AudioSystemInterface,
    F: FileSystemInterface,
    H: HotkeyRegistrar,
{
    let summary = service.refresh();
    info!(
        "Service started: {} output and {} input devices",
        summary.outputs.added, summary.inputs.added
    );

    let mut pending: Option<ServiceCommand> = None;
    loop {
        let command = match pending.take() {
            Some(command) => Some(command),
            None => tokio::select! {
                command = commands.recv() => command,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    Some(ServiceCommand::Shutdown)
                }
            },
        };

        match command {
            Some(ServiceCommand::Shutdown) => {
                info!("Shutdown requested");
                break;
            }
            Some(ServiceCommand::DevicesChanged) => {
                let outcome = debounce(&mut commands).await;
                service.refresh();
                match outcome {
                    Debounced::Quiet => {}
                    Debounced::Interrupted(next) => pending = Some(next),
                    Debounced::Closed => {
                        warn!("Command channel closed");
                        break;
                    }
                }
            }
            Some(ServiceCommand::Refresh) => {
                service.refresh();
            }
            Some(ServiceCommand::HotkeyPressed(device_id)) => {
                service.handle_hotkey_pressed(&device_id);
            }
            None => {
                warn!("Command channel closed");
                break;
            }
        }
    }

    service.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DataFlow, EndpointInfo};
    use crate::system::{MockAudioSystem, MockFileSystem, MockHotkeyRegistrar};

    #[tokio::test]
    async fn test_change_burst_is_coalesced() {
        let audio = MockAudioSystem::new();
        audio.add_endpoint(DataFlow::Render, EndpointInfo::new("a", "Speakers (Realtek)"));
        let mut service = SwitcherService::new_for_testing(
            audio.clone(),
            MockFileSystem::new(),
            MockHotkeyRegistrar::new(),
        );
        let (handle, commands) = ServiceHandle::channel();

        handle.devices_changed();
        handle.devices_changed();
        handle.devices_changed();
        handle.shutdown();
        run_service(&mut service, commands).await.unwrap();

        // Initial refresh plus one coalesced refresh, two directions each
        assert_eq!(audio.enumerate_call_count(), 4);
    }

    #[tokio::test]
    async fn test_hotkey_press_switches_default() {
        let audio = MockAudioSystem::new();
        audio.add_endpoint(DataFlow::Render, EndpointInfo::new("a", "Speakers (Realtek)"));
        audio.add_endpoint(DataFlow::Render, EndpointInfo::new("b", "Headphones (USB)"));
        let mut service = SwitcherService::new_for_testing(
            audio.clone(),
            MockFileSystem::new(),
            MockHotkeyRegistrar::new(),
        );
        let (handle, commands) = ServiceHandle::channel();

        handle.hotkey_pressed("b".to_string());
        handle.shutdown();
        run_service(&mut service, commands).await.unwrap();

        assert_eq!(service.default_device(DataFlow::Render).unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_closed_channel_stops_service() {
        let mut service = SwitcherService::new_for_testing(
            MockAudioSystem::new(),
            MockFileSystem::new(),
            MockHotkeyRegistrar::new(),
        );
        let (handle, commands) = ServiceHandle::channel();
        drop(handle);

        run_service(&mut service, commands).await.unwrap();
    }

    #[test]
    fn test_device_change_callback_enqueues() {
        let (handle, mut commands) = ServiceHandle::channel();
        let callback = handle.device_change_callback();
        callback();
        assert_eq!(commands.try_recv().unwrap(), ServiceCommand::DevicesChanged);
    }
}
