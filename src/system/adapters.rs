use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

use crate::audio::{DataFlow, DeviceRole, DeviceStateMask, EndpointInfo, Hotkey};
use crate::service::ServiceHandle;
use crate::system::traits::{AudioSystemInterface, FileSystemInterface, HotkeyRegistrar};

/// Production implementation of FileSystemInterface using std::fs
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFileSystem;

impl FileSystemInterface for StandardFileSystem {
    fn read_settings_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read settings file: {}", e))
    }

    fn write_settings_file(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("Failed to write settings file: {}", e))
    }

    fn settings_file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_settings_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .map_err(|e| anyhow::anyhow!("Failed to create settings directory: {}", e))
    }
}

/// Audio system used on platforms without a supported endpoint API.
/// Lists nothing and rejects every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedAudioSystem;

impl UnsupportedAudioSystem {
    pub fn new() -> Result<Self> {
        warn!("Audio endpoint control is only available on Windows; no devices will be listed");
        Ok(Self)
    }
}

impl AudioSystemInterface for UnsupportedAudioSystem {
    fn enumerate_endpoints(
        &self,
        _flow: DataFlow,
        _state_mask: DeviceStateMask,
    ) -> Result<Vec<EndpointInfo>> {
        Ok(Vec::new())
    }

    fn get_default_endpoint(&self, _flow: DataFlow, _role: DeviceRole) -> Result<Option<String>> {
        Ok(None)
    }

    fn set_default_endpoint(&self, device_id: &str, _role: DeviceRole) -> Result<()> {
        Err(anyhow::anyhow!(
            "Cannot set default device {}: unsupported platform",
            device_id
        ))
    }

    fn set_endpoint_visibility(&self, device_id: &str, _visible: bool) -> Result<()> {
        Err(anyhow::anyhow!(
            "Cannot change visibility of {}: unsupported platform",
            device_id
        ))
    }

    fn add_device_change_listener(&self, _callback: Box<dyn Fn() + Send + Sync>) -> Result<()> {
        debug!("Device change notifications unavailable on this platform");
        Ok(())
    }
}

/// Hotkey registrar that accepts and ignores registrations. Used where global
/// hotkeys are unavailable and by one-shot commands that must not grab them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHotkeyRegistrar;

impl NullHotkeyRegistrar {
    pub fn new(_handle: ServiceHandle) -> Result<Self> {
        Ok(Self)
    }
}

impl HotkeyRegistrar for NullHotkeyRegistrar {
    fn register(&self, device_id: &str, hotkey: &Hotkey) -> Result<()> {
        debug!("Ignoring hotkey {} for {}", hotkey, device_id);
        Ok(())
    }

    fn unregister_all(&self) {}
}

#[cfg(windows)]
pub type PlatformAudioSystem = crate::system::windows::WindowsAudioSystem;
#[cfg(not(windows))]
pub type PlatformAudioSystem = UnsupportedAudioSystem;

#[cfg(windows)]
pub type PlatformHotkeyRegistrar = crate::system::hotkeys_win32::Win32HotkeyRegistrar;
#[cfg(not(windows))]
pub type PlatformHotkeyRegistrar = NullHotkeyRegistrar;
