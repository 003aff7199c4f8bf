use anyhow::Result;
use std::path::Path;

use crate::audio::{DataFlow, DeviceRole, DeviceStateMask, EndpointInfo, Hotkey};

/// Trait for audio system operations - abstracts the platform endpoint API
pub trait AudioSystemInterface {
    /// Enumerate endpoints of one direction whose state is in `state_mask`
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state_mask: DeviceStateMask,
    ) -> Result<Vec<EndpointInfo>>;

    /// Get the id of the default endpoint for a direction and role
    fn get_default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<Option<String>>;

    /// Make an endpoint the system default for one role
    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<()>;

    /// Enable or disable an endpoint
    fn set_endpoint_visibility(&self, device_id: &str, visible: bool) -> Result<()>;

    /// Register a callback for device change notifications
    /// The callback will be invoked when devices are added, removed, change state,
    /// change properties, or when a default device changes
    fn add_device_change_listener(&self, callback: Box<dyn Fn() + Send + Sync>) -> Result<()>;
}

/// Trait for file system operations - abstracts std::fs for testability
pub trait FileSystemInterface {
    /// Read the entire contents of a settings file
    fn read_settings_file(&self, path: &Path) -> Result<String>;

    /// Write settings content to a file
    fn write_settings_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Check if a settings file exists
    fn settings_file_exists(&self, path: &Path) -> bool;

    /// Create the directory structure for settings files
    fn create_settings_dir(&self, path: &Path) -> Result<()>;
}

/// Trait for global hotkey registration with the OS
pub trait HotkeyRegistrar {
    /// Register a hotkey that switches to `device_id` when pressed
    fn register(&self, device_id: &str, hotkey: &Hotkey) -> Result<()>;

    /// Drop every registration made through this registrar
    fn unregister_all(&self);
}
