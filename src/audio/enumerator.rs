use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::system::AudioSystemInterface;

use super::device::{AudioDevice, DataFlow, DeviceRole, DeviceStateMask};

/// Turns raw platform endpoints into [`AudioDevice`] snapshots and forwards
/// default/visibility actions to the platform.
pub struct DeviceEnumerator<A: AudioSystemInterface> {
    audio_system: A,
}

impl<A: AudioSystemInterface> DeviceEnumerator<A> {
    pub fn new(audio_system: A) -> Self {
        Self { audio_system }
    }

    /// List endpoints of one direction matching `state_mask`, with default
    /// flags resolved. Never fails: a platform error yields an empty list.
    pub fn list_devices(&self, flow: DataFlow, state_mask: DeviceStateMask) -> Vec<AudioDevice> {
        let endpoints = match self.audio_system.enumerate_endpoints(flow, state_mask) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("Failed to enumerate {} devices: {:#}", flow, e);
                return Vec::new();
            }
        };

        let default_id = self.default_endpoint(flow, DeviceRole::Multimedia);
        let default_comms_id = self.default_endpoint(flow, DeviceRole::Communications);

        let mut devices = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if endpoint.id.is_empty() {
                debug!("Skipping {} endpoint without an id", flow);
                continue;
            }

            let is_default = default_id.as_deref() == Some(endpoint.id.as_str());
            let is_default_comms = default_comms_id.as_deref() == Some(endpoint.id.as_str());
            let device = AudioDevice::from_endpoint(endpoint, flow)
                .set_default(is_default)
                .set_default_comms(is_default_comms);
            debug!("  Enumerated {}", device);
            devices.push(device);
        }

        debug!("Enumerated {} {} devices", devices.len(), flow);
        devices
    }

    fn default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Option<String> {
        match self.audio_system.get_default_endpoint(flow, role) {
            Ok(id) => id,
            Err(e) => {
                debug!("No default {} endpoint for {:?}: {:#}", flow, role, e);
                None
            }
        }
    }

    /// Make `device_id` the default for the console and multimedia roles.
    pub fn set_default(&self, device_id: &str) -> Result<()> {
        info!("Setting default device to: {}", device_id);
        for role in [DeviceRole::Console, DeviceRole::Multimedia] {
            self.audio_system
                .set_default_endpoint(device_id, role)
                .with_context(|| format!("Failed to set {} as default {:?} device", device_id, role))?;
        }
        Ok(())
    }

    pub fn set_default_communications(&self, device_id: &str) -> Result<()> {
        info!("Setting default communications device to: {}", device_id);
        self.audio_system
            .set_default_endpoint(device_id, DeviceRole::Communications)
            .with_context(|| {
                format!("Failed to set {} as default communications device", device_id)
            })
    }

    pub fn set_enabled(&self, device_id: &str, enabled: bool) -> Result<()> {
        info!(
            "{} device: {}",
            if enabled { "Enabling" } else { "Disabling" },
            device_id
        );
        self.audio_system
            .set_endpoint_visibility(device_id, enabled)
            .with_context(|| format!("Failed to change visibility of {}", device_id))
    }

    /// Register a payload-less callback for any endpoint change. The callback
    /// runs on a platform thread and must only enqueue work.
    pub fn on_devices_changed(&self, callback: Box<dyn Fn() + Send + Sync>) -> Result<()> {
        self.audio_system
            .add_device_change_listener(callback)
            .context("Failed to register device change listener")
    }

    /// Get reference to the audio system (for testing)
    #[cfg(any(test, feature = "test-mocks"))]
    pub fn audio_system(&self) -> &A {
        &self.audio_system
    }
}
