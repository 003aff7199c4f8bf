//! Hotkey bookkeeping: the display table, conflict checks and OS registration.

use thiserror::Error;
use tracing::{debug, warn};

use crate::audio::{AudioDevice, Hotkey};
use crate::settings::Settings;
use crate::system::HotkeyRegistrar;

pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    #[error("This hotkey is already assigned to \"{display_name}\"")]
    Conflict {
        device_id: String,
        display_name: String,
    },
    #[error("A hotkey needs a key, not only modifiers")]
    Empty,
}

/// One row of the hotkey editor, including devices that are not connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyDisplayInfo {
    pub device_id: String,
    pub display_name: String,
    pub sub_name: String,
    pub hotkey: Hotkey,
    pub is_connected: bool,
}

fn stored_names(settings: &Settings, device_id: &str) -> (String, String) {
    match settings.device_name_mapping.get(device_id) {
        Some(identity) => (identity.display_name.clone(), identity.sub_name.clone()),
        None => (UNKNOWN_DEVICE_NAME.to_string(), String::new()),
    }
}

/// Connected devices holding a hotkey, followed by persisted hotkeys whose
/// device is currently absent, named from the stored fingerprints.
pub fn build_hotkey_table<'a>(
    settings: &Settings,
    connected: impl IntoIterator<Item = &'a AudioDevice>,
) -> Vec<HotkeyDisplayInfo> {
    let mut table: Vec<HotkeyDisplayInfo> = connected
        .into_iter()
        .filter_map(|device| {
            device.hotkey.map(|hotkey| HotkeyDisplayInfo {
                device_id: device.id.clone(),
                display_name: device.display_name(),
                sub_name: device.display_sub_name(),
                hotkey,
                is_connected: true,
            })
        })
        .collect();

    let disconnected: Vec<HotkeyDisplayInfo> = settings
        .hotkeys
        .iter()
        .filter(|(id, _)| !table.iter().any(|row| &row.device_id == *id))
        .map(|(id, hotkey)| {
            let (display_name, sub_name) = stored_names(settings, id);
            HotkeyDisplayInfo {
                device_id: id.clone(),
                display_name,
                sub_name,
                hotkey: *hotkey,
                is_connected: false,
            }
        })
        .collect();

    table.extend(disconnected);
    table
}

/// Reject `hotkey` for `device_id` if any other device, connected or not,
/// already holds a structurally equal hotkey.
pub fn find_conflict<'a>(
    settings: &Settings,
    connected: impl IntoIterator<Item = &'a AudioDevice>,
    device_id: &str,
    hotkey: &Hotkey,
) -> Result<(), HotkeyError> {
    if !hotkey.is_valid() {
        return Err(HotkeyError::Empty);
    }

    let Some((owner, _)) = settings
        .hotkeys
        .iter()
        .find(|(id, existing)| id.as_str() != device_id && *existing == hotkey)
    else {
        return Ok(());
    };

    let display_name = connected
        .into_iter()
        .find(|d| &d.id == owner)
        .map(|d| d.display_name())
        .unwrap_or_else(|| stored_names(settings, owner).0);

    Err(HotkeyError::Conflict {
        device_id: owner.clone(),
        display_name,
    })
}

/// Keeps OS registrations in step with the devices currently listed.
pub struct HotkeyManager<H: HotkeyRegistrar> {
    registrar: H,
}

impl<H: HotkeyRegistrar> HotkeyManager<H> {
    pub fn new(registrar: H) -> Self {
        Self { registrar }
    }

    /// Drop every registration and register one per listed device with a
    /// hotkey. Returns how many registrations succeeded.
    pub fn reload<'a>(&self, devices: impl IntoIterator<Item = &'a AudioDevice>) -> usize {
        self.registrar.unregister_all();

        let mut registered = 0;
        for device in devices {
            let Some(hotkey) = device.hotkey else {
                continue;
            };
            match self.registrar.register(&device.id, &hotkey) {
                Ok(()) => {
                    debug!("Registered {} for {}", hotkey, device.name);
                    registered += 1;
                }
                Err(e) => warn!("Could not register {} for {}: {:#}", hotkey, device.name, e),
            }
        }
        registered
    }

    pub fn unregister_all(&self) {
        self.registrar.unregister_all();
    }

    /// Get reference to the registrar (for testing)
    #[cfg(any(test, feature = "test-mocks"))]
    pub fn registrar(&self) -> &H {
        &self.registrar
    }
}
