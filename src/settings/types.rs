use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::audio::{DataFlow, DeviceStateMask, Hotkey};

/// Name fingerprint of a device id at the time it was last seen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceNameIdentity {
    pub display_name: String,
    pub sub_name: String,
    /// Direction the id was seen in; absent in older settings files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<DataFlow>,
}

impl DeviceNameIdentity {
    pub fn new(display_name: impl Into<String>, sub_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            sub_name: sub_name.into(),
            flow: None,
        }
    }

    pub fn with_flow(mut self, flow: DataFlow) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn matches(&self, display_name: &str, sub_name: &str) -> bool {
        self.display_name == display_name && self.sub_name == sub_name
    }

    /// Direction of the device recorded under `device_id`: the stored flow,
    /// else the one encoded in the endpoint id.
    pub fn flow_of(&self, device_id: &str) -> Option<DataFlow> {
        self.flow.or_else(|| DataFlow::from_endpoint_id(device_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSortMode {
    /// Favorites first, then by full friendly name
    #[default]
    FriendlyName,
    /// Favorites first, then by the hardware sub-name
    DeviceName,
}

impl FromStr for DeviceSortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FriendlyName" => Ok(DeviceSortMode::FriendlyName),
            "DeviceName" => Ok(DeviceSortMode::DeviceName),
            other => Err(format!("unknown sort mode '{}'", other)),
        }
    }
}

impl fmt::Display for DeviceSortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSortMode::FriendlyName => write!(f, "FriendlyName"),
            DeviceSortMode::DeviceName => write!(f, "DeviceName"),
        }
    }
}

/// Persisted user preferences, keyed by the current device id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub show_tray_icon: bool,
    pub minimize_to_tray: bool,
    pub close_to_tray: bool,
    pub start_minimized: bool,
    pub quick_switch_mode: bool,
    pub sync_communication_device: bool,
    pub show_disabled_devices: bool,
    pub show_disconnected_devices: bool,
    pub device_sort_mode: String,
    pub log_level: String,

    pub favorite_device_ids: BTreeSet<String>,
    pub hotkeys: BTreeMap<String, Hotkey>,
    pub custom_device_icons: BTreeMap<String, String>,
    pub device_name_mapping: BTreeMap<String, DeviceNameIdentity>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_tray_icon: true,
            minimize_to_tray: false,
            close_to_tray: true,
            start_minimized: false,
            quick_switch_mode: false,
            sync_communication_device: true,
            show_disabled_devices: false,
            show_disconnected_devices: false,
            device_sort_mode: DeviceSortMode::FriendlyName.to_string(),
            log_level: "info".to_string(),
            favorite_device_ids: BTreeSet::new(),
            hotkeys: BTreeMap::new(),
            custom_device_icons: BTreeMap::new(),
            device_name_mapping: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Enumeration mask implied by the display toggles.
    pub fn state_mask(&self) -> DeviceStateMask {
        DeviceStateMask::for_display(self.show_disabled_devices, self.show_disconnected_devices)
    }

    /// Parsed sort mode; unknown values fall back to `FriendlyName`.
    pub fn sort_mode(&self) -> DeviceSortMode {
        self.device_sort_mode.parse().unwrap_or_default()
    }

    pub fn is_favorite(&self, device_id: &str) -> bool {
        self.favorite_device_ids.contains(device_id)
    }

    pub fn hotkey_for(&self, device_id: &str) -> Option<Hotkey> {
        self.hotkeys.get(device_id).copied()
    }

    pub fn custom_icon_for(&self, device_id: &str) -> Option<&str> {
        self.custom_device_icons.get(device_id).map(String::as_str)
    }
}
