use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::LazyLock;

use super::hotkey::Hotkey;

/// Trailing parenthesized segment of a friendly name: `"<DisplayName> (<SubName>)"`.
static NAME_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\s\((.*)\)$").expect("device name pattern is valid"));

pub const GLYPH_SPEAKERS: &str = "\u{E7F5}";
pub const GLYPH_HEADPHONES: &str = "\u{E7F6}";
pub const GLYPH_DIGITAL: &str = "\u{E7F3}";
pub const GLYPH_MONITOR: &str = "\u{E7F4}";
pub const GLYPH_MICROPHONE: &str = "\u{E720}";
pub const GLYPH_MUSIC_NOTE: &str = "\u{E767}";

/// Direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFlow {
    Render,
    Capture,
}

/// Role an endpoint can be the system default for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Console,
    Multimedia,
    Communications,
}

/// Dominant state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Active,
    Disabled,
    NotPresent,
    Unplugged,
}

/// Set of endpoint states used to filter enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceStateMask(u32);

/// Raw endpoint as reported by the platform device API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: String,
    pub name: String,
    pub state: DeviceState,
    pub icon_path: String,
}

/// One audio endpoint as shown to the user, with preferences applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub icon_path: String,
    pub state: DeviceState,
    pub is_input: bool,
    pub is_default: bool,
    pub is_default_comms: bool,
    pub is_favorite: bool,
    pub hotkey: Option<Hotkey>,
    pub custom_icon_glyph: Option<String>,
    pub show_divider_above: bool,
}

impl DataFlow {
    /// Direction encoded in a Windows endpoint id (`{0.0.0.…}` render,
    /// `{0.0.1.…}` capture), if the id has that shape.
    pub fn from_endpoint_id(device_id: &str) -> Option<Self> {
        if device_id.starts_with("{0.0.0.") {
            Some(DataFlow::Render)
        } else if device_id.starts_with("{0.0.1.") {
            Some(DataFlow::Capture)
        } else {
            None
        }
    }
}

impl fmt::Display for DataFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFlow::Render => write!(f, "Output"),
            DataFlow::Capture => write!(f, "Input"),
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Active => write!(f, "Active"),
            DeviceState::Disabled => write!(f, "Disabled"),
            DeviceState::NotPresent => write!(f, "Not present"),
            DeviceState::Unplugged => write!(f, "Unplugged"),
        }
    }
}

impl DeviceState {
    /// Map a platform state bitfield to its dominant state (lowest set bit).
    pub fn from_bits(bits: u32) -> Self {
        if bits & DeviceStateMask::ACTIVE.0 != 0 {
            DeviceState::Active
        } else if bits & DeviceStateMask::DISABLED.0 != 0 {
            DeviceState::Disabled
        } else if bits & DeviceStateMask::NOT_PRESENT.0 != 0 {
            DeviceState::NotPresent
        } else if bits & DeviceStateMask::UNPLUGGED.0 != 0 {
            DeviceState::Unplugged
        } else {
            DeviceState::NotPresent
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            DeviceState::Active => 1,
            DeviceState::Disabled => 2,
            DeviceState::NotPresent => 4,
            DeviceState::Unplugged => 8,
        }
    }
}

impl DeviceStateMask {
    pub const ACTIVE: Self = Self(1);
    pub const DISABLED: Self = Self(2);
    pub const NOT_PRESENT: Self = Self(4);
    pub const UNPLUGGED: Self = Self(8);
    pub const ALL: Self = Self(15);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, state: DeviceState) -> bool {
        self.0 & state.bits() != 0
    }

    /// Active devices plus whatever the display toggles ask for. `NotPresent`
    /// is never included, matching what the OS sound panel lists.
    pub fn for_display(show_disabled: bool, show_disconnected: bool) -> Self {
        let mut mask = Self::ACTIVE;
        if show_disabled {
            mask |= Self::DISABLED;
        }
        if show_disconnected {
            mask |= Self::UNPLUGGED;
        }
        mask
    }
}

impl BitOr for DeviceStateMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceStateMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl EndpointInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: DeviceState::Active,
            icon_path: String::new(),
        }
    }

    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_icon_path(mut self, icon_path: impl Into<String>) -> Self {
        self.icon_path = icon_path.into();
        self
    }
}

/// Split a friendly name into `(display name, sub name)`.
///
/// `"MAIN Left/Right (Minifuse 1)"` becomes `("MAIN Left/Right", "Minifuse 1")`;
/// a name without a trailing parenthesized segment is returned whole with an
/// empty sub name.
pub fn split_device_name(name: &str) -> (String, String) {
    match NAME_PARTS.captures(name) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => (name.to_string(), String::new()),
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} [{}]",
            self.name,
            if self.is_input { "Input" } else { "Output" },
            if self.is_default {
                "Default"
            } else if self.is_default_comms {
                "Default communications"
            } else {
                "Available"
            },
            self.state
        )
    }
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, flow: DataFlow) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon_path: String::new(),
            state: DeviceState::Active,
            is_input: flow == DataFlow::Capture,
            is_default: false,
            is_default_comms: false,
            is_favorite: false,
            hotkey: None,
            custom_icon_glyph: None,
            show_divider_above: false,
        }
    }

    pub fn from_endpoint(endpoint: EndpointInfo, flow: DataFlow) -> Self {
        let mut device = Self::new(endpoint.id, endpoint.name, flow);
        device.state = endpoint.state;
        device.icon_path = endpoint.icon_path;
        device
    }

    pub fn set_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn set_default_comms(mut self, is_default_comms: bool) -> Self {
        self.is_default_comms = is_default_comms;
        self
    }

    pub fn set_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn flow(&self) -> DataFlow {
        if self.is_input {
            DataFlow::Capture
        } else {
            DataFlow::Render
        }
    }

    pub fn display_name(&self) -> String {
        split_device_name(&self.name).0
    }

    pub fn display_sub_name(&self) -> String {
        split_device_name(&self.name).1
    }

    pub fn has_sub_name(&self) -> bool {
        !self.display_sub_name().is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.state == DeviceState::Active
    }

    pub fn is_disabled(&self) -> bool {
        self.state == DeviceState::Disabled
    }

    /// Only `Unplugged` counts as disconnected; `NotPresent` endpoints are never listed.
    pub fn is_disconnected(&self) -> bool {
        self.state == DeviceState::Unplugged
    }

    /// Glyph to render for this device: the user's custom glyph, else one
    /// derived from the system icon resource, else a guess from the name.
    pub fn display_icon(&self) -> &str {
        if let Some(glyph) = self.custom_icon_glyph.as_deref().filter(|g| !g.is_empty()) {
            return glyph;
        }

        if !self.icon_path.is_empty() {
            if !self.icon_path.to_lowercase().contains("mmres.dll") {
                return GLYPH_MUSIC_NOTE;
            }

            let parts: Vec<&str> = self.icon_path.split(',').collect();
            if parts.len() == 2 {
                if let Ok(resource_id) = parts[1].trim().parse::<i32>() {
                    return match resource_id.unsigned_abs() {
                        3010 | 3014 => GLYPH_SPEAKERS,
                        3011 | 3012 => GLYPH_HEADPHONES,
                        3013 => GLYPH_DIGITAL,
                        3030 | 3031 => GLYPH_MICROPHONE,
                        _ => GLYPH_MONITOR,
                    };
                }
            }
        }

        let name = self.name.to_lowercase();
        if name.contains("headphone") || name.contains("headset") {
            GLYPH_HEADPHONES
        } else if name.contains("speaker") {
            GLYPH_SPEAKERS
        } else {
            GLYPH_MONITOR
        }
    }
}
