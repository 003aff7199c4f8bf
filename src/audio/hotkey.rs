use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use thiserror::Error;

/// Modifier keys of a global hotkey, using the Win32 `MOD_*` bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyModifiers(u32);

/// A global hotkey: modifiers plus a virtual key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hotkey {
    pub modifiers: KeyModifiers,
    pub key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseHotkeyError {
    #[error("hotkey is empty")]
    Empty,
    #[error("hotkey '{0}' has no key, only modifiers")]
    MissingKey(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

impl KeyModifiers {
    pub const NONE: Self = Self(0);
    pub const ALT: Self = Self(1);
    pub const CONTROL: Self = Self(2);
    pub const SHIFT: Self = Self(4);
    pub const WINDOWS: Self = Self(8);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0xF)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for KeyModifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for KeyModifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Hotkey {
    pub fn new(modifiers: KeyModifiers, key: u32) -> Self {
        Self { modifiers, key }
    }

    /// A hotkey needs a real key; modifiers alone cannot be registered.
    pub fn is_valid(&self) -> bool {
        self.key != 0
    }
}

const NAMED_KEYS: &[(u32, &str)] = &[
    (0x08, "Back"),
    (0x09, "Tab"),
    (0x0D, "Enter"),
    (0x13, "Pause"),
    (0x1B, "Escape"),
    (0x20, "Space"),
    (0x21, "PageUp"),
    (0x22, "PageDown"),
    (0x23, "End"),
    (0x24, "Home"),
    (0x25, "Left"),
    (0x26, "Up"),
    (0x27, "Right"),
    (0x28, "Down"),
    (0x2C, "Snapshot"),
    (0x2D, "Insert"),
    (0x2E, "Delete"),
    (0x6A, "Multiply"),
    (0x6B, "Add"),
    (0x6D, "Subtract"),
    (0x6E, "Decimal"),
    (0x6F, "Divide"),
    (0xAD, "VolumeMute"),
    (0xAE, "VolumeDown"),
    (0xAF, "VolumeUp"),
    (0xB0, "MediaNextTrack"),
    (0xB1, "MediaPreviousTrack"),
    (0xB3, "MediaPlayPause"),
];

/// Human-readable name of a virtual key code.
pub fn key_name(vk: u32) -> String {
    match vk {
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(vk)
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("Key{:02X}", vk)),
        0x60..=0x69 => format!("NumberPad{}", vk - 0x60),
        0x70..=0x87 => format!("F{}", vk - 0x6F),
        _ => NAMED_KEYS
            .iter()
            .find(|(code, _)| *code == vk)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("Key{:02X}", vk)),
    }
}

/// Inverse of [`key_name`], case-insensitive.
pub fn parse_key(name: &str) -> Option<u32> {
    let upper = name.trim().to_ascii_uppercase();
    let mut chars = upper.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            return Some(c as u32);
        }
    }

    if let Some(number) = upper.strip_prefix('F') {
        if let Ok(n) = number.parse::<u32>() {
            if (1..=24).contains(&n) {
                return Some(0x6F + n);
            }
        }
    }

    if let Some(digit) = upper.strip_prefix("NUMBERPAD") {
        if let Ok(n) = digit.parse::<u32>() {
            if n <= 9 {
                return Some(0x60 + n);
            }
        }
    }

    if let Some(hex) = upper.strip_prefix("KEY") {
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            if code > 0 && code <= 0xFE {
                return Some(code);
            }
        }
    }

    NAMED_KEYS
        .iter()
        .find(|(_, key)| key.eq_ignore_ascii_case(&upper))
        .map(|(code, _)| *code)
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.modifiers.contains(KeyModifiers::WINDOWS) {
            parts.push("Win".to_string());
        }
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            parts.push("Shift".to_string());
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            parts.push("Alt".to_string());
        }
        parts.push(key_name(self.key));
        write!(f, "{}", parts.join(" + "))
    }
}

impl FromStr for Hotkey {
    type Err = ParseHotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s
            .split('+')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(ParseHotkeyError::Empty);
        }

        let mut modifiers = KeyModifiers::NONE;
        let mut key = None;
        for token in tokens {
            match token.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
                "alt" => modifiers |= KeyModifiers::ALT,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                "win" | "windows" | "super" => modifiers |= KeyModifiers::WINDOWS,
                _ => {
                    let code =
                        parse_key(token).ok_or_else(|| ParseHotkeyError::UnknownKey(token.to_string()))?;
                    key = Some(code);
                }
            }
        }

        match key {
            Some(key) => Ok(Hotkey { modifiers, key }),
            None => Err(ParseHotkeyError::MissingKey(s.to_string())),
        }
    }
}
