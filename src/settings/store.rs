use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::audio::Hotkey;
use crate::system::FileSystemInterface;

use super::loader::SettingsLoader;
use super::types::{DeviceNameIdentity, Settings};

/// Single owner and writer of persisted preferences. Every mutation is
/// saved immediately; failures to save are logged and the in-memory copy wins.
pub struct SettingsStore<F: FileSystemInterface> {
    loader: SettingsLoader<F>,
    settings: Settings,
}

impl<F: FileSystemInterface> SettingsStore<F> {
    /// Load settings, falling back to defaults when the file is unreadable.
    pub fn new(loader: SettingsLoader<F>) -> Self {
        let settings = match loader.load_settings() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Using default settings: {:#}", e);
                Settings::default()
            }
        };
        Self { loader, settings }
    }

    /// Wrap already-loaded settings without touching the file system.
    pub fn with_settings(loader: SettingsLoader<F>, settings: Settings) -> Self {
        Self { loader, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_path(&self) -> &Path {
        self.loader.settings_path()
    }

    /// Persist the current settings. Returns false (after logging) on failure.
    pub fn save(&self) -> bool {
        match self.loader.save_settings(&self.settings) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save settings: {:#}", e);
                false
            }
        }
    }

    /// Persist, surfacing the error to the caller.
    pub fn try_save(&self) -> Result<()> {
        self.loader.save_settings(&self.settings)
    }

    /// Find a previously seen id whose stored fingerprint equals
    /// `(display_name, sub_name)`, never returning `current_id` itself.
    pub fn find_old_id_by_name(
        &self,
        display_name: &str,
        sub_name: &str,
        current_id: &str,
    ) -> Option<String> {
        self.find_old_id_by_name_excluding(display_name, sub_name, |id| id == current_id)
    }

    /// Like [`Self::find_old_id_by_name`], skipping every id for which `exclude`
    /// returns true. The first match in ascending id order wins.
    pub fn find_old_id_by_name_excluding(
        &self,
        display_name: &str,
        sub_name: &str,
        exclude: impl Fn(&str) -> bool,
    ) -> Option<String> {
        self.settings
            .device_name_mapping
            .iter()
            .filter(|(id, _)| !exclude(id))
            .find(|(_, identity)| identity.matches(display_name, sub_name))
            .map(|(id, _)| id.clone())
    }

    /// Stored id a reconnected device should inherit from: same names, a
    /// compatible direction, and not rejected by `exclude`. Ids whose
    /// direction is unknown are compatible with either.
    pub fn find_migration_source(
        &self,
        identity: &DeviceNameIdentity,
        exclude: impl Fn(&str) -> bool,
    ) -> Option<String> {
        self.settings
            .device_name_mapping
            .iter()
            .filter(|(id, _)| !exclude(id))
            .filter(|(id, stored)| match (identity.flow, stored.flow_of(id)) {
                (Some(wanted), Some(recorded)) => wanted == recorded,
                _ => true,
            })
            .find(|(_, stored)| stored.matches(&identity.display_name, &identity.sub_name))
            .map(|(id, _)| id.clone())
    }

    pub fn device_name_identity(&self, device_id: &str) -> Option<&DeviceNameIdentity> {
        self.settings.device_name_mapping.get(device_id)
    }

    /// Move every preference keyed by `old_id` to `new_id` and record the new
    /// fingerprint, then save once.
    pub fn migrate_device_settings(
        &mut self,
        old_id: &str,
        new_id: &str,
        identity: DeviceNameIdentity,
    ) {
        let settings = &mut self.settings;

        if settings.favorite_device_ids.remove(old_id) {
            settings.favorite_device_ids.insert(new_id.to_string());
            debug!("Migrated favorite {} -> {}", old_id, new_id);
        }
        if let Some(hotkey) = settings.hotkeys.remove(old_id) {
            settings.hotkeys.insert(new_id.to_string(), hotkey);
            debug!("Migrated hotkey {} -> {}", old_id, new_id);
        }
        if let Some(glyph) = settings.custom_device_icons.remove(old_id) {
            settings.custom_device_icons.insert(new_id.to_string(), glyph);
            debug!("Migrated custom icon {} -> {}", old_id, new_id);
        }
        settings.device_name_mapping.remove(old_id);
        settings
            .device_name_mapping
            .insert(new_id.to_string(), identity);

        info!("Migrated device settings from {} to {}", old_id, new_id);
        self.save();
    }

    /// Record the fingerprint of `device_id`. Saves and returns true only when
    /// the stored value changed.
    pub fn update_device_name_mapping(
        &mut self,
        device_id: &str,
        identity: DeviceNameIdentity,
    ) -> bool {
        if self.settings.device_name_mapping.get(device_id) == Some(&identity) {
            return false;
        }

        debug!(
            "Recording name mapping {} -> {} ({})",
            device_id, identity.display_name, identity.sub_name
        );
        self.settings
            .device_name_mapping
            .insert(device_id.to_string(), identity);
        self.save();
        true
    }

    /// Flip the favorite flag of a device; returns the new state.
    pub fn toggle_favorite(&mut self, device_id: &str) -> bool {
        let is_favorite = if self.settings.favorite_device_ids.remove(device_id) {
            false
        } else {
            self.settings
                .favorite_device_ids
                .insert(device_id.to_string());
            true
        };
        self.save();
        is_favorite
    }

    pub fn set_hotkey(&mut self, device_id: &str, hotkey: Option<Hotkey>) {
        match hotkey {
            Some(hotkey) => {
                self.settings.hotkeys.insert(device_id.to_string(), hotkey);
            }
            None => {
                self.settings.hotkeys.remove(device_id);
            }
        }
        self.save();
    }

    /// Set or clear a custom glyph; an empty glyph clears it.
    pub fn set_custom_icon(&mut self, device_id: &str, glyph: Option<&str>) {
        match glyph.filter(|g| !g.is_empty()) {
            Some(glyph) => {
                self.settings
                    .custom_device_icons
                    .insert(device_id.to_string(), glyph.to_string());
            }
            None => {
                self.settings.custom_device_icons.remove(device_id);
            }
        }
        self.save();
    }

    /// Get reference to the loader (for testing)
    #[cfg(any(test, feature = "test-mocks"))]
    pub fn loader(&self) -> &SettingsLoader<F> {
        &self.loader
    }
}
