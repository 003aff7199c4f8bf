//! Test utility builders for endpoints, settings and mock-backed services
//!
//! Individual methods may not be used by all tests, so dead code warnings are suppressed.

#![allow(dead_code)]

use soundhop::audio::{DataFlow, DeviceRole, DeviceState, EndpointInfo, Hotkey, KeyModifiers};
use soundhop::settings::{DeviceNameIdentity, Settings};
use soundhop::system::{MockAudioSystem, MockFileSystem, MockHotkeyRegistrar};
use soundhop::SwitcherService;

/// Path `SwitcherService::new_for_testing` reads and writes.
pub const TEST_SETTINGS_PATH: &str = "/test/settings.toml";

pub type MockService = SwitcherService<MockAudioSystem, MockFileSystem, MockHotkeyRegistrar>;

/// Builder for endpoints as the platform reports them
pub struct EndpointBuilder {
    id: String,
    name: String,
    flow: DataFlow,
    state: DeviceState,
    icon_path: String,
}

impl EndpointBuilder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            flow: DataFlow::Render,
            state: DeviceState::Active,
            icon_path: String::new(),
        }
    }

    pub fn input(mut self) -> Self {
        self.flow = DataFlow::Capture;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.state = DeviceState::Disabled;
        self
    }

    pub fn unplugged(mut self) -> Self {
        self.state = DeviceState::Unplugged;
        self
    }

    pub fn icon_path(mut self, icon_path: &str) -> Self {
        self.icon_path = icon_path.to_string();
        self
    }

    /// Register the endpoint with `audio`.
    pub fn add_to(self, audio: &MockAudioSystem) {
        let flow = self.flow;
        audio.add_endpoint(
            flow,
            EndpointInfo::new(self.id, self.name)
                .with_state(self.state)
                .with_icon_path(self.icon_path),
        );
    }

    /// Register the endpoint and make it the default for every role.
    pub fn add_as_default(self, audio: &MockAudioSystem) {
        let flow = self.flow;
        let id = self.id.clone();
        self.add_to(audio);
        audio.set_mock_default(flow, DeviceRole::Multimedia, Some(&id));
        audio.set_mock_default(flow, DeviceRole::Communications, Some(&id));
    }
}

/// Builder for persisted settings
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
        }
    }

    pub fn favorite(mut self, device_id: &str) -> Self {
        self.settings
            .favorite_device_ids
            .insert(device_id.to_string());
        self
    }

    pub fn hotkey(mut self, device_id: &str, modifiers: KeyModifiers, key: u32) -> Self {
        self.settings
            .hotkeys
            .insert(device_id.to_string(), Hotkey::new(modifiers, key));
        self
    }

    pub fn custom_icon(mut self, device_id: &str, glyph: &str) -> Self {
        self.settings
            .custom_device_icons
            .insert(device_id.to_string(), glyph.to_string());
        self
    }

    pub fn known_device(mut self, device_id: &str, display_name: &str, sub_name: &str) -> Self {
        self.settings.device_name_mapping.insert(
            device_id.to_string(),
            DeviceNameIdentity::new(display_name, sub_name),
        );
        self
    }

    pub fn sort_by_device_name(mut self) -> Self {
        self.settings.device_sort_mode = "DeviceName".to_string();
        self
    }

    pub fn show_disabled(mut self) -> Self {
        self.settings.show_disabled_devices = true;
        self
    }

    pub fn show_disconnected(mut self) -> Self {
        self.settings.show_disconnected_devices = true;
        self
    }

    pub fn without_comms_sync(mut self) -> Self {
        self.settings.sync_communication_device = false;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(&self.settings).unwrap()
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Service over mocks, with `settings` already on disk at [`TEST_SETTINGS_PATH`].
pub fn service_with_settings(
    audio: &MockAudioSystem,
    settings: SettingsBuilder,
) -> (MockService, MockFileSystem, MockHotkeyRegistrar) {
    let file_system = MockFileSystem::new();
    file_system.add_file(TEST_SETTINGS_PATH, settings.to_toml());
    let registrar = MockHotkeyRegistrar::new();
    let service =
        SwitcherService::new_for_testing(audio.clone(), file_system.clone(), registrar.clone());
    (service, file_system, registrar)
}

/// Settings as last written to the mock file system.
pub fn saved_settings(file_system: &MockFileSystem) -> Settings {
    let content = file_system
        .file_content(TEST_SETTINGS_PATH)
        .expect("settings were never written");
    toml::from_str(&content).unwrap()
}
