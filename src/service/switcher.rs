use anyhow::Result;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::audio::{AudioDevice, DataFlow, DeviceEnumerator, Hotkey};
use crate::hotkeys::{HotkeyDisplayInfo, HotkeyError, HotkeyManager, build_hotkey_table, find_conflict};
use crate::identity::{IdentityMigration, resolve_identities};
use crate::reconcile::{CollectionEvent, DeviceCollection, ReconcileSummary};
use crate::settings::{Settings, SettingsLoader, SettingsStore};
use crate::system::{AudioSystemInterface, FileSystemInterface, HotkeyRegistrar};

/// A user action issued against a device that cannot take it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("no device with id {0}")]
    UnknownDevice(String),
    #[error("device {0} is not active")]
    NotActive(String),
    #[error("device {0} is not disabled")]
    NotDisabled(String),
}

/// Outcome of one full refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub migrations: Vec<IdentityMigration>,
    pub outputs: ReconcileSummary,
    pub inputs: ReconcileSummary,
    pub hotkeys_registered: usize,
}

/// Application context: owns the settings store and both device collections
/// and is the only place they are mutated.
pub struct SwitcherService<A: AudioSystemInterface, F: FileSystemInterface, H: HotkeyRegistrar> {
    enumerator: DeviceEnumerator<A>,
    store: SettingsStore<F>,
    hotkeys: HotkeyManager<H>,
    outputs: DeviceCollection,
    inputs: DeviceCollection,
}

impl<A: AudioSystemInterface, F: FileSystemInterface, H: HotkeyRegistrar> SwitcherService<A, F, H> {
    pub fn new(audio_system: A, file_system: F, registrar: H, settings_path: PathBuf) -> Self {
        let store = SettingsStore::new(SettingsLoader::new(file_system, settings_path));
        Self {
            enumerator: DeviceEnumerator::new(audio_system),
            store,
            hotkeys: HotkeyManager::new(registrar),
            outputs: DeviceCollection::new(DataFlow::Render),
            inputs: DeviceCollection::new(DataFlow::Capture),
        }
    }

    /// Enumerate both directions, resolve identities across the combined list,
    /// reconcile each collection and re-register hotkeys.
    pub fn refresh(&mut self) -> RefreshSummary {
        let mask = self.store.settings().state_mask();
        let render = self.enumerator.list_devices(DataFlow::Render, mask);
        let capture = self.enumerator.list_devices(DataFlow::Capture, mask);

        let all: Vec<AudioDevice> = render.iter().chain(capture.iter()).cloned().collect();
        let migrations = resolve_identities(&mut self.store, &all);

        let settings = self.store.settings();
        let outputs = self.outputs.reconcile(render, settings);
        let inputs = self.inputs.reconcile(capture, settings);
        let hotkeys_registered = self.reload_hotkeys();

        debug!(
            "Refresh: {} outputs, {} inputs, {} migrations",
            self.outputs.len(),
            self.inputs.len(),
            migrations.len()
        );

        RefreshSummary {
            migrations,
            outputs,
            inputs,
            hotkeys_registered,
        }
    }

    fn reload_hotkeys(&self) -> usize {
        self.hotkeys
            .reload(self.outputs.devices().iter().chain(self.inputs.devices()))
    }

    fn apply_settings(&mut self) {
        let settings = self.store.settings();
        self.outputs.apply_settings(settings);
        self.inputs.apply_settings(settings);
    }

    pub fn collection(&self, flow: DataFlow) -> &DeviceCollection {
        match flow {
            DataFlow::Render => &self.outputs,
            DataFlow::Capture => &self.inputs,
        }
    }

    fn collection_mut(&mut self, flow: DataFlow) -> &mut DeviceCollection {
        match flow {
            DataFlow::Render => &mut self.outputs,
            DataFlow::Capture => &mut self.inputs,
        }
    }

    pub fn devices(&self, flow: DataFlow) -> &[AudioDevice] {
        self.collection(flow).devices()
    }

    pub fn default_device(&self, flow: DataFlow) -> Option<&AudioDevice> {
        self.collection(flow).default_device()
    }

    pub fn subscribe(
        &mut self,
        flow: DataFlow,
        observer: impl Fn(&CollectionEvent) + Send + Sync + 'static,
    ) {
        self.collection_mut(flow).subscribe(observer);
    }

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    pub fn settings_store(&self) -> &SettingsStore<F> {
        &self.store
    }

    /// Look a listed device up by id in either direction.
    pub fn find_device(&self, device_id: &str) -> Option<&AudioDevice> {
        self.outputs
            .get(device_id)
            .or_else(|| self.inputs.get(device_id))
    }

    /// Resolve user input: an id, an exact friendly name, or an exact
    /// (case-insensitive) display name, preferring `flow` when given.
    pub fn resolve_device(&self, query: &str, flow: Option<DataFlow>) -> Option<&AudioDevice> {
        let candidates: Vec<&AudioDevice> = match flow {
            Some(flow) => self.devices(flow).iter().collect(),
            None => self.outputs.devices().iter().chain(self.inputs.devices()).collect(),
        };
        candidates
            .iter()
            .find(|d| d.id == query)
            .or_else(|| candidates.iter().find(|d| d.name == query))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|d| d.display_name().eq_ignore_ascii_case(query))
            })
            .copied()
    }

    fn require_device(&self, device_id: &str) -> Result<&AudioDevice, ActionError> {
        self.find_device(device_id)
            .ok_or_else(|| ActionError::UnknownDevice(device_id.to_string()))
    }

    fn require_active(&self, device_id: &str) -> Result<DataFlow, ActionError> {
        let device = self.require_device(device_id)?;
        if !device.is_active() {
            return Err(ActionError::NotActive(device_id.to_string()));
        }
        Ok(device.flow())
    }

    /// Flip a device's favorite flag and re-sort. Returns the new flag.
    pub fn toggle_favorite(&mut self, device_id: &str) -> Result<bool, ActionError> {
        self.require_device(device_id)?;
        let is_favorite = self.store.toggle_favorite(device_id);
        info!(
            "{} {} {} favorites",
            if is_favorite { "Added" } else { "Removed" },
            device_id,
            if is_favorite { "to" } else { "from" }
        );
        self.apply_settings();
        Ok(is_favorite)
    }

    /// Make an active device the default for console and multimedia, and for
    /// communications too when syncing is enabled.
    pub fn set_default(&mut self, device_id: &str) -> Result<()> {
        let flow = self.require_active(device_id)?;
        self.enumerator.set_default(device_id)?;
        self.collection_mut(flow).mark_default(device_id);

        if self.store.settings().sync_communication_device {
            self.enumerator.set_default_communications(device_id)?;
            self.collection_mut(flow).mark_default_comms(device_id);
        }
        Ok(())
    }

    pub fn set_default_communications(&mut self, device_id: &str) -> Result<()> {
        let flow = self.require_active(device_id)?;
        self.enumerator.set_default_communications(device_id)?;
        self.collection_mut(flow).mark_default_comms(device_id);
        Ok(())
    }

    /// Set or clear (`None` or empty) the custom glyph of a device.
    pub fn set_device_icon(&mut self, device_id: &str, glyph: Option<&str>) -> Result<(), ActionError> {
        self.require_device(device_id)?;
        self.store.set_custom_icon(device_id, glyph);
        self.apply_settings();
        Ok(())
    }

    /// Switch to the active favorite after the current default, wrapping.
    /// Returns the id switched to, or `None` without favorites.
    pub fn cycle_to_next_favorite(&mut self, flow: DataFlow) -> Result<Option<String>> {
        let collection = self.collection(flow);
        let favorites: Vec<&AudioDevice> = collection
            .devices()
            .iter()
            .filter(|d| d.is_favorite && d.is_active())
            .collect();
        if favorites.is_empty() {
            debug!("No active {} favorites to cycle through", flow);
            return Ok(None);
        }

        let current = collection.default_device().map(|d| d.id.as_str());
        let next = match favorites.iter().position(|d| Some(d.id.as_str()) == current) {
            Some(index) => (index + 1) % favorites.len(),
            None => 0,
        };
        let next_id = favorites[next].id.clone();

        self.set_default(&next_id)?;
        Ok(Some(next_id))
    }

    pub fn enable_device(&mut self, device_id: &str) -> Result<()> {
        if !self.require_device(device_id)?.is_disabled() {
            return Err(ActionError::NotDisabled(device_id.to_string()).into());
        }
        self.enumerator.set_enabled(device_id, true)?;
        self.refresh();
        Ok(())
    }

    pub fn disable_device(&mut self, device_id: &str) -> Result<()> {
        self.require_active(device_id)?;
        self.enumerator.set_enabled(device_id, false)?;
        self.refresh();
        Ok(())
    }

    /// Assign a hotkey after checking it against every other device's hotkey.
    pub fn assign_hotkey(&mut self, device_id: &str, hotkey: Hotkey) -> Result<(), HotkeyError> {
        find_conflict(
            self.store.settings(),
            self.outputs.devices().iter().chain(self.inputs.devices()),
            device_id,
            &hotkey,
        )?;

        info!("Assigning {} to {}", hotkey, device_id);
        self.store.set_hotkey(device_id, Some(hotkey));
        self.apply_settings();
        self.reload_hotkeys();
        Ok(())
    }

    /// Remove a device's hotkey; returns whether one was set.
    pub fn clear_hotkey(&mut self, device_id: &str) -> bool {
        if self.store.settings().hotkey_for(device_id).is_none() {
            return false;
        }
        info!("Clearing hotkey of {}", device_id);
        self.store.set_hotkey(device_id, None);
        self.apply_settings();
        self.reload_hotkeys();
        true
    }

    pub fn hotkey_table(&self) -> Vec<HotkeyDisplayInfo> {
        build_hotkey_table(
            self.store.settings(),
            self.outputs.devices().iter().chain(self.inputs.devices()),
        )
    }

    pub fn handle_hotkey_pressed(&mut self, device_id: &str) {
        info!("Hotkey pressed for {}", device_id);
        if let Err(e) = self.set_default(device_id) {
            error!("Failed to switch to {}: {:#}", device_id, e);
        }
    }

    /// Forward platform change notifications to `callback`.
    pub fn on_devices_changed(&self, callback: Box<dyn Fn() + Send + Sync>) -> Result<()> {
        self.enumerator.on_devices_changed(callback)
    }

    /// Drop all OS hotkey registrations.
    pub fn shutdown(&self) {
        self.hotkeys.unregister_all();
        info!("Switcher service stopped");
    }
}

// Convenience constructor for production use
impl
    SwitcherService<
        crate::system::PlatformAudioSystem,
        crate::system::StandardFileSystem,
        crate::system::PlatformHotkeyRegistrar,
    >
{
    pub fn new_production(settings_path: PathBuf, handle: super::ServiceHandle) -> Result<Self> {
        let audio_system = crate::system::PlatformAudioSystem::new()?;
        let registrar = crate::system::PlatformHotkeyRegistrar::new(handle)?;
        Ok(Self::new(
            audio_system,
            crate::system::StandardFileSystem,
            registrar,
            settings_path,
        ))
    }
}

// Convenience constructor for testing
#[cfg(any(test, feature = "test-mocks"))]
impl
    SwitcherService<
        crate::system::MockAudioSystem,
        crate::system::MockFileSystem,
        crate::system::MockHotkeyRegistrar,
    >
{
    pub fn new_for_testing(
        audio_system: crate::system::MockAudioSystem,
        file_system: crate::system::MockFileSystem,
        registrar: crate::system::MockHotkeyRegistrar,
    ) -> Self {
        Self::new(
            audio_system,
            file_system,
            registrar,
            PathBuf::from("/test/settings.toml"),
        )
    }

    /// Access the mock audio system for test control
    pub fn mock_audio_system(&self) -> &crate::system::MockAudioSystem {
        self.enumerator.audio_system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DeviceRole, DeviceState, EndpointInfo, KeyModifiers};
    use crate::system::{MockAudioSystem, MockFileSystem, MockHotkeyRegistrar};

    fn service_with(
        endpoints: &[(&str, &str)],
    ) -> SwitcherService<MockAudioSystem, MockFileSystem, MockHotkeyRegistrar> {
        let audio = MockAudioSystem::new();
        for (id, name) in endpoints {
            audio.add_endpoint(DataFlow::Render, EndpointInfo::new(*id, *name));
        }
        let mut service = SwitcherService::new_for_testing(
            audio,
            MockFileSystem::new(),
            MockHotkeyRegistrar::new(),
        );
        service.refresh();
        service
    }

    #[test]
    fn test_set_default_updates_flags_after_success() {
        let mut service = service_with(&[("a", "Speakers (Realtek)"), ("b", "Headphones (USB)")]);

        service.set_default("b").unwrap();

        assert_eq!(service.default_device(DataFlow::Render).unwrap().id, "b");
        assert!(service.find_device("b").unwrap().is_default_comms);
        let calls = service.mock_audio_system().get_set_default_calls();
        assert_eq!(
            calls,
            vec![
                ("b".to_string(), DeviceRole::Console),
                ("b".to_string(), DeviceRole::Multimedia),
                ("b".to_string(), DeviceRole::Communications),
            ]
        );
    }

    #[test]
    fn test_failed_set_default_leaves_state_untouched() {
        let mut service = service_with(&[("a", "Speakers (Realtek)")]);
        service.mock_audio_system().set_action_failure(true);

        assert!(service.set_default("a").is_err());
        assert!(service.default_device(DataFlow::Render).is_none());
        assert!(!service.find_device("a").unwrap().is_default);
    }

    #[test]
    fn test_set_default_rejects_unknown_and_inactive() {
        let mut service = service_with(&[("a", "Speakers (Realtek)")]);
        let err = service.set_default("zzz").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ActionError>(),
            Some(&ActionError::UnknownDevice("zzz".to_string()))
        );

        service
            .mock_audio_system()
            .set_endpoint_state("a", DeviceState::Disabled);
        // Disabled devices are hidden by default, so it disappears on refresh
        service.refresh();
        assert!(service.find_device("a").is_none());
    }

    #[test]
    fn test_toggle_favorite_resorts() {
        let mut service = service_with(&[("a", "Alpha"), ("b", "Bravo")]);

        assert!(service.toggle_favorite("b").unwrap());

        let names: Vec<&str> = service
            .devices(DataFlow::Render)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["Bravo", "Alpha"]);
        assert!(service.settings().is_favorite("b"));
    }

    #[test]
    fn test_cycle_without_favorites_does_nothing() {
        let mut service = service_with(&[("a", "Alpha")]);
        assert_eq!(service.cycle_to_next_favorite(DataFlow::Render).unwrap(), None);
        assert!(service.mock_audio_system().get_set_default_calls().is_empty());
    }

    #[test]
    fn test_assign_hotkey_conflict() {
        let mut service = service_with(&[("x", "Speakers (Realtek)"), ("y", "Headphones (USB)")]);
        let hotkey = Hotkey::new(KeyModifiers::CONTROL, 0x41);

        service.assign_hotkey("y", hotkey).unwrap();
        let err = service.assign_hotkey("x", hotkey).unwrap_err();

        assert_eq!(
            err.to_string(),
            "This hotkey is already assigned to \"Headphones\""
        );
        assert!(service.settings().hotkey_for("x").is_none());
    }
}
