use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::{DataFlow, DeviceRole, DeviceState, DeviceStateMask, EndpointInfo, Hotkey};
use crate::system::traits::{AudioSystemInterface, FileSystemInterface, HotkeyRegistrar};

type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Mock audio system for testing - provides controllable endpoint behavior
#[derive(Clone)]
pub struct MockAudioSystem {
    pub endpoints: Arc<Mutex<Vec<(DataFlow, EndpointInfo)>>>,
    pub defaults: Arc<Mutex<HashMap<(DataFlow, DeviceRole), String>>>,
    pub device_change_callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
    pub set_default_calls: Arc<Mutex<Vec<(String, DeviceRole)>>>,
    pub visibility_calls: Arc<Mutex<Vec<(String, bool)>>>,
    pub enumerate_calls: Arc<AtomicUsize>,
    pub should_fail_enumeration: Arc<Mutex<bool>>,
    pub should_fail_action: Arc<Mutex<bool>>,
}

impl MockAudioSystem {
    pub fn new() -> Self {
        Self {
            endpoints: Arc::new(Mutex::new(Vec::new())),
            defaults: Arc::new(Mutex::new(HashMap::new())),
            device_change_callbacks: Arc::new(Mutex::new(Vec::new())),
            set_default_calls: Arc::new(Mutex::new(Vec::new())),
            visibility_calls: Arc::new(Mutex::new(Vec::new())),
            enumerate_calls: Arc::new(AtomicUsize::new(0)),
            should_fail_enumeration: Arc::new(Mutex::new(false)),
            should_fail_action: Arc::new(Mutex::new(false)),
        }
    }

    /// Add an endpoint to the mock system
    pub fn add_endpoint(&self, flow: DataFlow, endpoint: EndpointInfo) {
        self.endpoints.lock().unwrap().push((flow, endpoint));
    }

    /// Remove an endpoint by id
    pub fn remove_endpoint(&self, device_id: &str) {
        self.endpoints
            .lock()
            .unwrap()
            .retain(|(_, e)| e.id != device_id);
    }

    /// Change the state of an existing endpoint
    pub fn set_endpoint_state(&self, device_id: &str, state: DeviceState) {
        for (_, endpoint) in self.endpoints.lock().unwrap().iter_mut() {
            if endpoint.id == device_id {
                endpoint.state = state;
            }
        }
    }

    /// Set or clear the default endpoint for a direction and role
    pub fn set_mock_default(&self, flow: DataFlow, role: DeviceRole, device_id: Option<&str>) {
        let mut defaults = self.defaults.lock().unwrap();
        match device_id {
            Some(id) => {
                defaults.insert((flow, role), id.to_string());
            }
            None => {
                defaults.remove(&(flow, role));
            }
        }
    }

    /// Trigger all registered device change callbacks
    pub fn trigger_device_change(&self) {
        let callbacks = self.device_change_callbacks.lock().unwrap();
        for callback in callbacks.iter() {
            callback();
        }
    }

    /// Get all set default calls that were made
    pub fn get_set_default_calls(&self) -> Vec<(String, DeviceRole)> {
        self.set_default_calls.lock().unwrap().clone()
    }

    /// Get all visibility calls that were made
    pub fn get_visibility_calls(&self) -> Vec<(String, bool)> {
        self.visibility_calls.lock().unwrap().clone()
    }

    /// Clear the history of recorded calls
    pub fn clear_calls(&self) {
        self.set_default_calls.lock().unwrap().clear();
        self.visibility_calls.lock().unwrap().clear();
    }

    /// Number of enumerate_endpoints calls so far
    pub fn enumerate_call_count(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    /// Configure the mock to fail enumeration
    pub fn set_enumeration_failure(&self, should_fail: bool) {
        *self.should_fail_enumeration.lock().unwrap() = should_fail;
    }

    /// Configure the mock to fail default and visibility changes
    pub fn set_action_failure(&self, should_fail: bool) {
        *self.should_fail_action.lock().unwrap() = should_fail;
    }

    /// Get count of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.device_change_callbacks.lock().unwrap().len()
    }

    fn flow_of(&self, device_id: &str) -> Option<DataFlow> {
        self.endpoints
            .lock()
            .unwrap()
            .iter()
            .find(|(_, e)| e.id == device_id)
            .map(|(flow, _)| *flow)
    }
}

impl AudioSystemInterface for MockAudioSystem {
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state_mask: DeviceStateMask,
    ) -> Result<Vec<EndpointInfo>> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        if *self.should_fail_enumeration.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock enumeration failure"));
        }

        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, e)| *f == flow && state_mask.contains(e.state))
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn get_default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<Option<String>> {
        Ok(self.defaults.lock().unwrap().get(&(flow, role)).cloned())
    }

    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<()> {
        if *self.should_fail_action.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock set default failure"));
        }

        self.set_default_calls
            .lock()
            .unwrap()
            .push((device_id.to_string(), role));

        if let Some(flow) = self.flow_of(device_id) {
            self.defaults
                .lock()
                .unwrap()
                .insert((flow, role), device_id.to_string());
        }

        Ok(())
    }

    fn set_endpoint_visibility(&self, device_id: &str, visible: bool) -> Result<()> {
        if *self.should_fail_action.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock visibility failure"));
        }

        self.visibility_calls
            .lock()
            .unwrap()
            .push((device_id.to_string(), visible));

        let state = if visible {
            DeviceState::Active
        } else {
            DeviceState::Disabled
        };
        self.set_endpoint_state(device_id, state);
        Ok(())
    }

    fn add_device_change_listener(&self, callback: Box<dyn Fn() + Send + Sync>) -> Result<()> {
        self.device_change_callbacks.lock().unwrap().push(callback);
        Ok(())
    }
}

impl Default for MockAudioSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock file system for testing - provides controllable file operations
#[derive(Clone)]
pub struct MockFileSystem {
    pub files: Arc<Mutex<HashMap<PathBuf, String>>>,
    pub read_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub write_calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    pub directory_creation_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub should_fail_read: Arc<Mutex<bool>>,
    pub should_fail_write: Arc<Mutex<bool>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            read_calls: Arc::new(Mutex::new(Vec::new())),
            write_calls: Arc::new(Mutex::new(Vec::new())),
            directory_creation_calls: Arc::new(Mutex::new(Vec::new())),
            should_fail_read: Arc::new(Mutex::new(false)),
            should_fail_write: Arc::new(Mutex::new(false)),
        }
    }

    /// Add a file to the mock file system
    pub fn add_file<P: AsRef<Path>>(&self, path: P, content: String) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content);
    }

    /// Current content of a file, if any
    pub fn file_content<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Get all read calls that were made
    pub fn get_read_calls(&self) -> Vec<PathBuf> {
        self.read_calls.lock().unwrap().clone()
    }

    /// Get all write calls that were made
    pub fn get_write_calls(&self) -> Vec<(PathBuf, String)> {
        self.write_calls.lock().unwrap().clone()
    }

    /// Get all directory creation calls that were made
    pub fn get_directory_creation_calls(&self) -> Vec<PathBuf> {
        self.directory_creation_calls.lock().unwrap().clone()
    }

    /// Clear all call histories
    pub fn clear_call_history(&self) {
        self.read_calls.lock().unwrap().clear();
        self.write_calls.lock().unwrap().clear();
        self.directory_creation_calls.lock().unwrap().clear();
    }

    /// Configure the mock to fail read operations
    pub fn set_read_failure(&self, should_fail: bool) {
        *self.should_fail_read.lock().unwrap() = should_fail;
    }

    /// Configure the mock to fail write operations
    pub fn set_write_failure(&self, should_fail: bool) {
        *self.should_fail_write.lock().unwrap() = should_fail;
    }
}

impl FileSystemInterface for MockFileSystem {
    fn read_settings_file(&self, path: &Path) -> Result<String> {
        self.read_calls.lock().unwrap().push(path.to_path_buf());

        if *self.should_fail_read.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock read failure"));
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
    }

    fn write_settings_file(&self, path: &Path, content: &str) -> Result<()> {
        self.write_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string()));

        if *self.should_fail_write.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock write failure"));
        }

        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn settings_file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_settings_dir(&self, path: &Path) -> Result<()> {
        self.directory_creation_calls
            .lock()
            .unwrap()
            .push(path.to_path_buf());
        Ok(())
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock hotkey registrar for testing - records registrations
#[derive(Clone, Default)]
pub struct MockHotkeyRegistrar {
    pub registered: Arc<Mutex<Vec<(String, Hotkey)>>>,
    pub unregister_all_calls: Arc<AtomicUsize>,
    pub should_fail_register: Arc<Mutex<bool>>,
}

impl MockHotkeyRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently registered (device id, hotkey) pairs
    pub fn get_registered(&self) -> Vec<(String, Hotkey)> {
        self.registered.lock().unwrap().clone()
    }

    pub fn unregister_all_count(&self) -> usize {
        self.unregister_all_calls.load(Ordering::SeqCst)
    }

    /// Configure the mock to reject registrations
    pub fn set_register_failure(&self, should_fail: bool) {
        *self.should_fail_register.lock().unwrap() = should_fail;
    }
}

impl HotkeyRegistrar for MockHotkeyRegistrar {
    fn register(&self, device_id: &str, hotkey: &Hotkey) -> Result<()> {
        if *self.should_fail_register.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock hotkey registration failure"));
        }
        self.registered
            .lock()
            .unwrap()
            .push((device_id.to_string(), *hotkey));
        Ok(())
    }

    fn unregister_all(&self) {
        self.unregister_all_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.lock().unwrap().clear();
    }
}
