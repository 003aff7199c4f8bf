use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::system::FileSystemInterface;

use super::types::Settings;

/// Settings loader that uses dependency injection for file system operations
pub struct SettingsLoader<F: FileSystemInterface> {
    file_system: F,
    settings_path: PathBuf,
}

impl<F: FileSystemInterface> SettingsLoader<F> {
    pub fn new(file_system: F, settings_path: PathBuf) -> Self {
        Self {
            file_system,
            settings_path,
        }
    }

    /// Load settings from the configured path. A missing file yields defaults.
    pub fn load_settings(&self) -> Result<Settings> {
        debug!("Loading settings from: {}", self.settings_path.display());

        if !self.file_system.settings_file_exists(&self.settings_path) {
            info!("Settings file not found, using defaults");
            return Ok(Settings::default());
        }

        let content = self
            .file_system
            .read_settings_file(&self.settings_path)
            .with_context(|| {
                format!(
                    "Failed to read settings file: {}",
                    self.settings_path.display()
                )
            })?;

        let settings: Settings = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse settings file: {}",
                self.settings_path.display()
            )
        })?;

        debug!("Settings loaded successfully");
        Ok(settings)
    }

    /// Save settings to the configured path
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        debug!("Saving settings to: {}", self.settings_path.display());

        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_os_str().is_empty() {
                self.file_system
                    .create_settings_dir(parent)
                    .with_context(|| {
                        format!("Failed to create settings directory: {}", parent.display())
                    })?;
            }
        }

        let content = toml::to_string_pretty(settings).context("Failed to serialize settings")?;

        self.file_system
            .write_settings_file(&self.settings_path, &content)
            .with_context(|| {
                format!(
                    "Failed to write settings file: {}",
                    self.settings_path.display()
                )
            })?;

        debug!("Settings saved to: {}", self.settings_path.display());
        Ok(())
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn settings_exist(&self) -> bool {
        self.file_system.settings_file_exists(&self.settings_path)
    }

    /// Get reference to the file system (for testing)
    #[cfg(any(test, feature = "test-mocks"))]
    pub fn file_system(&self) -> &F {
        &self.file_system
    }
}

// Convenience constructors for production use with StandardFileSystem
impl SettingsLoader<crate::system::StandardFileSystem> {
    pub fn new_production(settings_path: PathBuf) -> Self {
        Self::new(crate::system::StandardFileSystem, settings_path)
    }

    /// Get the default settings path
    pub fn default_settings_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir().context("Failed to get local data directory")?;
        Ok(data_dir.join("SoundHop").join("settings.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MockFileSystem;

    #[test]
    fn test_load_missing_settings_returns_defaults_without_writing() {
        let mock_fs = MockFileSystem::new();
        let loader = SettingsLoader::new(mock_fs.clone(), PathBuf::from("/test/settings.toml"));

        let settings = loader.load_settings().unwrap();

        assert_eq!(settings, Settings::default());
        assert!(mock_fs.get_write_calls().is_empty());
        assert!(mock_fs.get_read_calls().is_empty());
    }

    #[test]
    fn test_load_existing_settings() {
        let mock_fs = MockFileSystem::new();
        let path = PathBuf::from("/test/settings.toml");
        mock_fs.add_file(
            &path,
            r#"
show_disabled_devices = true
favorite_device_ids = ["dev-1"]

[device_name_mapping.dev-1]
display_name = "Speakers"
sub_name = "Realtek Audio"
"#
            .to_string(),
        );
        let loader = SettingsLoader::new(mock_fs, path);

        let settings = loader.load_settings().unwrap();

        assert!(settings.show_disabled_devices);
        assert!(settings.is_favorite("dev-1"));
        assert_eq!(
            settings.device_name_mapping["dev-1"].display_name,
            "Speakers"
        );
    }

    #[test]
    fn test_load_corrupt_settings_is_an_error() {
        let mock_fs = MockFileSystem::new();
        let path = PathBuf::from("/test/settings.toml");
        mock_fs.add_file(&path, "favorite_device_ids = [".to_string());
        let loader = SettingsLoader::new(mock_fs, path);

        let err = loader.load_settings().unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn test_save_creates_parent_and_writes() {
        let mock_fs = MockFileSystem::new();
        let path = PathBuf::from("/test/dir/settings.toml");
        let loader = SettingsLoader::new(mock_fs.clone(), path.clone());

        loader.save_settings(&Settings::default()).unwrap();

        assert_eq!(
            mock_fs.get_directory_creation_calls(),
            vec![PathBuf::from("/test/dir")]
        );
        let writes = mock_fs.get_write_calls();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, path);
        assert!(writes[0].1.contains("sync_communication_device = true"));
    }

    #[test]
    fn test_save_failure_is_reported() {
        let mock_fs = MockFileSystem::new();
        mock_fs.set_write_failure(true);
        let loader = SettingsLoader::new(mock_fs, PathBuf::from("/test/settings.toml"));

        assert!(loader.save_settings(&Settings::default()).is_err());
    }
}
