pub mod loader;
pub mod store;
pub mod types;

pub use loader::SettingsLoader;
pub use store::SettingsStore;
pub use types::{DeviceNameIdentity, DeviceSortMode, Settings};
