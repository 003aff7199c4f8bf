pub mod audio;
pub mod hotkeys;
pub mod identity;
pub mod logging;
pub mod reconcile;
pub mod service;
pub mod settings;
pub mod system;

pub use audio::{AudioDevice, DataFlow, Hotkey};
pub use service::{ServiceHandle, SwitcherService};
pub use settings::Settings;
