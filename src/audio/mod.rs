pub mod device;
pub mod enumerator;
pub mod hotkey;

pub use device::{
    AudioDevice, DataFlow, DeviceRole, DeviceState, DeviceStateMask, EndpointInfo,
    split_device_name,
};
pub use enumerator::DeviceEnumerator;
pub use hotkey::{Hotkey, KeyModifiers, ParseHotkeyError};
