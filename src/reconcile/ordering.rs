use std::cmp::Ordering;

use crate::audio::AudioDevice;
use crate::settings::DeviceSortMode;

fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Favorites first, then case-insensitive by the field the sort mode selects.
pub fn compare_devices(a: &AudioDevice, b: &AudioDevice, mode: DeviceSortMode) -> Ordering {
    b.is_favorite.cmp(&a.is_favorite).then_with(|| match mode {
        DeviceSortMode::FriendlyName => compare_ignore_case(&a.name, &b.name),
        DeviceSortMode::DeviceName => {
            compare_ignore_case(&a.display_sub_name(), &b.display_sub_name())
                .then_with(|| compare_ignore_case(&a.name, &b.name))
        }
    })
}

/// Index of the device that should carry the divider: the first
/// non-favorite directly after a non-empty favorites block.
pub fn divider_index(devices: &[AudioDevice]) -> Option<usize> {
    if !devices.first().is_some_and(|d| d.is_favorite) {
        return None;
    }
    devices.iter().position(|d| !d.is_favorite)
}
