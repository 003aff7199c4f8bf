use std::collections::HashSet;
use tracing::{debug, info};

use crate::audio::{AudioDevice, DataFlow};
use crate::settings::Settings;

use super::ordering::{compare_devices, divider_index};

/// A mutable field of a device record that a reconciliation pass can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceField {
    Name,
    IsDefault,
    IsDefaultComms,
    IconPath,
    IsFavorite,
    Hotkey,
    State,
    CustomIconGlyph,
    ShowDividerAbove,
}

/// Change notification emitted by a [`DeviceCollection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    Added {
        id: String,
        index: usize,
    },
    Removed {
        id: String,
        index: usize,
    },
    Moved {
        id: String,
        from: usize,
        to: usize,
    },
    Updated {
        id: String,
        fields: Vec<DeviceField>,
    },
    DefaultDeviceChanged {
        previous: Option<String>,
        current: Option<String>,
    },
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub moved: usize,
    pub default_changed: bool,
}

impl ReconcileSummary {
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

type CollectionObserver = Box<dyn Fn(&CollectionEvent) + Send + Sync>;

/// Ordered, id-unique list of devices for one direction. Records are
/// updated in place across passes so that observers keep stable entries.
pub struct DeviceCollection {
    flow: DataFlow,
    devices: Vec<AudioDevice>,
    default_device_id: Option<String>,
    observers: Vec<CollectionObserver>,
}

impl DeviceCollection {
    pub fn new(flow: DataFlow) -> Self {
        Self {
            flow,
            devices: Vec::new(),
            default_device_id: None,
            observers: Vec::new(),
        }
    }

    pub fn flow(&self) -> DataFlow {
        self.flow
    }

    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, device_id: &str) -> Option<&AudioDevice> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    fn position(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.id == device_id)
    }

    /// First device flagged as the default, if any.
    pub fn default_device(&self) -> Option<&AudioDevice> {
        self.default_device_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn subscribe(&mut self, observer: impl Fn(&CollectionEvent) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&self, event: CollectionEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }

    /// Merge a fresh, identity-resolved enumeration into the collection.
    pub fn reconcile(&mut self, fresh: Vec<AudioDevice>, settings: &Settings) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let fresh: Vec<AudioDevice> = fresh
            .into_iter()
            .map(|device| with_preferences(device, settings))
            .collect();

        // Removal, back to front so emitted indices stay valid
        let fresh_ids: HashSet<String> = fresh.iter().map(|d| d.id.clone()).collect();
        for index in (0..self.devices.len()).rev() {
            if !fresh_ids.contains(&self.devices[index].id) {
                let removed = self.devices.remove(index);
                debug!("Removed {} device {}", self.flow, removed.id);
                self.emit(CollectionEvent::Removed {
                    id: removed.id,
                    index,
                });
                summary.removed += 1;
            }
        }

        // Update in place or append
        for device in fresh {
            match self.position(&device.id) {
                Some(index) => {
                    let fields = copy_mutable_fields(&mut self.devices[index], &device);
                    if !fields.is_empty() {
                        debug!("Updated {} {:?}", device.id, fields);
                        self.emit(CollectionEvent::Updated {
                            id: device.id,
                            fields,
                        });
                        summary.updated += 1;
                    }
                }
                None => {
                    let index = self.devices.len();
                    debug!("Added {} device {}", self.flow, device.id);
                    let id = device.id.clone();
                    self.devices.push(device);
                    self.emit(CollectionEvent::Added { id, index });
                    summary.added += 1;
                }
            }
        }

        summary.moved = self.sort(settings);
        summary.updated += self.update_dividers();
        summary.default_changed = self.update_default_device();
        summary
    }

    /// Re-apply preferences to the current records and restore ordering,
    /// without a fresh enumeration.
    pub fn apply_settings(&mut self, settings: &Settings) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for index in 0..self.devices.len() {
            let updated = with_preferences(self.devices[index].clone(), settings);
            let fields = copy_mutable_fields(&mut self.devices[index], &updated);
            if !fields.is_empty() {
                self.emit(CollectionEvent::Updated {
                    id: updated.id,
                    fields,
                });
                summary.updated += 1;
            }
        }
        summary.moved = self.sort(settings);
        summary.updated += self.update_dividers();
        summary
    }

    /// Stable sort applied as positional moves; returns the number of moves.
    fn sort(&mut self, settings: &Settings) -> usize {
        let mode = settings.sort_mode();
        let mut order: Vec<&AudioDevice> = self.devices.iter().collect();
        order.sort_by(|a, b| compare_devices(a, b, mode));
        let order: Vec<String> = order.into_iter().map(|d| d.id.clone()).collect();

        let mut moves = 0;
        for (target, id) in order.into_iter().enumerate() {
            let Some(current) = self.position(&id) else {
                continue;
            };
            if current != target {
                let device = self.devices.remove(current);
                self.devices.insert(target, device);
                self.emit(CollectionEvent::Moved {
                    id,
                    from: current,
                    to: target,
                });
                moves += 1;
            }
        }
        moves
    }

    fn update_dividers(&mut self) -> usize {
        let divider = divider_index(&self.devices);
        let mut changed = Vec::new();
        for (index, device) in self.devices.iter_mut().enumerate() {
            let show = divider == Some(index);
            if device.show_divider_above != show {
                device.show_divider_above = show;
                changed.push(device.id.clone());
            }
        }
        let count = changed.len();
        for id in changed {
            self.emit(CollectionEvent::Updated {
                id,
                fields: vec![DeviceField::ShowDividerAbove],
            });
        }
        count
    }

    fn update_default_device(&mut self) -> bool {
        let current = self
            .devices
            .iter()
            .find(|d| d.is_default)
            .map(|d| d.id.clone());
        if current == self.default_device_id {
            return false;
        }

        let previous = std::mem::replace(&mut self.default_device_id, current.clone());
        info!(
            "Default {} device changed: {} -> {}",
            self.flow,
            previous.as_deref().unwrap_or("none"),
            current.as_deref().unwrap_or("none")
        );
        self.emit(CollectionEvent::DefaultDeviceChanged { previous, current });
        true
    }

    /// Record a confirmed default change without waiting for the next pass.
    pub fn mark_default(&mut self, device_id: &str) -> bool {
        self.set_exclusive_flag(device_id, DeviceField::IsDefault);
        self.update_default_device()
    }

    /// Record a confirmed communications default change.
    pub fn mark_default_comms(&mut self, device_id: &str) {
        self.set_exclusive_flag(device_id, DeviceField::IsDefaultComms);
    }

    fn set_exclusive_flag(&mut self, device_id: &str, field: DeviceField) {
        let mut changed = Vec::new();
        for device in self.devices.iter_mut() {
            let wanted = device.id == device_id;
            let flag = match field {
                DeviceField::IsDefault => &mut device.is_default,
                DeviceField::IsDefaultComms => &mut device.is_default_comms,
                _ => continue,
            };
            if *flag != wanted {
                *flag = wanted;
                changed.push(device.id.clone());
            }
        }
        for id in changed {
            self.emit(CollectionEvent::Updated {
                id,
                fields: vec![field],
            });
        }
    }
}

fn with_preferences(mut device: AudioDevice, settings: &Settings) -> AudioDevice {
    device.is_favorite = settings.is_favorite(&device.id);
    device.hotkey = settings.hotkey_for(&device.id);
    device.custom_icon_glyph = settings.custom_icon_for(&device.id).map(str::to_string);
    device
}

/// Copy the fields a pass may change onto `target`, returning which changed.
fn copy_mutable_fields(target: &mut AudioDevice, source: &AudioDevice) -> Vec<DeviceField> {
    let mut fields = Vec::new();

    macro_rules! sync {
        ($field:ident, $tag:expr) => {
            if target.$field != source.$field {
                target.$field = source.$field.clone();
                fields.push($tag);
            }
        };
    }

    sync!(name, DeviceField::Name);
    sync!(is_default, DeviceField::IsDefault);
    sync!(is_default_comms, DeviceField::IsDefaultComms);
    sync!(icon_path, DeviceField::IconPath);
    sync!(is_favorite, DeviceField::IsFavorite);
    sync!(hotkey, DeviceField::Hotkey);
    sync!(state, DeviceField::State);
    sync!(custom_icon_glyph, DeviceField::CustomIconGlyph);
    fields
}
