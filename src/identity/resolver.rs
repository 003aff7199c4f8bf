use std::collections::HashSet;
use tracing::{debug, info};

use crate::audio::AudioDevice;
use crate::settings::{DeviceNameIdentity, SettingsStore};
use crate::system::FileSystemInterface;

/// A preference move from a vanished id to the id the device now reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMigration {
    pub old_id: String,
    pub new_id: String,
    pub identity: DeviceNameIdentity,
}

/// Fingerprint of a device as currently named, including its direction.
pub fn identity_of(device: &AudioDevice) -> DeviceNameIdentity {
    DeviceNameIdentity::new(device.display_name(), device.display_sub_name())
        .with_flow(device.flow())
}

/// Match every freshly enumerated device against the stored name fingerprints,
/// migrating preferences of ids that reappeared under a new id and refreshing
/// the fingerprint of every device seen. Devices are processed in order; all
/// migrations are persisted before this returns.
///
/// A device already recorded under its own id with the same names is known
/// and never looks for a source. A stored id that is itself part of `fresh`
/// is never a migration source: it still belongs to a connected device.
/// Sources must have been recorded for the same direction.
pub fn resolve_identities<F: FileSystemInterface>(
    store: &mut SettingsStore<F>,
    fresh: &[AudioDevice],
) -> Vec<IdentityMigration> {
    let fresh_ids: HashSet<&str> = fresh.iter().map(|d| d.id.as_str()).collect();
    let mut migrations = Vec::new();

    for device in fresh {
        let identity = identity_of(device);

        let known = store
            .device_name_identity(&device.id)
            .is_some_and(|stored| stored.matches(&identity.display_name, &identity.sub_name));
        let old_id = if known {
            None
        } else {
            store.find_migration_source(&identity, |id| fresh_ids.contains(id))
        };

        match old_id {
            Some(old_id) => {
                info!(
                    "Device \"{}\" reappeared as {} (was {})",
                    device.name, device.id, old_id
                );
                store.migrate_device_settings(&old_id, &device.id, identity.clone());
                migrations.push(IdentityMigration {
                    old_id,
                    new_id: device.id.clone(),
                    identity,
                });
            }
            None => {
                if store.update_device_name_mapping(&device.id, identity) {
                    debug!("Updated name mapping for {}", device.id);
                }
            }
        }
    }

    migrations
}
