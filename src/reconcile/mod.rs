pub mod collection;
pub mod ordering;

pub use collection::{CollectionEvent, DeviceCollection, DeviceField, ReconcileSummary};
pub use ordering::{compare_devices, divider_index};
