use soundhop::DataFlow;
use soundhop::audio::{DeviceRole, DeviceState};
use soundhop::reconcile::{CollectionEvent, DeviceField};
use soundhop::system::MockAudioSystem;
use std::sync::{Arc, Mutex};

mod test_utils;
use test_utils::builders::{EndpointBuilder, MockService, SettingsBuilder, service_with_settings};

/// Integration tests for keeping the device lists in step with the platform
/// These tests verify ordering, in-place updates, visibility filters and events

#[cfg(test)]
mod reconciliation_tests {
    use super::*;

    fn names(service: &MockService, flow: DataFlow) -> Vec<String> {
        service
            .devices(flow)
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    fn record_events(service: &mut MockService, flow: DataFlow) -> Arc<Mutex<Vec<CollectionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        service.subscribe(flow, move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn test_favorites_first_with_divider() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{1}", "Speakers (Realtek Audio)").add_to(&audio);
        EndpointBuilder::new("{2}", "headphones (USB Audio)").add_to(&audio);
        EndpointBuilder::new("{3}", "Monitor (NVIDIA High Definition Audio)").add_to(&audio);

        let settings = SettingsBuilder::new().favorite("{3}");
        let (mut service, _, _) = service_with_settings(&audio, settings);
        service.refresh();

        assert_eq!(
            names(&service, DataFlow::Render),
            vec![
                "Monitor (NVIDIA High Definition Audio)",
                "headphones (USB Audio)",
                "Speakers (Realtek Audio)",
            ]
        );
        let dividers: Vec<bool> = service
            .devices(DataFlow::Render)
            .iter()
            .map(|d| d.show_divider_above)
            .collect();
        assert_eq!(dividers, vec![false, true, false]);
    }

    #[test]
    fn test_no_divider_without_favorites() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{1}", "Speakers (Realtek Audio)").add_to(&audio);
        EndpointBuilder::new("{2}", "Headphones (USB Audio)").add_to(&audio);

        let (mut service, _, _) = service_with_settings(&audio, SettingsBuilder::new());
        service.refresh();

        assert!(
            service
                .devices(DataFlow::Render)
                .iter()
                .all(|d| !d.show_divider_above)
        );
    }

    #[test]
    fn test_sort_by_device_name() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{1}", "Speakers (Zen DAC)").add_to(&audio);
        EndpointBuilder::new("{2}", "Headphones (Zen DAC)").add_to(&audio);
        EndpointBuilder::new("{3}", "Speakers (Arctis 7)").add_to(&audio);

        let settings = SettingsBuilder::new().sort_by_device_name();
        let (mut service, _, _) = service_with_settings(&audio, settings);
        service.refresh();

        assert_eq!(
            names(&service, DataFlow::Render),
            vec![
                "Speakers (Arctis 7)",
                "Headphones (Zen DAC)",
                "Speakers (Zen DAC)",
            ]
        );
    }

    #[test]
    fn test_removed_device_emits_event() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{a}", "Alpha (USB)").add_to(&audio);
        EndpointBuilder::new("{b}", "Beta (USB)").add_to(&audio);

        let (mut service, _, _) = service_with_settings(&audio, SettingsBuilder::new());
        service.refresh();
        let events = record_events(&mut service, DataFlow::Render);

        audio.remove_endpoint("{a}");
        let summary = service.refresh();

        assert_eq!(summary.outputs.removed, 1);
        assert_eq!(names(&service, DataFlow::Render), vec!["Beta (USB)"]);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[CollectionEvent::Removed {
                id: "{a}".to_string(),
                index: 0
            }]
        );
    }

    #[test]
    fn test_rename_updates_record_in_place() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{a}", "Speakers (USB Audio)").add_to(&audio);

        let (mut service, _, _) = service_with_settings(&audio, SettingsBuilder::new());
        service.refresh();
        let events = record_events(&mut service, DataFlow::Render);

        audio.remove_endpoint("{a}");
        EndpointBuilder::new("{a}", "Desk Speakers (USB Audio)").add_to(&audio);
        let summary = service.refresh();

        assert_eq!(summary.outputs.added, 0);
        assert_eq!(summary.outputs.updated, 1);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[CollectionEvent::Updated {
                id: "{a}".to_string(),
                fields: vec![DeviceField::Name]
            }]
        );
        // Renamed devices get a fresh fingerprint
        assert_eq!(
            service
                .settings_store()
                .device_name_identity("{a}")
                .unwrap()
                .display_name,
            "Desk Speakers"
        );
    }

    #[test]
    fn test_disabled_devices_follow_visibility_setting() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{on}", "Speakers (Realtek Audio)").add_to(&audio);
        EndpointBuilder::new("{off}", "Line Out (Realtek Audio)")
            .disabled()
            .add_to(&audio);
        EndpointBuilder::new("{gone}", "Headset (Bluetooth)")
            .unplugged()
            .add_to(&audio);

        let (mut hidden, _, _) = service_with_settings(&audio, SettingsBuilder::new());
        hidden.refresh();
        assert_eq!(hidden.devices(DataFlow::Render).len(), 1);

        let settings = SettingsBuilder::new().show_disabled().show_disconnected();
        let (mut shown, _, _) = service_with_settings(&audio, settings);
        shown.refresh();
        assert_eq!(shown.devices(DataFlow::Render).len(), 3);
        assert!(shown.find_device("{off}").unwrap().is_disabled());
        assert!(shown.find_device("{gone}").unwrap().is_disconnected());
    }

    #[test]
    fn test_external_default_change_is_reported() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{a}", "Speakers (Realtek Audio)").add_as_default(&audio);
        EndpointBuilder::new("{b}", "Headphones (USB Audio)").add_to(&audio);

        let (mut service, _, _) = service_with_settings(&audio, SettingsBuilder::new());
        service.refresh();
        assert_eq!(service.default_device(DataFlow::Render).unwrap().id, "{a}");

        let events = record_events(&mut service, DataFlow::Render);
        audio.set_mock_default(DataFlow::Render, DeviceRole::Multimedia, Some("{b}"));
        let summary = service.refresh();

        assert!(summary.outputs.default_changed);
        assert_eq!(service.default_device(DataFlow::Render).unwrap().id, "{b}");
        assert!(events.lock().unwrap().contains(&CollectionEvent::DefaultDeviceChanged {
            previous: Some("{a}".to_string()),
            current: Some("{b}".to_string()),
        }));
    }

    #[test]
    fn test_state_change_keeps_device_listed() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{a}", "Headset (Bluetooth)").add_to(&audio);

        let settings = SettingsBuilder::new().show_disconnected();
        let (mut service, _, _) = service_with_settings(&audio, settings);
        service.refresh();

        audio.set_endpoint_state("{a}", DeviceState::Unplugged);
        let summary = service.refresh();

        assert_eq!(summary.outputs.removed, 0);
        assert_eq!(summary.outputs.updated, 1);
        assert!(service.find_device("{a}").unwrap().is_disconnected());
    }
}
