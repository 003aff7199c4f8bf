use soundhop::audio::KeyModifiers;
use soundhop::system::MockAudioSystem;
use soundhop::DataFlow;

mod test_utils;
use test_utils::builders::{EndpointBuilder, SettingsBuilder, saved_settings, service_with_settings};

/// Integration tests for identity resolution across refreshes
/// These tests verify that preferences follow a device whose id changed

#[cfg(test)]
mod identity_migration_tests {
    use super::*;

    #[test]
    fn test_reappearing_device_keeps_preferences() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{new-usb}", "Headphones (USB Audio)").add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device("{old-usb}", "Headphones", "USB Audio")
            .favorite("{old-usb}")
            .hotkey("{old-usb}", KeyModifiers::CONTROL | KeyModifiers::ALT, 0x48)
            .custom_icon("{old-usb}", "\u{E7F6}");
        let (mut service, file_system, registrar) = service_with_settings(&audio, settings);

        let summary = service.refresh();

        assert_eq!(summary.migrations.len(), 1);
        assert_eq!(summary.migrations[0].old_id, "{old-usb}");
        assert_eq!(summary.migrations[0].new_id, "{new-usb}");

        let device = service.find_device("{new-usb}").unwrap();
        assert!(device.is_favorite);
        assert!(device.hotkey.is_some());
        assert_eq!(device.display_icon(), "\u{E7F6}");

        // Persisted under the new id only
        let saved = saved_settings(&file_system);
        assert!(saved.favorite_device_ids.contains("{new-usb}"));
        assert!(!saved.favorite_device_ids.contains("{old-usb}"));
        assert!(saved.hotkeys.contains_key("{new-usb}"));
        assert!(!saved.device_name_mapping.contains_key("{old-usb}"));
        assert!(saved.device_name_mapping.contains_key("{new-usb}"));

        // Hotkey is registered under the new id
        let registered = registrar.get_registered();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].0, "{new-usb}");
    }

    #[test]
    fn test_unknown_device_is_recorded_without_migration() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{spk}", "Speakers (Realtek(R) Audio)").add_to(&audio);

        let (mut service, file_system, _) = service_with_settings(&audio, SettingsBuilder::new());
        let summary = service.refresh();

        assert!(summary.migrations.is_empty());
        let identity = service
            .settings_store()
            .device_name_identity("{spk}")
            .unwrap();
        assert_eq!(identity.display_name, "Speakers");
        assert_eq!(identity.sub_name, "Realtek(R) Audio");
        assert!(saved_settings(&file_system)
            .device_name_mapping
            .contains_key("{spk}"));
    }

    #[test]
    fn test_second_refresh_is_silent() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{new}", "Speakers (USB Audio)").add_to(&audio);
        EndpointBuilder::new("{mic}", "Microphone (USB Audio)")
            .input()
            .add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device("{old}", "Speakers", "USB Audio")
            .favorite("{old}");
        let (mut service, file_system, _) = service_with_settings(&audio, settings);

        service.refresh();
        file_system.clear_call_history();

        let summary = service.refresh();
        assert!(summary.migrations.is_empty());
        assert!(summary.outputs.is_unchanged());
        assert!(summary.inputs.is_unchanged());
        assert!(file_system.get_write_calls().is_empty());
    }

    #[test]
    fn test_connected_twins_do_not_trade_preferences() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{left}", "Speakers (USB Audio)").add_to(&audio);
        EndpointBuilder::new("{right}", "Speakers (USB Audio)").add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device("{left}", "Speakers", "USB Audio")
            .known_device("{right}", "Speakers", "USB Audio")
            .favorite("{left}");
        let (mut service, _, _) = service_with_settings(&audio, settings);

        let summary = service.refresh();

        assert!(summary.migrations.is_empty());
        assert!(service.find_device("{left}").unwrap().is_favorite);
        assert!(!service.find_device("{right}").unwrap().is_favorite);
    }

    #[test]
    fn test_twin_migrates_from_disconnected_id_only() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{a}", "Speakers (USB Audio)").add_to(&audio);
        EndpointBuilder::new("{c}", "Speakers (USB Audio)").add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device("{a}", "Speakers", "USB Audio")
            .known_device("{b}", "Speakers", "USB Audio")
            .favorite("{b}");
        let (mut service, _, _) = service_with_settings(&audio, settings);

        let summary = service.refresh();

        assert_eq!(summary.migrations.len(), 1);
        assert_eq!(summary.migrations[0].old_id, "{b}");
        assert_eq!(summary.migrations[0].new_id, "{c}");
        assert!(service.find_device("{c}").unwrap().is_favorite);
        assert!(!service.find_device("{a}").unwrap().is_favorite);
    }

    #[test]
    fn test_capture_migrates_from_entry_without_direction() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{mic-new}", "Microphone (Yeti)")
            .input()
            .add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device("{mic-old}", "Microphone", "Yeti")
            .favorite("{mic-old}");
        let (mut service, _, _) = service_with_settings(&audio, settings);

        service.refresh();

        let inputs = service.devices(DataFlow::Capture);
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].is_favorite);
        assert!(service.devices(DataFlow::Render).is_empty());
    }

    #[test]
    fn test_headset_endpoints_keep_their_own_preferences() {
        let render_old = "{0.0.0.00000000}.{render-old}";
        let capture_old = "{0.0.1.00000000}.{capture-old}";
        let render_new = "{0.0.0.00000000}.{render-new}";
        let capture_new = "{0.0.1.00000000}.{capture-new}";

        let audio = MockAudioSystem::new();
        EndpointBuilder::new(capture_new, "Headset (Jabra Evolve)")
            .input()
            .add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device(render_old, "Headset", "Jabra Evolve")
            .known_device(capture_old, "Headset", "Jabra Evolve")
            .hotkey(render_old, KeyModifiers::CONTROL, 0x48)
            .favorite(capture_old);
        let (mut service, _, _) = service_with_settings(&audio, settings);

        // Only the microphone has arrived so far
        let summary = service.refresh();
        assert_eq!(summary.migrations.len(), 1);
        assert_eq!(summary.migrations[0].old_id, capture_old);
        let mic = service.find_device(capture_new).unwrap();
        assert!(mic.is_favorite);
        assert!(mic.hotkey.is_none());
        assert!(service.settings().hotkeys.contains_key(render_old));

        EndpointBuilder::new(render_new, "Headset (Jabra Evolve)").add_to(&audio);
        let summary = service.refresh();
        assert_eq!(summary.migrations.len(), 1);
        assert_eq!(summary.migrations[0].old_id, render_old);
        let speaker = service.find_device(render_new).unwrap();
        assert!(speaker.hotkey.is_some());
        assert!(!speaker.is_favorite);
    }

    #[test]
    fn test_known_device_stays_put_when_twin_reconnects() {
        let audio = MockAudioSystem::new();
        EndpointBuilder::new("{c}", "Speakers (USB Audio)").add_to(&audio);
        EndpointBuilder::new("{a}", "Speakers (USB Audio)").add_to(&audio);

        let settings = SettingsBuilder::new()
            .known_device("{a}", "Speakers", "USB Audio")
            .known_device("{b}", "Speakers", "USB Audio")
            .custom_icon("{a}", "\u{E7F5}")
            .custom_icon("{b}", "\u{E7F6}");
        let (mut service, _, _) = service_with_settings(&audio, settings);

        service.refresh();

        assert_eq!(service.find_device("{a}").unwrap().display_icon(), "\u{E7F5}");
        assert_eq!(service.find_device("{c}").unwrap().display_icon(), "\u{E7F6}");
        assert!(service.settings_store().device_name_identity("{b}").is_none());
    }
}
