use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level, info, warn};

use soundhop::audio::{AudioDevice, DataFlow, Hotkey};
use soundhop::logging::{self, LoggingConfig};
use soundhop::service::{self, ServiceHandle, SwitcherService};
use soundhop::settings::SettingsLoader;
use soundhop::system::{NullHotkeyRegistrar, PlatformAudioSystem, StandardFileSystem};

#[derive(Parser)]
#[command(name = "soundhop")]
#[command(about = "Switch the default Windows audio device, with favorites and global hotkeys")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write logs to daily-rotated files
    #[arg(long, global = true)]
    log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio devices
    ListDevices {
        /// List input devices instead of outputs
        #[arg(short, long)]
        input: bool,
        /// Show detailed device information
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show current default devices
    ShowDefault,
    /// Make a device the default
    Switch {
        /// Device id, friendly name or display name
        device: String,
        /// Look the device up among inputs
        #[arg(short, long)]
        input: bool,
        /// Only change the communications default
        #[arg(long)]
        comms: bool,
    },
    /// Switch to the next favorite after the current default
    NextFavorite {
        /// Cycle input favorites instead of outputs
        #[arg(short, long)]
        input: bool,
    },
    /// Toggle a device's favorite flag
    Favorite { device: String },
    /// Set or clear a device's custom icon glyph
    SetIcon {
        device: String,
        /// Glyph to use; omit to clear
        glyph: Option<String>,
    },
    /// Enable a disabled device
    Enable { device: String },
    /// Disable an active device
    Disable { device: String },
    /// Manage global hotkeys
    Hotkey {
        #[command(subcommand)]
        command: HotkeyCommands,
    },
    /// Validate the settings file
    CheckSettings,
    /// Run the background service
    Daemon,
}

#[derive(Subcommand)]
enum HotkeyCommands {
    /// Assign a hotkey such as "Ctrl + Alt + F5"
    Set { device: String, combo: String },
    /// Remove a device's hotkey
    Clear { device: String },
    /// List configured hotkeys, including disconnected devices
    List,
}

type CliService = SwitcherService<PlatformAudioSystem, StandardFileSystem, NullHotkeyRegistrar>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = match cli.settings.clone() {
        Some(path) => path,
        None => SettingsLoader::default_settings_path()?,
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        SettingsLoader::new_production(settings_path.clone())
            .load_settings()
            .map(|s| logging::parse_level(&s.log_level))
            .unwrap_or(Level::INFO)
    };
    let (_guard, log_dir) = logging::initialize_logging(LoggingConfig {
        level,
        file_output: cli.log_file,
        console_output: true,
        log_dir: None,
        json_format: cli.json_logs,
    })?;

    match cli.command {
        Some(Commands::ListDevices { input, verbose }) => {
            list_devices(&open_service(settings_path)?, flow_of(input), verbose);
        }
        Some(Commands::ShowDefault) => {
            show_default_devices(&open_service(settings_path)?);
        }
        Some(Commands::Switch {
            device,
            input,
            comms,
        }) => {
            switch_device(&mut open_service(settings_path)?, &device, input, comms)?;
        }
        Some(Commands::NextFavorite { input }) => {
            let mut service = open_service(settings_path)?;
            match service.cycle_to_next_favorite(flow_of(input))? {
                Some(id) => {
                    let name = service.find_device(&id).map_or(id.clone(), |d| d.name.clone());
                    println!("Switched to {}", name);
                }
                None => println!(
                    "No active favorite {} devices",
                    flow_of(input).to_string().to_lowercase()
                ),
            }
        }
        Some(Commands::Favorite { device }) => {
            let mut service = open_service(settings_path)?;
            let id = resolve_id(&service, &device, None)?;
            let is_favorite = service.toggle_favorite(&id)?;
            println!(
                "{} is {} a favorite",
                device,
                if is_favorite { "now" } else { "no longer" }
            );
        }
        Some(Commands::SetIcon { device, glyph }) => {
            let mut service = open_service(settings_path)?;
            let id = resolve_id(&service, &device, None)?;
            service.set_device_icon(&id, glyph.as_deref())?;
            if let Some(device) = service.find_device(&id) {
                println!("{} now shows {}", device.name, device.display_icon());
            }
        }
        Some(Commands::Enable { device }) => {
            let mut service = open_service(settings_path)?;
            let id = resolve_id(&service, &device, None)?;
            service.enable_device(&id)?;
            println!("Enabled {}", device);
        }
        Some(Commands::Disable { device }) => {
            let mut service = open_service(settings_path)?;
            let id = resolve_id(&service, &device, None)?;
            service.disable_device(&id)?;
            println!("Disabled {}", device);
        }
        Some(Commands::Hotkey { command }) => {
            run_hotkey_command(&mut open_service(settings_path)?, command)?;
        }
        Some(Commands::CheckSettings) => {
            check_settings(settings_path)?;
        }
        Some(Commands::Daemon) | None => {
            if let Some(dir) = log_dir {
                if let Err(e) = logging::cleanup_old_logs(&dir, 7) {
                    warn!("Failed to clean up old logs: {:#}", e);
                }
            }
            run_daemon(settings_path).await?;
        }
    }

    Ok(())
}

fn flow_of(input: bool) -> DataFlow {
    if input {
        DataFlow::Capture
    } else {
        DataFlow::Render
    }
}

/// One-shot service: enumerates once and never grabs global hotkeys.
fn open_service(settings_path: PathBuf) -> Result<CliService> {
    let audio_system = PlatformAudioSystem::new()?;
    let mut service = SwitcherService::new(
        audio_system,
        StandardFileSystem,
        NullHotkeyRegistrar,
        settings_path,
    );
    service.refresh();
    Ok(service)
}

fn resolve_id(service: &CliService, query: &str, flow: Option<DataFlow>) -> Result<String> {
    service
        .resolve_device(query, flow)
        .map(|d| d.id.clone())
        .with_context(|| format!("Device '{}' not found", query))
}

fn device_line(device: &AudioDevice) -> String {
    let mut line = device.to_string();
    if device.is_favorite {
        line.push_str(" *favorite*");
    }
    if let Some(hotkey) = device.hotkey {
        line.push_str(&format!(" [{}]", hotkey));
    }
    line
}

fn list_devices(service: &CliService, flow: DataFlow, verbose: bool) {
    let devices = service.devices(flow);

    println!("{} devices:", flow);
    if devices.is_empty() {
        println!("  No audio devices found!");
        return;
    }

    for (i, device) in devices.iter().enumerate() {
        if device.show_divider_above {
            println!("  ----");
        }
        println!("  {}. {}", i + 1, device_line(device));
    }

    if verbose {
        println!("\n--- Detailed Device Information ---");
        for device in devices {
            println!("Device: {}", device.name);
            println!("  ID: {}", device.id);
            println!("  Display name: {}", device.display_name());
            println!("  Sub name: {}", device.display_sub_name());
            println!("  State: {}", device.state);
            println!("  Icon path: {}", device.icon_path);
            println!("  Icon glyph: U+{:04X}", device.display_icon().chars().next().map_or(0, u32::from));
            println!();
        }
    }
}

fn show_default_devices(service: &CliService) {
    for flow in [DataFlow::Render, DataFlow::Capture] {
        match service.default_device(flow) {
            Some(device) => println!("Default {}: {}", flow.to_string().to_lowercase(), device.name),
            None => println!("Default {}: none", flow.to_string().to_lowercase()),
        }
    }
}

fn switch_device(service: &mut CliService, query: &str, input: bool, comms: bool) -> Result<()> {
    let id = resolve_id(service, query, Some(flow_of(input)))?;
    if comms {
        service.set_default_communications(&id)?;
        println!("Switched communications device to {}", query);
    } else {
        service.set_default(&id)?;
        println!("Switched to {}", query);
    }
    Ok(())
}

fn run_hotkey_command(service: &mut CliService, command: HotkeyCommands) -> Result<()> {
    match command {
        HotkeyCommands::Set { device, combo } => {
            let hotkey: Hotkey = combo
                .parse()
                .with_context(|| format!("Invalid hotkey '{}'", combo))?;
            let id = resolve_id(service, &device, None)?;
            service.assign_hotkey(&id, hotkey)?;
            println!("{} -> {}", hotkey, device);
        }
        HotkeyCommands::Clear { device } => {
            // Disconnected devices can only be addressed by id
            let id = resolve_id(service, &device, None).unwrap_or(device.clone());
            if service.clear_hotkey(&id) {
                println!("Cleared hotkey of {}", device);
            } else {
                println!("{} has no hotkey", device);
            }
        }
        HotkeyCommands::List => {
            let table = service.hotkey_table();
            if table.is_empty() {
                println!("No hotkeys configured");
            }
            for row in table {
                println!(
                    "  {:<24} {}{}{}",
                    row.hotkey.to_string(),
                    row.display_name,
                    if row.sub_name.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", row.sub_name)
                    },
                    if row.is_connected { "" } else { " [disconnected]" }
                );
            }
        }
    }
    Ok(())
}

fn check_settings(settings_path: PathBuf) -> Result<()> {
    info!("Validating settings");
    let loader = SettingsLoader::new_production(settings_path);

    println!("Settings validation ({}):", loader.settings_path().display());
    if !loader.settings_exist() {
        println!("  - No settings file, defaults apply");
        return Ok(());
    }

    let settings = loader.load_settings()?;
    println!("  ✓ Settings file parsed successfully");
    println!("  ✓ Favorites: {}", settings.favorite_device_ids.len());
    println!("  ✓ Hotkeys: {}", settings.hotkeys.len());
    println!("  ✓ Custom icons: {}", settings.custom_device_icons.len());
    println!("  ✓ Known devices: {}", settings.device_name_mapping.len());
    if settings.device_sort_mode.parse::<soundhop::settings::DeviceSortMode>().is_err() {
        println!(
            "  ! Unknown device_sort_mode '{}', using {}",
            settings.device_sort_mode,
            settings.sort_mode()
        );
    }
    Ok(())
}

async fn run_daemon(settings_path: PathBuf) -> Result<()> {
    info!("Starting daemon mode");

    let (handle, commands) = ServiceHandle::channel();
    let mut service = SwitcherService::new_production(settings_path, handle.clone())?;
    service.on_devices_changed(handle.device_change_callback())?;

    println!("SoundHop daemon started");
    println!("  Press Ctrl+C to stop");

    service::run_service(&mut service, commands).await?;

    println!("Daemon stopped");
    Ok(())
}
