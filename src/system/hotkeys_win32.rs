//! Global hotkeys via RegisterHotKey on a dedicated message thread.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    HOT_KEY_MODIFIERS, MOD_NOREPEAT, RegisterHotKey, UnregisterHotKey,
};
use windows::Win32::UI::WindowsAndMessaging::{MSG, PM_REMOVE, PeekMessageW, WM_HOTKEY};

use crate::audio::Hotkey;
use crate::service::ServiceHandle;
use crate::system::traits::HotkeyRegistrar;

const POLL_INTERVAL: Duration = Duration::from_millis(15);

enum RegistrarCommand {
    Register {
        device_id: String,
        hotkey: Hotkey,
        reply: Sender<Result<()>>,
    },
    UnregisterAll,
    Shutdown,
}

/// Registers hotkeys from its own thread: WM_HOTKEY is posted to the queue
/// of the thread that called RegisterHotKey.
pub struct Win32HotkeyRegistrar {
    commands: Sender<RegistrarCommand>,
    thread: Option<JoinHandle<()>>,
}

impl Win32HotkeyRegistrar {
    pub fn new(handle: ServiceHandle) -> Result<Self> {
        let (commands, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("hotkeys".to_string())
            .spawn(move || message_loop(receiver, handle))
            .context("Failed to spawn hotkey thread")?;

        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }
}

impl HotkeyRegistrar for Win32HotkeyRegistrar {
    fn register(&self, device_id: &str, hotkey: &Hotkey) -> Result<()> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(RegistrarCommand::Register {
                device_id: device_id.to_string(),
                hotkey: *hotkey,
                reply,
            })
            .map_err(|_| anyhow::anyhow!("Hotkey thread is not running"))?;
        response
            .recv()
            .map_err(|_| anyhow::anyhow!("Hotkey thread exited during registration"))?
    }

    fn unregister_all(&self) {
        if self.commands.send(RegistrarCommand::UnregisterAll).is_err() {
            warn!("Hotkey thread is not running");
        }
    }
}

impl Drop for Win32HotkeyRegistrar {
    fn drop(&mut self) {
        let _ = self.commands.send(RegistrarCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn unregister(registered: &mut HashMap<i32, String>) {
    for id in registered.keys() {
        unsafe {
            let _ = UnregisterHotKey(None, *id);
        }
    }
    registered.clear();
}

fn message_loop(commands: Receiver<RegistrarCommand>, handle: ServiceHandle) {
    let mut registered: HashMap<i32, String> = HashMap::new();
    let mut next_id: i32 = 1;

    loop {
        loop {
            match commands.try_recv() {
                Ok(RegistrarCommand::Register {
                    device_id,
                    hotkey,
                    reply,
                }) => {
                    let id = next_id;
                    let modifiers = HOT_KEY_MODIFIERS(hotkey.modifiers.bits()) | MOD_NOREPEAT;
                    let result = unsafe { RegisterHotKey(None, id, modifiers, hotkey.key) }
                        .with_context(|| format!("Failed to register hotkey {}", hotkey));
                    if result.is_ok() {
                        debug!("Registered hotkey {} for {}", hotkey, device_id);
                        registered.insert(id, device_id);
                        next_id += 1;
                    }
                    let _ = reply.send(result);
                }
                Ok(RegistrarCommand::UnregisterAll) => unregister(&mut registered),
                Ok(RegistrarCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                    unregister(&mut registered);
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_HOTKEY {
                if let Some(device_id) = registered.get(&(msg.wParam.0 as i32)) {
                    handle.hotkey_pressed(device_id.clone());
                }
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}
