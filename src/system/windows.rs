//! Core Audio endpoint access through the MMDevice API.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use windows::Win32::Devices::Properties::{DEVPKEY_Device_FriendlyName, DEVPKEY_DeviceClass_IconPath};
use windows::Win32::Media::Audio::{
    DEVICE_STATE, EDataFlow, ERole, IMMDevice, IMMDeviceEnumerator, IMMNotificationClient,
    IMMNotificationClient_Impl, MMDeviceEnumerator, eCapture, eCommunications, eConsole,
    eMultimedia, eRender,
};
use windows::Win32::System::Com::{
    CLSCTX_ALL, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx, CoUninitialize, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};
use windows::core::{GUID, HRESULT, IUnknown, IUnknown_Vtbl, PCWSTR, implement, interface};
// The implement macro expects windows_core in scope
#[allow(unused_imports)]
use windows_core;

use crate::audio::{DataFlow, DeviceRole, DeviceState, DeviceStateMask, EndpointInfo};
use crate::system::traits::AudioSystemInterface;

type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Undocumented but stable interface behind the Sound control panel.
#[allow(non_snake_case)]
#[interface("F8679F50-850A-41CF-9C72-430F290290C8")]
unsafe trait IPolicyConfig: IUnknown {
    fn reserved1(&self) -> HRESULT;
    fn reserved2(&self) -> HRESULT;
    fn reserved3(&self) -> HRESULT;
    fn reserved4(&self) -> HRESULT;
    fn reserved5(&self) -> HRESULT;
    fn reserved6(&self) -> HRESULT;
    fn reserved7(&self) -> HRESULT;
    fn reserved8(&self) -> HRESULT;
    fn reserved9(&self) -> HRESULT;
    fn reserved10(&self) -> HRESULT;

    fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
    fn SetEndpointVisibility(&self, device_id: PCWSTR, visible: i32) -> HRESULT;
}

const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard;

impl ComGuard {
    pub fn new() -> Result<Self> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .context("Failed to initialize COM")?;
        }
        Ok(Self)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// Notification client fanning every endpoint event out to the registered callbacks.
#[implement(IMMNotificationClient)]
struct EndpointChangeClient {
    callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
}

impl EndpointChangeClient {
    fn notify(&self) {
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                callback();
            }
        }
    }
}

impl IMMNotificationClient_Impl for EndpointChangeClient_Impl {
    fn OnDeviceStateChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        self.notify();
        Ok(())
    }

    fn OnDeviceAdded(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        self.notify();
        Ok(())
    }

    fn OnDeviceRemoved(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        self.notify();
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        _flow: EDataFlow,
        _role: ERole,
        _pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        self.notify();
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        self.notify();
        Ok(())
    }
}

/// Production implementation of AudioSystemInterface backed by Core Audio.
pub struct WindowsAudioSystem {
    enumerator: IMMDeviceEnumerator,
    callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
    notification_client: RefCell<Option<IMMNotificationClient>>,
    _com: ComGuard,
}

impl WindowsAudioSystem {
    pub fn new() -> Result<Self> {
        let com = ComGuard::new()?;
        let enumerator: IMMDeviceEnumerator = unsafe {
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .context("Failed to create device enumerator")?
        };

        Ok(Self {
            enumerator,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            notification_client: RefCell::new(None),
            _com: com,
        })
    }

    fn endpoint_info(&self, device: &IMMDevice) -> Result<EndpointInfo> {
        unsafe {
            let id = device
                .GetId()
                .context("Failed to get endpoint id")?
                .to_string()
                .context("Endpoint id is not valid UTF-16")?;
            let state = device.GetState().context("Failed to get endpoint state")?;
            let props: IPropertyStore = device
                .OpenPropertyStore(STGM(0))
                .context("Failed to open endpoint property store")?;

            let name = read_string_property(
                &props,
                PROPERTYKEY {
                    fmtid: DEVPKEY_Device_FriendlyName.fmtid,
                    pid: DEVPKEY_Device_FriendlyName.pid,
                },
            )
            .unwrap_or_else(|| "Unknown Device".to_string());
            let icon_path = read_string_property(
                &props,
                PROPERTYKEY {
                    fmtid: DEVPKEY_DeviceClass_IconPath.fmtid,
                    pid: DEVPKEY_DeviceClass_IconPath.pid,
                },
            )
            .unwrap_or_default();

            Ok(EndpointInfo::new(id, name)
                .with_state(DeviceState::from_bits(state.0))
                .with_icon_path(icon_path))
        }
    }

    fn policy_config() -> Result<IPolicyConfig> {
        unsafe {
            CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL)
                .context("Failed to create policy config client")
        }
    }
}

fn read_string_property(props: &IPropertyStore, key: PROPERTYKEY) -> Option<String> {
    let value = unsafe { props.GetValue(&key).ok()? };
    let s = value.to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn to_edataflow(flow: DataFlow) -> EDataFlow {
    match flow {
        DataFlow::Render => eRender,
        DataFlow::Capture => eCapture,
    }
}

fn to_erole(role: DeviceRole) -> ERole {
    match role {
        DeviceRole::Console => eConsole,
        DeviceRole::Multimedia => eMultimedia,
        DeviceRole::Communications => eCommunications,
    }
}

impl AudioSystemInterface for WindowsAudioSystem {
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state_mask: DeviceStateMask,
    ) -> Result<Vec<EndpointInfo>> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(to_edataflow(flow), DEVICE_STATE(state_mask.bits()))
                .context("Failed to enumerate audio endpoints")?;
            let count = collection.GetCount().context("Failed to count endpoints")?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(device) => device,
                    Err(e) => {
                        warn!("Failed to read endpoint {}: {}", i, e);
                        continue;
                    }
                };
                match self.endpoint_info(&device) {
                    Ok(info) => endpoints.push(info),
                    Err(e) => warn!("Skipping unreadable endpoint: {:#}", e),
                }
            }
            Ok(endpoints)
        }
    }

    fn get_default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<Option<String>> {
        unsafe {
            let device = match self
                .enumerator
                .GetDefaultAudioEndpoint(to_edataflow(flow), to_erole(role))
            {
                Ok(device) => device,
                // No endpoint of this direction exists
                Err(_) => return Ok(None),
            };
            let id = device
                .GetId()
                .context("Failed to get default endpoint id")?
                .to_string()
                .context("Endpoint id is not valid UTF-16")?;
            Ok(Some(id))
        }
    }

    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<()> {
        let policy = Self::policy_config()?;
        let wide = to_wide(device_id);
        unsafe {
            policy
                .SetDefaultEndpoint(PCWSTR(wide.as_ptr()), to_erole(role).0 as u32)
                .ok()
                .with_context(|| format!("SetDefaultEndpoint failed for {}", device_id))
        }
    }

    fn set_endpoint_visibility(&self, device_id: &str, visible: bool) -> Result<()> {
        let policy = Self::policy_config()?;
        let wide = to_wide(device_id);
        unsafe {
            policy
                .SetEndpointVisibility(PCWSTR(wide.as_ptr()), i32::from(visible))
                .ok()
                .with_context(|| format!("SetEndpointVisibility failed for {}", device_id))
        }
    }

    fn add_device_change_listener(&self, callback: Box<dyn Fn() + Send + Sync>) -> Result<()> {
        self.callbacks
            .lock()
            .map_err(|_| anyhow::anyhow!("Device change callback list poisoned"))?
            .push(callback);

        let mut client = self.notification_client.borrow_mut();
        if client.is_none() {
            let notification: IMMNotificationClient = EndpointChangeClient {
                callbacks: Arc::clone(&self.callbacks),
            }
            .into();
            unsafe {
                self.enumerator
                    .RegisterEndpointNotificationCallback(&notification)
                    .context("Failed to register endpoint notification callback")?;
            }
            debug!("Registered endpoint notification client");
            *client = Some(notification);
        }
        Ok(())
    }
}

impl Drop for WindowsAudioSystem {
    fn drop(&mut self) {
        if let Some(client) = self.notification_client.get_mut().take() {
            unsafe {
                if let Err(e) = self.enumerator.UnregisterEndpointNotificationCallback(&client) {
                    warn!("Failed to unregister endpoint notification callback: {}", e);
                }
            }
        }
    }
}
