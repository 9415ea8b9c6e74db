//! ESP-Touch SmartConfig provisioning adapter.
//!
//! Implements [`ProvisioningPort`].  A phone app broadcasts the network
//! credentials encoded in packet lengths; the driver decodes them and hands
//! over NUL-padded `ssid[32]` / `password[64]` buffers plus an optional
//! BSSID.  The adapter validates those bytes and raises
//! `CredentialsReceived` on the event bus.  It never connects by itself:
//! joining and persisting are the orchestrator's job.
//!
//! ```text
//!  Phone ──ESP-Touch──▶ driver ──SC_EVENT_GOT_SSID_PSWD──▶ adapter
//!                                                            │
//!                                   CredentialsReceived ◀────┘
//! ```
//!
//! # Security
//!
//! - Length limits enforced on every field before any copy into owned storage.
//! - UTF-8 and control-character checks on the SSID.
//! - Passphrases are never logged.

use log::{info, warn};

use crate::app::ports::{ProvisioningError, ProvisioningPort};
use crate::credentials::{Bssid, PASSPHRASE_MAX_LEN, Passphrase, SSID_MAX_LEN, Ssid};
use crate::events::{EventPublisher, NetEvent, ReceivedCredentials};

use super::utils::{has_control_chars, sanitize_field};

// ───────────────────────────────────────────────────────────────
// Credential intake
// ───────────────────────────────────────────────────────────────

/// Validate raw driver buffers into owned credentials.
pub fn parse_credentials(
    ssid_raw: &[u8],
    password_raw: &[u8],
    bssid: Option<[u8; 6]>,
) -> Result<ReceivedCredentials, ProvisioningError> {
    let ssid = sanitize_field(ssid_raw, SSID_MAX_LEN)?;
    if ssid.is_empty() || has_control_chars(ssid) {
        return Err(ProvisioningError::InvalidSsid);
    }
    let password = sanitize_field(password_raw, PASSPHRASE_MAX_LEN)
        .map_err(|_| ProvisioningError::InvalidPassword)?;

    Ok(ReceivedCredentials {
        ssid: Ssid::try_from(ssid).map_err(|()| ProvisioningError::InvalidSsid)?,
        passphrase: Passphrase::try_from(password)
            .map_err(|()| ProvisioningError::InvalidPassword)?,
        bssid: bssid.map(Bssid).filter(|b| !b.is_zero()),
    })
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF static state (event callbacks)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static SC_PUBLISHER: std::sync::Mutex<Option<EventPublisher<'static>>> =
    std::sync::Mutex::new(None);

#[cfg(target_os = "espidf")]
fn raise_from_callback(event: NetEvent) {
    if let Ok(guard) = SC_PUBLISHER.lock() {
        if let Some(publisher) = guard.as_ref() {
            publisher.raise(event);
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sc_event_handler(
    _arg: *mut core::ffi::c_void,
    _base: esp_idf_svc::sys::esp_event_base_t,
    id: i32,
    data: *mut core::ffi::c_void,
) {
    use esp_idf_svc::sys::*;

    match id as u32 {
        smartconfig_event_t_SC_EVENT_SCAN_DONE => log::info!("SmartConfig: scan done"),
        smartconfig_event_t_SC_EVENT_FOUND_CHANNEL => log::info!("SmartConfig: found channel"),
        smartconfig_event_t_SC_EVENT_GOT_SSID_PSWD => {
            if data.is_null() {
                return;
            }
            // SAFETY: ESP-IDF passes a smartconfig_event_got_ssid_pswd_t for
            // this event id, valid for the duration of the callback.
            let evt = unsafe { &*(data as *const smartconfig_event_got_ssid_pswd_t) };
            let bssid = evt.bssid_set.then_some(evt.bssid);
            match parse_credentials(&evt.ssid, &evt.password, bssid) {
                Ok(creds) => {
                    log::info!("SmartConfig: got credentials for '{}'", creds.ssid);
                    raise_from_callback(NetEvent::CredentialsReceived(creds));
                }
                Err(e) => {
                    log::warn!("SmartConfig: rejected credentials: {}", e);
                    raise_from_callback(NetEvent::LinkLost);
                }
            }
        }
        smartconfig_event_t_SC_EVENT_SEND_ACK_DONE => log::info!("SmartConfig: ack sent"),
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// SmartConfig adapter
// ───────────────────────────────────────────────────────────────

pub struct SmartConfigAdapter<'a> {
    #[cfg(not(target_os = "espidf"))]
    publisher: EventPublisher<'a>,
    #[cfg(target_os = "espidf")]
    _publisher: core::marker::PhantomData<EventPublisher<'a>>,
    active: bool,
    /// Sessions started since construction.
    sessions: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_start: bool,
}

impl<'a> SmartConfigAdapter<'a> {
    #[cfg(not(target_os = "espidf"))]
    pub fn new(publisher: EventPublisher<'a>) -> Self {
        info!("SmartConfigAdapter: simulation backend");
        Self {
            publisher,
            active: false,
            sessions: 0,
            sim_fail_start: false,
        }
    }

    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    // ── Simulation controls ───────────────────────────────────

    /// Deliver credentials as the driver would.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(
        &mut self,
        ssid_raw: &[u8],
        password_raw: &[u8],
        bssid: Option<[u8; 6]>,
    ) -> Result<(), ProvisioningError> {
        if !self.active {
            return Err(ProvisioningError::NotActive);
        }
        let creds = parse_credentials(ssid_raw, password_raw, bssid)?;
        info!("SmartConfig(sim): got credentials for '{}'", creds.ssid);
        self.publisher.raise(NetEvent::CredentialsReceived(creds));
        Ok(())
    }

    /// Abort the running session as a timeout would.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_session(&mut self) {
        if self.active {
            warn!("SmartConfig(sim): session failed");
            self.publisher.raise(NetEvent::LinkLost);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next_start(&mut self) {
        self.sim_fail_start = true;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), ProvisioningError> {
        if core::mem::take(&mut self.sim_fail_start) {
            return Err(ProvisioningError::StartFailed);
        }
        info!("SmartConfig(sim): listening");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("SmartConfig(sim): stopped");
    }
}

#[cfg(target_os = "espidf")]
impl SmartConfigAdapter<'static> {
    /// Register the SmartConfig event callback.  The session starts on
    /// [`ProvisioningPort::start`].
    pub fn new(publisher: EventPublisher<'static>) -> Result<Self, ProvisioningError> {
        use esp_idf_svc::sys::*;

        if let Ok(mut guard) = SC_PUBLISHER.lock() {
            *guard = Some(publisher);
        }
        // SAFETY: static callback registered with the default event loop.
        let ret = unsafe {
            esp_event_handler_register(
                SC_EVENT,
                ESP_EVENT_ANY_ID,
                Some(sc_event_handler),
                core::ptr::null_mut(),
            )
        };
        if ret != ESP_OK {
            warn!("SmartConfig: event handler registration failed ({})", ret);
            return Err(ProvisioningError::StartFailed);
        }
        info!("SmartConfigAdapter: ESP-IDF backend");
        Ok(Self {
            _publisher: core::marker::PhantomData,
            active: false,
            sessions: 0,
        })
    }

    fn platform_start(&mut self) -> Result<(), ProvisioningError> {
        use esp_idf_svc::sys::*;

        let cfg = smartconfig_start_config_t {
            enable_log: false,
            esp_touch_v2_enable_crypt: false,
            esp_touch_v2_key: core::ptr::null_mut(),
        };
        // SAFETY: WiFi driver is started before provisioning is entered.
        let ret = unsafe {
            let r = esp_smartconfig_set_type(smartconfig_type_t_SC_TYPE_ESPTOUCH);
            if r != ESP_OK { r } else { esp_smartconfig_start(&cfg) }
        };
        if ret != ESP_OK {
            warn!("SmartConfig: start failed ({})", ret);
            return Err(ProvisioningError::StartFailed);
        }
        info!("SmartConfig: listening for ESP-Touch");
        Ok(())
    }

    fn platform_stop(&mut self) {
        // SAFETY: stopping an idle session is harmless.
        let ret = unsafe { esp_idf_svc::sys::esp_smartconfig_stop() };
        if ret != esp_idf_svc::sys::ESP_OK {
            warn!("SmartConfig: stop failed ({})", ret);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ProvisioningPort
// ───────────────────────────────────────────────────────────────

impl ProvisioningPort for SmartConfigAdapter<'_> {
    fn start(&mut self) -> Result<(), ProvisioningError> {
        if self.active {
            return Ok(());
        }
        self.platform_start()?;
        self.active = true;
        self.sessions += 1;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.platform_stop();
            self.active = false;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
