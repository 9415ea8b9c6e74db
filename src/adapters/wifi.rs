//! WiFi station-mode adapter.
//!
//! Implements [`RadioPort`], the hexagonal boundary for the radio.  Driver
//! outcomes are never returned from `start`/`connect`; they are raised on
//! the [`EventBus`](crate::events::EventBus):
//!
//! | Driver event              | Bus event          |
//! |---------------------------|--------------------|
//! | `WIFI_EVENT_STA_START`    | `InterfaceStarted` |
//! | `IP_EVENT_STA_GOT_IP`     | `AttachConfirmed`  |
//! | `WIFI_EVENT_STA_DISCONNECTED` | `LinkLost`     |
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` for driver
//!   control, raw `esp_event_handler_register` callbacks for events.
//! - **all other targets**: a deterministic simulation with a scripted set
//!   of visible networks and fault injection, for host-side tests.

use log::{debug, info, warn};

use crate::app::ports::{MAX_SCANNED_AP, RadioError, RadioPort, ScannedAp};
use crate::config::ManagerConfig;
#[cfg(not(target_os = "espidf"))]
use crate::credentials::Passphrase;
use crate::credentials::{Bssid, Ssid};
use crate::events::{EventPublisher, NetEvent};

use core::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

// ───────────────────────────────────────────────────────────────
// Simulated environment
// ───────────────────────────────────────────────────────────────

/// One access point in the simulated environment.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimNetwork {
    pub ap: ScannedAp,
    pub passphrase: Passphrase,
    /// Hidden networks only show up when `show_hidden` is set.
    pub hidden: bool,
    /// Unreachable networks are visible but never attach.
    pub reachable: bool,
}

// ───────────────────────────────────────────────────────────────
// Requested-disconnect filter
// ───────────────────────────────────────────────────────────────

/// Swallows the one `STA_DISCONNECTED` that answers a host-requested
/// disconnect, so it is not reported as a link loss.  Disarmed again by the
/// next connect in case the driver never sends it.
#[derive(Debug, Default)]
pub struct DisconnectGate {
    armed: AtomicBool,
}

impl DisconnectGate {
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, AtomicOrdering::Release);
    }

    pub fn disarm(&self) {
        self.armed.store(false, AtomicOrdering::Release);
    }

    /// `true` if this disconnect was requested and must stay silent.
    pub fn take(&self) -> bool {
        self.armed.swap(false, AtomicOrdering::AcqRel)
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF static state (event callbacks)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static WIFI_PUBLISHER: std::sync::Mutex<Option<EventPublisher<'static>>> =
    std::sync::Mutex::new(None);

#[cfg(target_os = "espidf")]
static DISCONNECT_GATE: DisconnectGate = DisconnectGate::new();

#[cfg(target_os = "espidf")]
fn raise_from_callback(event: NetEvent) {
    if let Ok(guard) = WIFI_PUBLISHER.lock() {
        if let Some(publisher) = guard.as_ref() {
            publisher.raise(event);
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn wifi_event_handler(
    _arg: *mut core::ffi::c_void,
    base: esp_idf_svc::sys::esp_event_base_t,
    id: i32,
    _data: *mut core::ffi::c_void,
) {
    use esp_idf_svc::sys::*;

    // SAFETY: the event bases are link-time constants exported by ESP-IDF.
    let (wifi_base, ip_base) = unsafe { (WIFI_EVENT, IP_EVENT) };
    let id = id as u32;

    if base == wifi_base && id == wifi_event_t_WIFI_EVENT_STA_START {
        log::info!("WiFi: STA started");
        raise_from_callback(NetEvent::InterfaceStarted);
    } else if base == wifi_base && id == wifi_event_t_WIFI_EVENT_STA_DISCONNECTED {
        if DISCONNECT_GATE.take() {
            debug!("WiFi: requested disconnect completed");
        } else {
            log::info!("WiFi: STA disconnected");
            raise_from_callback(NetEvent::LinkLost);
        }
    } else if base == ip_base && id == ip_event_t_IP_EVENT_STA_GOT_IP {
        log::info!("WiFi: got IP");
        raise_from_callback(NetEvent::AttachConfirmed);
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter<'a> {
    publisher: EventPublisher<'a>,
    started: bool,
    power_save: bool,
    show_hidden: bool,

    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,

    /// Simulation: every visible network.
    #[cfg(not(target_os = "espidf"))]
    sim_networks: Vec<SimNetwork>,
    /// Simulation: SSID of the current association.
    #[cfg(not(target_os = "espidf"))]
    sim_associated: Option<Ssid>,
    /// Simulation: number of upcoming `connect` calls to refuse synchronously.
    #[cfg(not(target_os = "espidf"))]
    sim_refuse_connects: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_scan: bool,
    /// Simulation: every `connect` call, in order.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_log: Vec<(Ssid, Option<Bssid>)>,
    #[cfg(not(target_os = "espidf"))]
    sim_gate: DisconnectGate,
}

#[cfg(not(target_os = "espidf"))]
impl<'a> WifiAdapter<'a> {
    pub fn new(publisher: EventPublisher<'a>, config: &ManagerConfig) -> Self {
        info!("WifiAdapter: simulation backend");
        Self {
            publisher,
            started: false,
            power_save: config.power_save,
            show_hidden: config.show_hidden,
            sim_networks: Vec::new(),
            sim_associated: None,
            sim_refuse_connects: 0,
            sim_fail_scan: false,
            sim_connect_log: Vec::new(),
            sim_gate: DisconnectGate::new(),
        }
    }

    // ── Simulation controls ───────────────────────────────────

    /// Add a visible, reachable network.
    pub fn sim_add_network(&mut self, ssid: &str, bssid: [u8; 6], rssi: i8, passphrase: &str) {
        let (Ok(ssid), Ok(passphrase)) = (Ssid::try_from(ssid), Passphrase::try_from(passphrase))
        else {
            warn!("WiFi(sim): ignoring oversized network definition");
            return;
        };
        self.sim_networks.push(SimNetwork {
            ap: ScannedAp {
                ssid,
                bssid: Bssid(bssid),
                rssi,
                channel: 1 + (bssid[5] % 11),
            },
            passphrase,
            hidden: false,
            reachable: true,
        });
    }

    pub fn sim_set_hidden(&mut self, ssid: &str, hidden: bool) {
        for n in self.sim_networks.iter_mut().filter(|n| n.ap.ssid == ssid) {
            n.hidden = hidden;
        }
    }

    pub fn sim_set_reachable(&mut self, ssid: &str, reachable: bool) {
        for n in self.sim_networks.iter_mut().filter(|n| n.ap.ssid == ssid) {
            n.reachable = reachable;
        }
    }

    /// Refuse the next `count` connect calls synchronously.
    pub fn sim_refuse_next_connects(&mut self, count: u32) {
        self.sim_refuse_connects = count;
    }

    pub fn sim_fail_next_scan(&mut self) {
        self.sim_fail_scan = true;
    }

    /// Drop the current association as if the AP went away.
    pub fn sim_drop_link(&mut self) {
        if let Some(ssid) = self.sim_associated.take() {
            info!("WiFi(sim): link to '{}' lost", ssid);
            self.sim_sta_disconnected();
        }
    }

    /// The driver's `STA_DISCONNECTED`, filtered like the target's callback.
    fn sim_sta_disconnected(&self) {
        if self.sim_gate.take() {
            debug!("WiFi(sim): requested disconnect completed");
        } else {
            self.publisher.raise(NetEvent::LinkLost);
        }
    }

    pub fn sim_associated(&self) -> Option<&str> {
        self.sim_associated.as_deref()
    }

    pub fn sim_connect_log(&self) -> &[(Ssid, Option<Bssid>)] {
        &self.sim_connect_log
    }

    // ── Platform-specific ─────────────────────────────────────

    fn platform_start(&mut self) -> Result<(), RadioError> {
        info!("WiFi(sim): STA started (power_save={})", self.power_save);
        self.publisher.raise(NetEvent::InterfaceStarted);
        Ok(())
    }

    fn platform_scan(&mut self) -> Result<heapless::Vec<ScannedAp, MAX_SCANNED_AP>, RadioError> {
        if core::mem::take(&mut self.sim_fail_scan) {
            return Err(RadioError::ScanFailed);
        }
        let mut visible: Vec<&SimNetwork> = self
            .sim_networks
            .iter()
            .filter(|n| self.show_hidden || !n.hidden)
            .collect();
        visible.sort_by(|a, b| b.ap.rssi.cmp(&a.ap.rssi));
        Ok(visible
            .into_iter()
            .take(MAX_SCANNED_AP)
            .map(|n| n.ap.clone())
            .collect())
    }

    fn platform_connect(
        &mut self,
        ssid: &str,
        passphrase: &str,
        bssid: Option<Bssid>,
    ) -> Result<(), RadioError> {
        if let Ok(logged) = Ssid::try_from(ssid) {
            self.sim_connect_log.push((logged, bssid));
        }
        if self.sim_refuse_connects > 0 {
            self.sim_refuse_connects -= 1;
            warn!("WiFi(sim): connect to '{}' refused", ssid);
            return Err(RadioError::ConnectFailed);
        }
        self.sim_gate.disarm();

        let joined = self.sim_networks.iter().any(|n| {
            n.ap.ssid == ssid
                && n.reachable
                && n.passphrase == passphrase
                && bssid.is_none_or(|b| b == n.ap.bssid)
        });
        if joined {
            self.sim_associated = Ssid::try_from(ssid).ok();
            info!("WiFi(sim): associated with '{}'", ssid);
            self.publisher.raise(NetEvent::AttachConfirmed);
        } else {
            info!("WiFi(sim): association with '{}' failed", ssid);
            self.sim_sta_disconnected();
        }
        Ok(())
    }

    /// Only a live association answers with `STA_DISCONNECTED`.
    fn platform_disconnect(&mut self) {
        self.sim_gate.arm();
        if self.sim_associated.take().is_some() {
            info!("WiFi(sim): disconnected");
            self.sim_sta_disconnected();
        }
    }
}

#[cfg(target_os = "espidf")]
impl WifiAdapter<'static> {
    /// Bring up the WiFi driver and register the bus-forwarding callbacks.
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: esp_idf_svc::nvs::EspDefaultNvsPartition,
        publisher: EventPublisher<'static>,
        config: &ManagerConfig,
    ) -> Result<Self, RadioError> {
        use esp_idf_svc::sys::*;

        let wifi = esp_idf_svc::wifi::EspWifi::new(modem, sysloop, Some(nvs))
            .map_err(|_| RadioError::NotStarted)?;

        if let Ok(mut guard) = WIFI_PUBLISHER.lock() {
            *guard = Some(publisher);
        }

        // SAFETY: registering static callbacks with the default loop, which
        // EspSystemEventLoop::take() has already created.
        let ret = unsafe {
            let r1 = esp_event_handler_register(
                WIFI_EVENT,
                ESP_EVENT_ANY_ID,
                Some(wifi_event_handler),
                core::ptr::null_mut(),
            );
            let r2 = esp_event_handler_register(
                IP_EVENT,
                ip_event_t_IP_EVENT_STA_GOT_IP as i32,
                Some(wifi_event_handler),
                core::ptr::null_mut(),
            );
            if r1 != ESP_OK { r1 } else { r2 }
        };
        if ret != ESP_OK {
            warn!("WiFi: event handler registration failed ({})", ret);
            return Err(RadioError::NotStarted);
        }

        info!("WifiAdapter: ESP-IDF driver initialised");
        Ok(Self {
            publisher,
            started: false,
            power_save: config.power_save,
            show_hidden: config.show_hidden,
            wifi,
        })
    }

    // ── Platform-specific ─────────────────────────────────────

    fn platform_start(&mut self) -> Result<(), RadioError> {
        use esp_idf_svc::wifi::{ClientConfiguration, Configuration};

        if self.wifi.is_started().unwrap_or(false) {
            // STA_START will not fire again for a running driver.
            self.publisher.raise(NetEvent::InterfaceStarted);
            return Ok(());
        }

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(|_| RadioError::NotStarted)?;
        self.wifi.start().map_err(|_| RadioError::NotStarted)?;

        let ps = if self.power_save {
            esp_idf_svc::sys::wifi_ps_type_t_WIFI_PS_MIN_MODEM
        } else {
            esp_idf_svc::sys::wifi_ps_type_t_WIFI_PS_NONE
        };
        // SAFETY: driver started above.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(ps) };
        if ret != esp_idf_svc::sys::ESP_OK {
            warn!("WiFi: esp_wifi_set_ps failed ({})", ret);
        }
        // STA_START arrives through the event callback.
        Ok(())
    }

    fn platform_scan(&mut self) -> Result<heapless::Vec<ScannedAp, MAX_SCANNED_AP>, RadioError> {
        let mut found = self.wifi.scan().map_err(|_| RadioError::ScanFailed)?;
        found.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));

        let mut out = heapless::Vec::new();
        for ap in found {
            if ap.ssid.is_empty() && !self.show_hidden {
                continue;
            }
            let Ok(ssid) = super::utils::sanitize_field(ap.ssid.as_bytes(), crate::credentials::SSID_MAX_LEN)
            else {
                continue;
            };
            let Ok(ssid) = Ssid::try_from(ssid) else {
                continue;
            };
            let entry = ScannedAp {
                ssid,
                bssid: Bssid(ap.bssid),
                rssi: ap.signal_strength,
                channel: ap.channel,
            };
            if out.push(entry).is_err() {
                break;
            }
        }
        Ok(out)
    }

    fn platform_connect(
        &mut self,
        ssid: &str,
        passphrase: &str,
        bssid: Option<Bssid>,
    ) -> Result<(), RadioError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let auth_method = if passphrase.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::InvalidCredentials)?,
            password: passphrase
                .try_into()
                .map_err(|_| RadioError::InvalidCredentials)?,
            bssid: bssid.map(|b| b.0),
            auth_method,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|_| RadioError::InvalidCredentials)?;
        // A disconnect the driver never confirmed must not hide this
        // attempt's failure.
        DISCONNECT_GATE.disarm();
        self.wifi.connect().map_err(|_| RadioError::ConnectFailed)
    }

    fn platform_disconnect(&mut self) {
        DISCONNECT_GATE.arm();
        if self.wifi.disconnect().is_err() {
            DISCONNECT_GATE.disarm();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// RadioPort
// ───────────────────────────────────────────────────────────────

impl RadioPort for WifiAdapter<'_> {
    fn start(&mut self) -> Result<(), RadioError> {
        if self.started {
            return Ok(());
        }
        self.platform_start()?;
        self.started = true;
        Ok(())
    }

    fn scan(&mut self) -> Result<heapless::Vec<ScannedAp, MAX_SCANNED_AP>, RadioError> {
        if !self.started {
            return Err(RadioError::NotStarted);
        }
        let list = self.platform_scan()?;
        info!("WiFi: scan found {} network(s)", list.len());
        Ok(list)
    }

    fn connect(
        &mut self,
        ssid: &str,
        passphrase: &str,
        bssid: Option<Bssid>,
    ) -> Result<(), RadioError> {
        if !self.started {
            return Err(RadioError::NotStarted);
        }
        if ssid.is_empty() || super::utils::has_control_chars(ssid) {
            return Err(RadioError::InvalidCredentials);
        }
        match bssid {
            Some(b) => info!("WiFi: connecting to '{}' via {}", ssid, b),
            None => info!("WiFi: connecting to '{}'", ssid),
        }
        self.platform_connect(ssid, passphrase, bssid)
    }

    fn disconnect(&mut self) {
        if self.started {
            self.platform_disconnect();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
