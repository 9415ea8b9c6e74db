//! apjoin firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter         WifiAdapter     SmartConfigAdapter         │
//! │  (Storage+Config)   (RadioPort)     (ProvisioningPort)         │
//! │  LogEventSink (EventSink)                                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        ConnectionOrchestrator (pure logic)             │    │
//! │  │        FSM · CredentialStore                           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventBus (driver callbacks ──▶ orchestrator task)             │
//! │  CommandQueue (application tasks ──▶ orchestrator task)        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use apjoin::adapters::log_sink::LogEventSink;
use apjoin::adapters::nvs::NvsAdapter;
use apjoin::adapters::smartconfig::SmartConfigAdapter;
use apjoin::adapters::wifi::WifiAdapter;
use apjoin::app::commands::CommandQueue;
use apjoin::app::ports::ConfigPort;
use apjoin::app::service::ConnectionOrchestrator;
use apjoin::config::ManagerConfig;
use apjoin::credentials::CredentialStore;
use apjoin::error::{Error, StoreError};
use apjoin::events::EventBus;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

/// Management commands (`SetAutoReconnect`, `Forget`, `ForgetAll`,
/// `Restart`).  Other tasks send through `COMMANDS.sender()`.
static COMMANDS: CommandQueue = CommandQueue::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  apjoin v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(Error::Config)?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ManagerConfig::default()
        }
    };
    info!("Config: {:?}", config);

    // ── 3. Credential store ───────────────────────────────────
    let mut store = CredentialStore::new(nvs);
    match store.init() {
        Ok(()) => {}
        Err(StoreError::NotFound) => {
            info!("First boot: writing empty credential image");
            if let Err(e) = store.persist() {
                warn!("Initial persist failed ({}), running from memory", e);
            }
        }
        Err(e) => warn!("Credential load failed ({}), running from memory", e),
    }

    // ── 4. Event bus + adapters ───────────────────────────────
    let bus: &'static EventBus = Box::leak(Box::new(EventBus::new()));

    let wifi = WifiAdapter::new(
        peripherals.modem,
        sysloop,
        nvs_partition,
        bus.publisher(),
        &config,
    )
    .map_err(Error::Radio)?;
    let smartconfig = SmartConfigAdapter::new(bus.publisher()).map_err(Error::Provisioning)?;

    // ── 5. Orchestrator ───────────────────────────────────────
    let mut orchestrator =
        ConnectionOrchestrator::new(store, wifi, smartconfig, LogEventSink::new(), config);
    orchestrator.start()?;

    info!("System ready. Entering event loop.");
    orchestrator.run(bus, &COMMANDS)
}
