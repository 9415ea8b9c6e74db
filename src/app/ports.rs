//! Port traits: the hexagonal boundary between the connection core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConnectionOrchestrator (domain)
//! ```
//!
//! Driven adapters (byte-store, radio, provisioning, event sinks) implement
//! these traits.  The [`ConnectionOrchestrator`](super::service::ConnectionOrchestrator)
//! consumes them via generics, so the domain core never touches the driver
//! directly.  Asynchronous outcomes (attach, link loss, received credentials)
//! never come back through these traits: adapters raise them on the
//! [`EventBus`](crate::events::EventBus).

use core::fmt;

use crate::config::ManagerConfig;
use crate::credentials::{Bssid, Ssid};

/// Hard bound on scan results imposed by the radio.
pub const MAX_SCANNED_AP: usize = 6;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value byte-store.
///
/// - Write operations MUST be atomic per key, with no partial writes on power
///   loss.  The ESP-IDF NVS API guarantees this natively; the in-memory
///   simulation achieves it trivially.
/// - No concurrent-writer guarantees are assumed by callers.
pub trait StoragePort {
    /// Read a value into `buf`.  Returns the stored length.
    ///
    /// A stored value larger than `buf` is reported as
    /// [`StorageError::InvalidSize`], never silently truncated.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  [`StorageError::NotFound`] if it did not exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`ManagerConfig`].
///
/// Implementations MUST validate before persisting.  Out-of-range values
/// are rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`ManagerConfig::default()`] if none is stored.
    fn load(&self) -> Result<ManagerConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ManagerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain → WiFi driver)
// ───────────────────────────────────────────────────────────────

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedAp {
    pub ssid: Ssid,
    pub bssid: Bssid,
    /// Signal strength in dBm.
    pub rssi: i8,
    pub channel: u8,
}

/// Station-mode radio.
///
/// `start` and `connect` only *begin* work; completion is signalled with
/// `InterfaceStarted`, `AttachConfirmed` or `LinkLost` on the event bus.
pub trait RadioPort {
    /// Bring the station interface up.
    fn start(&mut self) -> Result<(), RadioError>;

    /// Blocking scan of visible networks, strongest first.
    fn scan(&mut self) -> Result<heapless::Vec<ScannedAp, MAX_SCANNED_AP>, RadioError>;

    /// Begin associating with `ssid`.  `bssid` pins a specific access point.
    fn connect(
        &mut self,
        ssid: &str,
        passphrase: &str,
        bssid: Option<Bssid>,
    ) -> Result<(), RadioError>;

    /// Drop the current association, if any.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Provisioning port (driven adapter: domain → SmartConfig / BLE / …)
// ───────────────────────────────────────────────────────────────

/// Out-of-band credential delivery.
///
/// Received credentials arrive as `CredentialsReceived` on the event bus;
/// session failure or timeout arrives as `LinkLost`.
pub trait ProvisioningPort {
    fn start(&mut self) -> Result<(), ProvisioningError>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Stored value does not fit the caller's buffer.
    InvalidSize,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`RadioPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Driver not started.
    NotStarted,
    /// Scan could not be performed.
    ScanFailed,
    /// Driver refused the association request.
    ConnectFailed,
    /// SSID or passphrase not representable by the driver.
    InvalidCredentials,
}

/// Errors from [`ProvisioningPort`] operations and credential intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Provisioning service failed to start.
    StartFailed,
    /// Credentials arrived while no session was running.
    NotActive,
    /// Received field exceeds its maximum length.
    DataTooLong,
    /// Received field is not valid UTF-8.
    InvalidUtf8,
    /// SSID empty or otherwise unusable.
    InvalidSsid,
    /// Passphrase unusable.
    InvalidPassword,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::InvalidSize => write!(f, "stored value size mismatch"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "WiFi driver not started"),
            Self::ScanFailed => write!(f, "WiFi scan failed"),
            Self::ConnectFailed => write!(f, "WiFi connect request failed"),
            Self::InvalidCredentials => write!(f, "credentials rejected by driver"),
        }
    }
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed => write!(f, "provisioning start failed"),
            Self::NotActive => write!(f, "no provisioning session active"),
            Self::DataTooLong => write!(f, "received field exceeds max length"),
            Self::InvalidUtf8 => write!(f, "received field contains invalid UTF-8"),
            Self::InvalidSsid => write!(f, "SSID invalid (1-32 bytes, no NUL)"),
            Self::InvalidPassword => write!(f, "password invalid (at most 64 bytes, no NUL)"),
        }
    }
}
