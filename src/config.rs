//! Connection manager configuration
//!
//! Tunable behaviour of the orchestrator.  Persisted by the NVS adapter
//! through [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

/// When a successful reconnect's use-count bump is written to flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PersistPolicy {
    /// Persist right after the increment.
    #[default]
    Immediate,
    /// Keep the increment in memory until the next persisted mutation.
    Deferred,
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Connect attempts per visible network before its credential is dropped
    pub connect_attempts: u8,
    /// Re-enter the stored-credential search after a link drop
    pub auto_reconnect: bool,
    /// Flash write policy for reconnect use-count bumps
    pub reconnect_persist: PersistPolicy,
    /// Enable modem power save while associated
    pub power_save: bool,
    /// Include hidden networks in scans
    pub show_hidden: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            auto_reconnect: true,
            reconnect_persist: PersistPolicy::Immediate,
            power_save: false,
            show_hidden: true,
        }
    }
}
