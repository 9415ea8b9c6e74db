//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  It contains the current scan candidates, the in-flight
//! connection attempt, credentials pending confirmation, configuration,
//! and the queue of actions for the orchestrator to execute.

use log::warn;

use crate::app::ports::{MAX_SCANNED_AP, ScannedAp};
use crate::config::ManagerConfig;
use crate::credentials::{Bssid, Passphrase, Ssid};
use crate::events::ReceivedCredentials;

/// Upper bound on actions produced by a single input (including the
/// `on_exit`/`on_enter` of a transition).
pub const MAX_ACTIONS: usize = 8;

// ---------------------------------------------------------------------------
// Scan candidates and attempts
// ---------------------------------------------------------------------------

/// A visible network, annotated with the stored passphrase for its SSID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub ap: ScannedAp,
    /// `None` when the store has no credential for this SSID.
    pub stored: Option<Passphrase>,
}

/// The stored-credential connection currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    /// Live BSSID from the scan that produced this attempt.
    pub bssid: Option<Bssid>,
    /// 1-based attempt number against this network.
    pub attempt: u8,
}

// ---------------------------------------------------------------------------
// Actions (written by state handlers; executed by the orchestrator)
// ---------------------------------------------------------------------------

/// Side effects requested by state handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Scan for visible networks; the result comes back as `ScanCompleted`.
    Scan,
    /// Begin associating; a synchronous refusal comes back as `ConnectFailed`.
    Connect {
        ssid: Ssid,
        passphrase: Passphrase,
        bssid: Option<Bssid>,
    },
    /// Abandon the current association or association attempt.
    Disconnect,
    StartProvisioning,
    StopProvisioning,
    /// Add or refresh a provisioned credential in the store.
    RememberCredential(ReceivedCredentials),
    /// Drop a credential that exhausted its attempts.
    ForgetCredential(Ssid),
    /// Bump a credential's use count after a successful join.
    ReinforceCredential(Ssid),
    /// Write the store image.
    Persist,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Configuration --
    pub config: ManagerConfig,

    // -- Stored-credential search --
    /// Result of the latest scan, strongest first.
    pub candidates: heapless::Vec<ScanCandidate, MAX_SCANNED_AP>,
    /// Index into `candidates` of the network being tried.
    pub cursor: usize,
    pub attempt: Option<ConnectionAttempt>,

    // -- Provisioning --
    /// Credentials received but not yet confirmed by an attach.
    pub pending: Option<ReceivedCredentials>,

    // -- Link --
    /// SSID of the current association while `Connected`.
    pub connected_ssid: Option<Ssid>,

    // -- Output --
    pub actions: heapless::Vec<Action, MAX_ACTIONS>,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            candidates: heapless::Vec::new(),
            cursor: 0,
            attempt: None,
            pending: None,
            connected_ssid: None,
            actions: heapless::Vec::new(),
        }
    }

    /// Queue an action for the orchestrator.
    pub fn push(&mut self, action: Action) {
        if self.actions.push(action).is_err() {
            warn!("FSM: action queue full, action dropped");
        }
    }

    /// Attempts allowed per network, never below one.
    pub fn attempt_limit(&self) -> u8 {
        self.config.connect_attempts.max(1)
    }
}
