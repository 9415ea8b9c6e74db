//! Outbound application events.
//!
//! The [`ConnectionOrchestrator`](super::service::ConnectionOrchestrator)
//! emits these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them: log to serial,
//! light a status LED, notify the application, etc.

use crate::credentials::Ssid;
use crate::error::StoreError;
use crate::fsm::StateId;

/// Structured events emitted by the connection core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The orchestrator has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// Association confirmed and an address obtained.
    Connected { ssid: Ssid },

    /// A provisioned credential was written to the store.
    CredentialStored { ssid: Ssid },

    /// The store was full and this credential made room for a new one.
    CredentialEvicted { ssid: Ssid },

    /// A credential was removed, by exhaustion or by command.
    CredentialForgotten { ssid: Ssid },

    /// Writing the store image failed.  Memory stays authoritative.
    PersistFailed(StoreError),
}
