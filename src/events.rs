//! Network event bus.
//!
//! Events are produced by:
//! - the WiFi driver's event callbacks (interface up, got IP, disconnected)
//! - the provisioning service's callbacks (credentials received, session lost)
//! - the host simulations standing in for both
//!
//! Events are consumed by the orchestrator loop, which handles them one at
//! a time in arrival order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ WiFi driver │────▶│              │     │              │
//! │ SmartConfig │────▶│  Event Queue │────▶│ Orchestrator │
//! │ Simulation  │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The queue is an `embassy-sync` channel guarded by a critical section, so
//! producers may raise from any task.  Raising never blocks: when the queue
//! is full the event is dropped with a warning.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};
use log::warn;

use crate::credentials::{Bssid, Passphrase, Ssid};

/// Maximum number of pending events.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Credentials delivered by the provisioning service.
#[derive(Clone, PartialEq, Eq)]
pub struct ReceivedCredentials {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    pub bssid: Option<Bssid>,
}

impl core::fmt::Debug for ReceivedCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReceivedCredentials")
            .field("ssid", &self.ssid.as_str())
            .field("bssid", &self.bssid)
            .finish_non_exhaustive()
    }
}

/// Asynchronous signals from the network and provisioning collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// Station interface is up and ready to scan.
    InterfaceStarted,
    /// Association completed and an address was obtained.
    AttachConfirmed,
    /// Association failed or an established link dropped.  Also raised
    /// when a provisioning session fails.
    LinkLost,
    /// Provisioning delivered new credentials.
    CredentialsReceived(ReceivedCredentials),
}

type EventChannel = Channel<CriticalSectionRawMutex, NetEvent, EVENT_QUEUE_DEPTH>;

/// Single-consumer queue of [`NetEvent`]s.
pub struct EventBus {
    channel: EventChannel,
}

impl EventBus {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Producer handle.  Cheap to copy into callbacks.
    pub fn publisher(&self) -> EventPublisher<'_> {
        EventPublisher {
            sender: self.channel.sender(),
        }
    }

    /// Pop the next event without waiting.
    pub fn try_next(&self) -> Option<NetEvent> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next event.
    pub async fn next(&self) -> NetEvent {
        self.channel.receive().await
    }

    /// Block the calling task until an event arrives.
    pub fn next_blocking(&self) -> NetEvent {
        futures_lite::future::block_on(self.next())
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the [`EventBus`].
#[derive(Clone, Copy)]
pub struct EventPublisher<'a> {
    sender: Sender<'a, CriticalSectionRawMutex, NetEvent, EVENT_QUEUE_DEPTH>,
}

impl EventPublisher<'_> {
    /// Enqueue without blocking.  Returns `false` if the event was dropped.
    pub fn raise(&self, event: NetEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("EventBus: queue full, event dropped");
                false
            }
        }
    }
}
