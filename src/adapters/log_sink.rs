//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("START | initial_state={:?}", state),
            AppEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            AppEvent::Connected { ssid } => info!("LINK  | associated with '{}'", ssid),
            AppEvent::CredentialStored { ssid } => info!("CRED  | stored '{}'", ssid),
            AppEvent::CredentialEvicted { ssid } => info!("CRED  | evicted '{}'", ssid),
            AppEvent::CredentialForgotten { ssid } => info!("CRED  | forgot '{}'", ssid),
            AppEvent::PersistFailed(e) => warn!("CRED  | persist failed: {}", e),
        }
    }
}
