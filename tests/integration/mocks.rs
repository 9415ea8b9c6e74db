//! Mock adapters for integration tests.
//!
//! Each mock records every call so tests can assert on the full history
//! without touching flash or the radio.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use apjoin::app::events::AppEvent;
use apjoin::app::ports::{
    EventSink, MAX_SCANNED_AP, ProvisioningError, ProvisioningPort, RadioError, RadioPort,
    ScannedAp, StorageError, StoragePort,
};
use apjoin::credentials::{Bssid, Ssid};
use apjoin::fsm::StateId;

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
struct NvsState {
    blobs: RefCell<HashMap<(String, String), Vec<u8>>>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

/// Byte store whose clones share contents, so a test can "reboot" by
/// building a second store over a clone.
#[derive(Clone, Default)]
pub struct MockNvs {
    state: Rc<NvsState>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.set(fail);
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.state.writes.get()
    }

    pub fn raw(&self, ns: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .blobs
            .borrow()
            .get(&(ns.to_owned(), key.to_owned()))
            .cloned()
    }

    pub fn put_raw(&self, ns: &str, key: &str, data: &[u8]) {
        self.state
            .blobs
            .borrow_mut()
            .insert((ns.to_owned(), key.to_owned()), data.to_vec());
    }
}

impl StoragePort for MockNvs {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let blobs = self.state.blobs.borrow();
        let data = blobs
            .get(&(ns.to_owned(), key.to_owned()))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::InvalidSize);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.state.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        self.put_raw(ns, key, data);
        self.state.writes.set(self.state.writes.get() + 1);
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        if self.state.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        self.state
            .blobs
            .borrow_mut()
            .remove(&(ns.to_owned(), key.to_owned()))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.state
            .blobs
            .borrow()
            .contains_key(&(ns.to_owned(), key.to_owned()))
    }
}

// ── ScriptedRadio ─────────────────────────────────────────────

/// Radio whose scan result is fixed by the test.  Association outcomes are
/// injected by the test as bus events.
#[derive(Default)]
pub struct ScriptedRadio {
    pub started: bool,
    pub visible: Vec<ScannedAp>,
    pub connects: Vec<(String, Option<Bssid>)>,
    pub refuse_connects: bool,
    pub fail_scan: bool,
    pub disconnects: usize,
}

#[allow(dead_code)]
impl ScriptedRadio {
    pub fn with_visible(ssids: &[&str]) -> Self {
        Self {
            visible: ssids
                .iter()
                .enumerate()
                .map(|(i, s)| ap(s, [i as u8 + 1; 6], -40 - i as i8))
                .collect(),
            ..Default::default()
        }
    }

    pub fn connected_ssids(&self) -> Vec<&str> {
        self.connects.iter().map(|(s, _)| s.as_str()).collect()
    }
}

pub fn ap(ssid: &str, bssid: [u8; 6], rssi: i8) -> ScannedAp {
    ScannedAp {
        ssid: Ssid::try_from(ssid).unwrap(),
        bssid: Bssid(bssid),
        rssi,
        channel: 6,
    }
}

impl RadioPort for ScriptedRadio {
    fn start(&mut self) -> Result<(), RadioError> {
        self.started = true;
        Ok(())
    }

    fn scan(&mut self) -> Result<heapless::Vec<ScannedAp, MAX_SCANNED_AP>, RadioError> {
        if self.fail_scan {
            return Err(RadioError::ScanFailed);
        }
        Ok(self.visible.iter().take(MAX_SCANNED_AP).cloned().collect())
    }

    fn connect(
        &mut self,
        ssid: &str,
        _passphrase: &str,
        bssid: Option<Bssid>,
    ) -> Result<(), RadioError> {
        self.connects.push((ssid.to_owned(), bssid));
        if self.refuse_connects {
            return Err(RadioError::ConnectFailed);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

// ── MockProvisioner ───────────────────────────────────────────

#[derive(Default)]
pub struct MockProvisioner {
    pub active: bool,
    pub starts: usize,
    pub stops: usize,
    pub fail_start: bool,
}

impl ProvisioningPort for MockProvisioner {
    fn start(&mut self) -> Result<(), ProvisioningError> {
        if self.fail_start {
            return Err(ProvisioningError::StartFailed);
        }
        self.active = true;
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
        self.stops += 1;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    /// Every state entered, starting with the initial one.
    pub fn states(&self) -> Vec<StateId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Started(s) => Some(*s),
                AppEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
