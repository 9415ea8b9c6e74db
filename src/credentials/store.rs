//! Bounded, persisted collection of learned credentials.
//!
//! The store holds at most `N` records with unique SSIDs.  When full, a new
//! SSID replaces the least-used record in place (lowest index on ties), so
//! frequently joined networks survive while one-off networks rotate out.
//!
//! Persistence is wholesale: [`CredentialStore::persist`] writes the entire
//! image (see [`super::image`]) under one key.  Mutations are in-memory
//! until persisted; the caller decides when a mutation must survive reboot.

use log::{debug, info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::StoreError;

use super::image;
use super::record::{Bssid, CredentialRecord, Ssid, passphrase_from_str, ssid_from_str};

/// Default store capacity.
pub const MAX_AP_COUNT: usize = 5;

/// Byte-store namespace holding the credential image.
pub const STORE_NAMESPACE: &str = "ap_storage";
/// Key of the credential image within [`STORE_NAMESPACE`].
pub const STORE_KEY: &str = "ap_records";

/// Outcome of [`CredentialStore::add_or_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// SSID was already known; passphrase refreshed, use count bumped.
    Updated,
    /// Appended into a free slot.
    Added,
    /// Store was full; the named least-used record was overwritten.
    Replaced { evicted: Ssid },
}

pub struct CredentialStore<S: StoragePort, const N: usize = MAX_AP_COUNT> {
    storage: S,
    records: heapless::Vec<CredentialRecord, N>,
    initialized: bool,
}

impl<S: StoragePort, const N: usize> CredentialStore<S, N> {
    const IMAGE_FITS: () = assert!(
        image::image_len(N) <= image::MAX_IMAGE_LEN,
        "store capacity exceeds image::MAX_STORE_CAPACITY"
    );

    /// Uninitialized store.  Call [`init`](Self::init) before anything else.
    pub fn new(storage: S) -> Self {
        let () = Self::IMAGE_FITS;
        Self {
            storage,
            records: heapless::Vec::new(),
            initialized: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Mark the store usable and load the persisted image.
    ///
    /// An absent or corrupt image leaves the store empty and returns
    /// [`StoreError::NotFound`]; callers treat that as a first boot.
    /// Other storage failures also leave the store empty but are propagated
    /// unchanged.  Calling `init` again is a no-op.
    pub fn init(&mut self) -> Result<(), StoreError> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        match self.load() {
            Err(StoreError::InvalidSize) => Err(StoreError::NotFound),
            other => other,
        }
    }

    /// Re-read the persisted image, replacing the in-memory contents.
    ///
    /// Absent → [`StoreError::NotFound`]; corrupt → [`StoreError::InvalidSize`].
    /// Either way the store is left empty.
    pub fn load(&mut self) -> Result<(), StoreError> {
        self.ensure_init()?;

        let mut buf = Self::scratch();
        let result = match self.storage.read(STORE_NAMESPACE, STORE_KEY, &mut buf) {
            Ok(len) => image::decode::<N>(&buf[..len]),
            Err(StorageError::NotFound) => Err(StoreError::NotFound),
            Err(StorageError::InvalidSize) => Err(StoreError::InvalidSize),
            Err(e) => Err(StoreError::Storage(e)),
        };

        match result {
            Ok(records) => {
                info!("CredentialStore: loaded {} record(s)", records.len());
                self.records = records;
                Ok(())
            }
            Err(e) => {
                self.records.clear();
                match e {
                    StoreError::NotFound => info!("CredentialStore: no persisted image"),
                    StoreError::InvalidSize => {
                        warn!("CredentialStore: persisted image corrupt, starting empty");
                    }
                    other => warn!("CredentialStore: load failed: {}", other),
                }
                Err(e)
            }
        }
    }

    /// Write the whole image.  One attempt; the error is returned as-is.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        self.ensure_init()?;
        let mut buf = Self::scratch();
        image::encode(&self.records, &mut buf)?;
        self.storage.write(STORE_NAMESPACE, STORE_KEY, &buf)?;
        debug!("CredentialStore: persisted {} record(s)", self.records.len());
        Ok(())
    }

    /// Zeroed buffer of exactly `image_len(N)` bytes.
    fn scratch() -> image::ImageBuf {
        let mut buf = image::ImageBuf::new();
        // Length is bounded by IMAGE_FITS.
        let _ = buf.resize(image::image_len(N), 0);
        buf
    }

    /// Delete the persisted image and clear memory.
    pub fn erase(&mut self) -> Result<(), StoreError> {
        self.ensure_init()?;
        self.records.clear();
        match self.storage.delete(STORE_NAMESPACE, STORE_KEY) {
            Ok(()) | Err(StorageError::NotFound) => {
                info!("CredentialStore: erased");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Mutation ──────────────────────────────────────────────

    /// Insert or refresh a credential.
    ///
    /// A known SSID gets the new passphrase, the new BSSID if one is given,
    /// and `use_count + 1`.  An unknown SSID is appended with `use_count = 1`,
    /// or, when full, overwrites the least-used record.
    pub fn add_or_update(
        &mut self,
        ssid: &str,
        passphrase: &str,
        bssid: Option<Bssid>,
    ) -> Result<Upsert, StoreError> {
        self.ensure_init()?;
        let ssid = ssid_from_str(ssid)?;
        let passphrase = passphrase_from_str(passphrase)?;
        let bssid = bssid.filter(|b| !b.is_zero());

        if let Some(rec) = self.records.iter_mut().find(|r| r.ssid == ssid) {
            rec.passphrase = passphrase;
            if bssid.is_some() {
                rec.bssid = bssid;
            }
            rec.use_count = rec.use_count.saturating_add(1);
            debug!("CredentialStore: updated '{}' (uses={})", rec.ssid, rec.use_count);
            return Ok(Upsert::Updated);
        }

        let fresh = CredentialRecord {
            ssid,
            passphrase,
            bssid,
            use_count: 1,
        };

        match self.records.push(fresh) {
            Ok(()) => {
                debug!("CredentialStore: added record {}", self.records.len() - 1);
                Ok(Upsert::Added)
            }
            Err(fresh) => {
                let victim = self.least_used().ok_or(StoreError::InvalidState)?;
                let evicted = core::mem::replace(&mut self.records[victim], fresh).ssid;
                info!(
                    "CredentialStore: full, replaced '{}' at index {}",
                    evicted, victim
                );
                Ok(Upsert::Replaced { evicted })
            }
        }
    }

    /// Saturating `use_count + 1`.  Returns the new count.
    pub fn increment_use_count(&mut self, ssid: &str) -> Result<u8, StoreError> {
        self.ensure_init()?;
        let rec = self
            .records
            .iter_mut()
            .find(|r| r.ssid.as_str() == ssid)
            .ok_or(StoreError::NotFound)?;
        rec.use_count = rec.use_count.saturating_add(1);
        Ok(rec.use_count)
    }

    pub fn remove_by_ssid(&mut self, ssid: &str) -> Result<CredentialRecord, StoreError> {
        let (index, _) = self.find_by_ssid(ssid)?;
        self.remove_at(index)
    }

    /// Remove by index; later records shift down, order preserved.
    pub fn remove_at(&mut self, index: usize) -> Result<CredentialRecord, StoreError> {
        self.ensure_init()?;
        if index >= self.records.len() {
            return Err(StoreError::InvalidArgument);
        }
        let removed = self.records.remove(index);
        debug!("CredentialStore: removed '{}'", removed.ssid);
        Ok(removed)
    }

    /// Empty the in-memory store.  Persist separately.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.ensure_init()?;
        self.records.clear();
        Ok(())
    }

    /// Replace the whole collection after validating it.
    pub fn replace_all(&mut self, records: &[CredentialRecord]) -> Result<(), StoreError> {
        self.ensure_init()?;
        if records.len() > N {
            return Err(StoreError::InvalidArgument);
        }
        for (i, rec) in records.iter().enumerate() {
            ssid_from_str(&rec.ssid)?;
            passphrase_from_str(&rec.passphrase)?;
            if records[..i].iter().any(|r| r.ssid == rec.ssid) {
                return Err(StoreError::InvalidArgument);
            }
        }
        self.records.clear();
        for rec in records {
            let mut rec = rec.clone();
            rec.bssid = rec.bssid.filter(|b| !b.is_zero());
            self.records
                .push(rec)
                .map_err(|_| StoreError::InvalidArgument)?;
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn find_by_ssid(&self, ssid: &str) -> Result<(usize, &CredentialRecord), StoreError> {
        self.ensure_init()?;
        self.records
            .iter()
            .enumerate()
            .find(|(_, r)| r.ssid.as_str() == ssid)
            .ok_or(StoreError::NotFound)
    }

    pub fn find_by_bssid(&self, bssid: &Bssid) -> Result<(usize, &CredentialRecord), StoreError> {
        self.ensure_init()?;
        self.records
            .iter()
            .enumerate()
            .find(|(_, r)| r.bssid.as_ref() == Some(bssid))
            .ok_or(StoreError::NotFound)
    }

    pub fn get(&self, index: usize) -> Result<&CredentialRecord, StoreError> {
        self.ensure_init()?;
        self.records.get(index).ok_or(StoreError::InvalidArgument)
    }

    /// Records ordered by descending `use_count`, ties in storage order.
    /// Storage order itself is untouched.
    pub fn sort_by_usage(&self) -> Result<heapless::Vec<&CredentialRecord, N>, StoreError> {
        self.ensure_init()?;
        let mut view: heapless::Vec<&CredentialRecord, N> = self.records.iter().collect();
        view.sort_by(|a, b| b.use_count.cmp(&a.use_count));
        Ok(view)
    }

    /// Debug dump of every record.  Passphrases are never printed.
    pub fn log_all(&self) {
        info!(
            "CredentialStore: {}/{} record(s)",
            self.records.len(),
            N
        );
        for (i, r) in self.records.iter().enumerate() {
            match r.bssid {
                Some(b) => debug!("  [{}] ssid='{}' bssid={} uses={}", i, r.ssid, b, r.use_count),
                None => debug!("  [{}] ssid='{}' uses={}", i, r.ssid, r.use_count),
            }
        }
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The backing byte-store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ── Internal ──────────────────────────────────────────────

    fn ensure_init(&self) -> Result<(), StoreError> {
        if self.initialized {
            Ok(())
        } else {
            Err(StoreError::InvalidState)
        }
    }

    /// Index of the globally minimal `use_count`, first on ties.
    fn least_used(&self) -> Option<usize> {
        self.records
            .iter()
            .enumerate()
            .min_by_key(|(i, r)| (r.use_count, *i))
            .map(|(i, _)| i)
    }
}
