//! Persisted image codec.
//!
//! The store serializes wholesale into one fixed-size blob:
//!
//! ```text
//! ┌──────────────┬────────────────┬──────────┬───────────┐
//! │ ssid[33]     │ passphrase[65] │ bssid[6] │ use_count │  × N slots
//! └──────────────┴────────────────┴──────────┴───────────┘
//! ┌───────┐
//! │ count │  1 byte, number of occupied slots
//! └───────┘
//! ```
//!
//! Strings are NUL-padded; a field with no terminating NUL is malformed.
//! Unused slots are zero-filled so the image is deterministic for a given
//! store contents.  Any length other than `N * SLOT_LEN + 1` is treated as
//! corruption, which is how a capacity change between firmware builds is
//! detected.

use crate::error::StoreError;

use super::record::{
    Bssid, CredentialRecord, PASSPHRASE_MAX_LEN, SSID_MAX_LEN, passphrase_from_str, ssid_from_str,
};

const SSID_FIELD: usize = SSID_MAX_LEN + 1;
const PASS_FIELD: usize = PASSPHRASE_MAX_LEN + 1;
const BSSID_FIELD: usize = 6;

const SSID_OFF: usize = 0;
const PASS_OFF: usize = SSID_OFF + SSID_FIELD;
const BSSID_OFF: usize = PASS_OFF + PASS_FIELD;
const COUNT_OFF: usize = BSSID_OFF + BSSID_FIELD;

/// Bytes per record slot.
pub const SLOT_LEN: usize = COUNT_OFF + 1;

/// Total image length for a store of capacity `n`.
pub const fn image_len(n: usize) -> usize {
    n * SLOT_LEN + 1
}

/// Largest store capacity whose image fits [`ImageBuf`].
pub const MAX_STORE_CAPACITY: usize = 8;

/// Upper bound on any image this crate reads or writes.
pub const MAX_IMAGE_LEN: usize = image_len(MAX_STORE_CAPACITY);

/// Stack scratch buffer for one image.
pub type ImageBuf = heapless::Vec<u8, MAX_IMAGE_LEN>;

/// Encode `records` into `buf`, which must be exactly `image_len(N)` long.
pub fn encode(records: &[CredentialRecord], buf: &mut [u8]) -> Result<(), StoreError> {
    let capacity = (buf.len().saturating_sub(1)) / SLOT_LEN;
    if buf.len() != image_len(capacity) || records.len() > capacity || capacity > u8::MAX as usize
    {
        return Err(StoreError::InvalidSize);
    }

    buf.fill(0);
    for (slot, rec) in buf.chunks_exact_mut(SLOT_LEN).zip(records) {
        let ssid = rec.ssid.as_bytes();
        slot[SSID_OFF..SSID_OFF + ssid.len()].copy_from_slice(ssid);
        let pass = rec.passphrase.as_bytes();
        slot[PASS_OFF..PASS_OFF + pass.len()].copy_from_slice(pass);
        if let Some(b) = rec.bssid {
            slot[BSSID_OFF..COUNT_OFF].copy_from_slice(b.as_bytes());
        }
        slot[COUNT_OFF] = rec.use_count;
    }
    buf[capacity * SLOT_LEN] = records.len() as u8;
    Ok(())
}

/// Decode an image for a store of capacity `N`.
///
/// Rejects with [`StoreError::InvalidSize`] on a length mismatch, a count
/// above `N`, a malformed occupied slot, or a duplicate SSID.
pub fn decode<const N: usize>(
    buf: &[u8],
) -> Result<heapless::Vec<CredentialRecord, N>, StoreError> {
    if buf.len() != image_len(N) {
        return Err(StoreError::InvalidSize);
    }
    let count = buf[N * SLOT_LEN] as usize;
    if count > N {
        return Err(StoreError::InvalidSize);
    }

    let mut out = heapless::Vec::new();
    for slot in buf.chunks_exact(SLOT_LEN).take(count) {
        let rec = decode_slot(slot)?;
        if out.iter().any(|r: &CredentialRecord| r.ssid == rec.ssid) {
            return Err(StoreError::InvalidSize);
        }
        out.push(rec).map_err(|_| StoreError::InvalidSize)?;
    }
    Ok(out)
}

fn decode_slot(slot: &[u8]) -> Result<CredentialRecord, StoreError> {
    let ssid = nul_terminated(&slot[SSID_OFF..PASS_OFF])?;
    let pass = nul_terminated(&slot[PASS_OFF..BSSID_OFF])?;

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&slot[BSSID_OFF..COUNT_OFF]);
    let bssid = Bssid(mac);

    Ok(CredentialRecord {
        ssid: ssid_from_str(ssid).map_err(|_| StoreError::InvalidSize)?,
        passphrase: passphrase_from_str(pass).map_err(|_| StoreError::InvalidSize)?,
        bssid: (!bssid.is_zero()).then_some(bssid),
        use_count: slot[COUNT_OFF],
    })
}

fn nul_terminated(field: &[u8]) -> Result<&str, StoreError> {
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or(StoreError::InvalidSize)?;
    core::str::from_utf8(&field[..end]).map_err(|_| StoreError::InvalidSize)
}
