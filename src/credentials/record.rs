//! Validated credential value types.
//!
//! Every field is length-checked on construction and never truncated.
//! An SSID is 1–32 bytes, a passphrase 0–64 bytes, and neither may contain
//! an interior NUL (the persisted slot layout is NUL-padded).

use core::fmt;

use crate::error::StoreError;

/// Maximum SSID length in bytes (802.11).
pub const SSID_MAX_LEN: usize = 32;
/// Maximum WPA passphrase / PSK length in bytes.
pub const PASSPHRASE_MAX_LEN: usize = 64;

pub type Ssid = heapless::String<SSID_MAX_LEN>;
pub type Passphrase = heapless::String<PASSPHRASE_MAX_LEN>;

// ---------------------------------------------------------------------------
// BSSID
// ---------------------------------------------------------------------------

/// 6-byte hardware address of an access point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bssid(pub [u8; 6]);

impl Bssid {
    pub const ZERO: Self = Self([0; 6]);

    /// All-zero is the persisted encoding of "no BSSID".
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for Bssid {
    fn from(b: [u8; 6]) -> Self {
        Self(b)
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bssid({self})")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and copy an SSID.
pub fn ssid_from_str(s: &str) -> Result<Ssid, StoreError> {
    if s.is_empty() || s.len() > SSID_MAX_LEN || s.as_bytes().contains(&0) {
        return Err(StoreError::InvalidArgument);
    }
    Ssid::try_from(s).map_err(|()| StoreError::InvalidArgument)
}

/// Validate and copy a passphrase.  Empty is allowed (open networks).
pub fn passphrase_from_str(s: &str) -> Result<Passphrase, StoreError> {
    if s.len() > PASSPHRASE_MAX_LEN || s.as_bytes().contains(&0) {
        return Err(StoreError::InvalidArgument);
    }
    Passphrase::try_from(s).map_err(|()| StoreError::InvalidArgument)
}

// ---------------------------------------------------------------------------
// CredentialRecord
// ---------------------------------------------------------------------------

/// One remembered network.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    pub bssid: Option<Bssid>,
    /// How many times this network has been joined or re-learned.  Saturates.
    pub use_count: u8,
}

impl CredentialRecord {
    /// Build a fresh record with `use_count = 1`.
    pub fn new(ssid: &str, passphrase: &str, bssid: Option<Bssid>) -> Result<Self, StoreError> {
        Ok(Self {
            ssid: ssid_from_str(ssid)?,
            passphrase: passphrase_from_str(passphrase)?,
            bssid: bssid.filter(|b| !b.is_zero()),
            use_count: 1,
        })
    }
}

// Passphrases must never reach the log.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("ssid", &self.ssid.as_str())
            .field("passphrase", &"<redacted>")
            .field("bssid", &self.bssid)
            .field("use_count", &self.use_count)
            .finish()
    }
}
