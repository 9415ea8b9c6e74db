//! Learned WiFi credentials: value types, persisted image codec, and the
//! bounded store with usage-based eviction.

pub mod image;
pub mod record;
pub mod store;

pub use record::{Bssid, CredentialRecord, PASSPHRASE_MAX_LEN, Passphrase, SSID_MAX_LEN, Ssid};
pub use store::{CredentialStore, MAX_AP_COUNT, STORE_KEY, STORE_NAMESPACE, Upsert};
