//! Unified error types for the connection manager.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! entry point's error handling uniform. All variants are `Copy` so they
//! can travel through outbound [`AppEvent`](crate::app::events::AppEvent)s
//! without allocation.

use core::fmt;

use crate::app::ports::{ConfigError, ProvisioningError, RadioError, StorageError};

// ---------------------------------------------------------------------------
// Credential store errors
// ---------------------------------------------------------------------------

/// Errors returned by [`CredentialStore`](crate::credentials::CredentialStore)
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Operation attempted before `init()`.
    InvalidState,
    /// Empty, oversized or malformed input.  Nothing was mutated.
    InvalidArgument,
    /// Persisted image has the wrong size or fails bounds checks.
    InvalidSize,
    /// Lookup miss, or no persisted image.  An absence, not a fault.
    NotFound,
    /// The byte-store rejected the operation.  Propagated unchanged.
    Storage(StorageError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState => write!(f, "credential store not initialised"),
            Self::InvalidArgument => write!(f, "invalid credential argument"),
            Self::InvalidSize => write!(f, "persisted credential image has invalid size"),
            Self::NotFound => write!(f, "credential not found"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Credential store operation failed.
    Store(StoreError),
    /// Radio collaborator failed.
    Radio(RadioError),
    /// Provisioning collaborator failed.
    Provisioning(ProvisioningError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Provisioning(e) => write!(f, "provisioning: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
