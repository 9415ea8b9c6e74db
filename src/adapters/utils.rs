//! Shared utilities for adapter-layer validation.
//!
//! Raw credential bytes reach the adapters from driver callbacks as
//! fixed-size, NUL-padded C buffers.  These helpers turn them into checked
//! `&str`s and are used by both the WiFi and the SmartConfig adapters.

use crate::app::ports::ProvisioningError;

/// Strip trailing NUL padding from a driver buffer.
pub(super) fn trim_nul(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// Decode a NUL-padded field, rejecting oversized or non-UTF-8 content.
pub(super) fn sanitize_field(raw: &[u8], max_len: usize) -> Result<&str, ProvisioningError> {
    let raw = trim_nul(raw);
    if raw.len() > max_len {
        return Err(ProvisioningError::DataTooLong);
    }
    core::str::from_utf8(raw).map_err(|_| ProvisioningError::InvalidUtf8)
}

/// Returns `true` if `s` contains an ASCII control character.
pub(super) fn has_control_chars(s: &str) -> bool {
    s.bytes().any(|b| b < 0x20 || b == 0x7F)
}
