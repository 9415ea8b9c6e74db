//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements        | Connects to               |
//! |---------------|-------------------|---------------------------|
//! | `log_sink`    | EventSink         | Serial log output         |
//! | `nvs`         | ConfigPort        | NVS / in-memory store     |
//! |               | StoragePort       |                           |
//! | `smartconfig` | ProvisioningPort  | ESP-Touch SmartConfig     |
//! | `wifi`        | RadioPort         | ESP-IDF WiFi STA          |

pub mod log_sink;
pub mod nvs;
pub mod smartconfig;
pub(super) mod utils;
pub mod wifi;
