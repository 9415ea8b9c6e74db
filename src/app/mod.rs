//! Application core: connection logic, zero direct I/O.
//!
//! This module contains the orchestration rules for joining a network:
//! driving the FSM, executing its actions against the credential store,
//! and reporting what happened.  All interaction with the radio, the
//! provisioning service and flash happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
