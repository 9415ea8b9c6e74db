//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.  This is the classic embedded C FSM pattern expressed
//! in safe Rust.
//!
//! ```text
//!  IDLE ──[interface up]──▶ TRYING_STORED ──[attach]──▶ CONNECTED
//!    ▲                          │   ▲                     │   │
//!    │                [nothing left] └──[link lost, auto]──┘   │
//!    │                          ▼                             │
//!    │                    PROVISIONING ──[creds + attach]──▶──┘
//!    │                                                        │
//!    └──────────────────[link lost, no auto-reconnect]────────┘
//! ```

use super::context::{Action, ConnectionAttempt, FsmContext};
use super::{Input, StateDescriptor, StateId};
use crate::config::PersistPolicy;
use crate::credentials::Ssid;
use crate::events::NetEvent;
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_input: idle_input,
        },
        // Index 1: TryingStored
        StateDescriptor {
            id: StateId::TryingStored,
            name: "TryingStored",
            on_enter: Some(trying_enter),
            on_exit: Some(trying_exit),
            on_input: trying_input,
        },
        // Index 2: Provisioning
        StateDescriptor {
            id: StateId::Provisioning,
            name: "Provisioning",
            on_enter: Some(provisioning_enter),
            on_exit: Some(provisioning_exit),
            on_input: provisioning_input,
        },
        // Index 3: Connected
        StateDescriptor {
            id: StateId::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_exit: Some(connected_exit),
            on_input: connected_input,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state: waiting for the station interface
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.attempt = None;
    ctx.pending = None;
    ctx.candidates.clear();
    info!("IDLE: waiting for interface start");
}

fn idle_input(_ctx: &mut FsmContext, input: &Input) -> Option<StateId> {
    match input {
        Input::Net(NetEvent::InterfaceStarted) => Some(StateId::TryingStored),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRYING_STORED state: walking the scan list with remembered credentials
// ═══════════════════════════════════════════════════════════════════════════

fn trying_enter(ctx: &mut FsmContext) {
    ctx.candidates.clear();
    ctx.cursor = 0;
    ctx.attempt = None;
    ctx.push(Action::Scan);
    info!("TRYING_STORED: scanning");
}

fn trying_exit(ctx: &mut FsmContext) {
    ctx.attempt = None;
    ctx.candidates.clear();
}

fn trying_input(ctx: &mut FsmContext, input: &Input) -> Option<StateId> {
    match input {
        Input::ScanCompleted(list) => {
            ctx.candidates = list.clone();
            ctx.cursor = 0;
            info!("TRYING_STORED: {} network(s) visible", list.len());
            try_next_candidate(ctx)
        }
        Input::Net(NetEvent::AttachConfirmed) => {
            let attempt = ctx.attempt.take()?;
            info!(
                "TRYING_STORED: joined '{}' on attempt {}",
                attempt.ssid, attempt.attempt
            );
            ctx.push(Action::ReinforceCredential(attempt.ssid.clone()));
            if ctx.config.reconnect_persist == PersistPolicy::Immediate {
                ctx.push(Action::Persist);
            }
            ctx.connected_ssid = Some(attempt.ssid);
            Some(StateId::Connected)
        }
        Input::Net(NetEvent::LinkLost) | Input::ConnectFailed => {
            if ctx.attempt.is_none() {
                debug!("TRYING_STORED: failure with no attempt in flight, ignored");
                return None;
            }
            retry_or_advance(ctx)
        }
        Input::Forgotten(which) => drop_forgotten(ctx, which.as_ref()),
        Input::Net(NetEvent::InterfaceStarted | NetEvent::CredentialsReceived(_)) => None,
    }
}

/// Discard cached passphrases for credentials that left the store.  An
/// attempt in flight on one of them is abandoned for the next candidate.
fn drop_forgotten(ctx: &mut FsmContext, ssid: Option<&Ssid>) -> Option<StateId> {
    let is_gone = |other: &Ssid| ssid.is_none_or(|s| s == other);

    for candidate in ctx.candidates.iter_mut().skip(ctx.cursor) {
        if is_gone(&candidate.ap.ssid) {
            candidate.stored = None;
        }
    }

    let abandoned = ctx.attempt.take_if(|a| is_gone(&a.ssid))?;
    info!("TRYING_STORED: '{}' forgotten mid-attempt", abandoned.ssid);
    ctx.cursor += 1;
    let next = try_next_candidate(ctx);
    if next.is_some() {
        ctx.push(Action::Disconnect);
    }
    next
}

/// Start the first attempt on the next candidate with a stored credential,
/// or give up on the scan list.
fn try_next_candidate(ctx: &mut FsmContext) -> Option<StateId> {
    while let Some(candidate) = ctx.candidates.get(ctx.cursor) {
        if let Some(passphrase) = &candidate.stored {
            let attempt = ConnectionAttempt {
                ssid: candidate.ap.ssid.clone(),
                passphrase: passphrase.clone(),
                bssid: Some(candidate.ap.bssid),
                attempt: 1,
            };
            push_connect(ctx, &attempt);
            ctx.attempt = Some(attempt);
            return None;
        }
        debug!("TRYING_STORED: '{}' not stored, skipping", candidate.ap.ssid);
        ctx.cursor += 1;
    }

    info!("TRYING_STORED: no stored network reachable, provisioning");
    Some(StateId::Provisioning)
}

fn retry_or_advance(ctx: &mut FsmContext) -> Option<StateId> {
    let limit = ctx.attempt_limit();
    let mut attempt = ctx.attempt.take()?;

    if attempt.attempt < limit {
        attempt.attempt += 1;
        debug!(
            "TRYING_STORED: retrying '{}' ({}/{})",
            attempt.ssid, attempt.attempt, limit
        );
        push_connect(ctx, &attempt);
        ctx.attempt = Some(attempt);
        return None;
    }

    warn!(
        "TRYING_STORED: '{}' failed {} times, forgetting it",
        attempt.ssid, limit
    );
    ctx.push(Action::ForgetCredential(attempt.ssid.clone()));
    ctx.push(Action::Persist);
    for later in ctx.candidates.iter_mut().skip(ctx.cursor + 1) {
        if later.ap.ssid == attempt.ssid {
            later.stored = None;
        }
    }
    ctx.cursor += 1;
    try_next_candidate(ctx)
}

fn push_connect(ctx: &mut FsmContext, attempt: &ConnectionAttempt) {
    ctx.push(Action::Connect {
        ssid: attempt.ssid.clone(),
        passphrase: attempt.passphrase.clone(),
        bssid: attempt.bssid,
    });
}

// ═══════════════════════════════════════════════════════════════════════════
//  PROVISIONING state: waiting for credentials over the air
// ═══════════════════════════════════════════════════════════════════════════

fn provisioning_enter(ctx: &mut FsmContext) {
    ctx.pending = None;
    ctx.push(Action::StartProvisioning);
    info!("PROVISIONING: waiting for credentials");
}

fn provisioning_exit(ctx: &mut FsmContext) {
    ctx.pending = None;
    ctx.push(Action::StopProvisioning);
}

fn provisioning_input(ctx: &mut FsmContext, input: &Input) -> Option<StateId> {
    match input {
        Input::Net(NetEvent::CredentialsReceived(creds)) => {
            info!("PROVISIONING: received credentials for '{}'", creds.ssid);
            ctx.push(Action::Connect {
                ssid: creds.ssid.clone(),
                passphrase: creds.passphrase.clone(),
                bssid: creds.bssid,
            });
            ctx.pending = Some(creds.clone());
            None
        }
        Input::Net(NetEvent::AttachConfirmed) => {
            let creds = ctx.pending.take()?;
            info!("PROVISIONING: joined '{}', remembering it", creds.ssid);
            ctx.connected_ssid = Some(creds.ssid.clone());
            ctx.push(Action::RememberCredential(creds));
            ctx.push(Action::Persist);
            Some(StateId::Connected)
        }
        Input::Net(NetEvent::LinkLost) | Input::ConnectFailed => {
            warn!("PROVISIONING: join failed, restarting session");
            ctx.pending = None;
            ctx.push(Action::StopProvisioning);
            ctx.push(Action::StartProvisioning);
            None
        }
        Input::Net(NetEvent::InterfaceStarted) | Input::ScanCompleted(_) | Input::Forgotten(_) => {
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTED state: associated, watching for link loss
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut FsmContext) {
    match &ctx.connected_ssid {
        Some(ssid) => info!("CONNECTED: associated with '{}'", ssid),
        None => info!("CONNECTED"),
    }
}

fn connected_exit(ctx: &mut FsmContext) {
    ctx.connected_ssid = None;
}

fn connected_input(ctx: &mut FsmContext, input: &Input) -> Option<StateId> {
    match input {
        Input::Net(NetEvent::LinkLost) => {
            if ctx.config.auto_reconnect {
                info!("CONNECTED: link lost, searching stored networks");
                Some(StateId::TryingStored)
            } else {
                info!("CONNECTED: link lost, auto-reconnect disabled");
                Some(StateId::Idle)
            }
        }
        _ => None,
    }
}
