//! Orchestrator scenarios against scripted collaborators.
//!
//! Association outcomes are injected with `handle_event`, exactly as the
//! bus would deliver them.

use apjoin::app::commands::{AppCommand, CommandQueue};
use apjoin::app::events::AppEvent;
use apjoin::app::service::ConnectionOrchestrator;
use apjoin::config::{ManagerConfig, PersistPolicy};
use apjoin::credentials::{Bssid, CredentialStore, Ssid};
use apjoin::events::{EventBus, NetEvent, ReceivedCredentials};
use apjoin::fsm::StateId;

use crate::mocks::{MockNvs, MockProvisioner, RecordingSink, ScriptedRadio, ap};

type Orchestrator = ConnectionOrchestrator<MockNvs, ScriptedRadio, MockProvisioner, RecordingSink>;

fn seeded_store(nvs: &MockNvs, entries: &[(&str, &str)]) -> CredentialStore<MockNvs> {
    let mut store = CredentialStore::new(nvs.clone());
    let _ = store.init();
    for (ssid, pass) in entries {
        store.add_or_update(ssid, pass, None).unwrap();
    }
    store.persist().unwrap();
    store
}

fn boot(
    nvs: &MockNvs,
    entries: &[(&str, &str)],
    radio: ScriptedRadio,
    config: ManagerConfig,
) -> Orchestrator {
    let mut o = ConnectionOrchestrator::new(
        seeded_store(nvs, entries),
        radio,
        MockProvisioner::default(),
        RecordingSink::default(),
        config,
    );
    o.start().unwrap();
    o.handle_event(NetEvent::InterfaceStarted);
    o
}

/// Reload the persisted image into a fresh store.
fn reboot(nvs: &MockNvs) -> CredentialStore<MockNvs> {
    let mut store = CredentialStore::new(nvs.clone());
    let _ = store.init();
    store
}

fn creds(ssid: &str, pass: &str) -> NetEvent {
    NetEvent::CredentialsReceived(ReceivedCredentials {
        ssid: Ssid::try_from(ssid).unwrap(),
        passphrase: pass.try_into().unwrap(),
        bssid: None,
    })
}

fn ssid(s: &str) -> Ssid {
    Ssid::try_from(s).unwrap()
}

// ── Stored-network search ─────────────────────────────────────

#[test]
fn empty_store_goes_to_provisioning() {
    let nvs = MockNvs::new();
    let o = boot(
        &nvs,
        &[],
        ScriptedRadio::with_visible(&["Home", "Office"]),
        ManagerConfig::default(),
    );

    assert_eq!(
        o.sink().states(),
        vec![StateId::Idle, StateId::TryingStored, StateId::Provisioning]
    );
    assert!(o.radio().connects.is_empty());
    assert_eq!(o.provisioner().starts, 1);
}

#[test]
fn stored_network_joins_and_persists_reinforcement() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "pw1")],
        ScriptedRadio::with_visible(&["Home"]),
        ManagerConfig::default(),
    );
    assert_eq!(o.radio().connected_ssids(), vec!["Home"]);
    // The live scan BSSID pins the attempt.
    assert_eq!(o.radio().connects[0].1, Some(Bssid([1; 6])));

    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.sink().count(|e| *e == AppEvent::Connected { ssid: ssid("Home") }), 1);

    let stored = reboot(&nvs);
    assert_eq!(stored.find_by_ssid("Home").unwrap().1.use_count, 2);
}

#[test]
fn deferred_policy_keeps_reinforcement_in_memory() {
    let nvs = MockNvs::new();
    let config = ManagerConfig {
        reconnect_persist: PersistPolicy::Deferred,
        ..Default::default()
    };
    let mut o = boot(&nvs, &[("Home", "pw1")], ScriptedRadio::with_visible(&["Home"]), config);
    let writes = nvs.writes();

    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(nvs.writes(), writes);
    assert_eq!(o.store().find_by_ssid("Home").unwrap().1.use_count, 2);
    assert_eq!(reboot(&nvs).find_by_ssid("Home").unwrap().1.use_count, 1);
}

#[test]
fn stale_credential_is_forgotten_after_three_failures() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "stale")],
        ScriptedRadio::with_visible(&["Home"]),
        ManagerConfig::default(),
    );

    for _ in 0..3 {
        assert_eq!(o.state(), StateId::TryingStored);
        o.handle_event(NetEvent::LinkLost);
    }

    assert_eq!(o.radio().connects.len(), 3);
    assert_eq!(o.state(), StateId::Provisioning);
    assert!(o.store().is_empty());
    assert!(reboot(&nvs).is_empty());
    assert_eq!(
        o.sink().count(|e| *e == AppEvent::CredentialForgotten { ssid: ssid("Home") }),
        1
    );
}

#[test]
fn exhausted_network_falls_through_to_next_stored() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "stale"), ("Office", "pw2")],
        ScriptedRadio::with_visible(&["Home", "Office"]),
        ManagerConfig::default(),
    );

    for _ in 0..3 {
        o.handle_event(NetEvent::LinkLost);
    }
    assert_eq!(o.state(), StateId::TryingStored);
    assert_eq!(
        o.radio().connected_ssids(),
        vec!["Home", "Home", "Home", "Office"]
    );

    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Connected);
    assert!(o.store().find_by_ssid("Home").is_err());
    assert_eq!(o.store().find_by_ssid("Office").unwrap().1.use_count, 2);
}

#[test]
fn forgotten_ssid_is_skipped_on_other_access_points() {
    let nvs = MockNvs::new();
    let radio = ScriptedRadio {
        visible: vec![ap("Mesh", [0xa1; 6], -40), ap("Mesh", [0xa2; 6], -60)],
        ..Default::default()
    };
    let mut o = boot(&nvs, &[("Mesh", "stale")], radio, ManagerConfig::default());

    for _ in 0..3 {
        o.handle_event(NetEvent::LinkLost);
    }
    assert_eq!(o.radio().connects.len(), 3);
    assert_eq!(o.state(), StateId::Provisioning);
}

#[test]
fn custom_attempt_limit_is_honoured() {
    let nvs = MockNvs::new();
    let config = ManagerConfig {
        connect_attempts: 1,
        ..Default::default()
    };
    let mut o = boot(&nvs, &[("Home", "stale")], ScriptedRadio::with_visible(&["Home"]), config);

    o.handle_event(NetEvent::LinkLost);
    assert_eq!(o.radio().connects.len(), 1);
    assert_eq!(o.state(), StateId::Provisioning);
}

#[test]
fn refused_connects_count_as_failures() {
    let nvs = MockNvs::new();
    let radio = ScriptedRadio {
        refuse_connects: true,
        ..ScriptedRadio::with_visible(&["Home"])
    };
    let o = boot(&nvs, &[("Home", "pw1")], radio, ManagerConfig::default());

    assert_eq!(o.radio().connects.len(), 3);
    assert_eq!(o.state(), StateId::Provisioning);
    assert!(o.store().is_empty());
}

#[test]
fn scan_failure_is_an_empty_scan() {
    let nvs = MockNvs::new();
    let radio = ScriptedRadio {
        fail_scan: true,
        ..ScriptedRadio::with_visible(&["Home"])
    };
    let o = boot(&nvs, &[("Home", "pw1")], radio, ManagerConfig::default());

    assert_eq!(o.state(), StateId::Provisioning);
    assert_eq!(o.store().len(), 1);
}

#[test]
fn stray_attach_without_attempt_is_ignored() {
    let nvs = MockNvs::new();
    let mut o = ConnectionOrchestrator::new(
        seeded_store(&nvs, &[]),
        ScriptedRadio::default(),
        MockProvisioner::default(),
        RecordingSink::default(),
        ManagerConfig::default(),
    );
    o.start().unwrap();
    o.handle_event(NetEvent::AttachConfirmed);
    o.handle_event(NetEvent::LinkLost);
    assert_eq!(o.state(), StateId::Idle);
}

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn link_loss_reconnects_when_enabled() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "pw1")],
        ScriptedRadio::with_visible(&["Home"]),
        ManagerConfig::default(),
    );
    o.handle_event(NetEvent::AttachConfirmed);

    o.handle_event(NetEvent::LinkLost);
    assert_eq!(o.state(), StateId::TryingStored);
    assert_eq!(o.radio().connects.len(), 2);

    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.store().find_by_ssid("Home").unwrap().1.use_count, 3);
}

#[test]
fn link_loss_idles_when_disabled() {
    let nvs = MockNvs::new();
    let config = ManagerConfig {
        auto_reconnect: false,
        ..Default::default()
    };
    let mut o = boot(&nvs, &[("Home", "pw1")], ScriptedRadio::with_visible(&["Home"]), config);
    o.handle_event(NetEvent::AttachConfirmed);

    o.handle_event(NetEvent::LinkLost);
    assert_eq!(o.state(), StateId::Idle);
    assert_eq!(o.radio().connects.len(), 1);
}

// ── Provisioning ──────────────────────────────────────────────

#[test]
fn provisioned_credential_persisted_once_after_attach() {
    let nvs = MockNvs::new();
    let mut o = boot(&nvs, &[], ScriptedRadio::default(), ManagerConfig::default());
    assert_eq!(o.state(), StateId::Provisioning);
    let writes = nvs.writes();

    o.handle_event(creds("Cafe", "latte"));
    assert_eq!(o.radio().connected_ssids(), vec!["Cafe"]);
    assert_eq!(nvs.writes(), writes);
    assert!(o.store().is_empty());

    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(nvs.writes(), writes + 1);
    assert!(!o.provisioner().active);

    let stored = reboot(&nvs);
    let (_, rec) = stored.find_by_ssid("Cafe").unwrap();
    assert_eq!(rec.passphrase, "latte");
    assert_eq!(rec.use_count, 1);
}

#[test]
fn failed_provisioned_join_restarts_session_without_storing() {
    let nvs = MockNvs::new();
    let mut o = boot(&nvs, &[], ScriptedRadio::default(), ManagerConfig::default());
    let writes = nvs.writes();

    o.handle_event(creds("Cafe", "wrong"));
    o.handle_event(NetEvent::LinkLost);

    assert_eq!(o.state(), StateId::Provisioning);
    assert_eq!(o.provisioner().starts, 2);
    assert!(o.provisioner().active);
    assert_eq!(nvs.writes(), writes);

    // A late attach for the abandoned attempt is not remembered.
    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Provisioning);
    assert!(o.store().is_empty());
}

#[test]
fn provisioning_into_full_store_evicts_least_used() {
    let nvs = MockNvs::new();
    let mut store = seeded_store(&nvs, &[("A", "1"), ("B", "2"), ("C", "3"), ("D", "4"), ("E", "5")]);
    for name in ["A", "B", "D", "E"] {
        store.increment_use_count(name).unwrap();
    }
    store.persist().unwrap();

    let mut o = ConnectionOrchestrator::new(
        store,
        ScriptedRadio::default(),
        MockProvisioner::default(),
        RecordingSink::default(),
        ManagerConfig::default(),
    );
    o.start().unwrap();
    o.handle_event(NetEvent::InterfaceStarted);
    o.handle_event(creds("F", "6"));
    o.handle_event(NetEvent::AttachConfirmed);

    assert_eq!(o.store().len(), 5);
    assert!(o.store().find_by_ssid("C").is_err());
    assert!(o.store().find_by_ssid("F").is_ok());
    assert_eq!(o.sink().count(|e| *e == AppEvent::CredentialEvicted { ssid: ssid("C") }), 1);
}

#[test]
fn provisioning_start_failure_is_not_fatal() {
    let nvs = MockNvs::new();
    let mut o = ConnectionOrchestrator::new(
        seeded_store(&nvs, &[]),
        ScriptedRadio::default(),
        MockProvisioner {
            fail_start: true,
            ..Default::default()
        },
        RecordingSink::default(),
        ManagerConfig::default(),
    );
    o.start().unwrap();
    o.handle_event(NetEvent::InterfaceStarted);

    assert_eq!(o.state(), StateId::Provisioning);
    assert!(!o.provisioner().active);
}

// ── Persistence failures ──────────────────────────────────────

#[test]
fn persist_failure_keeps_running_from_memory() {
    let nvs = MockNvs::new();
    let mut o = boot(&nvs, &[], ScriptedRadio::with_visible(&["Cafe"]), ManagerConfig::default());
    nvs.set_fail_writes(true);

    o.handle_event(creds("Cafe", "latte"));
    o.handle_event(NetEvent::AttachConfirmed);

    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.sink().count(|e| matches!(e, AppEvent::PersistFailed(_))), 1);

    // Memory stays authoritative for the reconnect.
    o.handle_event(NetEvent::LinkLost);
    assert_eq!(o.radio().connected_ssids(), vec!["Cafe", "Cafe"]);
    assert!(reboot(&nvs).is_empty());
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn forget_command_persists_removal() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "pw1"), ("Office", "pw2")],
        ScriptedRadio::default(),
        ManagerConfig::default(),
    );

    o.handle_command(AppCommand::Forget(ssid("Home")));
    o.handle_command(AppCommand::Forget(ssid("Nowhere")));

    let stored = reboot(&nvs);
    assert_eq!(stored.len(), 1);
    assert!(stored.find_by_ssid("Office").is_ok());
    assert_eq!(o.sink().count(|e| matches!(e, AppEvent::CredentialForgotten { .. })), 1);
}

#[test]
fn forget_during_attempt_stops_retrying_it() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "pw1")],
        ScriptedRadio::with_visible(&["Home"]),
        ManagerConfig::default(),
    );
    assert_eq!(o.radio().connected_ssids(), vec!["Home"]);

    o.handle_command(AppCommand::Forget(ssid("Home")));
    assert_eq!(o.state(), StateId::Provisioning);
    assert_eq!(o.radio().disconnects, 1);
    assert_eq!(o.provisioner().starts, 1);

    // Late outcomes of the abandoned association change nothing.
    o.handle_event(NetEvent::LinkLost);
    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.radio().connected_ssids(), vec!["Home"]);
    assert_eq!(o.state(), StateId::Provisioning);
    assert!(o.store().is_empty());
}

#[test]
fn forget_all_during_attempt_skips_every_cached_candidate() {
    let nvs = MockNvs::new();
    let mut o = boot(
        &nvs,
        &[("Home", "pw1"), ("Office", "pw2")],
        ScriptedRadio::with_visible(&["Home", "Office"]),
        ManagerConfig::default(),
    );
    assert_eq!(o.radio().connected_ssids(), vec!["Home"]);

    o.handle_command(AppCommand::ForgetAll);
    assert_eq!(o.state(), StateId::Provisioning);
    assert_eq!(o.radio().connected_ssids(), vec!["Home"]);
    assert_eq!(reboot(&nvs).len(), 0);
}

#[test]
fn queued_commands_reach_the_orchestrator() {
    let nvs = MockNvs::new();
    let bus = EventBus::new();
    let commands = CommandQueue::new();
    let mut o = boot(
        &nvs,
        &[("Home", "pw1")],
        ScriptedRadio::with_visible(&["Home"]),
        ManagerConfig::default(),
    );
    o.handle_event(NetEvent::AttachConfirmed);
    assert_eq!(o.state(), StateId::Connected);

    let tx = commands.sender();
    assert!(tx.send(AppCommand::SetAutoReconnect(false)));
    assert!(bus.publisher().raise(NetEvent::LinkLost));

    // The command is taken first even though the event is also ready.
    o.step(&bus, &commands);
    assert!(!o.config().auto_reconnect);
    assert_eq!(o.state(), StateId::Connected);

    o.step(&bus, &commands);
    assert_eq!(o.state(), StateId::Idle);

    assert!(tx.send(AppCommand::Restart));
    assert_eq!(o.poll_commands(&commands), 1);
    assert_eq!(o.state(), StateId::TryingStored);
}

#[test]
fn restart_while_searching_rescans() {
    let nvs = MockNvs::new();
    let mut o = boot(&nvs, &[], ScriptedRadio::with_visible(&["Home"]), ManagerConfig::default());
    assert_eq!(o.state(), StateId::Provisioning);

    o.handle_event(creds("Home", "pw1"));
    o.handle_event(NetEvent::AttachConfirmed);
    o.handle_event(NetEvent::LinkLost);
    assert_eq!(o.state(), StateId::TryingStored);

    o.handle_command(AppCommand::Restart);
    assert_eq!(o.state(), StateId::TryingStored);
    assert_eq!(o.radio().connected_ssids(), vec!["Home", "Home", "Home"]);
    assert_eq!(o.radio().disconnects, 0);
}
