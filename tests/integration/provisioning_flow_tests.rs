//! End-to-end flow through the simulated WiFi and SmartConfig adapters.
//!
//! Nothing is injected by hand here: the adapters raise every event on the
//! bus and the orchestrator drains it with `poll`.

use apjoin::adapters::log_sink::LogEventSink;
use apjoin::adapters::smartconfig::SmartConfigAdapter;
use apjoin::adapters::wifi::WifiAdapter;
use apjoin::app::ports::{ProvisioningError, ProvisioningPort};
use apjoin::app::service::ConnectionOrchestrator;
use apjoin::config::ManagerConfig;
use apjoin::credentials::{Bssid, CredentialStore};
use apjoin::events::EventBus;
use apjoin::fsm::StateId;

use crate::mocks::MockNvs;

const CAFE_BSSID: [u8; 6] = [0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01];

fn store(nvs: &MockNvs) -> CredentialStore<MockNvs> {
    let mut store = CredentialStore::new(nvs.clone());
    let _ = store.init();
    store
}

#[test]
fn provision_join_drop_and_rejoin() {
    let bus = EventBus::new();
    let nvs = MockNvs::new();
    let config = ManagerConfig::default();

    let mut wifi = WifiAdapter::new(bus.publisher(), &config);
    wifi.sim_add_network("Cafe", CAFE_BSSID, -48, "latte");
    wifi.sim_add_network("Neighbour", [0x66; 6], -80, "secret");
    let smartconfig = SmartConfigAdapter::new(bus.publisher());

    let mut o = ConnectionOrchestrator::new(store(&nvs), wifi, smartconfig, LogEventSink::new(), config);
    o.start().unwrap();
    o.poll(&bus);
    assert_eq!(o.state(), StateId::Provisioning);
    assert!(o.provisioner().is_active());

    // The phone sends the credentials.
    o.provisioner_mut()
        .sim_deliver(b"Cafe\0\0\0\0", b"latte\0\0\0", Some(CAFE_BSSID))
        .unwrap();
    o.poll(&bus);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.radio().sim_associated(), Some("Cafe"));
    assert!(!o.provisioner().is_active());
    assert_eq!(o.store().find_by_ssid("Cafe").unwrap().1.bssid, Some(Bssid(CAFE_BSSID)));

    // The AP reboots.
    o.radio_mut().sim_drop_link();
    o.poll(&bus);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.store().find_by_ssid("Cafe").unwrap().1.use_count, 2);
    assert_eq!(o.provisioner().sessions(), 1);

    // After a reboot the credential is still there.
    let reloaded = store(&nvs);
    assert_eq!(reloaded.find_by_ssid("Cafe").unwrap().1.use_count, 2);
}

#[test]
fn wrong_password_restarts_provisioning() {
    let bus = EventBus::new();
    let nvs = MockNvs::new();
    let config = ManagerConfig::default();

    let mut wifi = WifiAdapter::new(bus.publisher(), &config);
    wifi.sim_add_network("Cafe", CAFE_BSSID, -48, "latte");
    let smartconfig = SmartConfigAdapter::new(bus.publisher());

    let mut o = ConnectionOrchestrator::new(store(&nvs), wifi, smartconfig, LogEventSink::new(), config);
    o.start().unwrap();
    o.poll(&bus);

    o.provisioner_mut().sim_deliver(b"Cafe", b"espresso", None).unwrap();
    o.poll(&bus);
    assert_eq!(o.state(), StateId::Provisioning);
    assert_eq!(o.provisioner().sessions(), 2);
    assert!(o.store().is_empty());

    o.provisioner_mut().sim_deliver(b"Cafe", b"latte", None).unwrap();
    o.poll(&bus);
    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.store().len(), 1);
}

#[test]
fn known_network_joins_without_provisioning() {
    let bus = EventBus::new();
    let nvs = MockNvs::new();
    let config = ManagerConfig::default();

    let mut seeded = store(&nvs);
    seeded.add_or_update("Home", "pw1", None).unwrap();
    seeded.persist().unwrap();

    let mut wifi = WifiAdapter::new(bus.publisher(), &config);
    wifi.sim_add_network("Home", [0x11; 6], -55, "pw1");
    let smartconfig = SmartConfigAdapter::new(bus.publisher());

    let mut o = ConnectionOrchestrator::new(store(&nvs), wifi, smartconfig, LogEventSink::new(), config);
    o.start().unwrap();
    o.poll(&bus);

    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.provisioner().sessions(), 0);
    assert_eq!(o.radio().sim_connect_log()[0].1, Some(Bssid([0x11; 6])));
}

#[test]
fn unreachable_network_is_forgotten_then_provisioned() {
    let bus = EventBus::new();
    let nvs = MockNvs::new();
    let config = ManagerConfig::default();

    let mut seeded = store(&nvs);
    seeded.add_or_update("Home", "old-password", None).unwrap();
    seeded.persist().unwrap();

    let mut wifi = WifiAdapter::new(bus.publisher(), &config);
    wifi.sim_add_network("Home", [0x11; 6], -55, "new-password");
    let smartconfig = SmartConfigAdapter::new(bus.publisher());

    let mut o = ConnectionOrchestrator::new(store(&nvs), wifi, smartconfig, LogEventSink::new(), config);
    o.start().unwrap();
    o.poll(&bus);

    assert_eq!(o.radio().sim_connect_log().len(), 3);
    assert_eq!(o.state(), StateId::Provisioning);
    assert!(store(&nvs).is_empty());
}

#[test]
fn out_of_range_network_falls_through_to_the_next() {
    let bus = EventBus::new();
    let nvs = MockNvs::new();
    let config = ManagerConfig::default();

    let mut seeded = store(&nvs);
    seeded.add_or_update("Home", "pw1", None).unwrap();
    seeded.add_or_update("Office", "pw2", None).unwrap();
    seeded.persist().unwrap();

    let mut wifi = WifiAdapter::new(bus.publisher(), &config);
    wifi.sim_add_network("Home", [0x11; 6], -40, "pw1");
    wifi.sim_add_network("Office", [0x22; 6], -70, "pw2");
    wifi.sim_set_reachable("Home", false);
    let smartconfig = SmartConfigAdapter::new(bus.publisher());

    let mut o = ConnectionOrchestrator::new(store(&nvs), wifi, smartconfig, LogEventSink::new(), config);
    o.start().unwrap();
    o.poll(&bus);

    assert_eq!(o.state(), StateId::Connected);
    assert_eq!(o.radio().sim_associated(), Some("Office"));
    assert_eq!(o.radio().sim_connect_log().len(), 4);
    assert!(store(&nvs).find_by_ssid("Home").is_err());
    assert_eq!(o.provisioner().sessions(), 0);
}

#[test]
fn failed_session_is_restarted() {
    let bus = EventBus::new();
    let nvs = MockNvs::new();
    let config = ManagerConfig::default();

    let wifi = WifiAdapter::new(bus.publisher(), &config);
    let smartconfig = SmartConfigAdapter::new(bus.publisher());

    let mut o = ConnectionOrchestrator::new(store(&nvs), wifi, smartconfig, LogEventSink::new(), config);
    o.start().unwrap();
    o.poll(&bus);
    assert_eq!(o.provisioner().sessions(), 1);

    o.provisioner_mut().sim_fail_session();
    o.poll(&bus);
    assert_eq!(o.state(), StateId::Provisioning);
    assert_eq!(o.provisioner().sessions(), 2);
    assert!(o.provisioner().is_active());
}

#[test]
fn malformed_delivery_is_rejected_at_the_adapter() {
    let bus = EventBus::new();
    let mut smartconfig = SmartConfigAdapter::new(bus.publisher());
    smartconfig.start().unwrap();

    assert_eq!(
        smartconfig.sim_deliver(b"", b"pw", None),
        Err(ProvisioningError::InvalidSsid)
    );
    assert_eq!(
        smartconfig.sim_deliver(&[0xff, 0xfe], b"pw", None),
        Err(ProvisioningError::InvalidUtf8)
    );
    assert!(bus.is_empty());
}
