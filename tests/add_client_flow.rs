mod common;

use std::fs;

use common::{base_settings, TestHost};
use wg_provision::state::{Settings, StateRepository as _};
use wg_provision::{addclient, setup};

fn provision_wg1(host: &TestHost, clients: u32) {
    let settings = Settings {
        interface: "wg1".into(),
        subnet: "10.1.0.0/24".into(),
        clients,
        ..base_settings()
    };
    setup::run(settings, &host.paths(), &host.tools()).unwrap();
}

#[test]
fn add_client_adopts_the_provisioned_interface_without_flags() {
    let host = TestHost::new();
    provision_wg1(&host, 0);

    // No flags: the stored wg1 identity wins over the wg0 defaults.
    addclient::run("bob", base_settings(), &host.paths(), &host.tools()).unwrap();

    let st = host.repo.load(Some("wg1")).unwrap().unwrap();
    assert_eq!(st.last_client_ip, 2);

    let applied = host.peers.applied.borrow();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].interface, "wg1");
    assert_eq!(applied[0].client_ip, "10.1.0.2");

    let bob = fs::read_to_string(host.paths().clients_dir.join("wg1").join("bob.conf")).unwrap();
    assert!(bob.contains("Address = 10.1.0.2/24"));

    let conf = fs::read_to_string(host.paths().config_dir.join("wg1.conf")).unwrap();
    assert!(conf.contains("AllowedIPs = 10.1.0.2/32"));
}

#[test]
fn add_client_without_prior_setup_fails_and_creates_nothing() {
    let host = TestHost::new();
    let err = addclient::run("bob", base_settings(), &host.paths(), &host.tools()).unwrap_err();
    assert!(err.to_string().contains("server configuration not found"));
    assert!(!host.paths().clients_dir.exists());
    assert!(!host.paths().state_dir.join("wg0.state").exists());
    assert!(host.peers.applied.borrow().is_empty());
}

#[test]
fn add_client_fails_when_the_server_config_was_removed() {
    let host = TestHost::new();
    provision_wg1(&host, 0);
    fs::remove_file(host.paths().config_dir.join("wg1.conf")).unwrap();

    let err = addclient::run("bob", base_settings(), &host.paths(), &host.tools()).unwrap_err();
    assert!(err.to_string().contains("server configuration not found"));
}

#[test]
fn failed_verification_leaves_the_counter_untouched() {
    let host = TestHost::new();
    provision_wg1(&host, 0);
    host.peers.verify_ok.set(false);

    let before = host.repo.load(Some("wg1")).unwrap().unwrap();
    let err = addclient::run("bob", base_settings(), &host.paths(), &host.tools()).unwrap_err();
    assert!(err.to_string().contains("verification failed"));

    let after = host.repo.load(Some("wg1")).unwrap().unwrap();
    assert_eq!(after.last_client_ip, before.last_client_ip);

    // Nothing was persisted for the failed client.
    assert!(!host.paths().clients_dir.join("wg1").join("bob.conf").exists());
    let conf = fs::read_to_string(host.paths().config_dir.join("wg1.conf")).unwrap();
    assert!(!conf.contains("[Peer]"));
}

#[test]
fn add_client_starts_a_stopped_interface() {
    let host = TestHost::new();
    provision_wg1(&host, 0);
    host.services.active.set(false);

    addclient::run("bob", base_settings(), &host.paths(), &host.tools()).unwrap();
    assert!(host.services.active.get());
}

#[test]
fn explicit_subnet_overrides_the_stored_pool() {
    let host = TestHost::new();
    provision_wg1(&host, 0);

    let settings = Settings { subnet: "10.2.0.0/24".into(), ..base_settings() };
    addclient::run("carol", settings, &host.paths(), &host.tools()).unwrap();

    let st = host.repo.load(Some("wg1")).unwrap().unwrap();
    assert_eq!(st.subnet, "10.2.0.0/24");
    let applied = host.peers.applied.borrow();
    assert_eq!(applied[0].client_ip, "10.2.0.2");
}

#[test]
fn consecutive_adds_allocate_consecutive_addresses() {
    let host = TestHost::new();
    provision_wg1(&host, 1);

    addclient::run("bob", base_settings(), &host.paths(), &host.tools()).unwrap();
    addclient::run("carol", base_settings(), &host.paths(), &host.tools()).unwrap();

    let st = host.repo.load(Some("wg1")).unwrap().unwrap();
    assert_eq!(st.last_client_ip, 4);
    let applied = host.peers.applied.borrow();
    assert_eq!(applied[0].client_ip, "10.1.0.3");
    assert_eq!(applied[1].client_ip, "10.1.0.4");
}
