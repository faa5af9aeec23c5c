//! Integration tests for the UDID derivation and persistence flow.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use std::time::Duration;

use common::{CountingEntropy, Device, DOMAIN};
use secureudid_core::platform::MemorySecureItemStore;
use secureudid_core::{ResolutionKind, SecureUdidError};

#[test]
fn test_identifier_survives_reinstall() {
    let device = Device::new();

    let before = device
        .install()
        .udid_for_domain(DOMAIN.to_string(), "salt1".to_string())
        .expect("udid");

    // Deleting the app drops its in-process state but not the device stores.
    let after = device
        .install()
        .udid_for_domain(DOMAIN.to_string(), "salt1".to_string())
        .expect("udid");

    assert_eq!(before, after);
}

#[test]
fn test_identifiers_are_scoped_by_domain_and_salt() {
    let udid = Device::new().install();
    let ids: Vec<String> = [
        (DOMAIN, "salt1"),
        (DOMAIN, "salt2"),
        ("com.example.other", "salt1"),
    ]
    .iter()
    .map(|(domain, salt)| {
        udid.udid_for_domain((*domain).to_string(), (*salt).to_string())
            .expect("udid")
    })
    .collect();

    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[0], ids[2]);
    assert_ne!(ids[1], ids[2]);
}

#[test]
fn test_wiped_keychain_heals_from_shared_store() {
    let device = Device::new();
    let udid = device.install();
    let original = udid
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");

    device.keychain.clear();

    let resolution = udid.resolve().expect("resolve");
    assert_eq!(resolution.kind(), ResolutionKind::Adopted);
    assert_eq!(resolution.written().len(), 1);
    assert!(device.keychain.raw("com.secureudid", "root").is_some());

    let healed = udid
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");
    assert_eq!(original, healed);
}

#[test]
fn test_wiping_every_store_regenerates() {
    let device = Device::new();
    let udid = device.install();
    let original = udid
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");

    device.keychain.clear();
    device.shared.clear();

    let regenerated = udid
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");
    assert_ne!(original, regenerated);
}

#[test]
fn test_unwritable_device_yields_no_identifier() {
    let device = Device::new();
    device.keychain.fail_writes(true);
    device.shared.fail_writes(true);

    match device
        .install()
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
    {
        Err(SecureUdidError::PersistenceUnavailable(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_filesystem_container_persists_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keychain = Arc::new(MemorySecureItemStore::new());

    let first = common::fs_install(&keychain, dir.path())
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");
    assert!(dir.path().join("secureudid/root.bin").exists());

    // A device restore that loses the keychain but keeps the container.
    let restored_keychain = Arc::new(MemorySecureItemStore::new());
    let second = common::fs_install(&restored_keychain, dir.path())
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");

    assert_eq!(first, second);
    assert!(restored_keychain.raw("com.secureudid", "root").is_some());
}

#[test]
fn test_concurrent_installs_agree_on_one_root() {
    const INSTALLS: usize = 6;

    let device = Arc::new(Device::new());
    let dir = tempfile::tempdir().expect("tempdir");
    let lock_path = dir.path().join("resolve.lock");
    let barrier = Arc::new(Barrier::new(INSTALLS));

    let handles: Vec<_> = (0..INSTALLS)
        .map(|_| {
            let device = Arc::clone(&device);
            let barrier = Arc::clone(&barrier);
            let lock_path = lock_path.clone();
            thread::spawn(move || {
                // Separate instances stand in for separate processes.
                let udid = device.install_locked(&lock_path);
                barrier.wait();
                udid.udid_for_domain(DOMAIN.to_string(), "salt".to_string())
                    .expect("udid")
            })
        })
        .collect();

    let ids: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    let expected = device
        .install()
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");
    assert_eq!(ids[0], expected);
}

#[test]
fn test_separate_instances_without_lock_file_agree() {
    let device = Arc::new(Device::new());
    device.keychain.set_read_delay(Some(Duration::from_millis(100)));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let udid = device.install();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                udid.udid_for_domain(DOMAIN.to_string(), "salt".to_string())
                    .expect("udid")
            })
        })
        .collect();
    let ids: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();

    assert_eq!(ids[0], ids[1]);
    device.keychain.set_read_delay(None);
    let later = device
        .install()
        .udid_for_domain(DOMAIN.to_string(), "salt".to_string())
        .expect("udid");
    assert_eq!(ids[0], later);
}

#[test]
fn test_exactly_one_root_is_created_across_installs() {
    const INSTALLS: usize = 4;

    let device = Arc::new(Device::new());
    let entropy = Arc::new(CountingEntropy::default());
    let barrier = Arc::new(Barrier::new(INSTALLS));

    let handles: Vec<_> = (0..INSTALLS)
        .map(|_| {
            let udid = device.install_counted(Arc::clone(&entropy));
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                udid.resolve().expect("resolve").kind()
            })
        })
        .collect();
    let kinds: Vec<ResolutionKind> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();

    assert_eq!(entropy.generated(), 1);
    assert_eq!(
        kinds
            .iter()
            .filter(|kind| **kind == ResolutionKind::Created)
            .count(),
        1
    );
}
