//! The sealed file store end to end: enrollment survives a restart, and the
//! wipe leaves the store file alone even when it sits inside a wiped directory.

use std::sync::Arc;

use covergate_core::{
    CoverFeedback, CoverGate, EncryptedFileStore, GateConfig, Role, StoreError, StoreKey,
};

use crate::common::{RecordingTerminator, code, init_tracing};

fn config_for(root: &std::path::Path) -> GateConfig {
    let toml = format!(
        r#"
[store]
path = "{store}"

[wipe]
delay_ms = 0

[[wipe.targets]]
kind = "preferences"
path = "{prefs}"

[[wipe.targets]]
kind = "files"
path = "{files}"
"#,
        store = root.join("prefs/secure.bin").display(),
        prefs = root.join("prefs").display(),
        files = root.join("files").display(),
    );
    let path = root.join("config.toml");
    std::fs::write(&path, toml).unwrap();
    GateConfig::load_from(&path).unwrap()
}

#[tokio::test]
async fn enrollment_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let key = StoreKey::generate();

    {
        let gate =
            CoverGate::open(&config, &key, Arc::new(RecordingTerminator::default())).unwrap();
        gate.enroll(Role::Real, code("1111")).await.unwrap();
        gate.enroll(Role::Decoy, code("2222")).await.unwrap();
    }

    let gate = CoverGate::open(&config, &key, Arc::new(RecordingTerminator::default())).unwrap();
    assert!(gate.is_configured().unwrap());
    assert_eq!(gate.submit(code("1111")).await.unwrap(), CoverFeedback::Reveal);
}

#[tokio::test]
async fn wrong_key_is_a_storage_fault() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());

    let gate = CoverGate::open(
        &config,
        &StoreKey::generate(),
        Arc::new(RecordingTerminator::default()),
    )
    .unwrap();
    gate.enroll(Role::Real, code("1111")).await.unwrap();
    drop(gate);

    let err = CoverGate::open(
        &config,
        &StoreKey::generate(),
        Arc::new(RecordingTerminator::default()),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        covergate_core::OpenError::Store(StoreError::Corrupt { .. })
    ));
}

#[test]
fn config_without_wipe_targets_is_refused() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            "[store]\npath = \"{}\"\n",
            dir.path().join("secure.bin").display()
        ),
    )
    .unwrap();
    let config = GateConfig::load_from(&path).unwrap();

    let err = CoverGate::open(
        &config,
        &StoreKey::generate(),
        Arc::new(RecordingTerminator::default()),
    )
    .unwrap_err();
    assert!(matches!(err, covergate_core::OpenError::NoWipeTargets));
    assert!(!dir.path().join("secure.bin").exists());
}

#[tokio::test]
async fn wipe_spares_the_store_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let key = StoreKey::generate();
    let terminator = Arc::new(RecordingTerminator::default());

    std::fs::create_dir_all(dir.path().join("files")).unwrap();
    std::fs::write(dir.path().join("files/doc.txt"), "secret").unwrap();

    let gate = CoverGate::open(&config, &key, terminator.clone()).unwrap();
    gate.enroll(Role::Real, code("1111")).await.unwrap();
    gate.enroll(Role::Panic, code("9999")).await.unwrap();
    std::fs::write(dir.path().join("prefs/ui.json"), "{}").unwrap();

    gate.submit(code("9999")).await.unwrap();
    let status = gate.wipe_handle().expect("wipe scheduled").finished().await;
    assert_eq!(status, Some(0));
    drop(gate);

    assert_eq!(terminator.calls(), vec![0]);
    assert!(!dir.path().join("files").exists());
    assert!(!dir.path().join("prefs/ui.json").exists());
    assert!(dir.path().join("prefs/secure.bin").exists());

    let store = EncryptedFileStore::open(dir.path().join("prefs/secure.bin"), &key).unwrap();
    let registry = covergate_core::CredentialRegistry::new(Arc::new(store));
    assert!(registry.matches(Role::Real, &code("1111")).unwrap());
}
