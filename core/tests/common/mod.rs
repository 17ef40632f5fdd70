//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, mpsc};
use std::time::Duration;

use covergate_core::{
    CoverGate, CredentialRegistry, CredentialStore, MemoryStore, PinCode, Role, StoreError,
    StoredValue, Terminator, WipePlan, WipeTargetKind,
};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn code(raw: &str) -> PinCode {
    PinCode::new(raw).expect("valid code")
}

/// Records exit statuses instead of ending the test process.
#[derive(Default)]
pub struct RecordingTerminator {
    calls: Mutex<Vec<i32>>,
}

impl RecordingTerminator {
    pub fn calls(&self) -> Vec<i32> {
        self.calls.lock().unwrap().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, status: i32) {
        self.calls.lock().unwrap().push(status);
    }
}

/// Store whose reads start failing once `fail` is set.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail: AtomicBool,
}

impl FlakyStore {
    pub fn break_reads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected fault".into()))
        } else {
            Ok(())
        }
    }
}

impl CredentialStore for FlakyStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.get_string(key)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.get_bool(key, default)
    }

    fn put_batch(&self, entries: &[(&str, StoredValue)]) -> Result<(), StoreError> {
        self.inner.put_batch(entries)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }

    fn entries(&self) -> Result<BTreeMap<String, StoredValue>, StoreError> {
        self.inner.entries()
    }
}

/// Store that can park its next string read until the test releases it.
#[derive(Default)]
pub struct PausingStore {
    inner: MemoryStore,
    pause: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

impl PausingStore {
    /// Returns `(reached, release)`. `reached` fires once a read is parked;
    /// sending on `release` lets it continue.
    pub fn pause_next_read(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.pause.lock().unwrap() = Some((reached_tx, release_rx));
        (reached_rx, release_tx)
    }

    fn park(&self) {
        let armed = self.pause.lock().unwrap().take();
        if let Some((reached, release)) = armed {
            reached.send(()).unwrap();
            release.recv().unwrap();
        }
    }
}

impl CredentialStore for PausingStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.park();
        self.inner.get_string(key)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.inner.get_bool(key, default)
    }

    fn put_batch(&self, entries: &[(&str, StoredValue)]) -> Result<(), StoreError> {
        self.inner.put_batch(entries)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }

    fn entries(&self) -> Result<BTreeMap<String, StoredValue>, StoreError> {
        self.inner.entries()
    }
}

/// A small application data tree under `root` and the plan that wipes it.
pub fn seed_app_data(root: &Path) -> WipePlan {
    for (rel, contents) in [
        ("databases/notes.db", "db"),
        ("prefs/settings.json", "{}"),
        ("files/photos/a.jpg", "jpg"),
        ("cache/thumbs/a.bin", "thumb"),
    ] {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    WipePlan::new()
        .target(WipeTargetKind::Databases, root.join("databases"))
        .target(WipeTargetKind::Preferences, root.join("prefs"))
        .target(WipeTargetKind::Files, root.join("files"))
        .target(WipeTargetKind::Cache, root.join("cache"))
}

/// Gate over `store` with real 1111, decoy 2222, panic 9999 and no wipe delay.
pub async fn enrolled_gate<S: CredentialStore + 'static>(
    store: Arc<S>,
    plan: WipePlan,
    terminator: Arc<RecordingTerminator>,
) -> CoverGate<S> {
    let gate = CoverGate::new(Arc::new(CredentialRegistry::new(store)), plan, terminator)
        .with_wipe_delay(Duration::ZERO);
    gate.enroll(Role::Real, code("1111")).await.unwrap();
    gate.enroll(Role::Decoy, code("2222")).await.unwrap();
    gate.enroll(Role::Panic, code("9999")).await.unwrap();
    gate
}
