//! A full setup-then-use pass through the gate.

use std::sync::Arc;
use std::time::Duration;

use covergate_core::{
    ClassificationOutcome, CoverFeedback, MemoryStore, SessionState, SubmitError, WipePlan,
};

use crate::common::{RecordingTerminator, code, enrolled_gate, init_tracing, seed_app_data};

#[tokio::test]
async fn each_code_classifies_to_its_role() {
    init_tracing();
    let terminator = Arc::new(RecordingTerminator::default());
    let gate = enrolled_gate(
        Arc::new(MemoryStore::new()),
        WipePlan::new(),
        terminator.clone(),
    )
    .await;

    let classifier = gate.classifier();
    assert_eq!(
        classifier.evaluate(&code("1111")).unwrap(),
        ClassificationOutcome::Real
    );
    assert_eq!(
        classifier.evaluate(&code("2222")).unwrap(),
        ClassificationOutcome::Decoy
    );
    assert_eq!(
        classifier.evaluate(&code("9999")).unwrap(),
        ClassificationOutcome::Wipe
    );
    assert_eq!(
        classifier.evaluate(&code("0000")).unwrap(),
        ClassificationOutcome::Wrong
    );
    assert!(terminator.calls().is_empty());
}

#[tokio::test]
async fn panic_code_wipes_data_and_terminates_exactly_once() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let plan = seed_app_data(dir.path());
    let terminator = Arc::new(RecordingTerminator::default());
    let gate = enrolled_gate(Arc::new(MemoryStore::new()), plan, terminator.clone()).await;

    assert_eq!(gate.submit(code("0000")).await.unwrap(), CoverFeedback::Reject);
    assert_eq!(
        gate.submit(code("2222")).await.unwrap(),
        CoverFeedback::Acknowledge
    );
    assert_eq!(gate.state(), SessionState::Locked);

    assert_eq!(
        gate.submit(code("9999")).await.unwrap(),
        CoverFeedback::Acknowledge
    );
    assert_eq!(gate.state(), SessionState::Wiped);

    let mut handle = gate.wipe_handle().expect("wipe scheduled");
    assert_eq!(handle.finished().await, Some(0));
    assert_eq!(terminator.calls(), vec![0]);
    for dir_name in ["databases", "prefs", "files", "cache"] {
        assert!(!dir.path().join(dir_name).exists(), "{dir_name} survived");
    }

    // Nothing further is processed, and no second wipe is scheduled.
    assert!(matches!(
        gate.submit(code("9999")).await,
        Err(SubmitError::Session(_))
    ));
    assert!(matches!(
        gate.submit(code("1111")).await,
        Err(SubmitError::Session(_))
    ));
    assert_eq!(terminator.calls(), vec![0]);
}

#[tokio::test]
async fn wipe_does_not_touch_credentials() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let terminator = Arc::new(RecordingTerminator::default());
    let gate = enrolled_gate(store, WipePlan::new(), terminator).await;

    gate.submit(code("9999")).await.unwrap();
    gate.wipe_handle().expect("wipe scheduled").finished().await;

    assert!(gate.is_configured().unwrap());
    assert!(gate.registry().is_decoy_configured().unwrap());
}

#[test]
fn wipe_outlives_the_runtime_that_scheduled_it() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let plan = seed_app_data(dir.path());
    let terminator = Arc::new(RecordingTerminator::default());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let mut handle = runtime.block_on(async {
        let gate = enrolled_gate(Arc::new(MemoryStore::new()), plan, terminator.clone())
            .await
            .with_wipe_delay(Duration::from_millis(300));
        gate.submit(code("9999")).await.unwrap();
        gate.wipe_handle().expect("wipe scheduled")
    });
    drop(runtime);
    assert!(terminator.calls().is_empty());

    let status = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(async {
            tokio::time::timeout(Duration::from_secs(10), handle.finished()).await
        })
        .expect("wipe finished");
    assert_eq!(status, Some(0));
    assert_eq!(terminator.calls(), vec![0]);
    assert!(!dir.path().join("files").exists());
}

#[tokio::test]
async fn clear_all_is_a_factory_reset() {
    init_tracing();
    let terminator = Arc::new(RecordingTerminator::default());
    let gate = enrolled_gate(
        Arc::new(MemoryStore::new()),
        WipePlan::new(),
        terminator,
    )
    .await;

    gate.registry().clear_all().unwrap();

    assert!(!gate.is_configured().unwrap());
    assert_eq!(gate.submit(code("1111")).await.unwrap(), CoverFeedback::Reject);
    assert_eq!(gate.submit(code("9999")).await.unwrap(), CoverFeedback::Reject);
    assert_eq!(gate.state(), SessionState::Locked);
}
