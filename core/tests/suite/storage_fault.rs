//! A store that cannot be read must never grant access or trigger a wipe.

use std::sync::Arc;

use covergate_core::{EnrollError, Role, SessionState, StoreError, SubmitError, WipePlan};

use crate::common::{FlakyStore, RecordingTerminator, code, enrolled_gate, init_tracing};

#[tokio::test]
async fn unreadable_store_keeps_the_session_locked() {
    init_tracing();
    let store = Arc::new(FlakyStore::default());
    let terminator = Arc::new(RecordingTerminator::default());
    let gate = enrolled_gate(store.clone(), WipePlan::new(), terminator.clone()).await;

    store.break_reads();

    for raw in ["1111", "2222", "9999", "0000"] {
        let err = gate.submit(code(raw)).await.unwrap_err();
        assert!(
            matches!(err, SubmitError::Store(StoreError::Unavailable(_))),
            "{raw}: {err}"
        );
        assert_eq!(gate.state(), SessionState::Locked);
    }
    assert!(gate.wipe_handle().is_none());
    assert!(terminator.calls().is_empty());
}

#[tokio::test]
async fn unreadable_store_refuses_enrollment() {
    init_tracing();
    let store = Arc::new(FlakyStore::default());
    let gate = enrolled_gate(
        store.clone(),
        WipePlan::new(),
        Arc::new(RecordingTerminator::default()),
    )
    .await;

    store.break_reads();

    assert!(matches!(
        gate.enroll(Role::Decoy, code("4444")).await,
        Err(EnrollError::Store(_))
    ));
    assert!(matches!(
        gate.change_real(code("1111"), code("5555")).await,
        Err(EnrollError::Store(_))
    ));
}
