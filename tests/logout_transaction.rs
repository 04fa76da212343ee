//! Integration tests for logout transactions
//!
//! These tests drive `LogoutTransaction` phase by phase and through the
//! `SessionService`, checking snapshot fixation, idempotent commit, rollback
//! behaviour and convergence of concurrent logouts.

mod common;

use std::sync::Arc;

use common::stores::{CountingSessionStore, FlakySessionStore};
use common::{login, memory_store, seed_sessions, self_auth, service_over};
use proptest::prelude::*;
use sessiond::storage::SessionStore;
use sessiond::transaction::LogoutTransaction;
use sessiond::{
    RollbackOutcome, SessionId, SessionTransaction, SessiondError, Transaction,
    TransactionRunner, TxContext, TxState, UserId,
};

fn logout_tx(store: Arc<dyn SessionStore>, user: &UserId) -> LogoutTransaction {
    LogoutTransaction::new(store, self_auth(user), user.clone(), &TxContext::detached())
}

#[tokio::test]
async fn concurrent_login_between_postcondition_and_commit_survives() {
    let store = memory_store();
    let u1 = UserId::from_str_unchecked("u1");
    let snapshot_ids = seed_sessions(store.as_ref(), &u1, 2).await;

    let mut tx = logout_tx(store.clone(), &u1);
    tx.precondition().await.unwrap();
    let snapshot = tx.postcondition(&TxContext::detached()).await.unwrap();
    assert_eq!(snapshot.session_ids(), &snapshot_ids[..]);

    let s3 = login(store.as_ref(), &u1).await;
    tx.commit().await.unwrap();

    assert_eq!(store.list_sessions(&u1).await.unwrap(), vec![s3]);
    for id in &snapshot_ids {
        assert!(!store.get_session(id).await.unwrap().unwrap().is_active());
    }
}

#[tokio::test]
async fn commit_twice_is_idempotent() {
    let store = Arc::new(CountingSessionStore::new());
    let user = UserId::new();
    seed_sessions(store.as_ref(), &user, 3).await;

    let mut tx = logout_tx(store.clone(), &user);
    tx.precondition().await.unwrap();
    tx.postcondition(&TxContext::detached()).await.unwrap();

    tx.commit().await.unwrap();
    let writes_after_first = store.writes();
    let revoked_after_first = tx.progress().revoked().to_vec();

    tx.commit().await.unwrap();
    assert_eq!(store.writes(), writes_after_first);
    assert_eq!(tx.progress().revoked(), &revoked_after_first[..]);
    assert_eq!(tx.state(), TxState::Committed);
    assert!(store.list_sessions(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn commit_in_created_state_fails_without_writes() {
    let store = Arc::new(CountingSessionStore::new());
    let user = UserId::new();
    seed_sessions(store.as_ref(), &user, 2).await;

    let mut tx = logout_tx(store.clone(), &user);
    let err = tx.commit().await.unwrap_err();

    assert!(matches!(err, SessiondError::InvalidState { .. }));
    assert_eq!(store.writes(), 0);
    assert_eq!(store.list_sessions(&user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn rollback_before_commit_writes_nothing() {
    let store = Arc::new(CountingSessionStore::new());
    let user = UserId::new();
    seed_sessions(store.as_ref(), &user, 2).await;

    let mut tx = logout_tx(store.clone(), &user);
    tx.precondition().await.unwrap();
    tx.postcondition(&TxContext::detached()).await.unwrap();

    assert_eq!(tx.rollback(), RollbackOutcome::Discarded);
    assert_eq!(tx.state(), TxState::RolledBack);
    assert_eq!(store.writes(), 0);

    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, SessiondError::InvalidState { .. }));
    assert_eq!(store.writes(), 0);
    assert_eq!(store.list_sessions(&user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn rollback_after_commit_is_partial() {
    let store = memory_store();
    let user = UserId::new();
    let ids = seed_sessions(store.as_ref(), &user, 2).await;

    let mut tx = logout_tx(store.clone(), &user);
    tx.precondition().await.unwrap();
    tx.postcondition(&TxContext::detached()).await.unwrap();
    tx.commit().await.unwrap();

    let outcome = tx.rollback();
    assert!(outcome.is_partial());
    assert!(matches!(outcome.as_error(), Some(SessiondError::PartialRollback { revoked: 2 })));
    assert_eq!(tx.state(), TxState::Committed);

    for id in &ids {
        assert!(store.get_session(id).await.unwrap().unwrap().revoked);
    }
    assert!(store.list_sessions(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn flaky_commit_is_retried_on_the_same_instance() {
    let store = Arc::new(FlakySessionStore::failing_first(1));
    let user = UserId::new();
    seed_sessions(store.as_ref(), &user, 3).await;

    let mut tx: SessionTransaction = logout_tx(store.clone(), &user).into();
    let runner = TransactionRunner::from_config(&sessiond::config::TransactionConfig {
        commit_retry_backoff_ms: 1,
        ..Default::default()
    });
    let report = runner.run(&mut tx, &TxContext::detached()).await.unwrap();

    assert_eq!(report.commit_attempts, 2);
    assert_eq!(report.revoked, 3);
    assert_eq!(report.already_absent, 0);
    // one failed call plus one per session
    assert_eq!(store.delete_calls(), 4);
    assert!(store.list_sessions(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn user_without_sessions_is_rejected_before_any_write() {
    let store = Arc::new(CountingSessionStore::new());
    let user = UserId::new();
    let service = service_over(store.clone());

    let err = service
        .logout(&self_auth(&user), &user, None, &TxContext::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, SessiondError::InvalidState { .. }));
    assert_eq!(store.writes(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logouts_converge() {
    let store = memory_store();
    let user = UserId::new();
    seed_sessions(store.as_ref(), &user, 20).await;
    let service = service_over(store.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            service.logout(&self_auth(&user), &user, None, &TxContext::detached()).await
        }));
    }

    let mut revoked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(report) => revoked += report.revoked,
            Err(err) => assert!(matches!(err, SessiondError::InvalidState { .. }), "{err}"),
        }
    }

    assert_eq!(revoked, 20);
    assert!(store.list_sessions(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn origin_session_from_another_user_is_rejected() {
    let store = memory_store();
    let alice = UserId::new();
    let bob = UserId::new();
    seed_sessions(store.as_ref(), &alice, 1).await;
    let bob_sessions = seed_sessions(store.as_ref(), &bob, 1).await;
    let service = service_over(store.clone());

    let err = service
        .logout(&self_auth(&alice), &alice, Some(bob_sessions[0].clone()), &TxContext::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, SessiondError::InvalidState { .. }));
    assert_eq!(store.list_sessions(&alice).await.unwrap().len(), 1);
    assert_eq!(store.list_sessions(&bob).await.unwrap().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After commit, only sessions created after the snapshot are active
    #[test]
    fn only_post_snapshot_sessions_survive(existing in 1usize..8, late_logins in 0usize..4) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let store = memory_store();
            let user = UserId::new();
            let bystander = UserId::new();
            seed_sessions(store.as_ref(), &user, existing).await;
            let bystander_ids = seed_sessions(store.as_ref(), &bystander, 2).await;

            let mut tx = logout_tx(store.clone(), &user);
            tx.precondition().await.unwrap();
            let snapshot = tx.postcondition(&TxContext::detached()).await.unwrap();
            assert_eq!(snapshot.len(), existing);

            let mut late: Vec<SessionId> = Vec::new();
            for _ in 0..late_logins {
                late.push(login(store.as_ref(), &user).await);
            }
            tx.commit().await.unwrap();

            let mut remaining = store.list_sessions(&user).await.unwrap();
            remaining.sort();
            late.sort();
            assert_eq!(remaining, late);
            assert_eq!(tx.progress().revoked().len(), existing);
            assert_eq!(store.list_sessions(&bystander).await.unwrap(), bystander_ids);
        });
    }
}
