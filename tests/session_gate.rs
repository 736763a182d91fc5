//! Integration tests for the session gate and its watcher

use std::{sync::Arc, time::Duration};

use jiff::{SignedDuration, Timestamp};
use testresult::TestResult;
use tokio::sync::mpsc;

use atlas_storefront::{
    session::{
        AdminUser, AuthSession, SessionUser,
        gate::{GateKind, GateState, GuardOutcome, SessionGate, guard},
        watcher::{GateWatcher, ViewEvent},
    },
    storage::{FileStore, MemoryStore, SessionStore, keys},
};

fn session() -> AuthSession {
    AuthSession {
        token: "opaque-token".to_string(),
        user: SessionUser {
            id: "u1".to_string(),
            fullname: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            role: "user".to_string(),
            phone: Some("9876543210".to_string()),
        },
    }
}

#[test]
fn corrupt_admin_record_signs_the_admin_out() -> TestResult {
    let dir = tempfile::tempdir()?;
    let profile = Arc::new(FileStore::open(dir.path().join("profile.json"))?);

    profile.set(keys::ADMIN_AUTHENTICATED, "true")?;
    profile.set(keys::ADMIN_USER, "{\"id\": \"a1\", \"loginTime\"")?;

    let gate = SessionGate::new(Arc::new(MemoryStore::new()), profile.clone());

    assert!(!gate.is_admin_authenticated());
    assert_eq!(profile.get(keys::ADMIN_AUTHENTICATED)?, None);
    assert_eq!(profile.get(keys::ADMIN_USER)?, None);

    let reopened = FileStore::open(profile.path())?;

    assert_eq!(reopened.get(keys::ADMIN_USER)?, None);

    Ok(())
}

#[test]
fn admin_window_is_24_hours() -> TestResult {
    let gate = SessionGate::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()));
    let login_at: Timestamp = "2026-10-16T00:00:00Z".parse()?;

    gate.admin_sign_in_at(AdminUser::new("a1", "ops@example.com", "Ops", login_at), login_at)?;

    let almost = login_at.checked_add(SignedDuration::from_secs(24 * 60 * 60 - 1))?;
    assert!(gate.is_admin_authenticated_at(almost));

    let expired = login_at.checked_add(SignedDuration::from_hours(24))?;
    assert!(!gate.is_admin_authenticated_at(expired));

    // Expiry signed the admin out for good.
    assert!(!gate.is_admin_authenticated_at(almost));

    Ok(())
}

#[test]
fn admin_sign_in_stamps_the_current_time() -> TestResult {
    let gate = SessionGate::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()));

    let admin = gate.admin_sign_in(AdminUser::new(
        "a1",
        "ops@example.com",
        "Ops",
        Timestamp::UNIX_EPOCH,
    ))?;

    assert_ne!(admin.login_at, Timestamp::UNIX_EPOCH);
    assert!(gate.is_admin_authenticated());

    gate.admin_sign_out()?;

    assert!(!gate.is_admin_authenticated());

    Ok(())
}

#[test]
fn guarded_views_follow_the_customer_session() -> TestResult {
    let gate = SessionGate::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()));

    assert_eq!(
        guard(gate.evaluate(GateKind::User), || "orders", "/login"),
        GuardOutcome::Redirect("/login".to_string())
    );

    gate.sign_in(&session())?;

    assert_eq!(
        guard(gate.evaluate(GateKind::User), || "orders", "/login"),
        GuardOutcome::Render("orders")
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn watcher_sees_sign_out_from_another_component() -> TestResult {
    let tab = Arc::new(MemoryStore::new());
    let gate = SessionGate::new(tab.clone(), Arc::new(MemoryStore::new()));

    gate.sign_in(&session())?;

    let (watcher, mut state) = GateWatcher::new(gate.clone(), GateKind::User);
    let (views, events) = mpsc::channel(4);

    assert_eq!(*state.borrow(), GateState::Unknown);

    let task = tokio::spawn(watcher.run(events));

    state.changed().await?;
    assert_eq!(*state.borrow_and_update(), GateState::Authenticated);

    gate.sign_out()?;

    state.changed().await?;
    assert_eq!(*state.borrow_and_update(), GateState::Unauthenticated);

    views.send(ViewEvent::Focus).await?;
    views.send(ViewEvent::Unmount).await?;
    task.await?;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn admin_watcher_follows_admin_sign_out() -> TestResult {
    let gate = SessionGate::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()));

    gate.admin_sign_in(AdminUser::new(
        "a1",
        "ops@example.com",
        "Ops",
        Timestamp::UNIX_EPOCH,
    ))?;

    let (watcher, mut state) = GateWatcher::new(gate.clone(), GateKind::Admin);
    let watcher = watcher.with_poll_interval(Duration::from_secs(60));
    let (views, events) = mpsc::channel(4);

    let task = tokio::spawn(watcher.run(events));

    state.changed().await?;
    assert_eq!(*state.borrow_and_update(), GateState::Authenticated);

    gate.admin_sign_out()?;

    state.changed().await?;
    assert_eq!(*state.borrow_and_update(), GateState::Unauthenticated);

    drop(views);
    task.await?;

    Ok(())
}
