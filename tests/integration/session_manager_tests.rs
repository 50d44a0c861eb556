//! Session lifecycle through `SessionManager`, using `sleep` as a worker.
//!
//! `sleep <port>` stays alive without binding anything, so these tests
//! exercise ports, processes and the registry without a real worker.

#![cfg(unix)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use session_broker::models::session::{SessionState, NOT_LOGGED_IN};
use session_broker::orchestrator::session_manager::SessionManager;
use session_broker::AppError;

use super::test_helpers::{kill_out_of_band, missing_worker_config, settle, sleep_config};

fn manager(start: u16, end: u16) -> SessionManager {
    SessionManager::from_config(&sleep_config(start, end)).expect("manager")
}

#[tokio::test]
async fn launch_registers_running_session() {
    let sessions = manager(41000, 41004);

    let launched = sessions.launch().expect("launch");
    assert_eq!(launched.port, 41000);
    assert_eq!(launched.user_display_name, NOT_LOGGED_IN);

    let info = sessions.get(&launched.session_id).expect("registered");
    assert_eq!(info.state, SessionState::Running);
    assert_eq!(info.port, 41000);
    assert_eq!(sessions.route(&launched.session_id).expect("route"), 41000);
    assert!(sessions.port_status().reserved_list.contains(&41000));

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn live_sessions_hold_distinct_ports() {
    let sessions = manager(41010, 41014);

    let ports: BTreeSet<u16> = (0..4)
        .map(|_| sessions.launch().expect("launch").port)
        .collect();
    assert_eq!(ports.len(), 4);
    assert_eq!(sessions.port_status().available, 0);

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn spawn_failure_leaves_port_available() {
    let sessions = SessionManager::from_config(&missing_worker_config(41020, 41022))
        .expect("manager");

    let err = sessions.launch().expect_err("spawn must fail");
    assert!(matches!(err, AppError::Spawn(_)), "got: {err}");

    let status = sessions.port_status();
    assert_eq!(status.reserved, 0);
    assert_eq!(status.available, 2);
    assert!(sessions.list().await.is_empty());
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let sessions = manager(41030, 41032);
    let launched = sessions.launch().expect("launch");

    assert!(sessions.shutdown(&launched.session_id).await);
    assert!(!sessions.shutdown(&launched.session_id).await);

    assert!(matches!(
        sessions.get(&launched.session_id),
        Err(AppError::NotFound(_))
    ));
    assert_eq!(sessions.port_status().available, 2);
}

#[tokio::test]
async fn shutdown_of_unknown_session_reports_false() {
    let sessions = manager(41040, 41042);
    assert!(!sessions.shutdown("no-such-session").await);
}

#[tokio::test]
async fn exhaustion_leaves_registry_unchanged() {
    let sessions = manager(41050, 41052);
    let a = sessions.launch().expect("first");
    let b = sessions.launch().expect("second");

    let err = sessions.launch().expect_err("pool exhausted");
    assert!(matches!(err, AppError::ResourceExhausted(_)));

    let listed = sessions.list().await;
    assert_eq!(listed.len(), 2);
    assert!(listed.contains_key(&a.session_id));
    assert!(listed.contains_key(&b.session_id));

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn released_port_is_reused_after_shutdown() {
    let sessions = manager(41060, 41062);
    let a = sessions.launch().expect("first");
    let _b = sessions.launch().expect("second");

    assert!(sessions.shutdown(&a.session_id).await);
    let c = sessions.launch().expect("third");
    assert_eq!(c.port, a.port);

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn list_reaps_worker_killed_out_of_band() {
    let sessions = manager(41070, 41072);
    let launched = sessions.launch().expect("launch");

    let pid = sessions
        .registry()
        .live_pid(&launched.session_id)
        .flatten()
        .expect("worker alive");
    kill_out_of_band(pid);
    settle().await;

    let listed = sessions.list().await;
    assert!(!listed.contains_key(&launched.session_id));
    assert!(!sessions.port_status().reserved_list.contains(&launched.port));
    assert!(!sessions.shutdown(&launched.session_id).await);
}

#[tokio::test]
async fn sweep_returns_reaped_ids() {
    let sessions = manager(41080, 41083);
    let doomed = sessions.launch().expect("doomed");
    let survivor = sessions.launch().expect("survivor");

    let pid = sessions
        .registry()
        .live_pid(&doomed.session_id)
        .flatten()
        .expect("worker alive");
    kill_out_of_band(pid);
    settle().await;

    assert_eq!(sessions.sweep().await, vec![doomed.session_id.clone()]);
    assert!(sessions.get(&survivor.session_id).is_ok());

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn update_user_info_sets_display_name() {
    let sessions = manager(41090, 41092);
    let launched = sessions.launch().expect("launch");

    sessions
        .update_user_info(&launched.session_id, "Ada", "Lovelace")
        .expect("update");
    assert_eq!(
        sessions
            .get(&launched.session_id)
            .expect("session")
            .user_display_name,
        "Ada Lovelace"
    );

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn update_user_info_with_empty_last_name_keeps_display_name() {
    let sessions = manager(41100, 41102);
    let launched = sessions.launch().expect("launch");

    let err = sessions
        .update_user_info(&launched.session_id, "Ada", "")
        .expect_err("blank last name");
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(
        sessions
            .get(&launched.session_id)
            .expect("session")
            .user_display_name,
        NOT_LOGGED_IN
    );

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn update_user_info_for_unknown_session_is_not_found() {
    let sessions = manager(41110, 41112);
    assert!(matches!(
        sessions.update_user_info("ghost", "Ada", "Lovelace"),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn memory_of_live_worker_is_cached() {
    let sessions = manager(41120, 41122);
    let launched = sessions.launch().expect("launch");

    let bytes = sessions
        .memory_of(&launched.session_id)
        .await
        .expect("session exists");
    if let Some(bytes) = bytes {
        assert!(bytes > 0);
        assert_eq!(
            sessions
                .get(&launched.session_id)
                .expect("session")
                .memory_bytes,
            Some(bytes)
        );
    }

    assert!(matches!(
        sessions.memory_of("ghost").await,
        Err(AppError::NotFound(_))
    ));

    sessions.shutdown_all().await;
}

#[tokio::test]
async fn shutdown_all_releases_every_port() {
    let sessions = manager(41130, 41133);
    for _ in 0..3 {
        sessions.launch().expect("launch");
    }

    assert_eq!(sessions.shutdown_all().await, 3);
    assert!(sessions.registry().is_empty());
    assert_eq!(sessions.port_status().reserved, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_launch_and_shutdown_keep_ports_consistent() {
    let sessions = Arc::new(manager(41200, 41203));

    let churners: Vec<_> = (0..4)
        .map(|_| {
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                let mut launched = 0_usize;
                for _ in 0..6 {
                    match sessions.launch() {
                        Ok(session) => {
                            launched += 1;
                            tokio::task::yield_now().await;
                            assert!(sessions.shutdown(&session.session_id).await);
                        }
                        Err(AppError::ResourceExhausted(_)) => {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                        }
                        Err(err) => panic!("unexpected launch error: {err}"),
                    }
                }
                launched
            })
        })
        .collect();

    let checker = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            for _ in 0..20 {
                let snapshot = sessions.list().await;
                let ports: BTreeSet<u16> = snapshot.values().map(|info| info.port).collect();
                assert_eq!(ports.len(), snapshot.len(), "port shared: {snapshot:?}");
                assert!(sessions.port_status().reserved <= 3);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };

    let mut launched = 0;
    for churner in churners {
        launched += churner.await.expect("churner");
    }
    checker.await.expect("checker");
    assert!(launched > 0);

    let mut registered: Vec<u16> = sessions.registry().list().values().map(|info| info.port).collect();
    registered.sort_unstable();
    let mut reserved = sessions.port_status().reserved_list;
    reserved.sort_unstable();
    assert_eq!(reserved, registered);
    assert!(registered.is_empty());

    sessions.shutdown_all().await;
    assert_eq!(sessions.port_status().reserved, 0);
}
