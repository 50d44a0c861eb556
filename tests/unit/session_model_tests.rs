use session_broker::models::session::{
    bytes_to_mb, display_name, new_session_id, LaunchedSession, SessionInfo, SessionState,
    NOT_LOGGED_IN,
};
use session_broker::AppError;

fn sample_info() -> SessionInfo {
    SessionInfo {
        session_id: "abc".into(),
        port: 5000,
        created_at: chrono::Utc::now(),
        memory_bytes: None,
        user_display_name: NOT_LOGGED_IN.into(),
        state: SessionState::Running,
    }
}

#[test]
fn session_ids_are_unique_uuids() {
    let a = new_session_id();
    let b = new_session_id();
    assert_ne!(a, b);
    assert!(uuid::Uuid::parse_str(&a).is_ok());
}

#[test]
fn display_name_joins_trimmed_names() {
    assert_eq!(
        display_name("  Ada ", " Lovelace ").expect("valid"),
        "Ada Lovelace"
    );
}

#[test]
fn display_name_rejects_blank_last_name() {
    assert!(matches!(
        display_name("Ada", "   "),
        Err(AppError::InvalidInput(_))
    ));
}

#[test]
fn display_name_rejects_empty_first_name() {
    assert!(matches!(
        display_name("", "Lovelace"),
        Err(AppError::InvalidInput(_))
    ));
}

#[test]
fn terminated_is_final() {
    for next in [
        SessionState::Creating,
        SessionState::Running,
        SessionState::Terminating,
        SessionState::Terminated,
    ] {
        assert!(!SessionState::Terminated.can_transition_to(next));
    }
}

#[test]
fn session_info_serializes_snake_case() {
    let json = serde_json::to_value(sample_info()).expect("serialize");
    assert_eq!(json["session_id"], "abc");
    assert_eq!(json["port"], 5000);
    assert_eq!(json["user_display_name"], NOT_LOGGED_IN);
    assert!(json["memory_bytes"].is_null());
}

#[test]
fn launched_session_copies_identity_fields() {
    let info = sample_info();
    let launched = LaunchedSession::from(&info);
    assert_eq!(launched.session_id, info.session_id);
    assert_eq!(launched.port, info.port);
    assert_eq!(launched.created_at, info.created_at);
    assert_eq!(launched.user_display_name, NOT_LOGGED_IN);
}

#[test]
fn bytes_to_mb_uses_binary_megabytes() {
    assert!((bytes_to_mb(3 * 1024 * 1024) - 3.0).abs() < f64::EPSILON);
}
