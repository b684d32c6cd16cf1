use super::*;

use chrono::Duration as ChronoDuration;

fn guard() -> ExclusiveGuard {
    let config = ExclusiveConfig {
        worker_id: Some("pc1".to_string()),
        ..Default::default()
    };
    ExclusiveGuard::new(&config).unwrap()
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_generated_worker_id() {
    let guard = ExclusiveGuard::new(&ExclusiveConfig::default()).unwrap();
    assert!(guard.worker_id().starts_with('w'));
    assert_eq!(guard.worker_id().len(), 9);
    assert!(!guard.worker_id().contains('_'));
}

#[test]
fn test_rejects_bad_tokens() {
    let config = ExclusiveConfig {
        prefix: "IN_PROGRESS".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        ExclusiveGuard::new(&config),
        Err(ExclusiveError::InvalidToken(_))
    ));

    let config = ExclusiveConfig {
        utc_offset_hours: 99,
        ..Default::default()
    };
    assert!(matches!(
        ExclusiveGuard::new(&config),
        Err(ExclusiveError::InvalidOffset(99))
    ));

    let config = ExclusiveConfig {
        utc_offset_hours: i32::MAX,
        ..Default::default()
    };
    assert!(matches!(
        ExclusiveGuard::new(&config),
        Err(ExclusiveError::InvalidOffset(i32::MAX))
    ));
}

#[test]
fn test_create_marker_is_valid() {
    let guard = guard();
    let marker = guard.create_marker_at("pc2", Some("Canvas"), now());
    assert_eq!(marker, "PROCESSING_2026-05-01_21:00:00_pc2_Canvas");
    assert!(guard.is_valid_marker(&marker));
    assert!(!guard.is_valid_marker("PROCESSING"));
    assert!(!guard.is_valid_marker("OTHER_2026-05-01_21:00:00_pc2"));
}

#[test]
fn test_deep_research_timeout() {
    let guard = guard();
    let old = guard.create_marker_at("pc2", Some("Deep Research"), now() - ChronoDuration::minutes(41));
    let fresh = guard.create_marker_at("pc2", Some("Deep Research"), now() - ChronoDuration::minutes(10));

    assert!(guard.is_timeout_at(&old, Some("Deep Research"), now()));
    assert!(!guard.is_timeout_at(&fresh, Some("Deep Research"), now()));
}

#[test]
fn test_ordinary_timeout() {
    let guard = guard();
    let marker = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(6));
    assert!(guard.is_timeout_at(&marker, None, now()));

    let marker = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(4));
    assert!(!guard.is_timeout_at(&marker, None, now()));
}

#[test]
fn test_feature_argument_overrides_marker_feature() {
    let guard = guard();
    let marker = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(10));
    assert!(guard.is_timeout_at(&marker, None, now()));
    assert!(!guard.is_timeout_at(&marker, Some("agent"), now()));
}

#[test]
fn test_unstructured_marker_times_out() {
    let guard = guard();
    assert!(guard.is_timeout_at("PROCESSING", None, now()));
    assert!(guard.is_timeout_at("something else", Some("Deep Research"), now()));
    assert_eq!(
        guard.recommended_wait_time_at("PROCESSING", None, now()),
        Duration::ZERO
    );
}

#[test]
fn test_recommended_wait_time() {
    let guard = guard();
    let marker = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(2));
    assert_eq!(
        guard.recommended_wait_time_at(&marker, None, now()),
        Duration::from_secs(180)
    );

    let expired = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(20));
    assert_eq!(
        guard.recommended_wait_time_at(&expired, None, now()),
        Duration::ZERO
    );
}

#[test]
fn test_evaluate_states() {
    let guard = guard();

    assert_eq!(guard.evaluate("", now()), ClaimState::Free);
    assert_eq!(guard.evaluate("---------- ChatGPT ----------", now()), ClaimState::Free);

    let own = guard.create_marker_at("pc1", None, now());
    assert_eq!(guard.evaluate(&own, now()), ClaimState::Own);

    let held = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(1));
    assert_eq!(
        guard.evaluate(&held, now()),
        ClaimState::Held {
            holder: "pc2".to_string(),
            wait: Duration::from_secs(240)
        }
    );

    let stale = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(30));
    assert_eq!(
        guard.evaluate(&stale, now()),
        ClaimState::Stale {
            holder: Some("pc2".to_string())
        }
    );

    assert_eq!(
        guard.evaluate("PROCESSING legacy", now()),
        ClaimState::Stale { holder: None }
    );
}

#[test]
fn test_offset_is_independent_of_host_zone() {
    let config = ExclusiveConfig {
        worker_id: Some("pc1".to_string()),
        utc_offset_hours: 0,
        ..Default::default()
    };
    let utc_guard = ExclusiveGuard::new(&config).unwrap();
    assert_eq!(
        utc_guard.create_marker_at("pc1", None, now()),
        "PROCESSING_2026-05-01_12:00:00_pc1"
    );
}

#[test]
fn test_evaluate_reads_first_line_only() {
    let guard = guard();
    let held = guard.create_marker_at("pc2", None, now() - ChronoDuration::minutes(1));
    let cell = format!("{held}\n\n---------- ChatGPT ----------\nModel: default");
    assert!(matches!(guard.evaluate(&cell, now()), ClaimState::Held { .. }));
    assert_eq!(
        guard.evaluate("---------- ChatGPT ----------\nPROCESSING", now()),
        ClaimState::Free
    );
}

#[test]
fn test_multiline_feature_keeps_its_timeout_class() {
    let guard = guard();
    let marker = guard.create_marker_at("pc2", Some("Deep\nResearch"), now() - ChronoDuration::minutes(10));
    assert_eq!(marker, "PROCESSING_2026-05-01_20:50:00_pc2_Deep Research");
    assert!(matches!(guard.evaluate(&marker, now()), ClaimState::Held { .. }));
}
