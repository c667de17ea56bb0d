// End-to-end deep-link routing through the Lookback façade

use std::sync::Arc;
use std::time::Duration;

use lookback_bridge::testing::{MockEnvironment, MockNativeBridge};
use lookback_bridge::{
    DiagnosticKind, DiagnosticsLog, InitialLinkOutcome, Lookback, ProbeOutcome, Severity,
    URL_SCHEME_KEY,
};
use serde_json::json;

struct Harness {
    lookback: Lookback,
    native: Arc<MockNativeBridge>,
    environment: Arc<MockEnvironment>,
    log: Arc<DiagnosticsLog>,
}

fn harness(environment: MockEnvironment) -> Harness {
    let native = Arc::new(MockNativeBridge::default());
    let environment = Arc::new(environment);
    let log = Arc::new(DiagnosticsLog::default());
    let lookback = Lookback::new(native.clone(), environment.clone(), log.clone());
    Harness {
        lookback,
        native,
        environment,
        log,
    }
}

#[tokio::test]
async fn test_launch_link_forwarded_once_and_scheme_recorded() {
    let h = harness(MockEnvironment::new().with_initial_url("demo://start"));

    let report = h.lookback.setup_participate("demo").await.join().await.unwrap();

    assert_eq!(report.scheme, "demo");
    assert_eq!(report.probe, ProbeOutcome::Listening);
    assert_eq!(report.initial_link, InitialLinkOutcome::Forwarded("demo://start".into()));
    assert_eq!(h.native.opened_urls(), vec!["demo://start".to_string()]);
    assert_eq!(h.lookback.settings().await.get(URL_SCHEME_KEY), Some(&json!("demo")));
    assert_eq!(h.environment.probed_urls(), vec!["demo://testing".to_string()]);
    assert!(h.log.history().await.is_empty());
}

#[tokio::test]
async fn test_unregistered_scheme_never_subscribes() {
    let h = harness(MockEnvironment::new().openable(false));

    let report = h.lookback.setup_participate("demo").await.join().await.unwrap();

    assert_eq!(report.probe, ProbeOutcome::SchemeNotRegistered);
    assert!(!h.lookback.is_listening_for_links().await);
    assert_eq!(h.environment.subscriber_count(), 0);

    let history = h.log.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].severity, Severity::Error);
    assert_eq!(history[0].kind, DiagnosticKind::SchemeNotRegistered { scheme: "demo".into() });

    assert_eq!(h.environment.emit_url("demo://open"), 0);
    assert!(h.native.opened_urls().is_empty());

    // the rest of the façade keeps working
    assert_eq!(h.lookback.settings().await.get(URL_SCHEME_KEY), Some(&json!("demo")));
}

#[tokio::test]
async fn test_live_links_are_filtered_by_scheme() {
    let h = harness(MockEnvironment::new());
    h.lookback.setup_participate("myapp").await.join().await.unwrap();

    h.environment.emit_url("other://open");
    h.environment.emit_url("myapp://open?x=1");

    let opened = h.native.wait_for_opened(1, Duration::from_secs(1)).await;
    assert_eq!(opened, vec!["myapp://open?x=1".to_string()]);
}

#[tokio::test]
async fn test_links_ignored_before_setup() {
    let h = harness(MockEnvironment::new());

    assert!(!h.lookback.handle_open_url("demo://start").await);
    assert!(!h.lookback.handle_open_url("anything at all").await);
    assert!(h.native.opened_urls().is_empty());
}

#[tokio::test]
async fn test_probe_error_still_handles_launch_link() {
    let h = harness(
        MockEnvironment::new()
            .failing_probe("Linking not linked")
            .with_initial_url("demo://start"),
    );

    let report = h.lookback.setup_participate("demo").await.join().await.unwrap();

    assert!(matches!(report.probe, ProbeOutcome::Failed(_)));
    assert_eq!(report.initial_link, InitialLinkOutcome::Forwarded("demo://start".into()));
    assert!(matches!(
        h.log.kinds().await.as_slice(),
        [DiagnosticKind::ProbeFailed { scheme, .. }] if scheme == "demo"
    ));
}

#[tokio::test]
async fn test_dropped_setup_handle_keeps_running() {
    let h = harness(MockEnvironment::new().with_initial_url("demo://start"));

    drop(h.lookback.setup_participate("demo").await);

    let opened = h.native.wait_for_opened(1, Duration::from_secs(1)).await;
    assert_eq!(opened, vec!["demo://start".to_string()]);
}
