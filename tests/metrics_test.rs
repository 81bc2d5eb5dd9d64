//! Gauge values exposed on /metrics
//!
//! The registry is process-global, so every test here runs serially.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serial_test::serial;
use tower::ServiceExt;

use common::{Harness, TEST_RNG_SEED};
use leadpulse::metrics::{encode_metrics, init_metrics};
use leadpulse::scheduler::{SchedulerContext, StatsSeed};
use leadpulse::server::create_router;

fn sample_line(name: &str) -> String {
    let text = encode_metrics().unwrap();
    text.lines()
        .find(|line| line.split_whitespace().next() == Some(name))
        .unwrap_or_else(|| panic!("{name} missing from:\n{text}"))
        .to_string()
}

#[test]
#[serial]
fn test_fetching_gauge_reflects_boot_state() {
    init_metrics().unwrap();

    let _enabled = SchedulerContext::new(StatsSeed::default(), Some(TEST_RNG_SEED), true).unwrap();
    assert_eq!(sample_line("leadpulse_fetching"), "leadpulse_fetching 1");

    let _disabled =
        SchedulerContext::new(StatsSeed::default(), Some(TEST_RNG_SEED), false).unwrap();
    assert_eq!(sample_line("leadpulse_fetching"), "leadpulse_fetching 0");
}

#[tokio::test]
#[serial]
async fn test_fetching_gauge_follows_control_endpoints() {
    init_metrics().unwrap();
    let harness = Harness::new(vec![], false);
    let app = create_router(harness.app_state());
    assert_eq!(sample_line("leadpulse_fetching"), "leadpulse_fetching 0");

    let start = Request::post("/api/start-fetching").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(start).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sample_line("leadpulse_fetching"), "leadpulse_fetching 1");

    let stop = Request::post("/api/stop-fetching").body(Body::empty()).unwrap();
    app.oneshot(stop).await.unwrap();
    assert_eq!(sample_line("leadpulse_fetching"), "leadpulse_fetching 0");
}

#[tokio::test]
#[serial]
async fn test_observer_gauge_tracks_event_streams() {
    init_metrics().unwrap();
    let harness = Harness::new(vec![], true);
    let app = create_router(harness.app_state());

    let request = Request::get("/api/events").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sample_line("leadpulse_observers"), "leadpulse_observers 1");

    drop(response);
    assert_eq!(harness.hub.observer_count(), 0);
    assert_eq!(sample_line("leadpulse_observers"), "leadpulse_observers 0");
}
