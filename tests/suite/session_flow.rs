//! End-to-end session behavior against a mock backend.

use std::time::Duration;

use mistake_engine::{ItemId, Outcome, Phase, PrefetchState};

use crate::common::{
    app_at, config_for, mount_ranking, start_backend, tick_until, tracked_events,
    wait_for_events,
};

const ALWAYS_REWARDED: &str = "p_correct = 1.0\ntransition_delay_ms = 1500\nreorder_period_hours = 1";
const QUICK: &str = "p_correct = 1.0\ntransition_delay_ms = 50\nreorder_period_hours = 1";

fn names(app: &mistake_engine::App) -> Vec<String> {
    app.session()
        .catalog()
        .items()
        .iter()
        .map(|id| id.as_str().to_string())
        .collect()
}

fn sorted(mut events: Vec<(String, String)>) -> Vec<(String, String)> {
    events.sort();
    events
}

fn event(item: &str, kind: &str) -> (String, String) {
    (item.to_string(), kind.to_string())
}

#[tokio::test]
async fn reorder_during_feedback_keeps_numeric_cursor() {
    let server = start_backend(&["a.png", "b.png", "c.png"]).await;
    let mut app = app_at(&config_for(&server, ALWAYS_REWARDED), 0).await;
    assert_eq!(app.view().current.as_str(), "a.png");

    assert_eq!(app.decide(), Some(Outcome::correct(20)));
    assert_eq!(app.view().badge.as_deref(), Some("+20"));

    // The ranking shows up mid-feedback; a new period forces an immediate fetch.
    mount_ranking(&server, &["c.png", "a.png", "b.png"]).await;
    assert!(app.set_reorder_period(Duration::from_secs(2 * 3600)));
    assert!(tick_until(&mut app, |app| names(app) == ["c.png", "a.png", "b.png"]).await);

    let during = app.view();
    assert!(during.is_animating());
    assert_eq!(during.cursor, 0);
    assert_eq!(during.score, 0);

    assert!(tick_until(&mut app, |app| app.view().phase == Phase::Idle).await);
    let after = app.view();
    assert_eq!(after.score, 20);
    assert_eq!(after.cursor, 1);
    assert_eq!(after.current.as_str(), "a.png");
    assert!(after.feedback.is_none());
    assert!(after.badge.is_none());
    app.shutdown();
}

#[tokio::test]
async fn view_and_engagement_events_reach_the_collector() {
    let server = start_backend(&["a.png", "b.png"]).await;
    let mut app = app_at(&config_for(&server, QUICK), 0).await;

    app.decide();
    assert!(tick_until(&mut app, |app| app.view().cursor == 1).await);

    let events = wait_for_events(&server, 3).await;
    assert_eq!(
        sorted(events),
        vec![
            event("a.png", "engagement"),
            event("a.png", "view"),
            event("b.png", "view"),
        ]
    );
    app.shutdown();
}

#[tokio::test]
async fn judgments_during_feedback_send_nothing() {
    let server = start_backend(&["a.png", "b.png"]).await;
    let mut app = app_at(&config_for(&server, ALWAYS_REWARDED), 0).await;

    assert!(app.decide().is_some());
    for _ in 0..5 {
        assert_eq!(app.decide(), None);
    }
    wait_for_events(&server, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let engagements = tracked_events(&server)
        .await
        .into_iter()
        .filter(|(_, kind)| kind == "engagement")
        .count();
    assert_eq!(engagements, 1);
    assert_eq!(app.view().score, 0);
    app.shutdown();
}

#[tokio::test]
async fn next_item_is_prefetched() {
    let server = start_backend(&["a.png", "b.png", "c.png"]).await;
    let mut app = app_at(&config_for(&server, ALWAYS_REWARDED), 1).await;
    assert!(app.prefetch_status().is_none());

    app.decide();
    assert!(
        tick_until(&mut app, |app| matches!(
            app.prefetch_status(),
            Some((_, PrefetchState::Ready(_)))
        ))
        .await
    );
    let (item, _) = app.prefetch_status().expect("prefetch started");
    assert_eq!(item, ItemId::new("c.png").expect("non-empty"));
    app.shutdown();
}

#[tokio::test]
async fn unreachable_collector_does_not_affect_the_session() {
    let server = start_backend(&["a.png", "b.png"]).await;
    let mut config = config_for(&server, QUICK);
    if let Some(endpoints) = config.endpoints.as_mut() {
        endpoints.tracking = Some("http://127.0.0.1:9/api/track".to_string());
    }
    let mut app = app_at(&config, 0).await;

    app.decide();
    assert!(tick_until(&mut app, |app| app.view().cursor == 1).await);
    assert_eq!(app.view().score, 20);
    app.shutdown();
}

#[tokio::test]
async fn malformed_ranking_keeps_order() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    let server = start_backend(&["a.png", "b.png"]).await;
    Mock::given(method("GET"))
        .and(path(crate::common::RANKING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error":"cold start"}"#))
        .expect(1..)
        .mount(&server)
        .await;

    let mut app = app_at(&config_for(&server, QUICK), 0).await;
    for _ in 0..20 {
        app.tick();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(names(&app), vec!["a.png", "b.png"]);
    app.shutdown();
}

#[tokio::test]
async fn ranking_with_unknown_ids_only_reorders_known_ones() {
    let server = start_backend(&["a.png", "b.png", "c.png"]).await;
    mount_ranking(&server, &["ghost.png", "c.png", "b.png", "a.png"]).await;

    let mut app = app_at(&config_for(&server, QUICK), 2).await;
    assert!(tick_until(&mut app, |app| names(app) == ["c.png", "b.png", "a.png"]).await);
    assert_eq!(app.view().cursor, 2);
    assert_eq!(app.view().current.as_str(), "a.png");
    app.shutdown();
}
