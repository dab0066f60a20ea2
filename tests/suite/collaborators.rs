//! Wire contracts with the remote collaborators.

use std::time::Duration;

use mistake_providers::retry::RetryConfig;
use mistake_providers::{
    EventTracker, ManifestSource, RankingClient, load_manifest, parse_endpoint, ranked_ids,
};
use mistake_types::{EventKind, ItemId};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn item(name: &str) -> ItemId {
    ItemId::new(name).expect("non-empty")
}

#[tokio::test]
async fn collector_receives_photo_id_and_event() {
    let server = MockServer::start().await;
    for (photo, event) in [("a.png", "view"), ("a.png", "engagement")] {
        Mock::given(method("POST"))
            .and(path("/api/track"))
            .and(body_json(serde_json::json!({ "photoId": photo, "event": event })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    let tracker = EventTracker::new(
        reqwest_client(),
        parse_endpoint(&format!("{}/api/track", server.uri())).expect("url"),
    );
    tracker.send(&item("a.png"), EventKind::View).await.expect("view");
    tracker
        .send(&item("a.png"), EventKind::Engagement)
        .await
        .expect("engagement");
}

#[tokio::test]
async fn ranking_order_is_preserved_and_ratio_is_optional() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/photo-order"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"photoId":"c.png","engagementRatio":0.8},{"photoId":"a.png"}]"#,
        ))
        .mount(&server)
        .await;

    let ranking = RankingClient::new(
        reqwest_client(),
        parse_endpoint(&format!("{}/api/photo-order", server.uri())).expect("url"),
    );
    let entries = ranking.fetch().await.expect("ranking");
    assert_eq!(entries[1].engagement_ratio, None);
    assert_eq!(ranked_ids(entries), vec![item("c.png"), item("a.png")]);
}

#[tokio::test]
async fn manifest_fetch_survives_a_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image-manifest.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/image-manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"["a.png","b.png"]"#))
        .mount(&server)
        .await;

    let source =
        ManifestSource::parse(&format!("{}/image-manifest.json", server.uri())).expect("url");
    let retry = RetryConfig {
        initial_delay: Duration::from_millis(10),
        ..RetryConfig::default()
    };
    let items = load_manifest(&reqwest_client(), &source, &retry)
        .await
        .expect("second attempt succeeds");
    assert_eq!(items, vec![item("a.png"), item("b.png")]);
}

fn reqwest_client() -> mistake_providers::reqwest::Client {
    mistake_providers::build_client(&mistake_providers::HttpSettings::default())
        .expect("client builds")
}
