//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests: a mock backend that plays the
//! manifest host, asset host, ranking provider and event collector at once.

#![allow(dead_code)]

use std::time::Duration;

use mistake_engine::{App, KeyValueStore, MemoryStore, MistakeConfig, START_INDEX_KEY};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const MANIFEST_PATH: &str = "/image-manifest.json";
pub const RANKING_PATH: &str = "/api/photo-order";
pub const TRACKING_PATH: &str = "/api/track";

/// Start a mock backend serving `manifest` (a JSON array of names).
///
/// The ranking endpoint is left unmounted; use [`mount_ranking`].
pub async fn start_backend(manifest: &[&str]) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/images/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89_u8, b'P', b'N', b'G']))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TRACKING_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    server
}

/// Serve `order` as the ranking, most engaging first.
pub async fn mount_ranking(server: &MockServer, order: &[&str]) {
    let body: Vec<serde_json::Value> = order
        .iter()
        .enumerate()
        .map(|(i, id)| {
            serde_json::json!({
                "photoId": id,
                "engagementRatio": 1.0 / (i as f64 + 1.0),
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(RANKING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Config pointing every endpoint at `server`.
pub fn config_for(server: &MockServer, game: &str) -> MistakeConfig {
    let uri = server.uri();
    toml::from_str(&format!(
        r#"
[endpoints]
tracking = "{uri}{TRACKING_PATH}"
ranking = "{uri}{RANKING_PATH}"
manifest = "{uri}{MANIFEST_PATH}"
assets = "{uri}/images/"

[game]
{game}
"#
    ))
    .expect("test config parses")
}

/// Build an app from `config` starting at `cursor`.
pub async fn app_at(config: &MistakeConfig, cursor: usize) -> App {
    let mut store = MemoryStore::new();
    store
        .set(START_INDEX_KEY, &cursor.to_string())
        .expect("memory store accepts writes");
    App::from_config(config, &mut store)
        .await
        .expect("session starts")
}

/// `(photoId, event)` pairs the collector has received so far.
pub async fn tracked_events(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path() == TRACKING_PATH)
        .filter_map(event_of)
        .collect()
}

fn event_of(req: &Request) -> Option<(String, String)> {
    let body: serde_json::Value = serde_json::from_slice(&req.body).ok()?;
    Some((
        body.get("photoId")?.as_str()?.to_string(),
        body.get("event")?.as_str()?.to_string(),
    ))
}

/// Poll until `expected` events have arrived or a few seconds pass.
pub async fn wait_for_events(server: &MockServer, expected: usize) -> Vec<(String, String)> {
    for _ in 0..200 {
        let events = tracked_events(server).await;
        if events.len() >= expected {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tracked_events(server).await
}

/// Tick `app` until `done` holds or a few seconds pass.
pub async fn tick_until(app: &mut App, mut done: impl FnMut(&App) -> bool) -> bool {
    for _ in 0..300 {
        app.tick();
        if done(app) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
