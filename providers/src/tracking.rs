//! Event collector client.

use mistake_types::{EventKind, ItemId, TrackEvent};
use url::Url;

use crate::ProviderError;

/// Fire-and-forget reporter of view/engagement events.
///
/// Each event is one `POST` with body `{"photoId": ..., "event": ...}`. No retry,
/// no idempotency key: losing an event is acceptable, slowing the session is not.
#[derive(Debug, Clone)]
pub struct EventTracker {
    client: reqwest::Client,
    endpoint: Url,
}

impl EventTracker {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Report an event in the background.
    ///
    /// Returns immediately. Failures are logged and dropped. Outside a tokio
    /// runtime the event is dropped with a warning.
    pub fn emit(&self, item: &ItemId, kind: EventKind) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(item = %item, event = kind.as_str(), "No runtime; dropping event");
            return;
        };

        let tracker = self.clone();
        let item = item.clone();
        handle.spawn(async move {
            if let Err(e) = tracker.send(&item, kind).await {
                tracing::warn!(item = %item, event = kind.as_str(), "Error tracking event: {e}");
            }
        });
    }

    /// Send one event and wait for the collector's status.
    pub async fn send(&self, item: &ItemId, kind: EventKind) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&TrackEvent::new(item, kind))
            .send()
            .await
            .map_err(|e| ProviderError::transport(&self.endpoint, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(&self.endpoint, response).await);
        }

        tracing::debug!(item = %item, event = kind.as_str(), "Tracked event");
        Ok(())
    }
}
