//! Ranking provider client.

use mistake_types::{ItemId, RankingEntry};
use url::Url;

use crate::ProviderError;

/// Client for `GET <ranking-endpoint>`.
#[derive(Debug, Clone)]
pub struct RankingClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl RankingClient {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the current ranking, most relevant first.
    ///
    /// An empty array is returned as `Ok(vec![])`; deciding that it means "no
    /// data" is the caller's business. Anything that is not an array of
    /// objects with a non-empty `photoId` is [`ProviderError::Malformed`].
    pub async fn fetch(&self) -> Result<Vec<RankingEntry>, ProviderError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| ProviderError::transport(&self.endpoint, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(&self.endpoint, response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(&self.endpoint, e))?;

        parse_ranking(&body).map_err(|reason| ProviderError::Malformed {
            origin: self.endpoint.to_string(),
            reason,
        })
    }
}

/// Decode a ranking payload. One bad entry rejects the whole payload.
pub fn parse_ranking(body: &[u8]) -> Result<Vec<RankingEntry>, String> {
    serde_json::from_slice::<Vec<RankingEntry>>(body).map_err(|e| e.to_string())
}

/// Ids in ranking order.
#[must_use]
pub fn ranked_ids(entries: Vec<RankingEntry>) -> Vec<ItemId> {
    entries.into_iter().map(|entry| entry.photo_id).collect()
}
