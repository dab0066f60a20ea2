//! HTTP clients for the remote collaborators of a session.
//!
//! # Architecture
//!
//! - [`EventTracker`] - fire-and-forget `POST` of view/engagement events
//! - [`RankingClient`] - `GET` of the engagement-ordered photo list
//! - [`load_manifest`] - one-shot read of the item list (URL or local file)
//! - [`Preloader`] - best-effort prefetch of the next item's asset bytes
//!
//! All clients share one [`reqwest::Client`] built from [`HttpSettings`]; nothing
//! here holds global state, so tests can point every client at a mock server.
//!
//! # Error Handling
//!
//! Every fallible call returns [`ProviderError`]. Callers in the engine treat all
//! of them as transient: they are logged and the previous good state is kept.

mod manifest;
mod preload;
mod ranking;
pub mod retry;
mod tracking;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub use manifest::{ManifestSource, load_manifest, parse_manifest};
pub use mistake_types;
pub use preload::{PrefetchHandle, PrefetchState, Preloader};
pub use ranking::{RankingClient, parse_ranking, ranked_ids};
pub use reqwest;
pub use tracking::EventTracker;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Largest error body kept for logging.
const MAX_ERROR_BODY_BYTES: usize = 2 * 1024;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response from {origin}: {reason}")]
    Malformed { origin: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    pub(crate) fn transport(url: &Url, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) async fn from_status(url: &Url, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body = truncate_body(body);
        Self::Status {
            url: url.to_string(),
            status,
            body,
        }
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut cut = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Parse an endpoint URL, reporting which string was bad.
pub fn parse_endpoint(raw: &str) -> Result<Url, ProviderError> {
    Url::parse(raw.trim()).map_err(|e| ProviderError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Transport settings shared by every client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Whole-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("mistake/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Build the shared HTTP client.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(settings.timeout))
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.clone())
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .build()
        .map_err(ProviderError::Client)
}
