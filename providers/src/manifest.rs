//! Item manifest loading.
//!
//! The manifest is a JSON array of filenames, produced from the image directory
//! and served beside the assets (or read straight from disk).

use std::collections::HashSet;
use std::path::PathBuf;

use mistake_types::ItemId;
use url::Url;

use crate::ProviderError;
use crate::retry::{RetryConfig, send_with_retry};

/// Where the manifest lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Remote(Url),
    File(PathBuf),
}

impl ManifestSource {
    /// `http(s)://` strings are URLs; anything else is a filesystem path.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            crate::parse_endpoint(trimmed).map(Self::Remote)
        } else {
            Ok(Self::File(PathBuf::from(trimmed)))
        }
    }

    fn origin(&self) -> String {
        match self {
            Self::Remote(url) => url.to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Load and decode the manifest.
///
/// Remote manifests are fetched with bounded retry. The result may be empty;
/// an empty catalog is rejected later, when the session is built.
pub async fn load_manifest(
    client: &reqwest::Client,
    source: &ManifestSource,
    retry: &RetryConfig,
) -> Result<Vec<ItemId>, ProviderError> {
    let body = match source {
        ManifestSource::Remote(url) => {
            let response = send_with_retry(url, || client.get(url.clone()), retry).await?;
            response
                .bytes()
                .await
                .map_err(|e| ProviderError::transport(url, e))?
                .to_vec()
        }
        ManifestSource::File(path) => {
            tokio::fs::read(path)
                .await
                .map_err(|source| ProviderError::Io {
                    path: path.clone(),
                    source,
                })?
        }
    };

    let items = parse_manifest(&body).map_err(|reason| ProviderError::Malformed {
        origin: source.origin(),
        reason,
    })?;
    tracing::info!(origin = %source.origin(), items = items.len(), "Loaded manifest");
    Ok(items)
}

/// Decode a manifest body.
///
/// Blank and repeated names are dropped (first occurrence wins) rather than
/// failing the load: one bad filename should not hide every other image.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<ItemId>, String> {
    let names: Vec<String> = serde_json::from_slice(body).map_err(|e| e.to_string())?;

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(names.len());
    for name in names {
        match ItemId::new(name) {
            Ok(id) => {
                if seen.insert(id.clone()) {
                    items.push(id);
                } else {
                    tracing::debug!(item = %id, "Skipping duplicate manifest entry");
                }
            }
            Err(_) => tracing::warn!("Skipping blank manifest entry"),
        }
    }
    Ok(items)
}
