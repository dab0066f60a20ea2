//! Best-effort asset prefetch.
//!
//! Prefetching hides download latency behind the feedback animation. Nothing
//! waits on it: if the bytes are not ready when the next item is shown, the
//! shell just fetches (or renders) late.

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use mistake_types::ItemId;
use tokio::sync::watch;
use url::Url;

use crate::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchState {
    Pending,
    Ready(Arc<[u8]>),
    Failed,
}

/// Resolves asset URLs and starts background downloads.
#[derive(Debug, Clone)]
pub struct Preloader {
    client: reqwest::Client,
    assets_base: Url,
}

impl Preloader {
    #[must_use]
    pub fn new(client: reqwest::Client, assets_base: Url) -> Self {
        Self {
            client,
            assets_base,
        }
    }

    /// `<assets-base>/<item>`, with the item name percent-encoded as one segment.
    pub fn asset_url(&self, item: &ItemId) -> Result<Url, ProviderError> {
        let mut url = self.assets_base.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::InvalidUrl {
                url: self.assets_base.to_string(),
                reason: "asset base cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push(item.as_str());
        Ok(url)
    }

    /// Start downloading `url` in the background.
    #[must_use]
    pub fn prefetch(&self, url: Url) -> PrefetchHandle {
        let (tx, rx) = watch::channel(PrefetchState::Pending);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.client.clone();
                let task_url = url.clone();
                let task = async move {
                    let state = match fetch_bytes(&client, &task_url).await {
                        Ok(bytes) => {
                            tracing::debug!(url = %task_url, bytes = bytes.len(), "Prefetched asset");
                            PrefetchState::Ready(bytes)
                        }
                        Err(e) => {
                            tracing::debug!(url = %task_url, "Prefetch failed: {e}");
                            PrefetchState::Failed
                        }
                    };
                    let _ = tx.send(state);
                };
                runtime.spawn(Abortable::new(task, abort_registration));
            }
            Err(_) => {
                tracing::warn!(url = %url, "No runtime; skipping prefetch");
                let _ = tx.send(PrefetchState::Failed);
            }
        }

        PrefetchHandle {
            url,
            state: rx,
            abort_handle,
        }
    }

    /// Resolve and prefetch an item's asset. `None` if the URL cannot be built.
    pub fn prefetch_item(&self, item: &ItemId) -> Option<PrefetchHandle> {
        match self.asset_url(item) {
            Ok(url) => Some(self.prefetch(url)),
            Err(e) => {
                tracing::warn!(item = %item, "Cannot prefetch: {e}");
                None
            }
        }
    }
}

async fn fetch_bytes(client: &reqwest::Client, url: &Url) -> Result<Arc<[u8]>, ProviderError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| ProviderError::transport(url, e))?;
    if !response.status().is_success() {
        return Err(ProviderError::from_status(url, response).await);
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::transport(url, e))?;
    Ok(Arc::from(bytes.as_ref()))
}

/// Handle to one in-flight prefetch. Dropping it cancels the download.
#[derive(Debug)]
pub struct PrefetchHandle {
    url: Url,
    state: watch::Receiver<PrefetchState>,
    abort_handle: AbortHandle,
}

impl PrefetchHandle {
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn state(&self) -> PrefetchState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), PrefetchState::Ready(_))
    }

    #[must_use]
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        match &*self.state.borrow() {
            PrefetchState::Ready(bytes) => Some(Arc::clone(bytes)),
            PrefetchState::Pending | PrefetchState::Failed => None,
        }
    }

    /// Wait until the download settles. A cancelled download reads as `Failed`.
    pub async fn wait(&mut self) -> PrefetchState {
        match self
            .state
            .wait_for(|state| !matches!(state, PrefetchState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => PrefetchState::Failed,
        }
    }

    pub fn cancel(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for PrefetchHandle {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}
