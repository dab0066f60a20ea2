//! Periodic ranking refresh.
//!
//! The loop fetches once immediately and then every period. Failures are
//! logged and skipped; the next tick tries again. At most one loop is live per
//! [`OrderSyncer`]: restarting cancels the previous loop before spawning.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable};
use mistake_providers::{ProviderError, RankingClient, ranked_ids};
use mistake_types::ItemId;
use tokio::time::MissedTickBehavior;

pub const MIN_REORDER_PERIOD: Duration = Duration::from_secs(1);
pub const MAX_REORDER_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

#[must_use]
pub fn clamp_period(period: Duration) -> Duration {
    period.clamp(MIN_REORDER_PERIOD, MAX_REORDER_PERIOD)
}

/// Where ranked ids come from.
pub trait RankingSource: Send + Sync + 'static {
    fn fetch_order(&self) -> impl Future<Output = Result<Vec<ItemId>, ProviderError>> + Send;
}

impl RankingSource for RankingClient {
    fn fetch_order(&self) -> impl Future<Output = Result<Vec<ItemId>, ProviderError>> + Send {
        async move { self.fetch().await.map(ranked_ids) }
    }
}

/// One fetch. `None` means "nothing to merge".
pub async fn sync_once<S: RankingSource + ?Sized>(source: &S) -> Option<Vec<ItemId>> {
    match source.fetch_order().await {
        Ok(order) if order.is_empty() => {
            tracing::debug!("Ranking is empty; keeping current order");
            None
        }
        Ok(order) => {
            tracing::debug!(items = order.len(), "Fetched ranking");
            Some(order)
        }
        Err(e) => {
            tracing::warn!("Error fetching ranking: {e}");
            None
        }
    }
}

/// Cancels the loop on drop.
#[derive(Debug)]
pub struct SyncHandle {
    abort_handle: AbortHandle,
    period: Duration,
}

impl SyncHandle {
    pub fn cancel(&self) {
        self.abort_handle.abort();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.abort_handle.is_aborted()
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Spawn the sync loop on the current runtime.
///
/// Outside a runtime nothing is spawned and the returned handle is already
/// cancelled.
pub fn spawn_sync_loop<S, F>(source: Arc<S>, period: Duration, mut on_order: F) -> SyncHandle
where
    S: RankingSource,
    F: FnMut(Vec<ItemId>) + Send + 'static,
{
    let period = clamp_period(period);
    let (abort_handle, abort_registration) = AbortHandle::new_pair();

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No runtime; ranking sync disabled");
        abort_handle.abort();
        return SyncHandle {
            abort_handle,
            period,
        };
    };

    let task = async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Some(order) = sync_once(source.as_ref()).await {
                on_order(order);
            }
        }
    };
    runtime.spawn(Abortable::new(task, abort_registration));
    tracing::info!(period_secs = period.as_secs(), "Started ranking sync");

    SyncHandle {
        abort_handle,
        period,
    }
}

/// Owns the single live sync loop for one source.
pub struct OrderSyncer<S: RankingSource> {
    source: Arc<S>,
    handle: Option<SyncHandle>,
}

impl<S: RankingSource> OrderSyncer<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            handle: None,
        }
    }

    /// (Re)start with `period`. Any previous loop is cancelled first.
    pub fn start<F>(&mut self, period: Duration, on_order: F)
    where
        F: FnMut(Vec<ItemId>) + Send + 'static,
    {
        self.stop();
        self.handle = Some(spawn_sync_loop(
            Arc::clone(&self.source),
            period,
            on_order,
        ));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_cancelled())
    }

    /// Period of the live loop, if any.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.handle
            .as_ref()
            .filter(|h| !h.is_cancelled())
            .map(SyncHandle::period)
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: RankingSource> Drop for OrderSyncer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
