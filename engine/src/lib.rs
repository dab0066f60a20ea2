//! Core engine for Mistake or Not: session state machine and catalog ordering.
//!
//! This crate contains the App state machine without TUI dependencies. The
//! shell drives it from a frame loop: input goes in through [`App::decide`] and
//! [`App::set_reorder_period`], [`App::tick`] applies whatever the background
//! tasks produced since the last frame, and [`App::view`] is the only thing
//! drawn.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

pub use mistake_providers::{
    self, EventTracker, HttpSettings, ManifestSource, PrefetchHandle, PrefetchState, Preloader,
    ProviderError, RankingClient,
};
pub use mistake_types::{
    EmptyItemIdError, EventKind, ItemId, Outcome, Phase, RankingEntry, SessionView,
};

mod catalog;
mod config;
mod random;
mod session;
mod store;
mod sync;

pub use catalog::{Catalog, EmptyCatalogError, START_INDEX_KEY};
pub use config::{
    ConfigError, Endpoints, MistakeConfig, config_path, expand_env_vars, period_from_hours,
};
pub use random::{RandomSource, ScriptedRandom, ThreadRandom, draw_outcome, uniform_index};
pub use session::{EventSink, FeedbackText, NoopSink, Session, SessionError, SessionSettings};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use sync::{
    MAX_REORDER_PERIOD, MIN_REORDER_PERIOD, OrderSyncer, RankingSource, SyncHandle,
    clamp_period, spawn_sync_loop, sync_once,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

// ============================================================================
// App - one session plus its ranking sync
// ============================================================================

/// One visitor session and the loop that keeps its order fresh.
///
/// Rankings arrive from the sync task over a channel and are merged on the
/// next [`App::tick`], so the catalog is only ever touched from the frame loop.
pub struct App<S: RankingSource = RankingClient> {
    session: Session,
    syncer: OrderSyncer<S>,
    orders_tx: mpsc::UnboundedSender<Vec<ItemId>>,
    orders_rx: mpsc::UnboundedReceiver<Vec<ItemId>>,
    reorder_period: Duration,
}

impl App<RankingClient> {
    /// Build everything from configuration.
    ///
    /// The manifest is the one startup precondition: it is fetched with bounded
    /// retry, and an empty or unreachable manifest is an error. The ranking
    /// and collector endpoints are only checked for syntax here.
    pub async fn from_config(
        config: &MistakeConfig,
        store: &mut dyn KeyValueStore,
    ) -> Result<Self, AppError> {
        let endpoints = config.endpoints();
        let client = mistake_providers::build_client(&config.http_settings())?;

        let manifest = ManifestSource::parse(&endpoints.manifest)?;
        let items = mistake_providers::load_manifest(
            &client,
            &manifest,
            &mistake_providers::retry::RetryConfig::default(),
        )
        .await?;

        let tracker = EventTracker::new(
            client.clone(),
            mistake_providers::parse_endpoint(&endpoints.tracking)?,
        );
        let ranking = RankingClient::new(
            client.clone(),
            mistake_providers::parse_endpoint(&endpoints.ranking)?,
        );
        let preloader = Preloader::new(client, mistake_providers::parse_endpoint(&endpoints.assets)?);

        let session = Session::open(
            items,
            store,
            config.session_settings(),
            Arc::new(tracker),
            Box::new(ThreadRandom),
        )?
        .with_preloader(preloader);

        Ok(Self::new(session, ranking, config.reorder_period()))
    }
}

impl<S: RankingSource> App<S> {
    /// Wrap a started session and begin syncing from `ranking` every `reorder_period`.
    pub fn new(session: Session, ranking: S, reorder_period: Duration) -> Self {
        let (orders_tx, orders_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            session,
            syncer: OrderSyncer::new(ranking),
            orders_tx,
            orders_rx,
            reorder_period: clamp_period(reorder_period),
        };
        app.restart_sync();
        app
    }

    fn restart_sync(&mut self) {
        let tx = self.orders_tx.clone();
        self.syncer.start(self.reorder_period, move |order| {
            let _ = tx.send(order);
        });
    }

    /// Apply fetched rankings and fired transitions. Returns whether the view changed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        while let Ok(order) = self.orders_rx.try_recv() {
            changed |= self.session.apply_order(&order);
        }
        changed |= self.session.tick();
        changed
    }

    /// Submit a judgment. `None` while feedback for the previous one is showing.
    pub fn decide(&mut self) -> Option<Outcome> {
        self.session.decide()
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn reorder_period(&self) -> Duration {
        self.reorder_period
    }

    /// Change the ranking refresh period.
    ///
    /// The period is clamped; the loop restarts (fetching immediately) only if
    /// the clamped value differs from the current one. Returns whether it did.
    pub fn set_reorder_period(&mut self, period: Duration) -> bool {
        let period = clamp_period(period);
        if period == self.reorder_period && self.syncer.is_running() {
            return false;
        }
        tracing::info!(period_secs = period.as_secs(), "Reorder period changed");
        self.reorder_period = period;
        self.restart_sync();
        true
    }

    pub fn is_syncing(&self) -> bool {
        self.syncer.is_running()
    }

    /// Where the shell should load `item` from.
    pub fn asset_url(&self, item: &ItemId) -> Option<Url> {
        let preloader = self.session.preloader()?;
        match preloader.asset_url(item) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(item = %item, "No asset URL: {e}");
                None
            }
        }
    }

    /// State of the latest prefetch, if one was started.
    pub fn prefetch_status(&self) -> Option<(ItemId, PrefetchState)> {
        self.session
            .prefetch()
            .map(|(item, handle)| (item.clone(), handle.state()))
    }

    /// Stop the sync loop and cancel pending timers and downloads.
    pub fn shutdown(&mut self) {
        self.syncer.stop();
        self.session.teardown();
        tracing::info!("Session shut down");
    }
}

impl<S: RankingSource> Drop for App<S> {
    fn drop(&mut self) {
        self.syncer.stop();
    }
}
