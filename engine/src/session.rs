//! The judgment state machine.
//!
//! ```text
//!   Idle --decide()--> Deciding --(transition_delay)--> Idle
//! ```
//!
//! `decide()` is accepted only from `Idle`. It reports engagement, draws the
//! outcome, shows feedback and schedules exactly one transition. The transition
//! timer is a spawned, abortable sleep whose completion arrives over a channel;
//! score and cursor change only when [`Session::tick`] (or
//! [`Session::next_transition`]) applies it. A stale completion (from a timer
//! that was superseded or torn down) is ignored.
//!
//! `View` is reported whenever the item on screen changes: at start, after a
//! transition advances the cursor, and after a reorder that moves a different
//! item under the cursor. It is never reported twice for the same item in a row.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable};
use mistake_providers::{EventTracker, PrefetchHandle, Preloader};
use mistake_types::{EventKind, ItemId, Outcome, Phase, SessionView};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::catalog::{Catalog, EmptyCatalogError};
use crate::config::{
    DEFAULT_FAILURE_FEEDBACK, DEFAULT_P_CORRECT, DEFAULT_REWARD_POINTS, DEFAULT_SUCCESS_FEEDBACK,
    DEFAULT_TRANSITION_DELAY,
};
use crate::random::{RandomSource, draw_outcome};
use crate::store::KeyValueStore;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    EmptyCatalog(#[from] EmptyCatalogError),
    #[error("a session needs a running tokio runtime")]
    NoRuntime,
}

/// Feedback templates. `{points}` is replaced with the reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackText {
    pub success: String,
    pub failure: String,
}

impl Default for FeedbackText {
    fn default() -> Self {
        Self {
            success: DEFAULT_SUCCESS_FEEDBACK.to_string(),
            failure: DEFAULT_FAILURE_FEEDBACK.to_string(),
        }
    }
}

impl FeedbackText {
    #[must_use]
    pub fn render(&self, outcome: Outcome) -> String {
        let template = if outcome.correct {
            &self.success
        } else {
            &self.failure
        };
        template.replace("{points}", &outcome.reward.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Probability in `[0, 1]` that a judgment is rewarded.
    pub p_correct: f64,
    pub reward_points: u32,
    pub transition_delay: Duration,
    /// Prefetch the next item's asset when a judgment is accepted.
    pub prefetch: bool,
    pub feedback: FeedbackText,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            p_correct: DEFAULT_P_CORRECT,
            reward_points: DEFAULT_REWARD_POINTS,
            transition_delay: DEFAULT_TRANSITION_DELAY,
            prefetch: true,
            feedback: FeedbackText::default(),
        }
    }
}

/// Receiver of behavioral events. Must return without waiting on the network.
pub trait EventSink: Send + Sync {
    fn emit(&self, item: &ItemId, kind: EventKind);
}

impl EventSink for EventTracker {
    fn emit(&self, item: &ItemId, kind: EventKind) {
        EventTracker::emit(self, item, kind);
    }
}

/// Drops every event. Used when no collector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _item: &ItemId, _kind: EventKind) {}
}

type DecisionId = u64;

struct PendingTransition {
    id: DecisionId,
    outcome: Outcome,
    abort_handle: AbortHandle,
}

pub struct Session {
    catalog: Catalog,
    settings: SessionSettings,
    events: Arc<dyn EventSink>,
    random: Box<dyn RandomSource>,
    preloader: Option<Preloader>,
    runtime: tokio::runtime::Handle,

    phase: Phase,
    score: u64,
    feedback: Option<String>,
    badge: Option<String>,
    last_viewed: Option<ItemId>,
    prefetch: Option<(ItemId, PrefetchHandle)>,

    pending: Option<PendingTransition>,
    next_decision: DecisionId,
    transitions_tx: mpsc::UnboundedSender<DecisionId>,
    transitions_rx: mpsc::UnboundedReceiver<DecisionId>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("catalog", &self.catalog)
            .field("phase", &self.phase)
            .field("score", &self.score)
            .field("pending", &self.pending.as_ref().map(|p| p.id))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build the catalog from `items` and start a session on it.
    ///
    /// Fails if `items` is empty or there is no tokio runtime.
    pub fn open(
        items: Vec<ItemId>,
        store: &mut dyn KeyValueStore,
        settings: SessionSettings,
        events: Arc<dyn EventSink>,
        mut random: Box<dyn RandomSource>,
    ) -> Result<Self, SessionError> {
        let catalog = Catalog::open(items, store, random.as_mut())?;
        Self::start(catalog, settings, events, random)
    }

    /// Start a session on an existing catalog. Reports `View` for the first item.
    pub fn start(
        catalog: Catalog,
        settings: SessionSettings,
        events: Arc<dyn EventSink>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let (transitions_tx, transitions_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            catalog,
            settings,
            events,
            random,
            preloader: None,
            runtime,
            phase: Phase::Idle,
            score: 0,
            feedback: None,
            badge: None,
            last_viewed: None,
            prefetch: None,
            pending: None,
            next_decision: 0,
            transitions_tx,
            transitions_rx,
        };
        tracing::info!(
            items = session.catalog.len(),
            cursor = session.catalog.cursor(),
            "Session started"
        );
        session.note_current();
        Ok(session)
    }

    #[must_use]
    pub fn with_preloader(mut self, preloader: Preloader) -> Self {
        self.preloader = Some(preloader);
        self
    }

    /// Submit a judgment on the current item.
    ///
    /// Returns the drawn outcome, or `None` if a previous judgment is still
    /// being shown. A rejected call has no side effects.
    pub fn decide(&mut self) -> Option<Outcome> {
        if self.phase == Phase::Deciding {
            tracing::debug!("Ignoring judgment while feedback is showing");
            return None;
        }

        let item = self.catalog.current().clone();
        self.events.emit(&item, EventKind::Engagement);

        if self.settings.prefetch {
            self.prefetch_next();
        }

        let outcome = draw_outcome(
            self.random.as_mut(),
            self.settings.p_correct,
            self.settings.reward_points,
        );
        self.feedback = Some(self.settings.feedback.render(outcome));
        self.badge = outcome.correct.then(|| format!("+{}", outcome.reward));
        self.phase = Phase::Deciding;
        self.schedule_transition(outcome);

        tracing::debug!(item = %item, correct = outcome.correct, reward = outcome.reward, "Judgment accepted");
        Some(outcome)
    }

    /// Apply any transition whose timer has fired. Returns whether one was applied.
    pub fn tick(&mut self) -> bool {
        let mut applied = false;
        while let Ok(id) = self.transitions_rx.try_recv() {
            applied |= self.complete_transition(id);
        }
        applied
    }

    /// Wait for the pending transition and apply it.
    ///
    /// Returns `false` immediately when nothing is pending.
    pub async fn next_transition(&mut self) -> bool {
        while self.pending.is_some() {
            let Some(id) = self.transitions_rx.recv().await else {
                return false;
            };
            if self.complete_transition(id) {
                return true;
            }
        }
        false
    }

    /// Merge a remote ranking into the catalog.
    ///
    /// Returns whether the order changed. Reports `View` if a different item is
    /// now under the cursor.
    pub fn apply_order(&mut self, order: &[ItemId]) -> bool {
        if !self.catalog.merge(order) {
            tracing::debug!("Ranking shares no items with the catalog; keeping order");
            return false;
        }
        tracing::debug!(items = self.catalog.len(), "Catalog reordered");
        self.note_current();
        true
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            current: self.catalog.current().clone(),
            cursor: self.catalog.cursor(),
            catalog_len: self.catalog.len(),
            score: self.score,
            phase: self.phase,
            feedback: self.feedback.clone(),
            badge: self.badge.clone(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn preloader(&self) -> Option<&Preloader> {
        self.preloader.as_ref()
    }

    /// The most recent prefetch, if any.
    #[must_use]
    pub fn prefetch(&self) -> Option<(&ItemId, &PrefetchHandle)> {
        self.prefetch.as_ref().map(|(item, handle)| (item, handle))
    }

    /// Cancel the pending transition and any in-flight prefetch.
    pub fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort_handle.abort();
            tracing::debug!(decision = pending.id, "Cancelled pending transition");
        }
        if let Some((_, handle)) = self.prefetch.take() {
            handle.cancel();
        }
    }

    fn prefetch_next(&mut self) {
        let Some(preloader) = &self.preloader else {
            return;
        };
        let next = self.catalog.peek_next().clone();
        if self.prefetch.as_ref().is_some_and(|(item, _)| *item == next) {
            return;
        }
        // Replacing the old handle drops it, which cancels its download.
        self.prefetch = preloader
            .prefetch_item(&next)
            .map(|handle| (next, handle));
    }

    fn schedule_transition(&mut self, outcome: Outcome) {
        let id = self.next_decision;
        self.next_decision += 1;

        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let delay = self.settings.transition_delay;
        let tx = self.transitions_tx.clone();
        let timer = async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(id);
        };
        self.runtime.spawn(Abortable::new(timer, abort_registration));

        if let Some(previous) = self.pending.replace(PendingTransition {
            id,
            outcome,
            abort_handle,
        }) {
            previous.abort_handle.abort();
        }
    }

    fn complete_transition(&mut self, id: DecisionId) -> bool {
        if self.pending.as_ref().is_none_or(|p| p.id != id) {
            tracing::debug!(decision = id, "Ignoring stale transition");
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };

        if pending.outcome.correct {
            self.score += u64::from(pending.outcome.reward);
        }
        self.feedback = None;
        self.badge = None;
        self.catalog.advance();
        self.phase = Phase::Idle;
        self.note_current();
        true
    }

    fn note_current(&mut self) {
        let current = self.catalog.current();
        if self.last_viewed.as_ref() == Some(current) {
            return;
        }
        let current = current.clone();
        self.events.emit(&current, EventKind::View);
        self.last_viewed = Some(current);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
