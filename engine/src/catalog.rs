//! Ordered item catalog with a wrapping cursor.
//!
//! # Invariants
//!
//! - The catalog is never empty once constructed.
//! - Identifiers are unique.
//! - `cursor < len`.
//!
//! # Reorder policy
//!
//! [`Catalog::merge`] keeps the numeric cursor. A reorder mid-session does not
//! jump the visitor back to the first item, but the slot under the cursor may
//! now hold a different item. The cursor only moves if the merged catalog is
//! shorter than the old position, in which case it wraps.

use std::collections::HashSet;

use mistake_types::ItemId;
use thiserror::Error;

use crate::random::{RandomSource, uniform_index};
use crate::store::KeyValueStore;

/// Store key for the sticky starting cursor.
pub const START_INDEX_KEY: &str = "mistake.start_index";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("catalog has no items to present")]
pub struct EmptyCatalogError;

#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<ItemId>,
    cursor: usize,
}

impl Catalog {
    /// Build the catalog from the manifest and pick the starting cursor.
    pub fn open(
        items: Vec<ItemId>,
        store: &mut dyn KeyValueStore,
        random: &mut dyn RandomSource,
    ) -> Result<Self, EmptyCatalogError> {
        let items = dedupe(items);
        if items.is_empty() {
            return Err(EmptyCatalogError);
        }
        let cursor = start_cursor(items.len(), store, random);
        Ok(Self { items, cursor })
    }

    /// Replace the catalog wholesale and re-pick the starting cursor.
    ///
    /// No-op (returns `false`) when `items` is empty.
    pub fn load(
        &mut self,
        items: Vec<ItemId>,
        store: &mut dyn KeyValueStore,
        random: &mut dyn RandomSource,
    ) -> bool {
        let items = dedupe(items);
        if items.is_empty() {
            return false;
        }
        self.cursor = start_cursor(items.len(), store, random);
        self.items = items;
        true
    }

    /// Reorder to follow `remote_order`, restricted to ids already present.
    ///
    /// Unknown and repeated ids are dropped. Returns `false` and leaves the
    /// catalog untouched when nothing in `remote_order` is known locally.
    pub fn merge(&mut self, remote_order: &[ItemId]) -> bool {
        let known: HashSet<&str> = self.items.iter().map(ItemId::as_str).collect();
        let mut taken: HashSet<&str> = HashSet::with_capacity(known.len());

        let merged: Vec<ItemId> = remote_order
            .iter()
            .filter(|id| known.contains(id.as_str()) && taken.insert(id.as_str()))
            .cloned()
            .collect();

        if merged.is_empty() {
            return false;
        }

        let dropped = self.items.len() - merged.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Ranking omits some local items; catalog shrinks");
        }
        self.items = merged;
        if self.cursor >= self.items.len() {
            self.cursor %= self.items.len();
        }
        true
    }

    #[must_use]
    pub fn current(&self) -> &ItemId {
        &self.items[self.cursor]
    }

    #[must_use]
    pub fn peek_next(&self) -> &ItemId {
        &self.items[(self.cursor + 1) % self.items.len()]
    }

    /// Move to the next item, wrapping at the end.
    pub fn advance(&mut self) -> &ItemId {
        self.cursor = (self.cursor + 1) % self.items.len();
        self.current()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }
}

fn dedupe(items: Vec<ItemId>) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Persisted index if present (clamped into range), else a fresh uniform draw
/// that is persisted for the next visit.
fn start_cursor(len: usize, store: &mut dyn KeyValueStore, random: &mut dyn RandomSource) -> usize {
    if let Some(raw) = store.get(START_INDEX_KEY) {
        match raw.trim().parse::<usize>() {
            Ok(index) => return index.min(len - 1),
            Err(_) => tracing::warn!(value = %raw, "Ignoring unparseable start index"),
        }
    }

    let index = uniform_index(random, len);
    if let Err(e) = store.set(START_INDEX_KEY, &index.to_string()) {
        tracing::warn!("Failed to persist start index: {e}");
    }
    index
}
