//! Core domain types for Mistake or Not.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod events;
mod view;

pub use events::{EventKind, RankingEntry, TrackEvent};
pub use view::{Outcome, Phase, SessionView};

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Item identifiers
// ============================================================================

/// Opaque name of one catalog entry (a filename).
///
/// Guaranteed non-empty after trimming, so every tracked event and every
/// catalog slot refers to something presentable. The stored value is not
/// trimmed: it is the join key with the remote ranking and must round-trip
/// byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

#[derive(Debug, Error)]
#[error("item identifier must not be empty")]
pub struct EmptyItemIdError;

impl ItemId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyItemIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyItemIdError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ItemId {
    type Error = EmptyItemIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ItemId {
    type Error = EmptyItemIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ItemId> for String {
    fn from(value: ItemId) -> Self {
        value.0
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
