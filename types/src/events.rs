//! Wire shapes shared with the event collector and the ranking provider.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ItemId;

/// Kind of behavioral event reported to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The item became the one on screen.
    View,
    /// The visitor submitted a judgment on the item.
    Engagement,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Engagement => "engagement",
        }
    }
}

/// Body of `POST <collector>`: `{"photoId": "...", "event": "view"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent<'a> {
    pub photo_id: &'a ItemId,
    pub event: EventKind,
}

impl<'a> TrackEvent<'a> {
    #[must_use]
    pub fn new(photo_id: &'a ItemId, event: EventKind) -> Self {
        Self { photo_id, event }
    }
}

/// One element of the ranking provider's response.
///
/// Only `photo_id` order is consumed; the ratio is kept for logging. A ratio
/// that is not a number reads as `None` instead of rejecting the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub photo_id: ItemId,
    #[serde(default, deserialize_with = "lenient_ratio")]
    pub engagement_ratio: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RatioField {
    Number(f64),
    Other(IgnoredAny),
}

fn lenient_ratio<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RatioField::deserialize(deserializer)? {
        RatioField::Number(ratio) => Some(ratio),
        RatioField::Other(_) => None,
    })
}
