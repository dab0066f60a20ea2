//! Render-relevant session state.
//!
//! The presentation shell never reaches into the engine's internals; it reads a
//! [`SessionView`] snapshot each frame.

use crate::ItemId;

/// Session phase.
///
/// `Deciding` is the only transient state: a judgment was accepted, feedback is
/// on screen and exactly one transition back to `Idle` is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Deciding,
}

/// Result of one judgment. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub correct: bool,
    pub reward: u32,
}

impl Outcome {
    #[must_use]
    pub const fn correct(reward: u32) -> Self {
        Self {
            correct: true,
            reward,
        }
    }

    #[must_use]
    pub const fn incorrect() -> Self {
        Self {
            correct: false,
            reward: 0,
        }
    }
}

/// Snapshot of everything the shell needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub current: ItemId,
    pub cursor: usize,
    pub catalog_len: usize,
    pub score: u64,
    pub phase: Phase,
    pub feedback: Option<String>,
    /// Floating reward label, e.g. `+20`. Only present after a rewarded judgment.
    pub badge: Option<String>,
}

impl SessionView {
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.phase == Phase::Deciding
    }
}
