//! Repeat policy
//!
//! Resolves "next"/"previous" over a traversal order of `len` slots. The
//! traversal itself (positional or shuffled) never decides what happens at
//! the boundaries; this module does.

use crate::types::RepeatMode;

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the end of the order
    Forward,
    /// Towards the start of the order
    Backward,
}

/// Boundary policy for one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatPolicy {
    mode: RepeatMode,
    wrap_allowed: bool,
}

impl RepeatPolicy {
    /// Policy for the given mode
    pub fn new(mode: RepeatMode) -> Self {
        Self {
            mode,
            wrap_allowed: true,
        }
    }

    /// Whether `All` may wrap around (single playbacks never wrap)
    #[must_use]
    pub fn with_wrap(mut self, wrap_allowed: bool) -> Self {
        self.wrap_allowed = wrap_allowed;
        self
    }

    /// Repeat mode in effect
    pub fn mode(&self) -> RepeatMode {
        self.mode
    }

    /// Resolve the slot after (or before) `cursor` in an order of `len` slots
    ///
    /// Returns `None` for "no next"/"no previous". A cursor past the end is
    /// clamped to the last slot.
    pub fn resolve(&self, direction: Direction, cursor: usize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let cursor = cursor.min(len - 1);

        match (self.mode, direction) {
            (RepeatMode::One, _) => Some(cursor),
            (_, Direction::Forward) if cursor + 1 < len => Some(cursor + 1),
            (_, Direction::Backward) if cursor > 0 => Some(cursor - 1),
            (RepeatMode::All, Direction::Forward) if self.wrap_allowed => Some(0),
            (RepeatMode::All, Direction::Backward) if self.wrap_allowed => Some(len - 1),
            _ => None,
        }
    }
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self::new(RepeatMode::None)
    }
}
