//! Shuffle engine
//!
//! Maintains a randomized traversal order over queue positions. The queue
//! itself is never reordered; shuffling only changes which position is
//! visited next.

use crate::repeat::{Direction, RepeatPolicy};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A permutation of queue positions plus a pointer into it
///
/// The slot at `position` is the queue position currently loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOrder {
    indices: Vec<usize>,
    position: usize,
}

impl ShuffleOrder {
    /// Queue positions in traversal order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Current slot in the permutation
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the permutation is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Randomized traversal over the queue
///
/// Disabled by default. While disabled, traversal is positional and this
/// engine holds no state.
#[derive(Debug)]
pub struct ShuffleEngine {
    order: Option<ShuffleOrder>,
    rng: StdRng,
}

impl ShuffleEngine {
    /// Engine seeded from OS entropy
    pub fn new() -> Self {
        Self {
            order: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Engine with a fixed seed, for reproducible orders
    pub fn with_seed(seed: u64) -> Self {
        Self {
            order: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Whether shuffled traversal is active
    pub fn is_enabled(&self) -> bool {
        self.order.is_some()
    }

    /// Current permutation, if enabled
    pub fn order(&self) -> Option<&ShuffleOrder> {
        self.order.as_ref()
    }

    /// Build a permutation of `len` positions with `anchor` first
    ///
    /// Every other position follows exactly once in uniformly random order
    /// (Fisher-Yates). An out-of-range anchor falls back to position 0.
    pub fn enable(&mut self, anchor: usize, len: usize) {
        let mut indices: Vec<usize> = (0..len).collect();
        if len > 0 {
            let anchor = if anchor < len { anchor } else { 0 };
            indices.swap(0, anchor);
            indices[1..].shuffle(&mut self.rng);
        }
        self.order = Some(ShuffleOrder {
            indices,
            position: 0,
        });
    }

    /// Discard the permutation; traversal reverts to positional order
    pub fn disable(&mut self) {
        self.order = None;
    }

    /// Rebuild after a structural queue mutation (no-op while disabled)
    pub fn regenerate(&mut self, anchor: Option<usize>, len: usize) {
        if self.is_enabled() {
            self.enable(anchor.unwrap_or(0), len);
        }
    }

    /// Extend the permutation with `new_count` freshly appended tail positions
    ///
    /// Already-visited slots and the current pointer are untouched; the new
    /// positions are shuffled among themselves and placed after the existing
    /// permutation.
    pub fn on_append(&mut self, new_count: usize) {
        let Some(order) = self.order.as_mut() else {
            return;
        };
        let start = order.indices.len();
        let mut tail: Vec<usize> = (start..start + new_count).collect();
        tail.shuffle(&mut self.rng);
        order.indices.extend(tail);
    }

    /// Advance the pointer; boundary behavior comes from `policy`
    ///
    /// Returns the queue position to load, or `None` when the policy says
    /// there is no next track.
    pub fn next(&mut self, policy: &RepeatPolicy) -> Option<usize> {
        self.step(policy, Direction::Forward)
    }

    /// Retreat the pointer; boundary behavior comes from `policy`
    pub fn previous(&mut self, policy: &RepeatPolicy) -> Option<usize> {
        self.step(policy, Direction::Backward)
    }

    fn step(&mut self, policy: &RepeatPolicy, direction: Direction) -> Option<usize> {
        let order = self.order.as_mut()?;
        let target = policy.resolve(direction, order.position, order.indices.len())?;
        order.position = target;
        order.indices.get(target).copied()
    }

    /// Queue positions that follow the pointer, without wrapping
    pub fn upcoming(&self, count: usize) -> Vec<usize> {
        self.order
            .as_ref()
            .map(|order| {
                order
                    .indices
                    .iter()
                    .skip(order.position + 1)
                    .take(count)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Point the permutation at the slot holding queue position `index`
    ///
    /// Used when the listener jumps to an explicit queue position.
    pub fn point_at(&mut self, index: usize) {
        if let Some(order) = self.order.as_mut() {
            if let Some(slot) = order.indices.iter().position(|&i| i == index) {
                order.position = slot;
            }
        }
    }
}

impl Default for ShuffleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepeatMode;
    use std::collections::HashSet;

    fn assert_permutation(order: &ShuffleOrder, len: usize) {
        let seen: HashSet<usize> = order.indices().iter().copied().collect();
        assert_eq!(order.len(), len);
        assert_eq!(seen.len(), len);
        assert!(seen.iter().all(|&i| i < len));
    }

    #[test]
    fn enable_places_anchor_first() {
        let mut engine = ShuffleEngine::with_seed(7);
        engine.enable(1, 4);

        let order = engine.order().unwrap();
        assert_eq!(order.indices()[0], 1);
        assert_eq!(order.position(), 0);
        assert_permutation(order, 4);

        let rest: HashSet<usize> = order.indices()[1..].iter().copied().collect();
        assert_eq!(rest, HashSet::from([0, 2, 3]));
    }

    #[test]
    fn out_of_range_anchor_defaults_to_zero() {
        let mut engine = ShuffleEngine::with_seed(1);
        engine.enable(99, 5);
        assert_eq!(engine.order().unwrap().indices()[0], 0);
    }

    #[test]
    fn shuffle_changes_order() {
        let mut engine = ShuffleEngine::with_seed(42);
        engine.enable(0, 50);
        let positional: Vec<usize> = (0..50).collect();

        // 49! orderings, a fixed seed will not hit the identity
        assert_ne!(engine.order().unwrap().indices(), positional.as_slice());
    }

    #[test]
    fn disable_discards_order() {
        let mut engine = ShuffleEngine::with_seed(3);
        engine.enable(0, 3);
        engine.disable();
        assert!(!engine.is_enabled());
        assert!(engine.next(&RepeatPolicy::default()).is_none());
    }

    #[test]
    fn on_append_extends_without_touching_prefix() {
        let mut engine = ShuffleEngine::with_seed(9);
        engine.enable(2, 5);
        engine.next(&RepeatPolicy::default());
        let before = engine.order().unwrap().clone();

        engine.on_append(4);

        let after = engine.order().unwrap();
        assert_eq!(&after.indices()[..5], before.indices());
        assert_eq!(after.position(), before.position());
        let tail: HashSet<usize> = after.indices()[5..].iter().copied().collect();
        assert_eq!(tail, HashSet::from([5, 6, 7, 8]));
        assert_permutation(after, 9);
    }

    #[test]
    fn on_append_while_disabled_is_noop() {
        let mut engine = ShuffleEngine::with_seed(9);
        engine.on_append(3);
        assert!(engine.order().is_none());
    }

    #[test]
    fn traversal_visits_every_position_once() {
        let mut engine = ShuffleEngine::with_seed(11);
        engine.enable(3, 6);
        let policy = RepeatPolicy::new(RepeatMode::None);

        let mut visited = vec![3];
        while let Some(index) = engine.next(&policy) {
            visited.push(index);
        }
        visited.sort_unstable();
        assert_eq!(visited, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn repeat_all_wraps_to_first_slot() {
        let mut engine = ShuffleEngine::with_seed(5);
        engine.enable(2, 3);
        let policy = RepeatPolicy::new(RepeatMode::All);

        engine.next(&policy);
        engine.next(&policy);
        assert_eq!(engine.next(&policy), Some(2));
        assert_eq!(engine.order().unwrap().position(), 0);
    }

    #[test]
    fn previous_walks_back_through_permutation() {
        let mut engine = ShuffleEngine::with_seed(5);
        engine.enable(0, 4);
        let policy = RepeatPolicy::new(RepeatMode::None);
        let second = engine.next(&policy).unwrap();
        engine.next(&policy);

        assert_eq!(engine.previous(&policy), Some(second));
        assert_eq!(engine.previous(&policy), Some(0));
        assert_eq!(engine.previous(&policy), None);
    }

    #[test]
    fn upcoming_lists_following_slots() {
        let mut engine = ShuffleEngine::with_seed(5);
        engine.enable(0, 4);
        let expected: Vec<usize> = engine.order().unwrap().indices()[1..3].to_vec();
        assert_eq!(engine.upcoming(2), expected);
    }

    #[test]
    fn point_at_moves_pointer_to_slot() {
        let mut engine = ShuffleEngine::with_seed(5);
        engine.enable(0, 5);
        let target = engine.order().unwrap().indices()[3];

        engine.point_at(target);
        assert_eq!(engine.order().unwrap().position(), 3);
    }

    #[test]
    fn empty_queue_enables_empty_order() {
        let mut engine = ShuffleEngine::with_seed(5);
        engine.enable(0, 0);
        assert!(engine.order().unwrap().is_empty());

        engine.on_append(2);
        assert_permutation(engine.order().unwrap(), 2);
    }
}
