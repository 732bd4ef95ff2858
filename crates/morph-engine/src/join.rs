//! Barrier join ("combine latest") over a fixed number of inputs.
//!
//! One slot per input holds that input's latest snapshot. Nothing is
//! produced until every slot has been filled at least once; from then on
//! every offer produces the concatenation of all slots in input order.
//! [`reset`](BarrierJoin::reset) empties every slot, which is how a
//! membership change starts the barrier over.

use std::sync::Arc;

use crate::producer::Snapshot;

/// Slot table for a barrier join.
#[derive(Debug)]
pub struct BarrierJoin<T> {
    slots: Vec<Option<Snapshot<T>>>,
    ready: usize,
}

impl<T> BarrierJoin<T> {
    /// Create a join over `width` inputs with every slot empty.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            slots: vec![None; width],
            ready: 0,
        }
    }

    /// Number of inputs.
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    /// Number of inputs that have delivered since the last reset.
    pub fn ready(&self) -> usize {
        self.ready
    }

    /// Whether every input has delivered since the last reset.
    pub fn is_complete(&self) -> bool {
        self.ready == self.slots.len()
    }

    /// Empty every slot and resize to `width`.
    pub fn reset(&mut self, width: usize) {
        self.slots.clear();
        self.slots.resize(width, None);
        self.ready = 0;
    }
}

impl<T: Clone> BarrierJoin<T> {
    /// Record a snapshot from input `slot`.
    ///
    /// Returns the merged snapshot if the barrier is (now) complete.
    /// Offers for slots outside the current width are ignored.
    pub fn offer(&mut self, slot: usize, snapshot: Snapshot<T>) -> Option<Snapshot<T>> {
        let entry = self.slots.get_mut(slot)?;
        if entry.is_none() {
            self.ready += 1;
        }
        *entry = Some(snapshot);
        self.is_complete().then(|| self.merged())
    }

    fn merged(&self) -> Snapshot<T> {
        let total = self.slots.iter().flatten().map(|s| s.len()).sum();
        let mut merged = Vec::with_capacity(total);
        for snapshot in self.slots.iter().flatten() {
            merged.extend_from_slice(snapshot);
        }
        Arc::from(merged)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snap(items: &[u32]) -> Snapshot<u32> {
        Arc::from(items)
    }

    #[test]
    fn withholds_until_every_slot_filled() {
        let mut join = BarrierJoin::new(3);
        assert!(join.offer(0, snap(&[1])).is_none());
        assert!(join.offer(2, snap(&[3])).is_none());
        assert_eq!(join.ready(), 2);
        let merged = join.offer(1, snap(&[2])).unwrap();
        assert_eq!(&*merged, &[1, 2, 3]);
    }

    #[test]
    fn repeated_offer_from_one_slot_does_not_count_twice() {
        let mut join = BarrierJoin::new(2);
        assert!(join.offer(0, snap(&[1])).is_none());
        assert!(join.offer(0, snap(&[9])).is_none());
        assert_eq!(join.ready(), 1);
        let merged = join.offer(1, snap(&[2])).unwrap();
        assert_eq!(&*merged, &[9, 2]);
    }

    #[test]
    fn emits_on_every_offer_once_complete() {
        let mut join = BarrierJoin::new(2);
        let _ = join.offer(0, snap(&[1]));
        let _ = join.offer(1, snap(&[2]));
        assert_eq!(&*join.offer(1, snap(&[5, 6])).unwrap(), &[1, 5, 6]);
        assert_eq!(&*join.offer(0, snap(&[])).unwrap(), &[5, 6]);
    }

    #[test]
    fn reset_starts_barrier_over() {
        let mut join = BarrierJoin::new(1);
        assert!(join.offer(0, snap(&[1])).is_some());
        join.reset(2);
        assert!(!join.is_complete());
        assert!(join.offer(0, snap(&[1])).is_none());
        assert!(join.offer(1, snap(&[2])).is_some());
    }

    #[test]
    fn out_of_range_offer_ignored() {
        let mut join = BarrierJoin::new(1);
        assert!(join.offer(4, snap(&[1])).is_none());
        assert_eq!(join.ready(), 0);
    }

    #[test]
    fn zero_width_is_trivially_complete() {
        let join: BarrierJoin<u32> = BarrierJoin::new(0);
        assert!(join.is_complete());
        assert_eq!(join.width(), 0);
    }

    proptest! {
        #[test]
        fn merged_is_concatenation_of_latest(
            width in 1usize..6,
            offers in prop::collection::vec((0usize..6, prop::collection::vec(any::<u32>(), 0..4)), 0..40),
        ) {
            let mut join = BarrierJoin::new(width);
            let mut latest: Vec<Option<Vec<u32>>> = vec![None; width];

            for (slot, items) in offers {
                let result = join.offer(slot, Arc::from(items.as_slice()));
                if slot < width {
                    latest[slot] = Some(items);
                }
                let all_filled = latest.iter().all(Option::is_some);
                if all_filled && slot < width {
                    let expected: Vec<u32> = latest.iter().flatten().flatten().copied().collect();
                    prop_assert_eq!(result.as_deref(), Some(expected.as_slice()));
                } else {
                    prop_assert!(result.is_none());
                }
            }
        }
    }
}
