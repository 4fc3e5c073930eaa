//! Sliding block windows over the swaps of a pool.
//!
//! Swaps are appended in total order and looked up by block neighbourhood.
//! Nothing ever reorders a window: a swap which does not strictly follow the
//! last one is an `OrderingViolation`.

use crate::types::{OrderKey, PoolId, SwapEvent};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingViolation {
    #[error("swap {key} appears twice in {pool}")]
    Duplicate { pool: PoolId, key: OrderKey },
    #[error("swap {key} in {pool} arrived after {previous}")]
    OutOfOrder {
        pool: PoolId,
        previous: OrderKey,
        key: OrderKey,
    },
    #[error("swap {key} of {found} was routed to {pool}")]
    ForeignPool {
        pool: PoolId,
        found: PoolId,
        key: OrderKey,
    },
}

/// The swaps of a single pool which are still within reach of a pending
/// victim, ordered by `OrderKey`
#[derive(Debug, Clone)]
pub struct BlockWindow {
    pool_id: PoolId,
    swaps: VecDeque<SwapEvent>,
}

impl BlockWindow {
    pub fn new(pool_id: PoolId) -> Self {
        Self {
            pool_id,
            swaps: VecDeque::new(),
        }
    }

    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    /// The key of the newest swap
    pub fn last_key(&self) -> Option<OrderKey> {
        self.swaps.back().map(|swap| swap.key)
    }

    /// Appends a swap which must strictly follow every swap seen so far
    pub fn push(&mut self, swap: SwapEvent) -> Result<(), OrderingViolation> {
        if swap.pool_id != self.pool_id {
            return Err(OrderingViolation::ForeignPool {
                pool: self.pool_id,
                found: swap.pool_id,
                key: swap.key,
            });
        }
        if let Some(previous) = self.last_key() {
            if swap.key == previous {
                return Err(OrderingViolation::Duplicate {
                    pool: self.pool_id,
                    key: swap.key,
                });
            }
            if swap.key < previous {
                return Err(OrderingViolation::OutOfOrder {
                    pool: self.pool_id,
                    previous,
                    key: swap.key,
                });
            }
        }
        self.swaps.push_back(swap);
        Ok(())
    }

    pub fn get(&self, key: &OrderKey) -> Option<&SwapEvent> {
        let idx = self.swaps.binary_search_by_key(key, |swap| swap.key).ok()?;
        self.swaps.get(idx)
    }

    /// All swaps whose block lies in `[center - radius, center + radius]`, in
    /// total order
    pub fn swaps_in_block_range(
        &self,
        center: u64,
        radius: u64,
    ) -> impl Iterator<Item = &SwapEvent> + '_ {
        let low = center.saturating_sub(radius);
        let high = center.saturating_add(radius);
        let start = self.swaps.partition_point(|swap| swap.block_number() < low);
        let end = self.swaps.partition_point(|swap| swap.block_number() <= high);
        self.swaps.range(start..end.max(start))
    }

    /// Drops every swap older than `block`, returning how many were dropped
    pub fn evict_before(&mut self, block: u64) -> usize {
        let count = self.swaps.partition_point(|swap| swap.block_number() < block);
        self.swaps.drain(..count);
        count
    }

    pub fn clear(&mut self) {
        self.swaps.clear();
    }
}

/// A set of `BlockWindow`s, one per pool, built from a single stream of swaps
#[derive(Debug, Clone, Default)]
pub struct BlockWindowIndex {
    windows: BTreeMap<PoolId, BlockWindow>,
}

impl BlockWindowIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a swap to the window of its pool
    pub fn push(&mut self, swap: SwapEvent) -> Result<(), OrderingViolation> {
        self.windows
            .entry(swap.pool_id)
            .or_insert_with(|| BlockWindow::new(swap.pool_id))
            .push(swap)
    }

    pub fn extend(
        &mut self,
        swaps: impl IntoIterator<Item = SwapEvent>,
    ) -> Result<(), OrderingViolation> {
        for swap in swaps {
            self.push(swap)?;
        }
        Ok(())
    }

    pub fn window(&self, pool_id: &PoolId) -> Option<&BlockWindow> {
        self.windows.get(pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolId> + '_ {
        self.windows.keys()
    }

    /// The swaps of `pool_id` in `[center - radius, center + radius]`
    pub fn swaps_in_block_range(
        &self,
        pool_id: &PoolId,
        center: u64,
        radius: u64,
    ) -> Vec<&SwapEvent> {
        self.windows
            .get(pool_id)
            .map(|window| window.swaps_in_block_range(center, radius).collect())
            .unwrap_or_default()
    }

    /// Evicts every swap older than `block` in all pools
    pub fn evict_before(&mut self, block: u64) -> usize {
        let evicted = self
            .windows
            .values_mut()
            .map(|window| window.evict_before(block))
            .sum();
        self.windows.retain(|_, window| !window.is_empty());
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn window_with(blocks: &[(u64, u64)]) -> BlockWindow {
        let mut window = BlockWindow::new(pool());
        for (block, tx) in blocks {
            window.push(SwapBuilder::new(pool(), *block, *tx).build()).unwrap();
        }
        window
    }

    #[test]
    fn range_is_inclusive_around_center() {
        let window = window_with(&[(98, 0), (99, 0), (99, 4), (100, 1), (101, 0), (102, 0)]);
        let found: Vec<_> = window.swaps_in_block_range(100, 1).collect();
        assert_eq!(positions(&found), vec![(99, 0), (99, 4), (100, 1), (101, 0)]);

        let found: Vec<_> = window.swaps_in_block_range(100, 0).collect();
        assert_eq!(positions(&found), vec![(100, 1)]);

        assert_eq!(window.swaps_in_block_range(200, 1).count(), 0);
        // no underflow at genesis
        assert_eq!(window.swaps_in_block_range(0, 1).count(), 0);
    }

    #[test]
    fn rejects_duplicates_and_reordering() {
        let mut window = window_with(&[(100, 1)]);
        assert_eq!(
            window.push(SwapBuilder::new(pool(), 100, 1).build()),
            Err(OrderingViolation::Duplicate {
                pool: pool(),
                key: OrderKey::new(100, 1, 0)
            })
        );
        assert!(matches!(
            window.push(SwapBuilder::new(pool(), 100, 0).build()),
            Err(OrderingViolation::OutOfOrder { .. })
        ));
        assert!(matches!(
            window.push(SwapBuilder::new(pool_n(2), 101, 0).build()),
            Err(OrderingViolation::ForeignPool { .. })
        ));
        // same tx, later log
        window
            .push(SwapBuilder::new(pool(), 100, 1).log_index(3).build())
            .unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn evicts_old_blocks() {
        let mut window = window_with(&[(98, 0), (99, 0), (99, 4), (100, 1)]);
        assert_eq!(window.evict_before(99), 1);
        assert_eq!(window.evict_before(99), 0);
        assert!(window.get(&OrderKey::new(99, 4, 0)).is_some());
        assert!(window.get(&OrderKey::new(98, 0, 0)).is_none());
        assert_eq!(window.evict_before(1_000), 3);
        assert!(window.is_empty());
    }

    #[test]
    fn index_separates_pools() {
        let mut index = BlockWindowIndex::new();
        index
            .extend(vec![
                SwapBuilder::new(pool_n(1), 100, 0).build(),
                SwapBuilder::new(pool_n(2), 100, 1).build(),
                SwapBuilder::new(pool_n(1), 101, 0).build(),
                SwapBuilder::new(pool_n(2), 103, 0).build(),
            ])
            .unwrap();

        let found = index.swaps_in_block_range(&pool_n(1), 100, 1);
        assert_eq!(positions(&found), vec![(100, 0), (101, 0)]);
        let found = index.swaps_in_block_range(&pool_n(2), 101, 1);
        assert_eq!(positions(&found), vec![(100, 1)]);
        assert!(index.swaps_in_block_range(&pool_n(3), 100, 1).is_empty());

        assert_eq!(index.evict_before(102), 3);
        assert_eq!(index.pools().collect::<Vec<_>>(), vec![&pool_n(2)]);
    }
}
