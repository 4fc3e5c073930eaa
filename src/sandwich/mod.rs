//! A module to detect sandwich attacks
//!
//! Detects the "liquidity taker attacks taker" sandwich on constant product
//! AMM pools. Scenario description taken from [https://arxiv.org/pdf/2009.14021.pdf]
//!
//! An adversarial liquidity taker exploits the victim's `TransactXforY`
//! transaction (`Txy_v`) after it was emitted on the network by front-
//! (`Txy_a`) and then back-running (`Tyx_a`) it.
//!
//! The timeline of the transactions looks as follows:
//!
//! ```text
//!   |                                        transaction order
//!   |                                                |
//!   |                Txy_a-------------------------->| front running
//!   |      Txy_v------------------------------------>|
//!   |                Tyx_a-------------------------->| back running
//!   |                                                V
//! Block N-1                                     Block N+1
//! ---------time appearance on Ethereum network------->
//! ```
//!
//! The attacker makes sure `Txy_a`, `Txy_v` and `Tyx_a` land in that order,
//! so that the attacker profits from the victim's slippage. Here all three
//! legs must trade on the same pool and lie within `radius` blocks of the
//! victim's block (one block by default).
//!
//! Detection happens per pool in a single ordered pass: every swap is a
//! victim candidate, candidates are classified in chain order as soon as
//! their block window is complete, and the legs of every classified
//! sandwich are claimed so that no swap takes part in two sandwiches.

mod classifier;
pub use classifier::Classifier;

pub mod matcher;

use crate::types::{Classification, OrderKey, PoolId, RejectReason, Sandwich, SwapEvent};
use crate::window::{BlockWindow, OrderingViolation};
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// The swaps of a pool which already take part in a classified sandwich
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimedSet {
    keys: BTreeSet<OrderKey>,
}

impl ClaimedSet {
    pub fn contains(&self, key: &OrderKey) -> bool {
        self.keys.contains(key)
    }

    pub fn insert(&mut self, key: OrderKey) -> bool {
        self.keys.insert(key)
    }

    /// Claims all three legs
    pub fn claim(&mut self, sandwich: &Sandwich) {
        self.insert(sandwich.front_run.key);
        self.insert(sandwich.victim.key);
        self.insert(sandwich.back_run.key);
    }

    /// Forgets the claims on swaps older than `block`
    pub fn prune_before(&mut self, block: u64) {
        self.keys = self.keys.split_off(&OrderKey::new(block, 0, 0));
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Scans the swaps of one pool for sandwiches.
///
/// The scanner owns all per-pool state, i.e. the block window and the claimed
/// swaps, so pools can be scanned in parallel without sharing anything.
#[derive(Debug, Clone)]
pub struct PoolScanner {
    classifier: Classifier,
    window: BlockWindow,
    claimed: ClaimedSet,
    /// Victim candidates whose block window is not complete yet
    pending: VecDeque<OrderKey>,
    evaluated: usize,
    rejections: HashMap<RejectReason, usize>,
}

impl PoolScanner {
    pub fn new(pool_id: PoolId, classifier: Classifier) -> Self {
        Self {
            classifier,
            window: BlockWindow::new(pool_id),
            claimed: ClaimedSet::default(),
            pending: VecDeque::new(),
            evaluated: 0,
            rejections: HashMap::new(),
        }
    }

    pub fn pool_id(&self) -> PoolId {
        self.window.pool_id()
    }

    /// Feeds the next swap of the pool. Returns the sandwiches whose victims'
    /// windows were completed by this swap.
    pub fn push(&mut self, swap: SwapEvent) -> Result<Vec<Sandwich>, OrderingViolation> {
        let key = swap.key;
        self.window.push(swap)?;
        let found = self.evaluate_until(Some(key.block_number));
        self.pending.push_back(key);
        Ok(found)
    }

    /// Classifies every remaining candidate with whatever the window holds
    pub fn finish(&mut self) -> Vec<Sandwich> {
        self.evaluate_until(None)
    }

    /// Number of victim candidates classified so far
    pub fn evaluated(&self) -> usize {
        self.evaluated
    }

    pub fn rejections(&self) -> &HashMap<RejectReason, usize> {
        &self.rejections
    }

    /// Number of swaps currently held in memory
    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    /// Evaluates pending victims which no swap at `current` or later can
    /// affect anymore, then evicts what no pending victim can reach.
    fn evaluate_until(&mut self, current: Option<u64>) -> Vec<Sandwich> {
        let radius = self.classifier.radius();
        let mut found = Vec::new();
        while let Some(key) = self.pending.front().copied() {
            if let Some(current) = current {
                if current <= key.block_number.saturating_add(radius) {
                    break;
                }
            }
            self.pending.pop_front();
            if let Some(sandwich) = self.evaluate(&key) {
                found.push(sandwich);
            }
        }

        match (self.pending.front(), current) {
            (Some(oldest), _) => self.evict_before(oldest.block_number.saturating_sub(radius)),
            (None, Some(current)) => self.evict_before(current.saturating_sub(radius)),
            (None, None) => {
                self.window.clear();
                self.claimed = ClaimedSet::default();
            }
        }
        found
    }

    fn evict_before(&mut self, block: u64) {
        let evicted = self.window.evict_before(block);
        if evicted > 0 {
            trace!("{}: evicted {} swaps before block {}", self.pool_id(), evicted, block);
        }
        self.claimed.prune_before(block);
    }

    fn evaluate(&mut self, key: &OrderKey) -> Option<Sandwich> {
        let victim = self.window.get(key)?;
        let neighbourhood: Vec<&SwapEvent> = self
            .window
            .swaps_in_block_range(key.block_number, self.classifier.radius())
            .collect();
        let state = self
            .classifier
            .classify(victim, &neighbourhood, &self.claimed);
        debug!("{}: {:?}", self.pool_id(), state);

        self.evaluated += 1;
        match state {
            Classification::Classified(sandwich) => {
                self.claimed.claim(&sandwich);
                Some(sandwich)
            }
            other => {
                if let Some(reason) = other.reject_reason() {
                    *self.rejections.entry(reason).or_default() += 1;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use ethers::types::U256;

    fn scan(swaps: Vec<SwapEvent>) -> Vec<Sandwich> {
        scan_with(Classifier::default(), swaps)
    }

    fn scan_with(classifier: Classifier, swaps: Vec<SwapEvent>) -> Vec<Sandwich> {
        let mut scanner = PoolScanner::new(pool(), classifier);
        let mut found = Vec::new();
        for swap in swaps {
            found.extend(scanner.push(swap).unwrap());
        }
        found.extend(scanner.finish());
        found
    }

    fn triple(sandwich: &Sandwich) -> (u64, u64, u64) {
        (
            sandwich.front_run.key.tx_index,
            sandwich.victim.key.tx_index,
            sandwich.back_run.key.tx_index,
        )
    }

    #[test]
    fn detects_simple_sandwich() {
        let found = scan(sandwich_swaps(pool(), 100));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], simple_sandwich());
        assert_eq!(found[0].attacker, attacker());
    }

    #[test]
    fn detects_across_adjacent_blocks() {
        let swaps = vec![
            SwapBuilder::new(pool(), 99, 7)
                .sender(attacker())
                .sell0(1_000, 1_974)
                .build(),
            SwapBuilder::new(pool(), 100, 0)
                .sender(victim())
                .sell0(10_000, 17_791)
                .build(),
            SwapBuilder::new(pool(), 101, 2)
                .sender(attacker())
                .sell1(1_974, 1_198)
                .build(),
        ];
        let found = scan(swaps);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].front_run.block_number(), 99);
        assert_eq!(found[0].back_run.block_number(), 101);
    }

    #[test]
    fn ignores_legs_two_blocks_away() {
        let swaps = vec![
            SwapBuilder::new(pool(), 98, 0)
                .sender(attacker())
                .sell0(1_000, 1_974)
                .build(),
            SwapBuilder::new(pool(), 100, 0)
                .sender(victim())
                .sell0(10_000, 17_791)
                .build(),
            SwapBuilder::new(pool(), 101, 0)
                .sender(attacker())
                .sell1(1_974, 1_198)
                .build(),
        ];
        assert!(scan(swaps.clone()).is_empty());

        // a wider window reaches it
        assert_eq!(scan_with(Classifier::new(2, U256::zero()), swaps).len(), 1);
    }

    #[test]
    fn reports_once_window_is_complete() {
        let mut scanner = PoolScanner::new(pool(), Classifier::default());
        for swap in sandwich_swaps(pool(), 100) {
            assert!(scanner.push(swap).unwrap().is_empty());
        }
        // block 101 may still hold a back-run
        let unrelated = SwapBuilder::new(pool(), 101, 0).sender(addr(0x77)).build();
        assert!(scanner.push(unrelated).unwrap().is_empty());

        let next = SwapBuilder::new(pool(), 102, 0).sender(addr(0x77)).build();
        let found = scanner.push(next).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(triple(&found[0]), (0, 1, 2));
        assert!(scanner.finish().is_empty());
        assert_eq!(scanner.evaluated(), 5);
    }

    fn legs(spec: &[(u64, u64, bool)]) -> Vec<SwapEvent> {
        spec.iter()
            .map(|(tx, sender, sells_token0)| {
                let builder = SwapBuilder::new(pool(), 100, *tx).sender(addr(*sender));
                if *sells_token0 {
                    builder.sell0(1_000, 1_000).build()
                } else {
                    builder.sell1(1_000, 1_000).build()
                }
            })
            .collect()
    }

    #[test]
    fn tie_break_picks_nearest_front_run() {
        // two attackers bracket the same victim
        let swaps = legs(&[
            (1, 0xa1, true),
            (3, 0xa2, true),
            (5, 0xb, true),
            (8, 0xa1, false),
            (9, 0xa2, false),
        ]);
        let mut scanner = PoolScanner::new(pool(), Classifier::default());
        let mut found = Vec::new();
        for swap in swaps {
            found.extend(scanner.push(swap).unwrap());
        }
        found.extend(scanner.finish());

        assert_eq!(found.len(), 1);
        assert_eq!(triple(&found[0]), (3, 5, 9));
        assert_eq!(found[0].attacker, addr(0xa2));
        assert_eq!(found[0].victim_address(), addr(0xb));
        // both front-runs were recognized as attacker legs
        assert_eq!(scanner.rejections().get(&RejectReason::AttackerLeg), Some(&2));
    }

    #[test]
    fn tie_break_ignores_small_inner_front_run() {
        let small = U256::from(10u64);
        let swaps = vec![
            SwapBuilder::new(pool(), 100, 1)
                .sender(addr(0xa1))
                .sell0(1_000, 1_000)
                .build(),
            SwapBuilder::new(pool(), 100, 3)
                .sender(addr(0xa2))
                .sell0(5, 5)
                .build(),
            SwapBuilder::new(pool(), 100, 5)
                .sender(victim())
                .sell0(10_000, 10_000)
                .build(),
            SwapBuilder::new(pool(), 100, 8)
                .sender(addr(0xa1))
                .sell1(1_000, 1_000)
                .build(),
            SwapBuilder::new(pool(), 100, 9)
                .sender(addr(0xa2))
                .sell1(5, 5)
                .build(),
        ];
        let found = scan_with(Classifier::new(1, small), swaps);
        assert_eq!(found.len(), 1);
        assert_eq!(triple(&found[0]), (3, 5, 9));
    }

    #[test]
    fn farther_bracket_wins_when_nearer_never_closes() {
        let found = scan(legs(&[
            (1, 0xa1, true),
            (3, 0xa2, true),
            (5, 0xb, true),
            (8, 0xa1, false),
        ]));
        // the unclosed swap is the nearest victim of the only bracket
        assert_eq!(found.len(), 1);
        assert_eq!(triple(&found[0]), (1, 3, 8));
    }

    #[test]
    fn legs_are_never_reused() {
        // two victims between the same attacker legs
        let swaps = vec![
            SwapBuilder::new(pool(), 100, 0)
                .sender(attacker())
                .sell0(1_000, 1_000)
                .build(),
            SwapBuilder::new(pool(), 100, 1)
                .sender(victim())
                .sell0(10_000, 10_000)
                .build(),
            SwapBuilder::new(pool(), 100, 2)
                .sender(addr(0xc))
                .sell0(10_000, 10_000)
                .build(),
            SwapBuilder::new(pool(), 100, 3)
                .sender(attacker())
                .sell1(1_000, 1_000)
                .build(),
        ];
        let found = scan(swaps);
        assert_eq!(found.len(), 1);
        assert_eq!(triple(&found[0]), (0, 1, 3));

        let mut seen = BTreeSet::new();
        for sandwich in &found {
            for key in &[
                sandwich.front_run.key,
                sandwich.victim.key,
                sandwich.back_run.key,
            ] {
                assert!(seen.insert(*key));
            }
        }
    }

    #[test]
    fn lone_victim_is_not_retried() {
        let mut scanner = PoolScanner::new(pool(), Classifier::default());
        let lone = SwapBuilder::new(pool(), 100, 0)
            .sender(victim())
            .sell0(10_000, 17_791)
            .build();
        assert!(scanner.push(lone).unwrap().is_empty());
        assert!(scanner.finish().is_empty());
        assert_eq!(scanner.rejections().get(&RejectReason::NoPair), Some(&1));
        assert!(scanner.finish().is_empty());
        assert_eq!(scanner.evaluated(), 1);
    }

    #[test]
    fn memory_stays_bounded() {
        let mut scanner = PoolScanner::new(pool(), Classifier::default());
        let mut found = 0;
        for block in 0..1_000u64 {
            for swap in sandwich_swaps(pool(), block) {
                found += scanner.push(swap).unwrap().len();
            }
            // the current block, the one before and the pending ones
            assert!(scanner.buffered() <= 9);
        }
        found += scanner.finish().len();
        assert_eq!(found, 1_000);
    }

    #[test]
    fn propagates_ordering_violations() {
        let mut scanner = PoolScanner::new(pool(), Classifier::default());
        scanner
            .push(SwapBuilder::new(pool(), 100, 1).build())
            .unwrap();
        assert!(scanner
            .push(SwapBuilder::new(pool(), 99, 0).build())
            .is_err());
    }

    #[test]
    fn claimed_set_prunes_old_blocks() {
        let mut claimed = ClaimedSet::default();
        claimed.claim(&simple_sandwich());
        claimed.insert(OrderKey::new(101, 0, 0));
        assert_eq!(claimed.len(), 4);
        claimed.prune_before(101);
        assert_eq!(claimed.len(), 1);
        assert!(claimed.contains(&OrderKey::new(101, 0, 0)));
    }
}
