use super::{matcher, ClaimedSet};
use crate::types::{Classification, RejectReason, Sandwich, SwapEvent};
use ethers::types::U256;

/// Drives a victim candidate through `Classification`
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    radius: u64,
    min_victim_amount_in: U256,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(1, U256::zero())
    }
}

impl Classifier {
    pub fn new(radius: u64, min_victim_amount_in: U256) -> Self {
        Self {
            radius,
            min_victim_amount_in,
        }
    }

    pub fn radius(&self) -> u64 {
        self.radius
    }

    /// Runs `victim` to a terminal state
    pub fn classify<'a>(
        &self,
        victim: &'a SwapEvent,
        window: &[&'a SwapEvent],
        claimed: &ClaimedSet,
    ) -> Classification<'a> {
        let mut state = Classification::Unmatched { victim };
        while !state.is_terminal() {
            state = self.step(state, window, claimed);
        }
        state
    }

    /// Performs a single transition
    pub fn step<'a>(
        &self,
        state: Classification<'a>,
        window: &[&'a SwapEvent],
        claimed: &ClaimedSet,
    ) -> Classification<'a> {
        match state {
            Classification::Unmatched { victim } => {
                if claimed.contains(&victim.key) {
                    return rejected(victim, RejectReason::AlreadyClaimed);
                }
                if !self.is_victim_sized(victim) {
                    return rejected(victim, RejectReason::BelowThreshold);
                }
                if matcher::opens_bracket(victim, window, claimed, |swap| self.is_victim_sized(swap)) {
                    return rejected(victim, RejectReason::AttackerLeg);
                }
                match matcher::find_pair(victim, window, claimed) {
                    Some((front, back)) => Classification::PairFound {
                        front,
                        victim,
                        back,
                    },
                    None => rejected(victim, RejectReason::NoPair),
                }
            }
            Classification::PairFound {
                front,
                victim,
                back,
            } => match self.validate(front, victim, back, claimed) {
                Ok(()) => Classification::Validated {
                    front,
                    victim,
                    back,
                },
                Err(reason) => rejected(victim, reason),
            },
            Classification::Validated {
                front,
                victim,
                back,
            } => Classification::Classified(Sandwich {
                front_run: front.clone(),
                victim: victim.clone(),
                back_run: back.clone(),
                attacker: front.sender_address,
            }),
            terminal => terminal,
        }
    }

    fn is_victim_sized(&self, swap: &SwapEvent) -> bool {
        swap.amount_in > self.min_victim_amount_in
    }

    /// Re-checks the whole detection rule on a matched triple
    fn validate(
        &self,
        front: &SwapEvent,
        victim: &SwapEvent,
        back: &SwapEvent,
        claimed: &ClaimedSet,
    ) -> Result<(), RejectReason> {
        if front.pool_id != victim.pool_id || back.pool_id != victim.pool_id {
            return Err(RejectReason::PoolMismatch);
        }
        if !(front.key < victim.key && victim.key < back.key) {
            return Err(RejectReason::OrderMismatch);
        }
        let low = victim.block_number().saturating_sub(self.radius);
        let high = victim.block_number().saturating_add(self.radius);
        let in_window = |swap: &SwapEvent| (low..=high).contains(&swap.block_number());
        if !in_window(front) || !in_window(back) {
            return Err(RejectReason::OutsideWindow);
        }
        if front.sender_address != back.sender_address
            || front.sender_address == victim.sender_address
        {
            return Err(RejectReason::SenderMismatch);
        }
        if front.direction != victim.direction
            || front.token_in != victim.token_in
            || back.direction != front.direction.opposite()
            || back.token_in != front.token_out
        {
            return Err(RejectReason::DirectionMismatch);
        }
        if claimed.contains(&front.key) || claimed.contains(&back.key) {
            return Err(RejectReason::AlreadyClaimed);
        }
        Ok(())
    }
}

fn rejected(victim: &SwapEvent, reason: RejectReason) -> Classification<'_> {
    Classification::Rejected { victim, reason }
}
