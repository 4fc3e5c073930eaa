use crate::types::{Sandwich, SwapEvent};
use std::fmt;

/// The state of a victim candidate as it moves through the classifier.
///
/// `Unmatched -> PairFound -> Validated -> Classified`, or `Rejected` on any
/// failed guard. `Classified` is terminal.
#[derive(Clone, PartialEq)]
pub enum Classification<'a> {
    Unmatched {
        victim: &'a SwapEvent,
    },
    PairFound {
        front: &'a SwapEvent,
        victim: &'a SwapEvent,
        back: &'a SwapEvent,
    },
    Validated {
        front: &'a SwapEvent,
        victim: &'a SwapEvent,
        back: &'a SwapEvent,
    },
    Classified(Sandwich),
    Rejected {
        victim: &'a SwapEvent,
        reason: RejectReason,
    },
}

/// Why a victim candidate did not end up in a sandwich
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// No front-run / back-run pair was found in the window
    NoPair,
    /// The victim already takes part in another sandwich
    AlreadyClaimed,
    /// The victim is below the configured minimum size
    BelowThreshold,
    /// The candidate is itself the front-run of a bracket around a later swap
    AttackerLeg,
    /// The legs are not on the same pool
    PoolMismatch,
    /// Legs are out of order
    OrderMismatch,
    /// The attacker legs are from different senders, or the victim is the attacker
    SenderMismatch,
    /// The front-run is not in the victim's direction, or the back-run does not close it
    DirectionMismatch,
    /// A leg lies outside the victim's block window
    OutsideWindow,
}

impl<'a> Classification<'a> {
    pub fn is_classified(&self) -> bool {
        matches!(self, Classification::Classified(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Classification::Rejected { .. })
    }

    /// `Classified` and `Rejected` have no further transitions
    pub fn is_terminal(&self) -> bool {
        self.is_classified() || self.is_rejected()
    }

    /// The victim candidate this state is about
    pub fn victim(&self) -> &SwapEvent {
        match self {
            Classification::Unmatched { victim }
            | Classification::PairFound { victim, .. }
            | Classification::Validated { victim, .. }
            | Classification::Rejected { victim, .. } => *victim,
            Classification::Classified(sandwich) => &sandwich.victim,
        }
    }

    /// Consumes the state, returning the sandwich if classified
    pub fn into_sandwich(self) -> Option<Sandwich> {
        match self {
            Classification::Classified(sandwich) => Some(sandwich),
            _ => None,
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Classification::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Debug for Classification<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Unmatched { victim } => {
                f.debug_tuple("Unmatched").field(&victim.key).finish()
            }
            Classification::PairFound {
                front,
                victim,
                back,
            } => f
                .debug_struct("PairFound")
                .field("front", &front.key)
                .field("victim", &victim.key)
                .field("back", &back.key)
                .finish(),
            Classification::Validated {
                front,
                victim,
                back,
            } => f
                .debug_struct("Validated")
                .field("front", &front.key)
                .field("victim", &victim.key)
                .field("back", &back.key)
                .finish(),
            Classification::Classified(sandwich) => {
                f.debug_tuple("Classified").field(&sandwich.id()).finish()
            }
            Classification::Rejected { victim, reason } => f
                .debug_struct("Rejected")
                .field("victim", &victim.key)
                .field("reason", reason)
                .finish(),
        }
    }
}
