use crate::prices::ReferenceCurrency;
use crate::types::{OrderKey, PoolId, SwapEvent};
use ethers::types::{Address, U256};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// The identity of a sandwich: the pool and the order keys of its three legs.
/// The same triple can never be reported as two distinct attacks.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Ord, Hash, Serialize)]
pub struct AttackId {
    pub pool_id: PoolId,
    pub front_run: OrderKey,
    pub victim: OrderKey,
    pub back_run: OrderKey,
}

impl fmt::Display for AttackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{} > {} > {}]",
            self.pool_id, self.front_run, self.victim, self.back_run
        )
    }
}

/// A validated front-run / victim / back-run triple, before pricing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sandwich {
    pub front_run: SwapEvent,
    pub victim: SwapEvent,
    pub back_run: SwapEvent,
    /// The sender of both attacking legs
    pub attacker: Address,
}

impl Sandwich {
    pub fn id(&self) -> AttackId {
        AttackId {
            pool_id: self.victim.pool_id,
            front_run: self.front_run.key,
            victim: self.victim.key,
            back_run: self.back_run.key,
        }
    }

    pub fn victim_address(&self) -> Address {
        self.victim.sender_address
    }
}

/// A monetary quantity in the smallest unit of a reference currency, tagged
/// with the block heights of the prices which produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Valuation {
    #[serde(serialize_with = "serialize_bigint")]
    pub value: BigInt,
    pub unit: ReferenceCurrency,
    /// Sorted, deduplicated
    pub price_blocks: Vec<u64>,
}

impl Valuation {
    pub fn new(value: BigInt, unit: ReferenceCurrency, mut price_blocks: Vec<u64>) -> Self {
        price_blocks.sort_unstable();
        price_blocks.dedup();
        Self {
            value,
            unit,
            price_blocks,
        }
    }

    /// Renders the value in whole units of the reference currency. Returns
    /// `None` if the value does not fit in a `Decimal`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        let mantissa = self.value.to_i128()?;
        Decimal::try_from_i128_with_scale(mantissa, self.unit.decimals()).ok()
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Some(decimal) => write!(f, "{} {}", decimal.normalize(), self.unit),
            None => write!(f, "{} {} (raw)", self.value, self.unit),
        }
    }
}

pub(crate) fn serialize_bigint<S: Serializer>(value: &BigInt, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

/// A classified and priced sandwich attack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandwichAttack {
    pub id: AttackId,
    #[serde(flatten)]
    pub sandwich: Sandwich,
    /// Value extracted: back-run proceeds minus front-run cost
    pub revenue: Valuation,
    /// `revenue - gas_cost`, exactly
    pub profit: Valuation,
    /// The gas paid for both attacking legs, rounded up to whole units
    pub gas_cost: Valuation,
    /// The victim's loss against execution without the front-run
    pub harm: Valuation,
    /// The gas paid for both attacking legs, in wei
    #[serde(serialize_with = "serialize_bigint")]
    pub attacker_gas_fee: BigInt,
}

impl SandwichAttack {
    pub fn attacker(&self) -> Address {
        self.sandwich.attacker
    }

    pub fn victim_address(&self) -> Address {
        self.sandwich.victim_address()
    }

    pub fn pool_id(&self) -> PoolId {
        self.id.pool_id
    }

    /// The victim's block timestamp if known
    pub fn timestamp(&self) -> Option<i64> {
        self.sandwich.victim.timestamp
    }

    pub fn block_number(&self) -> u64 {
        self.id.victim.block_number
    }

    /// The size of the victim's trade, in its input token
    pub fn victim_amount_in(&self) -> U256 {
        self.sandwich.victim.amount_in
    }
}
