//! Running totals over detected attacks.
//!
//! Every total is a plain sum and attacks are keyed by `AttackId`, so the
//! result neither depends on the order attacks are applied in nor on how
//! often the same attack is applied.

use crate::types::attack::serialize_bigint;
use crate::types::{AttackId, PoolId, SandwichAttack};
use chrono::{Datelike, TimeZone, Utc};
use ethers::types::Address;
use num_bigint::BigInt;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttackerTotals {
    pub attacks: u64,
    #[serde(serialize_with = "serialize_bigint")]
    pub revenue: BigInt,
    #[serde(serialize_with = "serialize_bigint")]
    pub profit: BigInt,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VictimTotals {
    pub attacks: u64,
    #[serde(serialize_with = "serialize_bigint")]
    pub harm: BigInt,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyTotals {
    pub attacks: u64,
    #[serde(serialize_with = "serialize_bigint")]
    pub revenue: BigInt,
    #[serde(serialize_with = "serialize_bigint")]
    pub profit: BigInt,
    #[serde(serialize_with = "serialize_bigint")]
    pub harm: BigInt,
}

/// A calendar month in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    /// The month a unix timestamp falls into
    pub fn from_timestamp(timestamp: i64) -> Option<Self> {
        let date = Utc.timestamp_opt(timestamp, 0).single()?;
        Some(Self {
            year: date.year(),
            month: date.month(),
        })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Chronological, by the victim's block and block timestamp
    Timestamp,
    Revenue,
    Profit,
    Harm,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::Timestamp
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timestamp" | "time" | "block" => Ok(SortKey::Timestamp),
            "revenue" => Ok(SortKey::Revenue),
            "profit" => Ok(SortKey::Profit),
            "harm" => Ok(SortKey::Harm),
            _ => Err(format!("cannot sort by `{}`", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Descending
    }
}

/// Filters, ordering and paging for `Aggregator::query`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttackQuery {
    pub attacker: Option<Address>,
    pub victim: Option<Address>,
    pub pool: Option<PoolId>,
    pub min_revenue: Option<BigInt>,
    pub max_revenue: Option<BigInt>,
    pub min_profit: Option<BigInt>,
    pub max_profit: Option<BigInt>,
    pub min_harm: Option<BigInt>,
    pub max_harm: Option<BigInt>,
    /// Bounds on the attacker's gas fee, in wei
    pub min_gas_fee: Option<BigInt>,
    pub max_gas_fee: Option<BigInt>,
    /// Victim blocks to include
    pub blocks: Option<RangeInclusive<u64>>,
    pub sort: SortKey,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AttackQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attacker(mut self, attacker: Address) -> Self {
        self.attacker = Some(attacker);
        self
    }

    pub fn victim(mut self, victim: Address) -> Self {
        self.victim = Some(victim);
        self
    }

    pub fn pool(mut self, pool: PoolId) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn min_revenue(mut self, min_revenue: impl Into<BigInt>) -> Self {
        self.min_revenue = Some(min_revenue.into());
        self
    }

    pub fn max_revenue(mut self, max_revenue: impl Into<BigInt>) -> Self {
        self.max_revenue = Some(max_revenue.into());
        self
    }

    pub fn min_profit(mut self, min_profit: impl Into<BigInt>) -> Self {
        self.min_profit = Some(min_profit.into());
        self
    }

    pub fn max_profit(mut self, max_profit: impl Into<BigInt>) -> Self {
        self.max_profit = Some(max_profit.into());
        self
    }

    pub fn min_harm(mut self, min_harm: impl Into<BigInt>) -> Self {
        self.min_harm = Some(min_harm.into());
        self
    }

    pub fn max_harm(mut self, max_harm: impl Into<BigInt>) -> Self {
        self.max_harm = Some(max_harm.into());
        self
    }

    /// Inclusive bounds on the gas both attacking legs paid, in wei
    pub fn gas_fee(mut self, min: Option<BigInt>, max: Option<BigInt>) -> Self {
        self.min_gas_fee = min;
        self.max_gas_fee = max;
        self
    }

    pub fn blocks(mut self, blocks: RangeInclusive<u64>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn sort_by(mut self, sort: SortKey, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    fn matches(&self, attack: &SandwichAttack) -> bool {
        let within = |min: &Option<BigInt>, max: &Option<BigInt>, value: &BigInt| {
            min.as_ref().map_or(true, |min| value >= min)
                && max.as_ref().map_or(true, |max| value <= max)
        };
        self.attacker.map_or(true, |a| attack.attacker() == a)
            && self.victim.map_or(true, |v| attack.victim_address() == v)
            && self.pool.map_or(true, |p| attack.pool_id() == p)
            && within(&self.min_revenue, &self.max_revenue, &attack.revenue.value)
            && within(&self.min_profit, &self.max_profit, &attack.profit.value)
            && within(&self.min_harm, &self.max_harm, &attack.harm.value)
            && within(&self.min_gas_fee, &self.max_gas_fee, &attack.attacker_gas_fee)
            && self
                .blocks
                .as_ref()
                .map_or(true, |blocks| blocks.contains(&attack.block_number()))
    }

    fn compare(&self, a: &SandwichAttack, b: &SandwichAttack) -> Ordering {
        let by_key = match self.sort {
            // blocks are chronological, the timestamp only refines within one
            SortKey::Timestamp => (a.block_number(), a.timestamp())
                .cmp(&(b.block_number(), b.timestamp())),
            SortKey::Revenue => a.revenue.value.cmp(&b.revenue.value),
            SortKey::Profit => a.profit.value.cmp(&b.profit.value),
            SortKey::Harm => a.harm.value.cmp(&b.harm.value),
        };
        let by_key = match self.order {
            SortOrder::Ascending => by_key,
            SortOrder::Descending => by_key.reverse(),
        };
        by_key.then_with(|| a.id.cmp(&b.id))
    }
}

/// Per-attacker and per-victim totals plus the attacks they were built from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregator {
    attacks: BTreeMap<AttackId, SandwichAttack>,
    attackers: BTreeMap<Address, AttackerTotals>,
    victims: BTreeMap<Address, VictimTotals>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attack to the totals. Returns `false` if it was already known.
    pub fn apply(&mut self, attack: SandwichAttack) -> bool {
        if self.attacks.contains_key(&attack.id) {
            return false;
        }

        let attacker = self.attackers.entry(attack.attacker()).or_default();
        attacker.attacks += 1;
        attacker.revenue += &attack.revenue.value;
        attacker.profit += &attack.profit.value;

        let victim = self.victims.entry(attack.victim_address()).or_default();
        victim.attacks += 1;
        victim.harm += &attack.harm.value;

        self.attacks.insert(attack.id, attack);
        true
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    pub fn get(&self, id: &AttackId) -> Option<&SandwichAttack> {
        self.attacks.get(id)
    }

    pub fn attacker(&self, attacker: &Address) -> Option<&AttackerTotals> {
        self.attackers.get(attacker)
    }

    pub fn victim(&self, victim: &Address) -> Option<&VictimTotals> {
        self.victims.get(victim)
    }

    pub fn attackers(&self) -> impl Iterator<Item = (&Address, &AttackerTotals)> + '_ {
        self.attackers.iter()
    }

    pub fn victims(&self) -> impl Iterator<Item = (&Address, &VictimTotals)> + '_ {
        self.victims.iter()
    }

    /// All known attacks, ordered by `AttackId`
    pub fn attacks(&self) -> impl Iterator<Item = &SandwichAttack> + '_ {
        self.attacks.values()
    }

    /// Runs a query over the known attacks
    pub fn query(&self, query: &AttackQuery) -> Vec<&SandwichAttack> {
        let mut found: Vec<_> = self
            .attacks
            .values()
            .filter(|attack| query.matches(attack))
            .collect();
        found.sort_by(|a, b| query.compare(a, b));
        found
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Totals per calendar month of the victims' block timestamps. Attacks
    /// without a timestamp are left out.
    pub fn monthly(&self) -> BTreeMap<Month, MonthlyTotals> {
        let mut months = BTreeMap::<Month, MonthlyTotals>::new();
        for attack in self.attacks.values() {
            let month = match attack.timestamp().and_then(Month::from_timestamp) {
                Some(month) => month,
                None => continue,
            };
            let totals = months.entry(month).or_default();
            totals.attacks += 1;
            totals.revenue += &attack.revenue.value;
            totals.profit += &attack.profit.value;
            totals.harm += &attack.harm.value;
        }
        months
    }
}

impl Extend<SandwichAttack> for Aggregator {
    fn extend<T: IntoIterator<Item = SandwichAttack>>(&mut self, iter: T) {
        for attack in iter {
            self.apply(attack);
        }
    }
}
