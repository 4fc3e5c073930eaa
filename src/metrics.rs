//! Revenue, profit and harm of classified sandwiches.
//!
//! All intermediate values are exact rationals. Every monetary output is
//! rounded to the reference currency's smallest unit exactly once, at the
//! very end: gains down, the gas cost up. Profit is derived from the rounded
//! parts.

use crate::prices::{floor, to_bigint, HistoricalPrice, PricingUnavailable, Quote};
use crate::types::{AttackId, Protocol, Sandwich, SandwichAttack, SwapEvent, Valuation};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error(transparent)]
    PricingUnavailable(#[from] PricingUnavailable),
    /// The victim did better than without the front-run, which the AMM
    /// model cannot produce
    #[error("negative harm of {harm} for {id}")]
    NegativeHarm { id: AttackId, harm: BigInt },
}

impl MetricsError {
    /// Whether the error invalidates the whole run rather than one attack
    pub fn is_fatal(&self) -> bool {
        matches!(self, MetricsError::NegativeHarm { .. })
    }
}

/// `getAmountOut` of the constant product pairs, with the pair's fee
pub fn get_amount_out(
    protocol: Protocol,
    amount_in: &BigInt,
    reserve_in: &BigInt,
    reserve_out: &BigInt,
) -> Option<BigInt> {
    if amount_in.is_zero() || !reserve_in.is_positive() || !reserve_out.is_positive() {
        return None;
    }
    let (fee_num, fee_den) = protocol.fee();
    let amount_in_with_fee = amount_in * BigInt::from(fee_num);
    let numerator = &amount_in_with_fee * reserve_out;
    let denominator = reserve_in * BigInt::from(fee_den) + amount_in_with_fee;
    Some(numerator / denominator)
}

/// Prices sandwiches in a single reference currency
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    prices: HistoricalPrice,
}

impl MetricsCalculator {
    pub fn new(prices: HistoricalPrice) -> Self {
        Self { prices }
    }

    pub fn prices(&self) -> &HistoricalPrice {
        &self.prices
    }

    /// Turns a classified sandwich into an attack record
    pub fn evaluate(&self, sandwich: Sandwich) -> Result<SandwichAttack, MetricsError> {
        let unit = self.prices.reference();

        let revenue = self.revenue(&sandwich)?;
        let gas = self.gas(&sandwich)?;
        let harm = self.harm(&sandwich)?;

        let harm_value = floor(&harm.amount);
        if harm_value.is_negative() {
            return Err(MetricsError::NegativeHarm {
                id: sandwich.id(),
                harm: harm_value,
            });
        }

        // a cost rounds up, so that profit never exceeds its exact value
        let revenue_value = floor(&revenue.amount);
        let gas_value = gas.amount.ceil().to_integer();
        let profit = Valuation::new(
            &revenue_value - &gas_value,
            unit,
            revenue
                .price_blocks
                .iter()
                .chain(gas.price_blocks.iter())
                .copied()
                .collect(),
        );

        Ok(SandwichAttack {
            id: sandwich.id(),
            revenue: Valuation::new(revenue_value, unit, revenue.price_blocks),
            profit,
            gas_cost: Valuation::new(gas_value, unit, gas.price_blocks),
            harm: Valuation::new(harm_value, unit, harm.price_blocks),
            attacker_gas_fee: sandwich.front_run.gas_cost() + sandwich.back_run.gas_cost(),
            sandwich,
        })
    }

    /// What the back-run paid out minus what the front-run paid in, each
    /// valued right before its own leg
    pub fn revenue(&self, sandwich: &Sandwich) -> Result<Quote, PricingUnavailable> {
        let front = &sandwich.front_run;
        let back = &sandwich.back_run;
        let spent = self.prices.quote(front, front.token_in, front.amount_in)?;
        let received = self.prices.quote(back, back.token_out, back.amount_out)?;
        Ok(Quote {
            amount: received.amount - spent.amount,
            price_blocks: received
                .price_blocks
                .into_iter()
                .chain(spent.price_blocks)
                .collect(),
        })
    }

    /// The fees of both attacking transactions
    pub fn gas(&self, sandwich: &Sandwich) -> Result<Quote, PricingUnavailable> {
        let mut total = Quote {
            amount: BigRational::zero(),
            price_blocks: Vec::with_capacity(2),
        };
        for leg in &[&sandwich.front_run, &sandwich.back_run] {
            let quote = self.prices.quote_gas(&leg.gas_cost(), leg.block_number())?;
            total.amount += quote.amount;
            total.price_blocks.extend(quote.price_blocks);
        }
        Ok(total)
    }

    /// What the victim would have received without the front-run minus what
    /// it received, valued right before the victim's swap.
    ///
    /// The counterfactual replays the victim's trade against its pre-swap
    /// reserves with the front-run's reserve shift reversed.
    pub fn harm(&self, sandwich: &Sandwich) -> Result<Quote, PricingUnavailable> {
        let front = &sandwich.front_run;
        let victim = &sandwich.victim;

        let hypothetical = self.hypothetical_amount_out(front, victim)?;
        let lost = hypothetical - to_bigint(victim.amount_out);
        self.prices
            .quote_exact(victim, victim.token_out, BigRational::from_integer(lost))
    }

    fn hypothetical_amount_out(
        &self,
        front: &SwapEvent,
        victim: &SwapEvent,
    ) -> Result<BigInt, PricingUnavailable> {
        let reserves = victim
            .reserves
            .ok_or(PricingUnavailable::MissingReserves {
                pool: victim.pool_id,
                key: victim.key,
            })?;
        let (reserve_in, reserve_out) = reserves.oriented(victim.direction);
        let inconsistent = || PricingUnavailable::InconsistentReserves {
            pool: victim.pool_id,
            key: victim.key,
        };

        let reserve_in = to_bigint(reserve_in) - to_bigint(front.amount_in);
        let reserve_out = to_bigint(reserve_out) + to_bigint(front.amount_out);
        if !reserve_in.is_positive() {
            return Err(inconsistent());
        }
        get_amount_out(
            victim.protocol(),
            &to_bigint(victim.amount_in),
            &reserve_in,
            &reserve_out,
        )
        .ok_or_else(inconsistent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::WETH;
    use crate::prices::{NativePrices, ReferenceCurrency};
    use crate::test_helpers::*;
    use ethers::types::U256;
    use rust_decimal::Decimal;

    fn int(value: i64) -> BigInt {
        BigInt::from(value)
    }

    #[test]
    fn amount_out_follows_the_pair() {
        let out = |protocol, amount_in: i64, r_in: i64, r_out: i64| {
            get_amount_out(protocol, &int(amount_in), &int(r_in), &int(r_out))
        };
        assert_eq!(
            out(Protocol::UniswapV2, 1_000, 100_000, 200_000),
            Some(int(1_974))
        );
        assert_eq!(
            out(Protocol::SushiswapV2, 10_000, 101_000, 198_026),
            Some(int(17_791))
        );
        // the lower fee pays out more
        assert_eq!(
            out(Protocol::PancakeSwapV2, 1_000, 100_000, 200_000),
            Some(int(1_975))
        );
        assert_eq!(out(Protocol::UniswapV2, 0, 100_000, 200_000), None);
        assert_eq!(out(Protocol::UniswapV2, 10, 0, 200_000), None);
    }

    #[test]
    fn prices_the_simple_sandwich() {
        let attack = MetricsCalculator::default()
            .evaluate(simple_sandwich())
            .unwrap();

        // received 1_198 X for 1_000 X
        assert_eq!(attack.revenue.value, int(198));
        // 10 * 2 + 10 * 3 wei of gas
        assert_eq!(attack.attacker_gas_fee, int(50));
        assert_eq!(attack.gas_cost.value, int(50));
        assert_eq!(attack.profit.value, int(148));
        // 18_132 Y without the front-run against 17_791 Y, at 101_000 X / 198_026 Y
        assert_eq!(attack.harm.value, int(173));
        assert_eq!(attack.harm.unit, ReferenceCurrency::Native);
        assert_eq!(attack.harm.price_blocks, vec![100]);
        assert_eq!(attack.id, simple_sandwich().id());
    }

    #[test]
    fn harm_without_front_run_shift_is_zero() {
        let mut sandwich = simple_sandwich();
        // the victim got exactly what the untouched pool would have paid
        sandwich.front_run.amount_in = 0u64.into();
        sandwich.front_run.amount_out = 0u64.into();
        sandwich.victim.reserves = Some(crate::types::Reserves::new(100_000u64, 200_000u64));
        sandwich.victim.amount_out = 18_132u64.into();
        let harm = MetricsCalculator::default().harm(&sandwich).unwrap();
        assert!(harm.amount.is_zero());
    }

    #[test]
    fn negative_harm_is_fatal() {
        let mut sandwich = simple_sandwich();
        sandwich.victim.amount_out = 20_000u64.into();
        let err = MetricsCalculator::default()
            .evaluate(sandwich)
            .unwrap_err();
        assert!(matches!(err, MetricsError::NegativeHarm { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_victim_reserves_withhold_the_attack() {
        let mut sandwich = simple_sandwich();
        sandwich.victim.reserves = None;
        let err = MetricsCalculator::default()
            .evaluate(sandwich)
            .unwrap_err();
        assert!(matches!(
            err,
            MetricsError::PricingUnavailable(PricingUnavailable::MissingReserves { .. })
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn inconsistent_reserves_are_unavailable() {
        let mut sandwich = simple_sandwich();
        sandwich.victim.reserves = Some(crate::types::Reserves::new(500u64, 198_026u64));
        assert!(matches!(
            MetricsCalculator::default().evaluate(sandwich),
            Err(MetricsError::PricingUnavailable(
                PricingUnavailable::InconsistentReserves { .. }
            ))
        ));
    }

    #[test]
    fn values_in_a_token_via_native_prices() {
        let usdc = ReferenceCurrency::Token {
            address: addr(0xc0),
            decimals: 6,
        };
        let mut native = NativePrices::new();
        // 2_000 USDC per ETH, i.e. 2e-9 units per wei
        native.insert(90, Decimal::from(2_000), 6);
        let calculator = MetricsCalculator::new(HistoricalPrice::new(usdc, *WETH, native));

        let mut sandwich = simple_sandwich();
        // scale the X legs to 1e15 wei so the result survives the conversion
        let scale = U256::from(1_000_000_000_000u64);
        for leg in &mut [
            &mut sandwich.front_run,
            &mut sandwich.victim,
            &mut sandwich.back_run,
        ] {
            if let Some(reserves) = leg.reserves.as_mut() {
                reserves.reserve0 = reserves.reserve0 * scale;
            }
            if leg.token_in == token_x() {
                leg.amount_in = leg.amount_in * scale;
            } else {
                leg.amount_out = leg.amount_out * scale;
            }
        }

        let attack = calculator.evaluate(sandwich).unwrap();
        // 198e12 wei at 2e-9 USDC units per wei
        assert_eq!(attack.revenue.value, int(396_000));
        assert_eq!(attack.revenue.price_blocks, vec![90]);
        // 50 wei of gas is a fraction of a USDC unit, charged as one
        assert_eq!(attack.gas_cost.value, int(1));
        assert_eq!(attack.gas_cost.unit, usdc);
        assert_eq!(attack.profit.value, int(395_999));
        assert_eq!(
            attack.profit.value,
            &attack.revenue.value - &attack.gas_cost.value
        );
        assert_eq!(attack.revenue.unit, usdc);
    }

    #[test]
    fn profit_reconciles_with_fractional_revenue() {
        let usdc = ReferenceCurrency::Token {
            address: addr(0xc0),
            decimals: 6,
        };
        let mut native = NativePrices::new();
        // 1_500 USDC per ETH leaves every amount a fraction of a unit
        native.insert(90, Decimal::from(1_500), 6);
        let calculator = MetricsCalculator::new(HistoricalPrice::new(usdc, *WETH, native));
        let mut sandwich = simple_sandwich();
        sandwich.front_run.gas_price = 3u64.into();

        let attack = calculator.evaluate(sandwich).unwrap();
        // 198 wei of revenue floors to nothing, 60 wei of gas rounds up to one unit
        assert_eq!(attack.revenue.value, int(0));
        assert_eq!(attack.gas_cost.value, int(1));
        assert_eq!(attack.profit.value, int(-1));
        assert_eq!(
            attack.profit.value,
            &attack.revenue.value - &attack.gas_cost.value
        );
        assert_eq!(attack.profit.price_blocks, vec![90]);
    }
}
