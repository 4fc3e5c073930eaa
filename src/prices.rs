use crate::addresses::WETH;
use crate::types::{OrderKey, PoolId, SwapEvent};
use ethers::types::{Address, U256};
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The currency every monetary output is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceCurrency {
    /// The chain's native currency, in wei
    Native,
    /// An ERC20 token, in its smallest unit
    Token { address: Address, decimals: u32 },
}

impl ReferenceCurrency {
    pub fn decimals(&self) -> u32 {
        match self {
            ReferenceCurrency::Native => 18,
            ReferenceCurrency::Token { decimals, .. } => *decimals,
        }
    }
}

impl Default for ReferenceCurrency {
    fn default() -> Self {
        ReferenceCurrency::Native
    }
}

impl fmt::Display for ReferenceCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceCurrency::Native => write!(f, "native"),
            ReferenceCurrency::Token { address, .. } => write!(f, "{:?}", address),
        }
    }
}

impl FromStr for ReferenceCurrency {
    type Err = String;

    /// Parses `native` or `<address>:<decimals>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(ReferenceCurrency::Native);
        }
        let (address, decimals) = s
            .split_once(':')
            .ok_or_else(|| format!("`{}` is not `native` or `<address>:<decimals>`", s))?;
        let address = Address::from_str(address).map_err(|err| err.to_string())?;
        let decimals = decimals.parse::<u32>().map_err(|err| err.to_string())?;
        Ok(ReferenceCurrency::Token { address, decimals })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingUnavailable {
    #[error("no reserves known for {pool} before {key}")]
    MissingReserves { pool: PoolId, key: OrderKey },
    #[error("{token:?} has no liquidity in {pool} before {key}")]
    EmptyReserve {
        pool: PoolId,
        key: OrderKey,
        token: Address,
    },
    #[error("{token:?} cannot be converted to {unit} through {pool}")]
    NoRoute {
        pool: PoolId,
        token: Address,
        unit: ReferenceCurrency,
    },
    #[error("no native price at or before block {0}")]
    NoNativePrice(u64),
    #[error("reserves of {pool} before {key} are inconsistent with its swaps")]
    InconsistentReserves { pool: PoolId, key: OrderKey },
}

/// An exact amount together with the blocks whose prices produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub amount: BigRational,
    pub price_blocks: Vec<u64>,
}

/// Historical prices of the native currency, expressed as smallest reference
/// units per wei. Lookups use the latest price at or before a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativePrices {
    points: BTreeMap<u64, BigRational>,
}

impl NativePrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `price` whole reference units per whole native unit at `block`
    pub fn insert(&mut self, block: u64, price: Decimal, reference_decimals: u32) {
        let units_per_wei = decimal_to_rational(price) * pow10(reference_decimals)
            / pow10(ReferenceCurrency::Native.decimals());
        self.points.insert(block, units_per_wei);
    }

    /// Returns the price in effect at `block` and the block it was recorded at
    pub fn price_at(&self, block: u64) -> Option<(u64, &BigRational)> {
        self.points
            .range(..=block)
            .next_back()
            .map(|(block, price)| (*block, price))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Converts token amounts to a reference currency using the pools' own
/// reserves at the block of the swap being valued.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalPrice {
    reference: ReferenceCurrency,
    wrapped_native: Address,
    native: NativePrices,
}

impl Default for HistoricalPrice {
    fn default() -> Self {
        Self::new(ReferenceCurrency::Native, *WETH, NativePrices::default())
    }
}

impl HistoricalPrice {
    pub fn new(reference: ReferenceCurrency, wrapped_native: Address, native: NativePrices) -> Self {
        Self {
            reference,
            wrapped_native,
            native,
        }
    }

    pub fn reference(&self) -> ReferenceCurrency {
        self.reference
    }

    fn is_reference(&self, token: Address) -> bool {
        match self.reference {
            // assume price parity of WETH / ETH
            ReferenceCurrency::Native => token == self.wrapped_native,
            ReferenceCurrency::Token { address, .. } => token == address,
        }
    }

    /// Values `amount` of `token` with the reserves `swap`'s pool held right
    /// before `swap`
    pub fn quote(
        &self,
        swap: &SwapEvent,
        token: Address,
        amount: U256,
    ) -> Result<Quote, PricingUnavailable> {
        self.quote_exact(swap, token, to_rational(amount))
    }

    /// Same as `quote` for an exact, possibly negative, amount
    pub fn quote_exact(
        &self,
        swap: &SwapEvent,
        token: Address,
        amount: BigRational,
    ) -> Result<Quote, PricingUnavailable> {
        let block = swap.block_number();
        if self.is_reference(token) {
            return Ok(Quote {
                amount,
                price_blocks: vec![block],
            });
        }
        if token == self.wrapped_native {
            return self.quote_native(amount, block);
        }

        let other = swap.other_token(token);
        let (reserve_token, reserve_other) = match (swap.reserve_of(token), swap.reserve_of(other)) {
            (Some(t), Some(o)) => (t, o),
            _ => {
                return Err(PricingUnavailable::MissingReserves {
                    pool: swap.pool_id,
                    key: swap.key,
                })
            }
        };
        if reserve_token.is_zero() {
            return Err(PricingUnavailable::EmptyReserve {
                pool: swap.pool_id,
                key: swap.key,
                token,
            });
        }
        let in_other = amount * to_rational(reserve_other) / to_rational(reserve_token);

        if self.is_reference(other) {
            return Ok(Quote {
                amount: in_other,
                price_blocks: vec![block],
            });
        }

        if other == self.wrapped_native {
            let native = self.quote_native(in_other, block)?;
            let mut price_blocks = native.price_blocks;
            price_blocks.push(block);
            return Ok(Quote {
                amount: native.amount,
                price_blocks,
            });
        }

        Err(PricingUnavailable::NoRoute {
            pool: swap.pool_id,
            token,
            unit: self.reference,
        })
    }

    /// Values a gas fee paid at `block`
    pub fn quote_gas(&self, wei: &BigInt, block: u64) -> Result<Quote, PricingUnavailable> {
        self.quote_native(BigRational::from_integer(wei.clone()), block)
    }

    fn quote_native(&self, wei: BigRational, block: u64) -> Result<Quote, PricingUnavailable> {
        if self.is_reference(self.wrapped_native) {
            return Ok(Quote {
                amount: wei,
                price_blocks: vec![block],
            });
        }
        let (priced_at, price) = self
            .native
            .price_at(block)
            .ok_or(PricingUnavailable::NoNativePrice(block))?;
        Ok(Quote {
            amount: wei * price,
            price_blocks: vec![priced_at],
        })
    }
}

pub(crate) fn to_bigint(value: U256) -> BigInt {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigInt::from(BigUint::from_bytes_be(&bytes))
}

pub(crate) fn to_rational(value: U256) -> BigRational {
    BigRational::from_integer(to_bigint(value))
}

fn pow10(exp: u32) -> BigRational {
    BigRational::from_integer(BigInt::from(10u8).pow(exp))
}

fn decimal_to_rational(value: Decimal) -> BigRational {
    let numer = BigInt::from(value.mantissa());
    let denom = BigInt::from(10u8).pow(value.scale());
    if denom.is_zero() {
        return BigRational::zero();
    }
    BigRational::new(numer, denom)
}

/// Floors an exact amount to the reference currency's smallest unit
pub(crate) fn floor(amount: &BigRational) -> BigInt {
    if amount.denom().is_one() {
        return amount.numer().clone();
    }
    amount.floor().to_integer()
}
