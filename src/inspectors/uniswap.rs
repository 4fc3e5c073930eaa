use crate::{
    addresses::ROUTERS,
    inspectors::MalformedEvent,
    traits::SwapNormalizer,
    types::{Direction, OrderKey, PoolId, Protocol, RawSwap, Reserves, SwapEvent},
};

use ethers::types::{Address, U256};

#[derive(Debug, Clone, Default)]
/// Decodes the `Swap` event of Uniswap V2 pairs and their forks.
///
/// `Swap(sender, amount0In, amount1In, amount0Out, amount1Out, to)` carries
/// both legs of the trade for both tokens. Exactly one token must go in and
/// the other must come out, anything else (e.g. a flash swap paying back in
/// both tokens) cannot be given a direction.
pub struct Uniswap;

impl Uniswap {
    pub fn new() -> Self {
        Self
    }
}

impl SwapNormalizer for Uniswap {
    fn protocols(&self) -> &[Protocol] {
        &Protocol::ALL
    }

    fn normalize(&self, raw: &RawSwap, protocol: Protocol) -> Result<SwapEvent, MalformedEvent> {
        let key = OrderKey::new(raw.block_number, raw.tx_index, raw.log_index);
        let pool_id = PoolId::new(protocol, raw.pool);

        let (token0, token1) = match (raw.token0, raw.token1) {
            (Some(t0), Some(t1)) if t0 != t1 && !t0.is_zero() && !t1.is_zero() => (t0, t1),
            _ => return Err(MalformedEvent::UnresolvableTokens { pool: pool_id, key }),
        };

        let amount0_in = parse_amount(&raw.amount0_in, "amount0_in", key)?;
        let amount1_in = parse_amount(&raw.amount1_in, "amount1_in", key)?;
        let amount0_out = parse_amount(&raw.amount0_out, "amount0_out", key)?;
        let amount1_out = parse_amount(&raw.amount1_out, "amount1_out", key)?;

        let direction = resolve_direction(amount0_in, amount1_in, amount0_out, amount1_out)
            .ok_or(MalformedEvent::AmbiguousDirection { pool: pool_id, key })?;
        let (token_in, token_out, amount_in, amount_out) = match direction {
            Direction::ZeroForOne => (token0, token1, amount0_in, amount1_out),
            Direction::OneForZero => (token1, token0, amount1_in, amount0_out),
        };

        let sender_address = resolve_sender(raw, key)?;

        let reserves = match (&raw.reserve0, &raw.reserve1) {
            (Some(r0), Some(r1)) => Some(Reserves {
                reserve0: parse_amount(r0, "reserve0", key)?,
                reserve1: parse_amount(r1, "reserve1", key)?,
            }),
            _ => None,
        };

        let gas_used = parse_amount(&raw.gas_used, "gas_used", key)?;
        // prefer the price actually paid over the legacy field
        let gas_price = match (&raw.effective_gas_price, &raw.gas_price) {
            (Some(price), _) => parse_amount(price, "effective_gas_price", key)?,
            (None, Some(price)) => parse_amount(price, "gas_price", key)?,
            (None, None) => return Err(MalformedEvent::MissingGasPrice { key }),
        };

        Ok(SwapEvent {
            pool_id,
            key,
            tx_hash: raw.tx_hash,
            timestamp: raw.block_timestamp,
            sender_address,
            to_address: raw.to,
            token0,
            token1,
            token_in,
            token_out,
            amount_in,
            amount_out,
            direction,
            reserves,
            gas_used,
            gas_price,
        })
    }
}

/// token0 -> token1 iff only `amount0In` and `amount1Out` are set, and vice versa
fn resolve_direction(
    amount0_in: U256,
    amount1_in: U256,
    amount0_out: U256,
    amount1_out: U256,
) -> Option<Direction> {
    let zero = U256::zero();
    if amount0_in > zero && amount1_out > zero && amount1_in == zero && amount0_out == zero {
        Some(Direction::ZeroForOne)
    } else if amount1_in > zero && amount0_out > zero && amount0_in == zero && amount1_out == zero
    {
        Some(Direction::OneForZero)
    } else {
        None
    }
}

/// The EOA behind the swap. The event's own `sender` is only a fallback since
/// it is usually the router.
fn resolve_sender(raw: &RawSwap, key: OrderKey) -> Result<Address, MalformedEvent> {
    match (raw.tx_from, raw.sender) {
        (Some(from), _) => Ok(from),
        (None, Some(sender)) if ROUTERS.contains_key(&sender) => {
            Err(MalformedEvent::UnattributableSender { key, router: sender })
        }
        (None, Some(sender)) => Ok(sender),
        (None, None) => Err(MalformedEvent::MissingSender { key }),
    }
}

fn parse_amount(value: &str, field: &'static str, key: OrderKey) -> Result<U256, MalformedEvent> {
    let value = value.trim();
    if let Some(abs) = value.strip_prefix('-') {
        let is_zero = U256::from_dec_str(abs).map(|v| v.is_zero()).unwrap_or(false);
        if !is_zero {
            return Err(MalformedEvent::NegativeAmount {
                key,
                field,
                value: value.to_string(),
            });
        }
        return Ok(U256::zero());
    }
    U256::from_dec_str(value).map_err(|_| MalformedEvent::InvalidAmount {
        key,
        field,
        value: value.to_string(),
    })
}
