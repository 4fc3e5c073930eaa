use crate::addresses::WETH;
use crate::prices::ReferenceCurrency;
use crate::types::{
    Direction, OrderKey, PoolId, Protocol, RawSwap, Reserves, Sandwich, SandwichAttack,
    SwapEvent, Valuation,
};
use ethers::types::{Address, TxHash, U256};
use num_bigint::BigInt;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn attacker() -> Address {
    addr(0xa)
}

pub fn victim() -> Address {
    addr(0xb)
}

/// token0 of the test pool, the wrapped native token
pub fn token_x() -> Address {
    *WETH
}

/// token1 of the test pool
pub fn token_y() -> Address {
    addr(0x7)
}

pub fn pool() -> PoolId {
    PoolId::new(Protocol::UniswapV2, addr(0x1001))
}

pub fn pool_n(n: u64) -> PoolId {
    PoolId::new(Protocol::UniswapV2, addr(0x1000 + n))
}

/// Builds `SwapEvent`s on the `token_x` / `token_y` pair
pub struct SwapBuilder {
    swap: SwapEvent,
}

impl SwapBuilder {
    pub fn new(pool_id: PoolId, block_number: u64, tx_index: u64) -> Self {
        Self {
            swap: SwapEvent {
                pool_id,
                key: OrderKey::new(block_number, tx_index, 0),
                tx_hash: TxHash::from_low_u64_be(block_number * 1_000 + tx_index),
                timestamp: None,
                sender_address: victim(),
                to_address: None,
                token0: token_x(),
                token1: token_y(),
                token_in: token_x(),
                token_out: token_y(),
                amount_in: 1u64.into(),
                amount_out: 1u64.into(),
                direction: Direction::ZeroForOne,
                reserves: None,
                gas_used: U256::zero(),
                gas_price: U256::zero(),
            },
        }
    }

    pub fn log_index(mut self, log_index: u64) -> Self {
        self.swap.key.log_index = log_index;
        self
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.swap.sender_address = sender;
        self
    }

    /// Sells `amount_in` of token0 for `amount_out` of token1
    pub fn sell0(mut self, amount_in: u64, amount_out: u64) -> Self {
        self.swap.direction = Direction::ZeroForOne;
        self.swap.token_in = self.swap.token0;
        self.swap.token_out = self.swap.token1;
        self.swap.amount_in = amount_in.into();
        self.swap.amount_out = amount_out.into();
        self
    }

    /// Sells `amount_in` of token1 for `amount_out` of token0
    pub fn sell1(mut self, amount_in: u64, amount_out: u64) -> Self {
        self.swap.direction = Direction::OneForZero;
        self.swap.token_in = self.swap.token1;
        self.swap.token_out = self.swap.token0;
        self.swap.amount_in = amount_in.into();
        self.swap.amount_out = amount_out.into();
        self
    }

    pub fn reserves(mut self, reserve0: u64, reserve1: u64) -> Self {
        self.swap.reserves = Some(Reserves::new(reserve0, reserve1));
        self
    }

    pub fn gas(mut self, gas_used: u64, gas_price: u64) -> Self {
        self.swap.gas_used = gas_used.into();
        self.swap.gas_price = gas_price.into();
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.swap.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> SwapEvent {
        self.swap
    }
}

/// The sandwich used throughout the tests, on a pool holding 100_000 X and
/// 200_000 Y. All amounts follow the 0.3% constant product formula.
///
/// - front-run: attacker sells 1_000 X for 1_974 Y
/// - victim: sells 10_000 X for 17_791 Y (18_132 Y without the front-run)
/// - back-run: attacker sells 1_974 Y for 1_198 X
pub fn sandwich_swaps(pool_id: PoolId, block_number: u64) -> Vec<SwapEvent> {
    vec![
        SwapBuilder::new(pool_id, block_number, 0)
            .sender(attacker())
            .sell0(1_000, 1_974)
            .reserves(100_000, 200_000)
            .gas(10, 2)
            .build(),
        SwapBuilder::new(pool_id, block_number, 1)
            .sender(victim())
            .sell0(10_000, 17_791)
            .reserves(101_000, 198_026)
            .gas(10, 1)
            .timestamp(1_700_000_000)
            .build(),
        SwapBuilder::new(pool_id, block_number, 2)
            .sender(attacker())
            .sell1(1_974, 1_198)
            .reserves(111_000, 180_235)
            .gas(10, 3)
            .build(),
    ]
}

pub fn simple_sandwich() -> Sandwich {
    let mut swaps = sandwich_swaps(pool(), 100).into_iter();
    let (front_run, victim, back_run) = match (swaps.next(), swaps.next(), swaps.next()) {
        (Some(f), Some(v), Some(b)) => (f, v, b),
        _ => unreachable!("three swaps"),
    };
    Sandwich {
        front_run,
        victim,
        back_run,
        attacker: attacker(),
    }
}

/// An already priced attack by `attacker` on `victim` in `block`, valued in
/// wei
pub fn attack_at(
    pool_id: PoolId,
    block_number: u64,
    attacker: Address,
    victim: Address,
    (revenue, profit, harm): (i64, i64, i64),
) -> SandwichAttack {
    let mut swaps = sandwich_swaps(pool_id, block_number).into_iter();
    let (mut front_run, mut victim_swap, mut back_run) =
        match (swaps.next(), swaps.next(), swaps.next()) {
            (Some(f), Some(v), Some(b)) => (f, v, b),
            _ => unreachable!("three swaps"),
        };
    front_run.sender_address = attacker;
    back_run.sender_address = attacker;
    victim_swap.sender_address = victim;
    victim_swap.timestamp = Some(1_700_000_000 + block_number as i64 * 12);
    let sandwich = Sandwich {
        front_run,
        victim: victim_swap,
        back_run,
        attacker,
    };
    let value = |v: i64| {
        Valuation::new(
            BigInt::from(v),
            ReferenceCurrency::Native,
            vec![block_number],
        )
    };
    SandwichAttack {
        id: sandwich.id(),
        sandwich,
        revenue: value(revenue),
        profit: value(profit),
        gas_cost: value(revenue - profit),
        harm: value(harm),
        attacker_gas_fee: BigInt::from(50),
    }
}

/// A raw warehouse row selling token0 of `pool_n(pool)`
pub fn raw_swap(pool: u64, block_number: u64, tx_index: u64, sender: Address) -> RawSwap {
    RawSwap {
        pool: pool_n(pool).address,
        protocol: "uniswapv2".to_string(),
        token0: Some(token_x()),
        token1: Some(token_y()),
        block_number,
        tx_index,
        log_index: 0,
        tx_hash: TxHash::from_low_u64_be(block_number * 1_000 + tx_index),
        block_timestamp: None,
        tx_from: Some(sender),
        sender: None,
        to: None,
        amount0_in: "1000".to_string(),
        amount1_in: "0".to_string(),
        amount0_out: "0".to_string(),
        amount1_out: "1974".to_string(),
        reserve0: Some("100000".to_string()),
        reserve1: Some("200000".to_string()),
        gas_used: "10".to_string(),
        effective_gas_price: Some("2".to_string()),
        gas_price: None,
    }
}

/// Flips a raw row to sell token1 instead
pub fn flip(mut raw: RawSwap, amount_in: u64, amount_out: u64) -> RawSwap {
    raw.amount0_in = "0".to_string();
    raw.amount1_out = "0".to_string();
    raw.amount1_in = amount_in.to_string();
    raw.amount0_out = amount_out.to_string();
    raw
}

/// The raw rows of `sandwich_swaps` on `pool_n(pool)`
pub fn raw_sandwich(pool: u64, block_number: u64) -> Vec<RawSwap> {
    let front = raw_swap(pool, block_number, 0, attacker());

    let mut victim_row = raw_swap(pool, block_number, 1, victim());
    victim_row.amount0_in = "10000".to_string();
    victim_row.amount1_out = "17791".to_string();
    victim_row.reserve0 = Some("101000".to_string());
    victim_row.reserve1 = Some("198026".to_string());
    victim_row.effective_gas_price = Some("1".to_string());
    victim_row.block_timestamp = Some(1_700_000_000);

    let mut back = flip(raw_swap(pool, block_number, 2, attacker()), 1_974, 1_198);
    back.reserve0 = Some("111000".to_string());
    back.reserve1 = Some("180235".to_string());
    back.effective_gas_price = Some("3".to_string());

    vec![front, victim_row, back]
}

/// Collects the `(block, tx_index)` pairs of the swaps
pub fn positions(swaps: &[&SwapEvent]) -> Vec<(u64, u64)> {
    swaps
        .iter()
        .map(|s| (s.key.block_number, s.key.tx_index))
        .collect()
}
