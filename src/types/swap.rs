use crate::prices::to_bigint;
use crate::types::{Direction, OrderKey, PoolId, Protocol};
use ethers::types::{Address, TxHash, U256};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A swap log joined with its transaction, as delivered by the warehouse.
///
/// Amounts are kept as the decimal strings the warehouse exports so that
/// validation happens in exactly one place, the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSwap {
    /// The pair contract which emitted the `Swap` log
    pub pool: Address,
    /// The protocol tag of the pair, e.g. `uniswapv2`
    pub protocol: String,
    pub token0: Option<Address>,
    pub token1: Option<Address>,

    pub block_number: u64,
    pub tx_index: u64,
    pub log_index: u64,
    #[serde(default)]
    pub tx_hash: TxHash,
    #[serde(default)]
    pub block_timestamp: Option<i64>,

    /// The EOA which signed the transaction
    #[serde(default)]
    pub tx_from: Option<Address>,
    /// The `sender` topic of the log, usually a router
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,

    pub amount0_in: String,
    pub amount1_in: String,
    pub amount0_out: String,
    pub amount1_out: String,

    /// The pair's reserves right before this swap (the preceding `Sync`)
    #[serde(default)]
    pub reserve0: Option<String>,
    #[serde(default)]
    pub reserve1: Option<String>,

    pub gas_used: String,
    #[serde(default)]
    pub effective_gas_price: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
}

/// A pair's reserves at some point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub reserve0: U256,
    pub reserve1: U256,
}

impl Reserves {
    pub fn new<A: Into<U256>, B: Into<U256>>(reserve0: A, reserve1: B) -> Self {
        Self {
            reserve0: reserve0.into(),
            reserve1: reserve1.into(),
        }
    }

    /// Returns the `(reserve_in, reserve_out)` pair as seen by a swap in
    /// `direction`
    pub fn oriented(&self, direction: Direction) -> (U256, U256) {
        match direction {
            Direction::ZeroForOne => (self.reserve0, self.reserve1),
            Direction::OneForZero => (self.reserve1, self.reserve0),
        }
    }
}

/// A canonical on-chain swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub pool_id: PoolId,
    pub key: OrderKey,
    pub tx_hash: TxHash,
    pub timestamp: Option<i64>,

    /// The actor behind the swap (the transaction's EOA when known)
    pub sender_address: Address,
    pub to_address: Option<Address>,

    pub token0: Address,
    pub token1: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub direction: Direction,

    /// Reserves right before the swap, if the source could provide them
    pub reserves: Option<Reserves>,

    pub gas_used: U256,
    pub gas_price: U256,
}

impl SwapEvent {
    pub fn protocol(&self) -> Protocol {
        self.pool_id.protocol
    }

    pub fn block_number(&self) -> u64 {
        self.key.block_number
    }

    /// The fee paid for the transaction which contains this swap, in wei
    pub fn gas_cost(&self) -> BigInt {
        to_bigint(self.gas_used) * to_bigint(self.gas_price)
    }

    /// The pool token which is not `token`
    pub fn other_token(&self, token: Address) -> Address {
        if token == self.token0 {
            self.token1
        } else {
            self.token0
        }
    }

    /// The pool's reserve of `token` right before this swap
    pub fn reserve_of(&self, token: Address) -> Option<U256> {
        let reserves = self.reserves?;
        if token == self.token0 {
            Some(reserves.reserve0)
        } else if token == self.token1 {
            Some(reserves.reserve1)
        } else {
            None
        }
    }
}
