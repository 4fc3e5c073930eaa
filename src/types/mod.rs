//! All the datatypes associated with sandwich inspection
pub mod swap;
pub use swap::{RawSwap, Reserves, SwapEvent};

pub mod attack;
pub use attack::{AttackId, Sandwich, SandwichAttack, Valuation};

pub(crate) mod classification;
pub use classification::{Classification, RejectReason};

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The supported protocols. All of them are constant product pairs which
/// emit the Uniswap V2 `Swap` event.
pub enum Protocol {
    UniswapV2,
    SushiswapV2,
    PancakeSwapV2,
}

impl Protocol {
    /// Every supported protocol family
    pub const ALL: [Protocol; 3] = [
        Protocol::UniswapV2,
        Protocol::SushiswapV2,
        Protocol::PancakeSwapV2,
    ];

    /// The swap fee as a `(numerator, denominator)` pair of the amount which
    /// remains after the fee, as used in the pair's `getAmountOut`.
    pub fn fee(&self) -> (u64, u64) {
        match self {
            // 0.30%
            Protocol::UniswapV2 | Protocol::SushiswapV2 => (997, 1000),
            // 0.25%
            Protocol::PancakeSwapV2 => (9975, 10000),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(|c: char| c == '_' || c == '-', "").as_str() {
            "uniswapv2" | "uniswap" => Ok(Protocol::UniswapV2),
            "sushiswapv2" | "sushiswap" | "sushi" => Ok(Protocol::SushiswapV2),
            "pancakeswapv2" | "pancakeswap" | "pancake" => Ok(Protocol::PancakeSwapV2),
            _ => Err(format!("`{}` is not a supported protocol", s)),
        }
    }
}

/// A liquidity pool: the protocol family and the pair address
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId {
    pub protocol: Protocol,
    pub address: Address,
}

impl PoolId {
    pub fn new(protocol: Protocol, address: Address) -> Self {
        Self { protocol, address }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.protocol, self.address)
    }
}

/// The chain's canonical ordering of events. Ordering is lexicographic over
/// `(block_number, tx_index, log_index)`.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub block_number: u64,
    pub tx_index: u64,
    pub log_index: u64,
}

impl OrderKey {
    pub fn new(block_number: u64, tx_index: u64, log_index: u64) -> Self {
        Self {
            block_number,
            tx_index,
            log_index,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.block_number, self.tx_index, self.log_index
        )
    }
}

/// Which of the pool's two tokens was sold
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// token0 in, token1 out
    ZeroForOne,
    /// token1 in, token0 out
    OneForZero,
}

impl Direction {
    /// The direction which closes a position opened in this direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::ZeroForOne => Direction::OneForZero,
            Direction::OneForZero => Direction::ZeroForOne,
        }
    }
}
