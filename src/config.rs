use crate::addresses::WETH;
use crate::prices::{HistoricalPrice, NativePrices, ReferenceCurrency};
use crate::types::{PoolId, Protocol};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no pool protocol selected")]
    NoProtocols,
    #[error("block range {start}..={end} is empty")]
    EmptyRange { start: u64, end: u64 },
    #[error("the window radius must be at least one block")]
    ZeroRadius,
    #[error("batches must span at least one block")]
    ZeroBatch,
    #[error("at least one pool must be scanned at a time")]
    ZeroConcurrency,
    #[error("invalid native price `{price}` at block {block}: {reason}")]
    InvalidPrice {
        block: u64,
        price: String,
        reason: String,
    },
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    DeserializationError(#[from] serde_json::Error),
}

/// An inclusive range of blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }

    pub fn to_range(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }

    /// Splits the range into consecutive chunks of at most `size` blocks
    pub fn chunks(&self, size: u64) -> impl Iterator<Item = RangeInclusive<u64>> {
        let BlockRange { start, end } = *self;
        let size = size.max(1);
        let mut next = Some(start).filter(|start| *start <= end);
        std::iter::from_fn(move || {
            let from = next?;
            let to = from.saturating_add(size - 1).min(end);
            next = if to < end { Some(to + 1) } else { None };
            Some(from..=to)
        })
    }
}

impl Default for BlockRange {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// The price of one whole native unit in whole reference units at a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativePricePoint {
    pub block: u64,
    /// Decimal string, e.g. `"1834.25"`
    pub price: String,
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The protocol families to scan
    #[serde(default = "default_protocols")]
    pub pool_protocols: Vec<Protocol>,
    #[serde(default)]
    pub block_range: BlockRange,
    #[serde(default)]
    pub reference_currency: ReferenceCurrency,
    /// Blocks around the victim's block which may hold the attacker's legs
    #[serde(default = "default_window_radius")]
    pub window_radius: u64,
    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: Address,
    /// Needed to value gas and wrapped native amounts in a token reference
    #[serde(default)]
    pub native_prices: Vec<NativePricePoint>,
    /// Victim swaps must trade strictly more than this, in their input token
    #[serde(default)]
    pub min_victim_amount_in: u128,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// How many blocks to fetch per call to the source
    #[serde(default = "default_batch_blocks")]
    pub batch_blocks: u64,
    #[serde(default = "default_max_concurrent_pools")]
    pub max_concurrent_pools: usize,
    /// Scan exactly these pools instead of asking the source
    #[serde(default)]
    pub pools: Option<Vec<PoolId>>,
}

fn default_protocols() -> Vec<Protocol> {
    Protocol::ALL.to_vec()
}

fn default_window_radius() -> u64 {
    1
}

fn default_wrapped_native() -> Address {
    *WETH
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_batch_blocks() -> u64 {
    1_000
}

fn default_max_concurrent_pools() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_protocols: default_protocols(),
            block_range: BlockRange::default(),
            reference_currency: ReferenceCurrency::Native,
            window_radius: default_window_radius(),
            wrapped_native: default_wrapped_native(),
            native_prices: Vec::new(),
            min_victim_amount_in: 0,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            batch_blocks: default_batch_blocks(),
            max_concurrent_pools: default_max_concurrent_pools(),
            pools: None,
        }
    }
}

impl Config {
    /// Reads a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_protocols.is_empty() {
            return Err(ConfigError::NoProtocols);
        }
        if self.block_range.start > self.block_range.end {
            return Err(ConfigError::EmptyRange {
                start: self.block_range.start,
                end: self.block_range.end,
            });
        }
        if self.window_radius == 0 {
            return Err(ConfigError::ZeroRadius);
        }
        if self.batch_blocks == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if self.max_concurrent_pools == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.native_price_book()?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn min_victim_amount_in(&self) -> U256 {
        U256::from(self.min_victim_amount_in)
    }

    pub fn scans(&self, protocol: Protocol) -> bool {
        self.pool_protocols.contains(&protocol)
    }

    /// Builds the price source for valuing attacks
    pub fn pricing(&self) -> Result<HistoricalPrice, ConfigError> {
        Ok(HistoricalPrice::new(
            self.reference_currency,
            self.wrapped_native,
            self.native_price_book()?,
        ))
    }

    fn native_price_book(&self) -> Result<NativePrices, ConfigError> {
        let decimals = self.reference_currency.decimals();
        let mut book = NativePrices::new();
        for point in &self.native_prices {
            let invalid = |reason: String| ConfigError::InvalidPrice {
                block: point.block,
                price: point.price.clone(),
                reason,
            };
            let price =
                Decimal::from_str(point.price.trim()).map_err(|err| invalid(err.to_string()))?;
            if price.is_sign_negative() || price.is_zero() {
                return Err(invalid("prices must be positive".to_string()));
            }
            book.insert(point.block, price, decimals);
        }
        Ok(book)
    }

    /// The first block to scan in the next incremental run after a run
    /// which scanned everything up to `high_water_mark`.
    ///
    /// Victims near the previous end may have been classified without their
    /// back-run, so the next run starts early enough to see their whole
    /// window again. Overlapping attacks are dropped by their id.
    pub fn resume_from(&self, high_water_mark: u64) -> u64 {
        high_water_mark.saturating_sub(self.window_radius.saturating_mul(2))
    }
}
