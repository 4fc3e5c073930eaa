use crate::inspectors::MalformedEvent;
use crate::types::{PoolId, Protocol, RawSwap, SwapEvent};
use async_trait::async_trait;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Trait for decoding the raw swap rows of specific pool protocols
pub trait SwapNormalizer: core::fmt::Debug + Send + Sync {
    /// The protocol families this normalizer can decode
    fn protocols(&self) -> &[Protocol];

    /// Decodes a row which is known to belong to `protocol`
    fn normalize(&self, raw: &RawSwap, protocol: Protocol) -> Result<SwapEvent, MalformedEvent>;
}

/// Pull interface to wherever raw swaps are stored
#[async_trait]
pub trait SwapSource: Send + Sync {
    /// Returns the raw swaps of `pool` whose block lies in `blocks`. Rows need
    /// not be ordered.
    async fn fetch_swaps(
        &self,
        pool: PoolId,
        blocks: RangeInclusive<u64>,
    ) -> Result<Vec<RawSwap>, SourceError>;

    /// Returns every pool with swaps in `blocks`
    async fn pools(&self, blocks: RangeInclusive<u64>) -> Result<Vec<PoolId>, SourceError>;

    /// Rows the source read but could not decode. No pool ever sees them.
    fn undecodable(&self) -> usize {
        0
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    DeserializationError(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}
