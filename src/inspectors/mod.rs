//! # Inspectors
//!
//! An inspector decodes the raw swap rows of one or more pool protocols into
//! canonical `SwapEvent`s. Decoding is purely structural: amounts are never
//! rounded or converted here.

mod uniswap;
/// The Uniswap V2 inspector, also used for its forks
pub use uniswap::Uniswap;

use crate::{
    traits::SwapNormalizer,
    types::{OrderKey, PoolId, Protocol, RawSwap, SwapEvent},
};
use ethers::types::Address;
use log::warn;
use std::collections::BTreeSet;
use thiserror::Error;

/// A row which cannot be turned into a `SwapEvent`. It is reported and
/// skipped, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("pool {pool:?} has unsupported protocol `{tag}`")]
    UnsupportedProtocol { pool: Address, tag: String },
    #[error("pool {pool:?} is a {protocol} pool, which is not scanned in this run")]
    ProtocolDisabled { pool: Address, protocol: Protocol },
    #[error("negative {field} `{value}` at {key}")]
    NegativeAmount {
        key: OrderKey,
        field: &'static str,
        value: String,
    },
    #[error("invalid {field} `{value}` at {key}")]
    InvalidAmount {
        key: OrderKey,
        field: &'static str,
        value: String,
    },
    #[error("cannot resolve the token pair of {pool} at {key}")]
    UnresolvableTokens { pool: PoolId, key: OrderKey },
    #[error("cannot resolve the direction of the swap in {pool} at {key}")]
    AmbiguousDirection { pool: PoolId, key: OrderKey },
    #[error("swap at {key} has no sender")]
    MissingSender { key: OrderKey },
    #[error("swap at {key} only names the router {router:?} as sender")]
    UnattributableSender { key: OrderKey, router: Address },
    #[error("swap at {key} has no gas price")]
    MissingGasPrice { key: OrderKey },
}

/// Routes raw rows to the inspector of their protocol
#[derive(Debug)]
pub struct Normalizer {
    enabled: BTreeSet<Protocol>,
    inspectors: Vec<Box<dyn SwapNormalizer>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Protocol::ALL.iter().copied())
    }
}

impl Normalizer {
    /// A normalizer for the given protocols, with the default inspectors
    pub fn new(protocols: impl IntoIterator<Item = Protocol>) -> Self {
        Self::with_inspectors(protocols, vec![Box::new(Uniswap::new())])
    }

    pub fn with_inspectors(
        protocols: impl IntoIterator<Item = Protocol>,
        inspectors: Vec<Box<dyn SwapNormalizer>>,
    ) -> Self {
        Self {
            enabled: protocols.into_iter().collect(),
            inspectors,
        }
    }

    pub fn is_enabled(&self, protocol: Protocol) -> bool {
        self.enabled.contains(&protocol)
    }

    /// Decodes one row
    pub fn normalize(&self, raw: &RawSwap) -> Result<SwapEvent, MalformedEvent> {
        let protocol = raw
            .protocol
            .parse::<Protocol>()
            .map_err(|_| MalformedEvent::UnsupportedProtocol {
                pool: raw.pool,
                tag: raw.protocol.clone(),
            })?;
        if !self.is_enabled(protocol) {
            return Err(MalformedEvent::ProtocolDisabled {
                pool: raw.pool,
                protocol,
            });
        }

        let inspector = self
            .inspectors
            .iter()
            .find(|inspector| inspector.protocols().contains(&protocol))
            .ok_or_else(|| MalformedEvent::UnsupportedProtocol {
                pool: raw.pool,
                tag: raw.protocol.clone(),
            })?;
        inspector.normalize(raw, protocol)
    }

    /// Decodes every row, logging and collecting the malformed ones
    pub fn normalize_many<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a RawSwap>,
    ) -> (Vec<SwapEvent>, Vec<MalformedEvent>) {
        let mut swaps = Vec::new();
        let mut malformed = Vec::new();
        for raw in rows {
            match self.normalize(raw) {
                Ok(swap) => swaps.push(swap),
                Err(err) => {
                    warn!("skipping malformed swap in {:?}: {}", raw.pool, err);
                    malformed.push(err);
                }
            }
        }
        (swaps, malformed)
    }
}
