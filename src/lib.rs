#![allow(clippy::new_without_default)]
//! SANDWICH-INSPECT
//!
//! Utility for detecting and valuing sandwich attacks on constant product
//! AMM pools
//!
//! - Inspectors
//!     - UniswapV2 (and clones)
//! - Sandwich classification
//! - Metrics
//!     - Revenue, profit and victim harm in a reference currency
//! - Aggregation

/// Swap normalizers, one per protocol family
pub mod inspectors;

/// Types for SANDWICH-INSPECT
pub mod types;

/// Various addresses which are found among protocols
pub mod addresses;

/// Per pool windows of ordered swaps
pub mod window;

/// Front-run / back-run matching and the streaming pool scanner
pub mod sandwich;

pub mod metrics;

/// Running totals over detected attacks
pub mod aggregator;

pub mod config;

pub mod pipeline;
pub use pipeline::{Pipeline, Report};

/// In-memory swap source
pub mod source;
pub use source::MemorySource;

mod cached_provider;
pub use cached_provider::CachedSource;

#[cfg(test)]
mod test_helpers;

mod traits;
pub use traits::*;

mod prices;
pub use prices::{HistoricalPrice, NativePrices, PricingUnavailable, Quote, ReferenceCurrency};
