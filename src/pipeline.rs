//! The batch pipeline.
//!
//! Every pool is scanned by its own task which owns all of the pool's state,
//! so pools run in parallel without sharing anything mutable. A pool which
//! cannot be fetched fails on its own, while a modeling error in the metrics
//! aborts the whole run.

use crate::addresses::lookup;
use crate::aggregator::Aggregator;
use crate::config::{Config, ConfigError};
use crate::inspectors::Normalizer;
use crate::metrics::{MetricsCalculator, MetricsError};
use crate::sandwich::{Classifier, PoolScanner};
use crate::traits::{SourceError, SwapSource};
use crate::types::{PoolId, RejectReason, Sandwich, SandwichAttack};
use crate::window::OrderingViolation;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single pool. Other pools are unaffected.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("fetching blocks {start}..={end} timed out after {timeout:?}")]
    Timeout {
        start: u64,
        end: u64,
        timeout: Duration,
    },
    #[error("fetching blocks {start}..={end} failed: {source}")]
    Retrieval {
        start: u64,
        end: u64,
        source: SourceError,
    },
    #[error(transparent)]
    Ordering(#[from] OrderingViolation),
    #[error(transparent)]
    Metrics(MetricsError),
    #[error("pool worker died: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not list pools: {0}")]
    Source(#[from] SourceError),
    /// A modeling defect, every result of the run is suspect
    #[error("aborting run, {pool}: {source}")]
    NegativeHarm { pool: PoolId, source: MetricsError },
}

/// What happened in one pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolReport {
    /// Rows fetched from the source
    pub rows: usize,
    /// Rows which could not be normalized
    pub malformed: usize,
    /// Victim candidates classified
    pub evaluated: usize,
    pub rejections: HashMap<RejectReason, usize>,
    /// Attacks reported
    pub attacks: usize,
    /// Attacks withheld for lack of prices
    pub withheld: usize,
}

/// The outcome of a run
#[derive(Debug, Default)]
pub struct Report {
    /// Every reported attack, ordered by the victim's order key
    pub attacks: Vec<SandwichAttack>,
    pub aggregator: Aggregator,
    pub pools: BTreeMap<PoolId, PoolReport>,
    pub failed: BTreeMap<PoolId, PoolError>,
    /// Rows the source could not decode, which belong to no pool
    pub undecodable: usize,
    /// The last block every successful pool was scanned through
    pub high_water_mark: u64,
}

impl Report {
    /// Rows which were skipped, whether the source or a pool's normalizer
    /// rejected them
    pub fn malformed(&self) -> usize {
        self.undecodable + self.pools.values().map(|pool| pool.malformed).sum::<usize>()
    }

    pub fn withheld(&self) -> usize {
        self.pools.values().map(|pool| pool.withheld).sum()
    }
}

/// Scans the configured block range of every pool a source knows about
pub struct Pipeline<S> {
    source: Arc<S>,
    config: Arc<Config>,
    normalizer: Arc<Normalizer>,
    metrics: Arc<MetricsCalculator>,
}

impl<S: SwapSource + 'static> Pipeline<S> {
    pub fn new(source: S, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = MetricsCalculator::new(config.pricing()?);
        let normalizer = Normalizer::new(config.pool_protocols.iter().copied());
        Ok(Self {
            source: Arc::new(source),
            config: Arc::new(config),
            normalizer: Arc::new(normalizer),
            metrics: Arc::new(metrics),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The pools to scan: the configured ones, or every pool the source has
    /// swaps for, restricted to the enabled protocols
    pub async fn pools(&self) -> Result<Vec<PoolId>, SourceError> {
        let mut pools = match &self.config.pools {
            Some(pools) => pools.clone(),
            None => self.source.pools(self.config.block_range.to_range()).await?,
        };
        let total = pools.len();
        pools.retain(|pool| self.config.scans(pool.protocol));
        pools.sort();
        pools.dedup();
        if pools.len() < total {
            debug!("skipping {} pools of disabled protocols", total - pools.len());
        }
        Ok(pools)
    }

    /// Runs the pipeline over the configured block range
    pub async fn run(&self) -> Result<Report, PipelineError> {
        let pools = self.pools().await?;
        info!(
            "scanning {} pools over blocks {}..={}",
            pools.len(),
            self.config.block_range.start,
            self.config.block_range.end
        );

        let mut outcomes = stream::iter(pools)
            .map(|pool_id| {
                let worker = self.worker(pool_id);
                async move {
                    let result = tokio::spawn(worker.run())
                        .await
                        .unwrap_or_else(|err| Err(PoolError::Worker(err.to_string())));
                    (pool_id, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent_pools);

        let mut finished = BTreeMap::new();
        while let Some((pool_id, result)) = outcomes.next().await {
            match result {
                Err(PoolError::Metrics(err)) if err.is_fatal() => {
                    return Err(PipelineError::NegativeHarm {
                        pool: pool_id,
                        source: err,
                    })
                }
                result => {
                    finished.insert(pool_id, result);
                }
            }
        }

        let mut report = Report {
            undecodable: self.source.undecodable(),
            high_water_mark: self.config.block_range.end,
            ..Report::default()
        };
        for (pool_id, result) in finished {
            match result {
                Ok((pool_report, attacks)) => {
                    report.attacks.extend(attacks);
                    report.pools.insert(pool_id, pool_report);
                }
                Err(err) => {
                    warn!("{} failed: {}", pool_id, err);
                    report.failed.insert(pool_id, err);
                }
            }
        }
        report
            .attacks
            .sort_by_key(|attack| (attack.id.victim, attack.id.pool_id));
        report.aggregator.extend(report.attacks.iter().cloned());

        info!(
            "found {} attacks in {} pools ({} failed, {} malformed rows, {} withheld)",
            report.attacks.len(),
            report.pools.len(),
            report.failed.len(),
            report.malformed(),
            report.withheld()
        );
        Ok(report)
    }

    fn worker(&self, pool_id: PoolId) -> PoolWorker<S> {
        PoolWorker {
            pool_id,
            source: self.source.clone(),
            config: self.config.clone(),
            normalizer: self.normalizer.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Owns the scan of a single pool
struct PoolWorker<S> {
    pool_id: PoolId,
    source: Arc<S>,
    config: Arc<Config>,
    normalizer: Arc<Normalizer>,
    metrics: Arc<MetricsCalculator>,
}

impl<S: SwapSource + 'static> PoolWorker<S> {
    async fn run(self) -> Result<(PoolReport, Vec<SandwichAttack>), PoolError> {
        let classifier = Classifier::new(
            self.config.window_radius,
            self.config.min_victim_amount_in(),
        );
        let mut scanner = PoolScanner::new(self.pool_id, classifier);
        let mut report = PoolReport::default();
        let mut attacks = Vec::new();

        for chunk in self
            .config
            .block_range
            .chunks(self.config.batch_blocks)
        {
            let (start, end) = (*chunk.start(), *chunk.end());
            let timeout = self.config.fetch_timeout();
            let rows = tokio::time::timeout(timeout, self.source.fetch_swaps(self.pool_id, chunk))
                .await
                .map_err(|_| PoolError::Timeout {
                    start,
                    end,
                    timeout,
                })?
                .map_err(|source| PoolError::Retrieval { start, end, source })?;
            report.rows += rows.len();

            let (mut swaps, malformed) = self.normalizer.normalize_many(&rows);
            report.malformed += malformed.len();
            swaps.retain(|swap| {
                let belongs = swap.pool_id == self.pool_id && (start..=end).contains(&swap.block_number());
                if !belongs {
                    warn!(
                        "{}: dropping swap {} of {} returned for blocks {}..={}",
                        self.pool_id, swap.key, swap.pool_id, start, end
                    );
                }
                belongs
            });
            report.malformed += rows.len() - malformed.len() - swaps.len();
            swaps.sort_by_key(|swap| swap.key);

            for swap in swaps {
                for sandwich in scanner.push(swap)? {
                    self.price(sandwich, &mut report, &mut attacks)?;
                }
            }
        }
        for sandwich in scanner.finish() {
            self.price(sandwich, &mut report, &mut attacks)?;
        }

        report.evaluated = scanner.evaluated();
        report.rejections = scanner.rejections().clone();
        info!(
            "{}: {} rows, {} attacks, {} withheld, {} malformed",
            self.pool_id, report.rows, report.attacks, report.withheld, report.malformed
        );
        Ok((report, attacks))
    }

    fn price(
        &self,
        sandwich: Sandwich,
        report: &mut PoolReport,
        attacks: &mut Vec<SandwichAttack>,
    ) -> Result<(), PoolError> {
        let id = sandwich.id();
        match self.metrics.evaluate(sandwich) {
            Ok(attack) => {
                info!(
                    "sandwich {} by {} on {}: revenue {}, profit {}, harm {}",
                    attack.id,
                    lookup(attack.attacker()),
                    lookup(attack.victim_address()),
                    attack.revenue,
                    attack.profit,
                    attack.harm
                );
                report.attacks += 1;
                attacks.push(attack);
                Ok(())
            }
            Err(MetricsError::PricingUnavailable(err)) => {
                warn!("withholding sandwich {}: {}", id, err);
                report.withheld += 1;
                Ok(())
            }
            Err(err) => Err(PoolError::Metrics(err)),
        }
    }
}
