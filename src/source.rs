use crate::config::BlockRange;
use crate::traits::{SourceError, SwapSource};
use crate::types::{PoolId, Protocol, RawSwap};
use async_trait::async_trait;
use ethers::types::Address;
use log::warn;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::ops::RangeInclusive;
use std::path::Path;

/// Serves raw swaps held in memory, e.g. an export of the warehouse
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: BTreeMap<Address, Vec<RawSwap>>,
    undecodable: usize,
}

impl MemorySource {
    pub fn new(rows: impl IntoIterator<Item = RawSwap>) -> Self {
        let mut source = Self::default();
        source.extend(rows);
        source
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = RawSwap>) {
        for row in rows {
            self.rows.entry(row.pool).or_default().push(row);
        }
    }

    /// Reads one JSON encoded `RawSwap` per line. Lines which do not decode
    /// are logged, counted and skipped.
    pub fn from_json_lines(reader: impl BufRead) -> Result<Self, SourceError> {
        let mut rows = Vec::new();
        let mut undecodable = 0;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawSwap>(line) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    warn!("skipping undecodable row on line {}: {}", idx + 1, err);
                    undecodable += 1;
                }
            }
        }
        Ok(Self {
            undecodable,
            ..Self::new(rows)
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path)?;
        Self::from_json_lines(std::io::BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The lowest and highest block of any row
    pub fn block_bounds(&self) -> Option<BlockRange> {
        let blocks = self.rows.values().flatten().map(|row| row.block_number);
        let (start, end) = blocks.fold(None, |bounds, block| match bounds {
            None => Some((block, block)),
            Some((start, end)) => Some((u64::min(start, block), u64::max(end, block))),
        })?;
        Some(BlockRange::new(start, end))
    }
}

#[async_trait]
impl SwapSource for MemorySource {
    async fn fetch_swaps(
        &self,
        pool: PoolId,
        blocks: RangeInclusive<u64>,
    ) -> Result<Vec<RawSwap>, SourceError> {
        Ok(self
            .rows
            .get(&pool.address)
            .map(|rows| {
                rows.iter()
                    .filter(|row| blocks.contains(&row.block_number))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    fn undecodable(&self) -> usize {
        self.undecodable
    }

    async fn pools(&self, blocks: RangeInclusive<u64>) -> Result<Vec<PoolId>, SourceError> {
        let mut pools = Vec::new();
        for (address, rows) in &self.rows {
            let row = match rows.iter().find(|row| blocks.contains(&row.block_number)) {
                Some(row) => row,
                None => continue,
            };
            match row.protocol.parse::<Protocol>() {
                Ok(protocol) => pools.push(PoolId::new(protocol, *address)),
                Err(err) => warn!(
                    "skipping {} rows of pool {:?}: {}",
                    rows.len(),
                    address,
                    err
                ),
            }
        }
        Ok(pools)
    }
}
