use crate::traits::{SourceError, SwapSource};
use crate::types::{PoolId, RawSwap};
use async_trait::async_trait;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Wraps a `SwapSource`, storing every answer as a JSON file so that
/// repeated runs over the same blocks never hit the inner source again
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    cache: PathBuf,
}

impl<S: SwapSource> CachedSource<S> {
    /// Creates a new source with the cache located at the provided path
    pub fn new<P: Into<PathBuf>>(inner: S, cache: P) -> Self {
        Self {
            inner,
            cache: cache.into(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn read<T: DeserializeOwned, K: AsRef<Path>>(&self, fname: K) -> Result<T, SourceError> {
        let path = self.cache.join(fname);
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str::<T>(&json)?)
    }

    fn write<T: Serialize, K: AsRef<Path>>(&self, fname: K, data: T) -> Result<(), SourceError> {
        std::fs::create_dir_all(&self.cache)?;
        let path = self.cache.join(fname);
        let writer = std::fs::File::create(path)?;
        Ok(serde_json::to_writer(writer, &data)?)
    }
}

#[async_trait]
impl<S: SwapSource> SwapSource for CachedSource<S> {
    async fn fetch_swaps(
        &self,
        pool: PoolId,
        blocks: RangeInclusive<u64>,
    ) -> Result<Vec<RawSwap>, SourceError> {
        let fname = format!(
            "{}-{:?}-{}-{}.swaps.json",
            pool.protocol,
            pool.address,
            blocks.start(),
            blocks.end()
        );
        // check if it exists, else get from the inner source
        if let Ok(rows) = self.read(&fname) {
            debug!("cache hit for {}", fname);
            return Ok(rows);
        }
        let rows = self.inner.fetch_swaps(pool, blocks).await?;
        self.write(&fname, &rows)?;
        Ok(rows)
    }

    async fn pools(&self, blocks: RangeInclusive<u64>) -> Result<Vec<PoolId>, SourceError> {
        let fname = format!("{}-{}.pools.json", blocks.start(), blocks.end());
        if let Ok(pools) = self.read(&fname) {
            return Ok(pools);
        }
        let pools = self.inner.pools(blocks).await?;
        self.write(&fname, &pools)?;
        Ok(pools)
    }

    fn undecodable(&self) -> usize {
        self.inner.undecodable()
    }
}
