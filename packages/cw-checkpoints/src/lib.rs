#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

use std::ops::{Add, Sub};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use cosmwasm_std::{StdError, StdResult, Storage};
use cw_storage_plus::{Map, Prefixer, PrimaryKey};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CheckpointError {
    #[error(transparent)]
    Std(#[from] StdError),

    #[error("checkpoint keys must not decrease. got ({key}), latest is ({latest})")]
    DecreasingKey { key: u64, latest: u64 },
}

/// A single history entry: the clock key it was recorded at and the value
/// that held from that key onward.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint<V> {
    pub key: u64,
    pub value: V,
}

/// A map to an append-only history of `(key, value)` checkpoints, where
/// keys are monotonically non-decreasing clock values. The latest value is
/// readable in O(1) and the value as of any past key in O(log n).
///
/// Pushing a key equal to the latest key overwrites the latest value, so a
/// series never holds two entries with the same key. Pushing a key smaller
/// than the latest key fails.
///
/// `V::default()` is what lookups return for a point in time before the
/// first checkpoint (or for an empty series).
pub struct CheckpointMap<'a, K, V> {
    /// Entries for a series, indexed by insertion position.
    checkpoints: Map<'a, (K, u64), Checkpoint<V>>,
    /// The number of entries per series.
    length: Map<'a, K, u64>,
}

impl<'a, K, V> CheckpointMap<'a, K, V> {
    /// Creates a new [`CheckpointMap`] with the given storage keys.
    ///
    /// Example:
    ///
    /// ```rust
    /// use cw_checkpoints::CheckpointMap;
    /// use cosmwasm_std::{Addr, Uint128};
    ///
    /// pub const VOTE_WEIGHTS: CheckpointMap<&Addr, Uint128> =
    ///     CheckpointMap::new("vote_weights", "vote_weights__length");
    /// ```
    pub const fn new(checkpoints_key: &'a str, length_key: &'a str) -> Self {
        Self {
            checkpoints: Map::new(checkpoints_key),
            length: Map::new(length_key),
        }
    }
}

impl<'a, K, V> CheckpointMap<'a, K, V>
where
    K: PrimaryKey<'a> + Prefixer<'a> + Clone,
    V: Serialize + DeserializeOwned + Clone + Default,
{
    /// The number of checkpoints stored for a series. Coalesced same-key
    /// pushes count once.
    pub fn len(&self, storage: &dyn Storage, k: K) -> StdResult<u64> {
        Ok(self.length.may_load(storage, k)?.unwrap_or_default())
    }

    pub fn is_empty(&self, storage: &dyn Storage, k: K) -> StdResult<bool> {
        Ok(self.len(storage, k)? == 0)
    }

    /// Appends a checkpoint, or overwrites the latest one if `key` equals
    /// its key. Fails with [`CheckpointError::DecreasingKey`] if `key` is
    /// smaller than the latest stored key.
    pub fn push(
        &self,
        storage: &mut dyn Storage,
        k: K,
        key: u64,
        value: V,
    ) -> Result<(), CheckpointError> {
        let len = self.len(storage, k.clone())?;
        if len > 0 {
            let latest = self.at(storage, k.clone(), len - 1)?;
            if key < latest.key {
                return Err(CheckpointError::DecreasingKey {
                    key,
                    latest: latest.key,
                });
            }
            if key == latest.key {
                self.checkpoints
                    .save(storage, (k, len - 1), &Checkpoint { key, value })?;
                return Ok(());
            }
        }
        self.checkpoints
            .save(storage, (k.clone(), len), &Checkpoint { key, value })?;
        self.length.save(storage, k, &(len + 1))?;
        Ok(())
    }

    /// Pushes the result of applying `action` to the latest value (or the
    /// default for an empty series), returning the new value.
    pub fn update(
        &self,
        storage: &mut dyn Storage,
        k: K,
        key: u64,
        action: impl Fn(V) -> V,
    ) -> Result<V, CheckpointError> {
        let value = action(self.latest(storage, k.clone())?);
        self.push(storage, k, key, value.clone())?;
        Ok(value)
    }

    pub fn increment(
        &self,
        storage: &mut dyn Storage,
        k: K,
        key: u64,
        delta: V,
    ) -> Result<V, CheckpointError>
    where
        V: Add<Output = V>,
    {
        self.update(storage, k, key, |v| v + delta.clone())
    }

    pub fn decrement(
        &self,
        storage: &mut dyn Storage,
        k: K,
        key: u64,
        delta: V,
    ) -> Result<V, CheckpointError>
    where
        V: Sub<Output = V>,
    {
        self.update(storage, k, key, |v| v - delta.clone())
    }

    /// The most recent value, or the default if the series is empty. O(1).
    pub fn latest(&self, storage: &dyn Storage, k: K) -> StdResult<V> {
        Ok(self
            .latest_checkpoint(storage, k)?
            .map(|(_, value)| value)
            .unwrap_or_default())
    }

    /// The most recent `(key, value)` pair, or `None` if the series is
    /// empty.
    pub fn latest_checkpoint(&self, storage: &dyn Storage, k: K) -> StdResult<Option<(u64, V)>> {
        let len = self.len(storage, k.clone())?;
        if len == 0 {
            return Ok(None);
        }
        let latest = self.at(storage, k, len - 1)?;
        Ok(Some((latest.key, latest.value)))
    }

    /// The value of the first checkpoint with key greater than or equal to
    /// `key`, or the default if there is none. O(log n).
    pub fn lower_lookup(&self, storage: &dyn Storage, k: K, key: u64) -> StdResult<V> {
        let len = self.len(storage, k.clone())?;
        let pos = self.first_at_or_above(storage, k.clone(), key, 0, len)?;
        if pos == len {
            return Ok(V::default());
        }
        Ok(self.at(storage, k, pos)?.value)
    }

    /// The value of the last checkpoint with key less than or equal to
    /// `key`, or the default if there is none. O(log n).
    pub fn upper_lookup(&self, storage: &dyn Storage, k: K, key: u64) -> StdResult<V> {
        let len = self.len(storage, k.clone())?;
        let pos = self.first_above(storage, k.clone(), key, 0, len)?;
        if pos == 0 {
            return Ok(V::default());
        }
        Ok(self.at(storage, k, pos - 1)?.value)
    }

    /// Same result as [`Self::upper_lookup`], optimized for querying
    /// current or near-current state: the latest checkpoint is checked
    /// first, and the binary search only runs when its key exceeds `key`.
    pub fn upper_lookup_recent(&self, storage: &dyn Storage, k: K, key: u64) -> StdResult<V> {
        let len = self.len(storage, k.clone())?;
        if len == 0 {
            return Ok(V::default());
        }
        let latest = self.at(storage, k.clone(), len - 1)?;
        if latest.key <= key {
            return Ok(latest.value);
        }
        // The latest entry is past the query, so the answer (if any) lies
        // strictly before it.
        let pos = self.first_above(storage, k.clone(), key, 0, len - 1)?;
        if pos == 0 {
            return Ok(V::default());
        }
        Ok(self.at(storage, k, pos - 1)?.value)
    }

    /// Same result as [`Self::upper_lookup`], narrowing the binary-search
    /// range with `snapshot_key`, an anchor the caller knows does not
    /// exceed `key` (typically the last key at which a dependent value
    /// changed). A stale or bogus anchor degrades to the unrestricted
    /// search, never to a wrong answer.
    pub fn upper_lookup_most_recent_snapshot(
        &self,
        storage: &dyn Storage,
        k: K,
        key: u64,
        snapshot_key: u64,
    ) -> StdResult<V> {
        let len = self.len(storage, k.clone())?;
        if len == 0 {
            return Ok(V::default());
        }
        let latest = self.at(storage, k.clone(), len - 1)?;
        if latest.key <= key {
            return Ok(latest.value);
        }
        let low = self.first_at_or_above(storage, k.clone(), snapshot_key, 0, len)?;
        let pos = self.first_above(storage, k.clone(), key, low, len)?;
        if pos > low {
            return Ok(self.at(storage, k, pos - 1)?.value);
        }
        // Nothing in [snapshot_key, key]: the anchor overshot. Search the
        // prefix it excluded.
        let pos = self.first_above(storage, k.clone(), key, 0, low)?;
        if pos == 0 {
            return Ok(V::default());
        }
        Ok(self.at(storage, k, pos - 1)?.value)
    }

    fn at(&self, storage: &dyn Storage, k: K, pos: u64) -> StdResult<Checkpoint<V>> {
        self.checkpoints.load(storage, (k, pos))
    }

    /// First position in `[low, high)` whose key exceeds `key`, or `high`
    /// if none does.
    fn first_above(
        &self,
        storage: &dyn Storage,
        k: K,
        key: u64,
        mut low: u64,
        mut high: u64,
    ) -> StdResult<u64> {
        while low < high {
            let mid = low + (high - low) / 2;
            if self.at(storage, k.clone(), mid)?.key > key {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        Ok(low)
    }

    /// First position in `[low, high)` whose key is at least `key`, or
    /// `high` if none is.
    fn first_at_or_above(
        &self,
        storage: &dyn Storage,
        k: K,
        key: u64,
        mut low: u64,
        mut high: u64,
    ) -> StdResult<u64> {
        while low < high {
            let mid = low + (high - low) / 2;
            if self.at(storage, k.clone(), mid)?.key >= key {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        Ok(low)
    }
}
