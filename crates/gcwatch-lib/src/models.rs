//! Core data models for the overflow detector

use crate::error::ReadingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A payload stamped with the instant it was observed
///
/// Equality and ordering compare the timestamp first, then the payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sample<T> {
    timestamp: DateTime<Utc>,
    payload: T,
}

impl<T> Sample<T> {
    pub fn new(timestamp: DateTime<Utc>, payload: T) -> Self {
        Self { timestamp, payload }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// Usage snapshot of a single memory pool
///
/// `init` and `max` may be unknown, which is kept distinct from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryReading {
    init: Option<u64>,
    used: u64,
    committed: u64,
    max: Option<u64>,
}

impl MemoryReading {
    /// Create a reading, enforcing `used <= committed <= max`
    pub fn new(
        init: Option<u64>,
        used: u64,
        committed: u64,
        max: Option<u64>,
    ) -> Result<Self, ReadingError> {
        if used > committed {
            return Err(ReadingError::UsedAboveCommitted { used, committed });
        }
        if let Some(max) = max {
            if committed > max {
                return Err(ReadingError::CommittedAboveMax { committed, max });
            }
        }

        Ok(Self {
            init,
            used,
            committed,
            max,
        })
    }

    /// Create a reading from raw signed values where `-1` means unknown
    pub fn from_raw(init: i64, used: i64, committed: i64, max: i64) -> Result<Self, ReadingError> {
        Self::new(
            unknown_as_none("init", init)?,
            non_negative("used", used)?,
            non_negative("committed", committed)?,
            unknown_as_none("max", max)?,
        )
    }

    pub fn init(&self) -> Option<u64> {
        self.init
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }

    /// `used / max`, or `None` when the capacity is unknown
    pub fn usage_ratio(&self) -> Option<f64> {
        match self.max {
            Some(max) if max > 0 => Some(self.used as f64 / max as f64),
            _ => None,
        }
    }

    /// Usage in percent, or `None` when the capacity is unknown
    pub fn usage_pct(&self) -> Option<f64> {
        self.usage_ratio().map(|ratio| ratio * 100.0)
    }

    /// Merge two readings of the same pool type
    ///
    /// `used` and `committed` are summed. `init` and `max` are summed only
    /// when known on both sides.
    pub fn merged_with(&self, other: &MemoryReading) -> MemoryReading {
        MemoryReading {
            init: self.init.zip(other.init).map(|(a, b)| a.saturating_add(b)),
            used: self.used.saturating_add(other.used),
            committed: self.committed.saturating_add(other.committed),
            max: self.max.zip(other.max).map(|(a, b)| a.saturating_add(b)),
        }
    }
}

impl fmt::Display for MemoryReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(value: Option<u64>) -> String {
            value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
        }

        write!(
            f,
            "init = {}, used = {}, committed = {}, max = {}",
            opt(self.init),
            self.used,
            self.committed,
            opt(self.max)
        )
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, ReadingError> {
    u64::try_from(value).map_err(|_| ReadingError::Negative { field, value })
}

fn unknown_as_none(field: &'static str, value: i64) -> Result<Option<u64>, ReadingError> {
    match value {
        -1 => Ok(None),
        v if v < -1 => Err(ReadingError::BelowUnknown { field, value }),
        v => Ok(Some(v as u64)),
    }
}

/// Memory pool categories, abstracted away from collector-specific pool names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    /// Young generation (eden)
    Young,
    Survivor,
    /// Long-lived objects
    Old,
    Metaspace,
    CodeCache,
    CompressedClassSpace,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolType::Young => "young",
            PoolType::Survivor => "survivor",
            PoolType::Old => "old",
            PoolType::Metaspace => "metaspace",
            PoolType::CodeCache => "code_cache",
            PoolType::CompressedClassSpace => "compressed_class_space",
        };
        f.write_str(name)
    }
}

/// Severity class of a garbage collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcCollection {
    Minor,
    Major,
}

impl GcCollection {
    pub fn is_major(&self) -> bool {
        matches!(self, GcCollection::Major)
    }
}

impl fmt::Display for GcCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcCollection::Minor => write!(f, "minor"),
            GcCollection::Major => write!(f, "major"),
        }
    }
}

/// Memory readings observed right after a garbage collection
#[derive(Debug, Clone, PartialEq)]
pub struct GcEvent {
    collection: GcCollection,
    memory_after_gc: HashMap<PoolType, MemoryReading>,
}

impl GcEvent {
    pub fn new(collection: GcCollection, memory_after_gc: HashMap<PoolType, MemoryReading>) -> Self {
        Self {
            collection,
            memory_after_gc,
        }
    }

    pub fn collection(&self) -> GcCollection {
        self.collection
    }

    pub fn memory_after_gc(&self) -> &HashMap<PoolType, MemoryReading> {
        &self.memory_after_gc
    }

    /// Reading for a single pool type, if the collection reported one
    pub fn reading(&self, pool: PoolType) -> Option<&MemoryReading> {
        self.memory_after_gc.get(&pool)
    }
}
