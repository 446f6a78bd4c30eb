//! GC notification wire format
//!
//! One JSON object per line, as emitted by a JVM-side notification bridge:
//!
//! ```json
//! {"timestamp":"2026-01-01T00:00:00Z","gc_name":"G1 Old Generation",
//!  "action":"end of major GC",
//!  "memory_after_gc":{"G1 Old Gen":{"init":1,"used":2,"committed":3,"max":4}}}
//! ```
//!
//! Pool and collector names are the ones reported by OpenJDK-compatible
//! runtimes.

use super::GcSample;
use crate::error::{NotificationError, ReadingError};
use crate::models::{GcCollection, GcEvent, MemoryReading, PoolType, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw notification as read from the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcNotification {
    /// When the collection finished; receipt time is used when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gc_name: Option<String>,
    pub action: String,
    pub memory_after_gc: HashMap<String, RawUsage>,
}

/// Pool usage as reported by the runtime; `-1`, `null` or absent means unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUsage {
    #[serde(default)]
    pub init: Option<i64>,
    pub used: i64,
    pub committed: i64,
    #[serde(default)]
    pub max: Option<i64>,
}

impl RawUsage {
    pub fn to_reading(&self) -> Result<MemoryReading, ReadingError> {
        MemoryReading::from_raw(
            self.init.unwrap_or(-1),
            self.used,
            self.committed,
            self.max.unwrap_or(-1),
        )
    }
}

/// The action text attached to a GC notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcAction {
    EndOfMinorGc,
    EndOfMajorGc,
}

impl GcAction {
    pub const ALL: [GcAction; 2] = [GcAction::EndOfMinorGc, GcAction::EndOfMajorGc];

    pub fn action_text(&self) -> &'static str {
        match self {
            GcAction::EndOfMinorGc => "end of minor GC",
            GcAction::EndOfMajorGc => "end of major GC",
        }
    }

    pub fn collection(&self) -> GcCollection {
        match self {
            GcAction::EndOfMinorGc => GcCollection::Minor,
            GcAction::EndOfMajorGc => GcCollection::Major,
        }
    }

    pub fn from_notification_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.action_text() == text)
    }
}

/// Known memory pools of the supported collectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryPool {
    G1OldGen,
    G1SurvivorSpace,
    G1EdenSpace,
    PsEdenSpace,
    PsSurvivorSpace,
    PsOldGen,
    /// Shared by ParNew and CMS
    ParEdenSpace,
    ParSurvivorSpace,
    CmsOldGen,
    Metaspace,
    CodeCache,
    CodeHeapNonNmethods,
    CodeHeapNonProfiledNmethods,
    CodeHeapProfiledNmethods,
    /// Only present with compressed class pointers
    CompressedClassSpace,
}

impl MemoryPool {
    pub const ALL: [MemoryPool; 15] = [
        MemoryPool::G1OldGen,
        MemoryPool::G1SurvivorSpace,
        MemoryPool::G1EdenSpace,
        MemoryPool::PsEdenSpace,
        MemoryPool::PsSurvivorSpace,
        MemoryPool::PsOldGen,
        MemoryPool::ParEdenSpace,
        MemoryPool::ParSurvivorSpace,
        MemoryPool::CmsOldGen,
        MemoryPool::Metaspace,
        MemoryPool::CodeCache,
        MemoryPool::CodeHeapNonNmethods,
        MemoryPool::CodeHeapNonProfiledNmethods,
        MemoryPool::CodeHeapProfiledNmethods,
        MemoryPool::CompressedClassSpace,
    ];

    pub fn pool_name(&self) -> &'static str {
        match self {
            MemoryPool::G1OldGen => "G1 Old Gen",
            MemoryPool::G1SurvivorSpace => "G1 Survivor Space",
            MemoryPool::G1EdenSpace => "G1 Eden Space",
            MemoryPool::PsEdenSpace => "PS Eden Space",
            MemoryPool::PsSurvivorSpace => "PS Survivor Space",
            MemoryPool::PsOldGen => "PS Old Gen",
            MemoryPool::ParEdenSpace => "Par Eden Space",
            MemoryPool::ParSurvivorSpace => "Par Survivor Space",
            MemoryPool::CmsOldGen => "CMS Old Gen",
            MemoryPool::Metaspace => "Metaspace",
            MemoryPool::CodeCache => "Code Cache",
            MemoryPool::CodeHeapNonNmethods => "CodeHeap 'non-nmethods'",
            MemoryPool::CodeHeapNonProfiledNmethods => "CodeHeap 'non-profiled nmethods'",
            MemoryPool::CodeHeapProfiledNmethods => "CodeHeap 'profiled nmethods'",
            MemoryPool::CompressedClassSpace => "Compressed Class Space",
        }
    }

    pub fn pool_type(&self) -> PoolType {
        match self {
            MemoryPool::G1OldGen | MemoryPool::PsOldGen | MemoryPool::CmsOldGen => PoolType::Old,
            MemoryPool::G1SurvivorSpace
            | MemoryPool::PsSurvivorSpace
            | MemoryPool::ParSurvivorSpace => PoolType::Survivor,
            MemoryPool::G1EdenSpace | MemoryPool::PsEdenSpace | MemoryPool::ParEdenSpace => {
                PoolType::Young
            }
            MemoryPool::Metaspace => PoolType::Metaspace,
            MemoryPool::CodeCache
            | MemoryPool::CodeHeapNonNmethods
            | MemoryPool::CodeHeapNonProfiledNmethods
            | MemoryPool::CodeHeapProfiledNmethods => PoolType::CodeCache,
            MemoryPool::CompressedClassSpace => PoolType::CompressedClassSpace,
        }
    }

    pub fn from_pool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.pool_name() == name)
    }

    pub fn is_supported(name: &str) -> bool {
        Self::from_pool_name(name).is_some()
    }
}

/// Garbage collectors whose notifications are understood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedGc {
    ParNew,
    ConcurrentMarkSweep,
    G1YoungGeneration,
    G1OldGeneration,
    PsScavenge,
    PsMarkSweep,
}

impl SupportedGc {
    pub const ALL: [SupportedGc; 6] = [
        SupportedGc::ParNew,
        SupportedGc::ConcurrentMarkSweep,
        SupportedGc::G1YoungGeneration,
        SupportedGc::G1OldGeneration,
        SupportedGc::PsScavenge,
        SupportedGc::PsMarkSweep,
    ];

    pub fn gc_name(&self) -> &'static str {
        match self {
            SupportedGc::ParNew => "ParNew",
            SupportedGc::ConcurrentMarkSweep => "ConcurrentMarkSweep",
            SupportedGc::G1YoungGeneration => "G1 Young Generation",
            SupportedGc::G1OldGeneration => "G1 Old Generation",
            SupportedGc::PsScavenge => "PS Scavenge",
            SupportedGc::PsMarkSweep => "PS MarkSweep",
        }
    }

    /// Pools this collector manages
    pub fn memory_pools(&self) -> &'static [MemoryPool] {
        match self {
            SupportedGc::ParNew => &[MemoryPool::ParEdenSpace, MemoryPool::ParSurvivorSpace],
            SupportedGc::ConcurrentMarkSweep => &[
                MemoryPool::ParEdenSpace,
                MemoryPool::ParSurvivorSpace,
                MemoryPool::CmsOldGen,
            ],
            SupportedGc::G1YoungGeneration => {
                &[MemoryPool::G1EdenSpace, MemoryPool::G1SurvivorSpace]
            }
            SupportedGc::G1OldGeneration => &[
                MemoryPool::G1EdenSpace,
                MemoryPool::G1SurvivorSpace,
                MemoryPool::G1OldGen,
            ],
            SupportedGc::PsScavenge => &[MemoryPool::PsEdenSpace, MemoryPool::PsSurvivorSpace],
            SupportedGc::PsMarkSweep => &[
                MemoryPool::PsEdenSpace,
                MemoryPool::PsSurvivorSpace,
                MemoryPool::PsOldGen,
            ],
        }
    }

    pub fn from_gc_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|gc| gc.gc_name() == name)
    }
}

impl GcNotification {
    /// Convert into a timestamped event
    ///
    /// Readings of pools sharing a [`PoolType`] are merged.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<GcSample, NotificationError> {
        if let Some(gc_name) = &self.gc_name {
            if SupportedGc::from_gc_name(gc_name).is_none() {
                return Err(NotificationError::UnsupportedCollector(gc_name.clone()));
            }
        }

        let action = GcAction::from_notification_text(&self.action)
            .ok_or_else(|| NotificationError::UnsupportedAction(self.action.clone()))?;

        let mut pools: HashMap<PoolType, MemoryReading> = HashMap::new();
        for (name, usage) in &self.memory_after_gc {
            let pool = MemoryPool::from_pool_name(name)
                .ok_or_else(|| NotificationError::UnknownPool(name.clone()))?;
            let reading = usage
                .to_reading()
                .map_err(|source| NotificationError::InvalidReading {
                    pool: name.clone(),
                    source,
                })?;

            pools
                .entry(pool.pool_type())
                .and_modify(|existing| *existing = existing.merged_with(&reading))
                .or_insert(reading);
        }

        let timestamp = self.timestamp.unwrap_or(received_at);
        Ok(Sample::new(timestamp, GcEvent::new(action.collection(), pools)))
    }
}

/// Parse one notification line into a timestamped event
pub fn parse_notification(
    line: &str,
    received_at: DateTime<Utc>,
) -> Result<GcSample, NotificationError> {
    let notification: GcNotification = serde_json::from_str(line)?;
    notification.into_event(received_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_g1_major_collection() {
        let line = r#"{"timestamp":"2026-01-01T00:00:00Z","gc_name":"G1 Old Generation",
            "action":"end of major GC",
            "memory_after_gc":{"G1 Old Gen":{"init":1,"used":2,"committed":3,"max":4}}}"#;

        let sample = parse_notification(line, received()).unwrap();
        assert_eq!(
            sample.timestamp(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );

        let event = sample.payload();
        assert_eq!(event.collection(), GcCollection::Major);
        let old = event.reading(PoolType::Old).unwrap();
        assert_eq!(old.init(), Some(1));
        assert_eq!(old.used(), 2);
        assert_eq!(old.committed(), 3);
        assert_eq!(old.max(), Some(4));
    }

    #[test]
    fn test_missing_timestamp_uses_receipt_time() {
        let line = r#"{"action":"end of minor GC","memory_after_gc":{}}"#;

        let sample = parse_notification(line, received()).unwrap();
        assert_eq!(sample.timestamp(), received());
        assert_eq!(sample.payload().collection(), GcCollection::Minor);
        assert!(sample.payload().memory_after_gc().is_empty());
    }

    #[test]
    fn test_unknown_values_map_to_none() {
        let line = r#"{"action":"end of major GC","memory_after_gc":{
            "PS Old Gen":{"init":-1,"used":5,"committed":6,"max":-1},
            "Metaspace":{"used":1,"committed":2,"max":null}}}"#;

        let sample = parse_notification(line, received()).unwrap();
        let old = sample.payload().reading(PoolType::Old).unwrap();
        assert_eq!(old.init(), None);
        assert_eq!(old.max(), None);

        let meta = sample.payload().reading(PoolType::Metaspace).unwrap();
        assert_eq!(meta.max(), None);
    }

    #[test]
    fn test_same_type_pools_are_merged() {
        let line = r#"{"action":"end of major GC","memory_after_gc":{
            "CodeHeap 'non-nmethods'":{"init":1,"used":10,"committed":20,"max":100},
            "CodeHeap 'profiled nmethods'":{"init":1,"used":5,"committed":10,"max":-1},
            "CodeHeap 'non-profiled nmethods'":{"init":1,"used":1,"committed":1,"max":50}}}"#;

        let sample = parse_notification(line, received()).unwrap();
        let code = sample.payload().reading(PoolType::CodeCache).unwrap();
        assert_eq!(code.used(), 16);
        assert_eq!(code.committed(), 31);
        assert_eq!(code.max(), None);
        assert_eq!(code.init(), Some(3));
    }

    #[test]
    fn test_rejects_unsupported_input() {
        let unknown_action = r#"{"action":"end of GC pause","memory_after_gc":{}}"#;
        assert!(matches!(
            parse_notification(unknown_action, received()),
            Err(NotificationError::UnsupportedAction(a)) if a == "end of GC pause"
        ));

        let unknown_gc = r#"{"gc_name":"Shenandoah Cycles","action":"end of major GC","memory_after_gc":{}}"#;
        assert!(matches!(
            parse_notification(unknown_gc, received()),
            Err(NotificationError::UnsupportedCollector(_))
        ));

        let unknown_pool =
            r#"{"action":"end of major GC","memory_after_gc":{"Tenured Gen":{"used":1,"committed":1}}}"#;
        assert!(matches!(
            parse_notification(unknown_pool, received()),
            Err(NotificationError::UnknownPool(p)) if p == "Tenured Gen"
        ));

        let negative =
            r#"{"action":"end of major GC","memory_after_gc":{"G1 Old Gen":{"used":-3,"committed":1}}}"#;
        assert!(matches!(
            parse_notification(negative, received()),
            Err(NotificationError::InvalidReading { .. })
        ));

        assert!(matches!(
            parse_notification("not json", received()),
            Err(NotificationError::Malformed(_))
        ));
    }

    #[test]
    fn test_pool_table() {
        assert_eq!(MemoryPool::from_pool_name("G1 Old Gen"), Some(MemoryPool::G1OldGen));
        assert_eq!(MemoryPool::G1OldGen.pool_type(), PoolType::Old);
        assert_eq!(MemoryPool::ParEdenSpace.pool_type(), PoolType::Young);
        assert_eq!(
            MemoryPool::CompressedClassSpace.pool_type(),
            PoolType::CompressedClassSpace
        );
        assert!(!MemoryPool::is_supported("g1 old gen"));

        for pool in MemoryPool::ALL {
            assert_eq!(MemoryPool::from_pool_name(pool.pool_name()), Some(pool));
        }
    }

    #[test]
    fn test_collector_table() {
        assert_eq!(SupportedGc::from_gc_name("PS MarkSweep"), Some(SupportedGc::PsMarkSweep));
        assert!(SupportedGc::G1OldGeneration
            .memory_pools()
            .contains(&MemoryPool::G1OldGen));
        assert!(!SupportedGc::PsScavenge
            .memory_pools()
            .iter()
            .any(|p| p.pool_type() == PoolType::Old));
        assert_eq!(SupportedGc::from_gc_name("ZGC"), None);
    }

    #[test]
    fn test_action_table() {
        assert_eq!(
            GcAction::from_notification_text("end of minor GC"),
            Some(GcAction::EndOfMinorGc)
        );
        assert_eq!(GcAction::EndOfMajorGc.collection(), GcCollection::Major);
        assert_eq!(GcAction::from_notification_text("End of major GC"), None);
    }
}
