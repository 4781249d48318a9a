//! Rolling per-supplier click statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::EventType;

/// Collection holding one statistics document per supplier.
pub const STATS_COLLECTION: &str = "supplier_stats";

pub const FIELD_WINDOW_COUNT_A: &str = "windowCountA";
pub const FIELD_WINDOW_COUNT_B: &str = "windowCountB";
pub const FIELD_TOTAL_COUNT_A: &str = "totalCountA";
pub const FIELD_TOTAL_COUNT_B: &str = "totalCountB";
pub const FIELD_LAST_AGGREGATED_AT: &str = "lastAggregatedAt";

/// Click counts for one supplier within one aggregation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub channel_a: u64,
    pub channel_b: u64,
}

impl WindowCounts {
    pub fn record(&mut self, event_type: EventType) {
        match event_type {
            EventType::ContactChannelA => self.channel_a += 1,
            EventType::ContactChannelB => self.channel_b += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.channel_a + self.channel_b
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Statistics document owned by the aggregator.
///
/// Window counts are replaced on every run; totals only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierStats {
    pub window_count_a: u64,
    pub window_count_b: u64,
    pub total_count_a: u64,
    pub total_count_b: u64,
    pub last_aggregated_at: Option<DateTime<Utc>>,
}

impl SupplierStats {
    /// Reads stats from stored fields. Missing or non-numeric counters read as 0.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let count = |name: &str| fields.get(name).map(read_count).unwrap_or(0);

        Self {
            window_count_a: count(FIELD_WINDOW_COUNT_A),
            window_count_b: count(FIELD_WINDOW_COUNT_B),
            total_count_a: count(FIELD_TOTAL_COUNT_A),
            total_count_b: count(FIELD_TOTAL_COUNT_B),
            last_aggregated_at: fields
                .get(FIELD_LAST_AGGREGATED_AT)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Folds a window into prior stats. No prior record starts totals at zero.
    pub fn fold_window(
        prior: Option<&Map<String, Value>>,
        counts: WindowCounts,
        now: DateTime<Utc>,
    ) -> Self {
        let prior = prior.map(Self::from_fields).unwrap_or_default();

        Self {
            window_count_a: counts.channel_a,
            window_count_b: counts.channel_b,
            total_count_a: prior.total_count_a.saturating_add(counts.channel_a),
            total_count_b: prior.total_count_b.saturating_add(counts.channel_b),
            last_aggregated_at: Some(now),
        }
    }

    /// Fields written by a merge. Anything else on the document is left alone.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_WINDOW_COUNT_A.into(), self.window_count_a.into());
        fields.insert(FIELD_WINDOW_COUNT_B.into(), self.window_count_b.into());
        fields.insert(FIELD_TOTAL_COUNT_A.into(), self.total_count_a.into());
        fields.insert(FIELD_TOTAL_COUNT_B.into(), self.total_count_b.into());
        if let Some(at) = self.last_aggregated_at {
            fields.insert(FIELD_LAST_AGGREGATED_AT.into(), Value::String(at.to_rfc3339()));
        }
        fields
    }
}

/// Counters may come back as floats from stores with a single number type.
fn read_count(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .unwrap_or(0)
}
