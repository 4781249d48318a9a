//! Document, filter, and write-operation types.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Document fields.
pub type Fields = Map<String, Value>;

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(key: impl Into<String>, fields: Fields) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Reads a field as an RFC 3339 timestamp.
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        read_timestamp(&self.fields, field)
    }
}

/// Range comparison for timestamp filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `>=`
    Gte,
    /// `<`
    Lt,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Lt => "<",
        }
    }
}

/// Range filter on a timestamp field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: DateTime<Utc>,
}

impl Filter {
    pub fn gte(field: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte,
            value,
        }
    }

    pub fn lt(field: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lt,
            value,
        }
    }

    /// Missing or unparseable timestamps never match.
    pub fn matches(&self, fields: &Fields) -> bool {
        match read_timestamp(fields, &self.field) {
            Some(ts) => match self.op {
                FilterOp::Gte => ts >= self.value,
                FilterOp::Lt => ts < self.value,
            },
            None => false,
        }
    }
}

/// A single operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Set the given fields, preserving any others already on the document.
    SetMerge {
        collection: String,
        key: String,
        fields: Fields,
    },
    Delete {
        collection: String,
        key: String,
    },
}

impl WriteOp {
    pub fn set_merge(collection: impl Into<String>, key: impl Into<String>, fields: Fields) -> Self {
        Self::SetMerge {
            collection: collection.into(),
            key: key.into(),
            fields,
        }
    }

    pub fn delete(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Delete {
            collection: collection.into(),
            key: key.into(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::SetMerge { collection, .. } | Self::Delete { collection, .. } => collection,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::SetMerge { key, .. } | Self::Delete { key, .. } => key,
        }
    }
}

/// Shallow merge: top-level fields in `update` replace those in `target`.
pub fn merge_fields(target: &mut Fields, update: Fields) {
    for (name, value) in update {
        target.insert(name, value);
    }
}

fn read_timestamp(fields: &Fields, field: &str) -> Option<DateTime<Utc>> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
