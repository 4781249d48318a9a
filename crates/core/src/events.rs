//! Click event definitions.
//!
//! Click events are written by the app when a user contacts a supplier and
//! are never mutated afterwards. The pipeline only reads and deletes them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Collection holding raw click events.
pub const CLICKS_COLLECTION: &str = "supplier_clicks";

/// Field names on a click event document.
pub const FIELD_SUPPLIER_ID: &str = "supplierId";
pub const FIELD_EVENT_TYPE: &str = "eventType";
pub const FIELD_OCCURRED_AT: &str = "occurredAt";

/// Counted click categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// WhatsApp inquiry
    #[serde(rename = "CONTACT_CHANNEL_A")]
    ContactChannelA,
    /// Phone call
    #[serde(rename = "CONTACT_CHANNEL_B")]
    ContactChannelB,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContactChannelA => "CONTACT_CHANNEL_A",
            Self::ContactChannelB => "CONTACT_CHANNEL_B",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CONTACT_CHANNEL_A" => Ok(Self::ContactChannelA),
            "CONTACT_CHANNEL_B" => Ok(Self::ContactChannelB),
            other => Err(Error::malformed(format!("unrecognized event type: {other}"))),
        }
    }
}

/// A decoded click event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub supplier_id: String,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(
        supplier_id: impl Into<String>,
        event_type: EventType,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            supplier_id: supplier_id.into(),
            event_type,
            occurred_at,
        }
    }

    /// Decodes a click event from raw document fields.
    ///
    /// Fails with [`Error::MalformedRecord`] when the supplier id is missing or
    /// blank, or the event type is absent or not a counted category.
    /// `occurredAt` is store-assigned; an unreadable value falls back to the
    /// Unix epoch since the window filter already ran against it.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let supplier_id = fields
            .get(FIELD_SUPPLIER_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::malformed("missing supplierId"))?;

        let event_type = fields
            .get(FIELD_EVENT_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("missing eventType"))?
            .parse::<EventType>()?;

        let occurred_at = fields
            .get(FIELD_OCCURRED_AT)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default();

        Ok(Self::new(supplier_id, event_type, occurred_at))
    }

    /// Encodes the event as document fields.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_SUPPLIER_ID.into(), Value::String(self.supplier_id.clone()));
        fields.insert(
            FIELD_EVENT_TYPE.into(),
            Value::String(self.event_type.as_str().into()),
        );
        fields.insert(
            FIELD_OCCURRED_AT.into(),
            Value::String(self.occurred_at.to_rfc3339()),
        );
        fields
    }
}
