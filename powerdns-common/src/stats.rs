//! Decoding of the `/servers/{id}/statistics` payload.
//!
//! PowerDNS returns a flat JSON list. Plain statistics carry a string value;
//! map and ring statistics carry a list of name/value pairs instead:
//!
//! ```json
//! [
//!   {"name": "udp-queries", "type": "StatisticItem", "value": "1024"},
//!   {"name": "response-by-qtype", "type": "MapStatisticItem",
//!    "value": [{"name": "A", "value": "812"}, {"name": "AAAA", "value": "212"}]}
//! ]
//! ```

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

const STATISTIC_ITEM: &str = "StatisticItem";
const MAP_STATISTIC_ITEM: &str = "MapStatisticItem";
const RING_STATISTIC_ITEM: &str = "RingStatisticItem";

/// One decoded statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct StatEntry {
    pub name: String,
    pub value: StatValue,
}

impl StatEntry {
    /// Build a plain statistic.
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: StatValue::Single(value.into()),
        }
    }
}

/// Value of a statistic, tagged by its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    /// A `StatisticItem`: one textual number.
    Single(String),
    /// A `MapStatisticItem` or `RingStatisticItem`: named sub-values.
    Map(Vec<MapEntry>),
}

/// One element of a map or ring statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize)]
struct RawStat {
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    value: Value,
}

#[derive(Deserialize)]
struct RawMapEntry {
    name: String,
    value: Value,
}

/// Decode a statistics response body.
///
/// Invalid JSON, or a top level that is not a list of `{name, value}` records,
/// is an [`Error::Parse`] and no list is produced. A record whose value has an
/// unusable shape is dropped on its own, so one odd statistic never hides the
/// others.
pub fn decode_statistics(body: &[u8]) -> Result<Vec<StatEntry>> {
    let raw: Vec<RawStat> = serde_json::from_slice(body)?;
    Ok(raw.into_iter().filter_map(convert).collect())
}

fn convert(raw: RawStat) -> Option<StatEntry> {
    let value = match (raw.kind.as_deref(), raw.value) {
        (Some(STATISTIC_ITEM), value) => StatValue::Single(scalar_text(&raw.name, value)?),
        (Some(MAP_STATISTIC_ITEM | RING_STATISTIC_ITEM), Value::Array(items)) => {
            StatValue::Map(map_entries(&raw.name, items))
        }
        (Some(kind @ (MAP_STATISTIC_ITEM | RING_STATISTIC_ITEM)), _) => {
            debug!(stat = %raw.name, kind, "Skipping statistic whose value is not a list");
            return None;
        }
        // Untagged or unknown tags: go by shape.
        (_, Value::Array(items)) => StatValue::Map(map_entries(&raw.name, items)),
        (_, value) => StatValue::Single(scalar_text(&raw.name, value)?),
    };

    Some(StatEntry {
        name: raw.name,
        value,
    })
}

fn map_entries(stat: &str, items: Vec<Value>) -> Vec<MapEntry> {
    items
        .into_iter()
        .filter_map(|item| {
            let entry: RawMapEntry = match serde_json::from_value(item) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(stat, error = %e, "Skipping invalid map entry");
                    return None;
                }
            };
            let value = scalar_text(stat, entry.value)?;
            Some(MapEntry {
                name: entry.name,
                value,
            })
        })
        .collect()
}

fn scalar_text(stat: &str, value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => {
            debug!(stat, value = %other, "Skipping statistic with non-scalar value");
            None
        }
    }
}
