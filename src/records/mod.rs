pub mod datasets;
pub mod field_map;

pub use datasets::{Dataset, DatasetKind};
pub use field_map::{FieldKind, FieldMap, FieldSpec};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch::RawResponse;

/// Geography key column in every API response.
pub const GEO_KEY: &str = "state";

/// A coerced cell. `Missing` is distinct from zero and is never NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Count(i64),
    Ratio(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_count(&self) -> Option<i64> {
        match self {
            Value::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn coerce(cell: Option<&str>, kind: FieldKind) -> Value {
        let Some(cell) = cell.map(str::trim).filter(|c| !c.is_empty()) else {
            return Value::Missing;
        };
        match kind {
            FieldKind::Count => cell.parse().map(Value::Count).unwrap_or(Value::Missing),
            FieldKind::Text => Value::Text(cell.to_string()),
        }
    }
}

/// One geographic entity's fields for a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub state_code: String,
    pub fields: BTreeMap<String, Value>,
    pub last_updated: DateTime<Utc>,
}

impl MappedRecord {
    pub fn new(state_code: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            state_code: state_code.into(),
            fields: BTreeMap::new(),
            last_updated,
        }
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Missing)
    }

    pub fn count(&self, name: &str) -> Option<i64> {
        self.get(name).as_count()
    }

    /// `state_code` is a field of every record even though it lives outside `fields`.
    pub fn has_field(&self, name: &str) -> bool {
        name == "state_code" || self.fields.contains_key(name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("response has no `state` column")]
    MissingGeographyKey,
    #[error("row {row} has no state code")]
    MissingStateCode { row: usize },
}

/// Map every data row of `raw` into a record with exactly the fields of
/// `field_map`. Variables absent from the header become `Missing` in every
/// record; cells that fail coercion become `Missing` in that record.
pub fn map_records(
    raw: &RawResponse,
    field_map: &FieldMap,
    last_updated: DateTime<Utc>,
) -> Result<Vec<MappedRecord>, MapError> {
    let geo_idx = raw.column(GEO_KEY).ok_or(MapError::MissingGeographyKey)?;

    let columns: Vec<(&FieldSpec, Option<usize>)> = field_map
        .iter()
        .map(|spec| {
            let idx = raw.column(&spec.code);
            if idx.is_none() {
                warn!(code = %spec.code, field = %spec.name, "Variable not found in header");
            }
            (spec, idx)
        })
        .collect();

    let mut records = Vec::with_capacity(raw.len());
    for (i, row) in raw.rows.iter().enumerate() {
        let state_code = row[geo_idx]
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(MapError::MissingStateCode { row: i + 1 })?;

        let mut record = MappedRecord::new(state_code, last_updated);
        for (spec, idx) in &columns {
            let value = match idx {
                Some(idx) => Value::coerce(row[*idx].as_deref(), spec.kind),
                None => Value::Missing,
            };
            record.fields.insert(spec.name.clone(), value);
        }
        records.push(record);
    }

    debug!(records = records.len(), fields = field_map.len(), "mapped");
    Ok(records)
}
