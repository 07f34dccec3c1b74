//! # Payload Ingestion
//!
//! Maps loosely-typed remote/uploaded payloads onto the fixed record shapes.
//!
//! ## Why a Separate Step?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Upstream sources disagree on naming:                                   │
//! │                                                                         │
//! │    { "Codigo": "7501", "Cantidad": "12,5" }                            │
//! │    { "product_code": 7501, "qty": 12.5 }                               │
//! │    { "SKU": "7501", "Stock": 12.5 }                                    │
//! │                                                                         │
//! │  All three become SystemStockRecord { product_code: "7501", 12.5 }     │
//! │                                                                         │
//! │  Read sites never look at raw JSON again.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are compared case-insensitively with `_`, `-` and spaces removed, so
//! `unitOfMeasure`, `unit_of_measure` and `Unit Of Measure` all match.
//!
//! Rows that cannot be mapped are dropped and counted in [`IngestReport`];
//! only a payload that is not a list at all is an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::quantity::Quantity;
use crate::types::{AvailableRound, CountEntry, Product, SystemStockRecord, DEFAULT_UNIT_OF_MEASURE};
use crate::validation::{
    validate_code, validate_count_quantity, validate_round_number, validate_system_quantity,
};

const CODE_KEYS: &[&str] = &["code", "codigo", "cod", "productcode", "sku", "item"];
const NAME_KEYS: &[&str] = &["name", "nombre", "descripcion", "description", "productname"];
const UNIT_KEYS: &[&str] = &["unit", "unidad", "um", "uom", "unitofmeasure"];
const QTY_KEYS: &[&str] = &[
    "quantity",
    "qty",
    "cantidad",
    "stock",
    "saldo",
    "systemqty",
    "physicalqty",
];
const NUMBER_KEYS: &[&str] = &["number", "numero", "roundnumber", "nro"];
const ID_KEYS: &[&str] = &["id", "_id", "roundid"];
const WRAPPER_KEYS: &[&str] = &["data", "items", "records", "rows"];

// =============================================================================
// Report
// =============================================================================

/// Outcome counters for one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Rows mapped onto records (after duplicate collapsing).
    pub accepted: usize,
    /// Rows dropped as malformed.
    pub dropped: usize,
    /// Rows whose code repeated an earlier row (the later row won).
    pub duplicates: usize,
}

impl IngestReport {
    /// Returns a `RowsDropped` summary if anything was dropped.
    pub fn dropped_error(&self, what: &str) -> Option<ValidationError> {
        (self.dropped > 0).then(|| ValidationError::RowsDropped {
            what: what.to_string(),
            dropped: self.dropped,
        })
    }
}

/// Records plus the counters describing how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub report: IngestReport,
}

// =============================================================================
// Field Access
// =============================================================================

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    obj.iter().find_map(|(key, value)| {
        let key = normalize_key(key);
        // "_id" loses its underscore during normalization
        aliases
            .iter()
            .any(|alias| normalize_key(alias) == key)
            .then_some(value)
            .filter(|v| !v.is_null())
    })
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}

fn quantity(value: &Value) -> Option<Quantity> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(units) => units
                .checked_mul(crate::quantity::MILLI_PER_UNIT)
                .map(Quantity::from_milli),
            None => n.as_f64().and_then(Quantity::from_f64),
        },
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Extracts the row list from a payload, unwrapping `{ "data": [...] }`.
pub fn rows(payload: &Value) -> Result<&Vec<Value>, ValidationError> {
    match payload {
        Value::Array(rows) => Ok(rows),
        Value::Object(obj) => WRAPPER_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "payload".to_string(),
                reason: "object without a data/items list".to_string(),
            }),
        other => Err(ValidationError::InvalidFormat {
            field: "payload".to_string(),
            reason: format!("expected a list, got {}", kind(other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Collapses rows by key: first-seen position, last-seen value.
fn collapse<T>(mapped: Vec<(String, T)>, report: &mut IngestReport) -> Vec<T> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(mapped.len());
    let mut out: Vec<T> = Vec::with_capacity(mapped.len());
    for (key, record) in mapped {
        match index.get(&key) {
            Some(&i) => {
                report.duplicates += 1;
                out[i] = record;
            }
            None => {
                index.insert(key, out.len());
                out.push(record);
            }
        }
    }
    report.accepted = out.len();
    out
}

// =============================================================================
// Record Mappers
// =============================================================================

/// Maps a catalog payload.
///
/// A non-list payload fails with [`CoreError::CatalogLoad`]; rows without a
/// code are dropped.
pub fn products(payload: &Value) -> CoreResult<Ingested<Product>> {
    let rows = rows(payload).map_err(|e| CoreError::CatalogLoad {
        reason: e.to_string(),
    })?;

    let mut report = IngestReport::default();
    let mut mapped = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(obj) = row.as_object() else {
            report.dropped += 1;
            continue;
        };
        let Some(code) = field(obj, CODE_KEYS)
            .and_then(text)
            .and_then(|c| validate_code(&c).ok())
        else {
            report.dropped += 1;
            continue;
        };
        let name = field(obj, NAME_KEYS).and_then(text).unwrap_or_default();
        let unit_of_measure = field(obj, UNIT_KEYS)
            .and_then(text)
            .unwrap_or_else(|| DEFAULT_UNIT_OF_MEASURE.to_string());

        mapped.push((
            code.clone(),
            Product {
                code,
                name,
                unit_of_measure,
            },
        ));
    }

    let records = collapse(mapped, &mut report);
    Ok(Ingested { records, report })
}

/// Maps a system snapshot payload.
///
/// Rows with an empty code, an unparseable quantity or one beyond
/// `MAX_SYSTEM_UNITS` are dropped. Negative system quantities are kept.
pub fn stock_records(payload: &Value) -> Result<Ingested<SystemStockRecord>, ValidationError> {
    let rows = rows(payload)?;

    let mut report = IngestReport::default();
    let mut mapped = Vec::with_capacity(rows.len());

    for row in rows {
        let parsed = row.as_object().and_then(|obj| {
            let code = field(obj, CODE_KEYS)
                .and_then(text)
                .and_then(|c| validate_code(&c).ok())?;
            let quantity = field(obj, QTY_KEYS).and_then(quantity)?;
            validate_system_quantity(quantity).ok()?;
            Some(SystemStockRecord {
                product_code: code,
                quantity,
            })
        });
        match parsed {
            Some(record) => mapped.push((record.product_code.clone(), record)),
            None => report.dropped += 1,
        }
    }

    let records = collapse(mapped, &mut report);
    Ok(Ingested { records, report })
}

/// Maps a physical count payload.
///
/// Negative counts are malformed and dropped.
pub fn count_entries(payload: &Value) -> Result<Ingested<CountEntry>, ValidationError> {
    let rows = rows(payload)?;

    let mut report = IngestReport::default();
    let mut mapped = Vec::with_capacity(rows.len());

    for row in rows {
        let parsed = row.as_object().and_then(|obj| {
            let code = field(obj, CODE_KEYS)
                .and_then(text)
                .and_then(|c| validate_code(&c).ok())?;
            let quantity = field(obj, QTY_KEYS).and_then(quantity)?;
            validate_count_quantity(quantity).ok()?;
            let unit_of_measure = field(obj, UNIT_KEYS)
                .and_then(text)
                .unwrap_or_else(|| DEFAULT_UNIT_OF_MEASURE.to_string());
            Some(CountEntry {
                product_code: code,
                quantity,
                unit_of_measure,
            })
        });
        match parsed {
            Some(entry) => mapped.push((entry.product_code.clone(), entry)),
            None => report.dropped += 1,
        }
    }

    let records = collapse(mapped, &mut report);
    Ok(Ingested { records, report })
}

/// Maps the available-round list used by the join flow.
///
/// A row without an id reuses its number as the id.
pub fn available_rounds(payload: &Value) -> Result<Ingested<AvailableRound>, ValidationError> {
    let rows = rows(payload)?;

    let mut report = IngestReport::default();
    let mut mapped = Vec::with_capacity(rows.len());

    for row in rows {
        let parsed = match row {
            Value::Object(obj) => field(obj, NUMBER_KEYS)
                .and_then(text)
                .and_then(|n| validate_round_number(&n).ok())
                .map(|number| AvailableRound {
                    id: field(obj, ID_KEYS)
                        .and_then(text)
                        .unwrap_or_else(|| number.clone()),
                    number,
                }),
            bare => text(bare)
                .and_then(|n| validate_round_number(&n).ok())
                .map(|number| AvailableRound {
                    id: number.clone(),
                    number,
                }),
        };
        match parsed {
            Some(round) => mapped.push((round.number.clone(), round)),
            None => report.dropped += 1,
        }
    }

    let records = collapse(mapped, &mut report);
    Ok(Ingested { records, report })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_products_heterogeneous_names() {
        let payload = json!([
            { "Codigo": "A", "Nombre": "Arroz", "UM": "KG" },
            { "product_code": 7501, "description": "Aceite" },
            { "name": "sin codigo" },
            "garbage"
        ]);
        let out = products(&payload).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.report.dropped, 2);
        assert_eq!(out.records[0].unit_of_measure, "KG");
        assert_eq!(out.records[1].code, "7501");
        assert_eq!(out.records[1].unit_of_measure, DEFAULT_UNIT_OF_MEASURE);
    }

    #[test]
    fn test_products_non_list_is_catalog_error() {
        let err = products(&json!({ "error": "boom" })).unwrap_err();
        assert!(matches!(err, CoreError::CatalogLoad { .. }));
        assert!(products(&json!("nope")).is_err());
    }

    #[test]
    fn test_wrapped_payload() {
        let out = products(&json!({ "data": [{ "code": "A" }] })).unwrap();
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_stock_records_duplicates_last_wins() {
        let payload = json!([
            { "code": "A", "qty": 10 },
            { "code": "B", "cantidad": "5,5" },
            { "code": "A", "stock": -2 },
            { "code": "", "qty": 1 },
            { "code": "C" }
        ]);
        let out = stock_records(&payload).unwrap();
        assert_eq!(out.report.accepted, 2);
        assert_eq!(out.report.duplicates, 1);
        assert_eq!(out.report.dropped, 2);
        assert_eq!(out.records[0].product_code, "A");
        assert_eq!(out.records[0].quantity, Quantity::from_units(-2));
        assert_eq!(out.records[1].quantity.milli(), 5_500);
        assert!(out.report.dropped_error("snapshot").is_some());
    }

    #[test]
    fn test_stock_records_drop_extreme_quantities() {
        let payload = json!([
            { "code": "A", "qty": -9_223_372_036_854_775i64 },
            { "code": "B", "qty": 1e15 },
            { "code": "C", "qty": -40 }
        ]);
        let out = stock_records(&payload).unwrap();
        assert_eq!(out.report.accepted, 1);
        assert_eq!(out.report.dropped, 2);
        assert_eq!(out.records[0].product_code, "C");
    }

    #[test]
    fn test_count_entries_drop_negative() {
        let payload = json!([
            { "productCode": "A", "physicalQty": 3 },
            { "productCode": "B", "physicalQty": -1 }
        ]);
        let out = count_entries(&payload).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.report.dropped, 1);
    }

    #[test]
    fn test_available_rounds() {
        let payload = json!([
            { "numero": "3", "_id": "abc" },
            { "number": 4 },
            5,
            { "number": "x" }
        ]);
        let out = available_rounds(&payload).unwrap();
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.records[0].id, "abc");
        assert_eq!(out.records[1].id, "4");
        assert_eq!(out.records[2].number, "5");
        assert_eq!(out.report.dropped, 1);
    }
}
