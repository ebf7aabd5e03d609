//! Logical <-> remote column names
//!
//! The hosted schema names a few columns differently from the local one.
//! Every row and filter crosses this table on its way in or out, so remote
//! names never leak past the adapter.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Row;
use crate::error::{Error, Result};

/// `(table, logical column, remote column)`
const RENAMES: &[(&str, &str, &str)] = &[("warehouses", "codigo_consejo", "nif")];

/// Remote name of a logical column
pub fn remote_column<'a>(table: &str, logical: &'a str) -> &'a str {
    RENAMES
        .iter()
        .find(|(t, l, _)| *t == table && *l == logical)
        .map(|(_, _, remote)| *remote)
        .unwrap_or(logical)
}

/// Logical name of a remote column
pub fn logical_column<'a>(table: &str, remote: &'a str) -> &'a str {
    RENAMES
        .iter()
        .find(|(t, _, r)| *t == table && *r == remote)
        .map(|(_, logical, _)| *logical)
        .unwrap_or(remote)
}

pub fn to_remote(table: &str, row: Row) -> Row {
    row.into_iter()
        .map(|(k, v)| (remote_column(table, &k).to_string(), v))
        .collect()
}

pub fn from_remote(table: &str, row: Row) -> Row {
    row.into_iter()
        .map(|(k, v)| (logical_column(table, &k).to_string(), v))
        .collect()
}

/// Serialize a payload into a remote row
pub fn encode<T: Serialize>(table: &str, value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(row) => Ok(to_remote(table, row)),
        other => Err(Error::Other(format!(
            "expected an object for table '{}', got {}",
            table, other
        ))),
    }
}

/// Deserialize a remote row; malformed rows are integrity failures
pub fn decode<T: DeserializeOwned>(table: &str, row: Row) -> Result<T> {
    let id = row.get("id").cloned();
    serde_json::from_value(serde_json::Value::Object(from_remote(table, row))).map_err(|e| {
        Error::integrity(format!(
            "{} row {}: {}",
            table,
            id.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string()),
            e
        ))
    })
}
