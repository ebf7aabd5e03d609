//! Ad-hoc filtering of the wide incident table
//!
//! Filters use the same `column=op.value` syntax as the hosted table API
//! and are evaluated over each row's JSON form, so column names match the
//! serialized field names of [`IncidentRow`].

use pgrest::Filter;
use serde_json::Value;

use super::IncidentRow;
use crate::error::{Error, Result};

/// Filterable columns of [`IncidentRow`]
pub const COLUMNS: &[&str] = &[
    "id",
    "date",
    "registering_coordinator",
    "warehouse",
    "warehouse_zone",
    "causing_verifier",
    "verifier_zone",
    "incident_code",
    "incident_type",
    "assigned_coordinator_id",
    "assigned_coordinator",
    "explanation",
    "enlace",
    "status",
    "responsible",
];

/// Parse `column=op.value` expressions, rejecting unknown columns
pub fn parse_where<S: AsRef<str>>(exprs: &[S]) -> Result<Vec<Filter>> {
    let filters = pgrest::parse_filters(exprs.iter().map(|s| s.as_ref()))?;
    for filter in &filters {
        if !COLUMNS.contains(&filter.column.as_str()) {
            return Err(Error::Validation {
                field: filter.column.clone(),
                message: format!("unknown column; expected one of {}", COLUMNS.join(", ")),
            });
        }
    }
    Ok(filters)
}

/// Evaluate a row against all filters (logical AND)
pub fn evaluate(filters: &[Filter], row: &IncidentRow) -> bool {
    let value = match serde_json::to_value(row) {
        Ok(Value::Object(map)) => map,
        _ => return false,
    };
    filters.iter().all(|f| f.matches(value.get(&f.column)))
}

/// Keep the rows matching every filter, preserving order
pub fn apply(rows: Vec<IncidentRow>, filters: &[Filter]) -> Vec<IncidentRow> {
    if filters.is_empty() {
        return rows;
    }
    rows.into_iter().filter(|r| evaluate(filters, r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::readmodel::assemble;
    use crate::readmodel::fixtures::*;

    fn rows() -> Vec<IncidentRow> {
        assemble(
            &[
                record(1, "2025-01-05", 1, 1, Status::Pendiente),
                record(2, "2024-12-20", 2, 2, Status::Solucionado),
                record(3, "2025-02-01", 2, 1, Status::EnProceso),
            ],
            &lookups(),
        )
    }

    fn ids(rows: &[IncidentRow]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_status_neq() {
        let filters = parse_where(&["status=neq.Solucionado"]).unwrap();
        assert_eq!(ids(&apply(rows(), &filters)), vec![1, 3]);
    }

    #[test]
    fn test_zone_and_date_combined() {
        let filters = parse_where(&["warehouse_zone=eq.REQUENA", "date=gte.2025-01-01"]).unwrap();
        assert_eq!(ids(&apply(rows(), &filters)), vec![3]);
    }

    #[test]
    fn test_ilike_on_names() {
        let filters = parse_where(&["causing_verifier=ilike.*paz*"]).unwrap();
        assert_eq!(ids(&apply(rows(), &filters)), vec![1, 3]);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = parse_where(&["colour=eq.red"]).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_malformed_expression() {
        let err = parse_where(&["status"]).unwrap_err();
        assert!(matches!(err, Error::FilterParse { .. }));
    }
}
