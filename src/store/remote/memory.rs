//! In-process table API with the server's filter semantics
//!
//! Stores rows exactly as the hosted service would (remote column names,
//! server-assigned ids) so the remote adapter can run without a network.

use async_trait::async_trait;
use pgrest::{Filter, OrderDirection, Query};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Row, Tables};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Vec<Row>>,
    next_id: BTreeMap<String, i64>,
}

#[derive(Debug, Default)]
pub struct MemoryTables {
    state: Mutex<State>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw rows of `table` as stored, under remote column names
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .map(|state| state.tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Other("in-memory tables lock poisoned".to_string()))
    }
}

fn row_matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row.get(&f.column)))
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // Nulls sort last, as on the server for ascending order
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl Tables for MemoryTables {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let state = self.lock()?;
        let mut rows: Vec<Row> = state
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| row_matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|o| {
                    let ord = compare_cells(a.get(&o.column), b.get(&o.column));
                    match o.direction {
                        OrderDirection::Asc => ord,
                        OrderDirection::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        if !query.select.is_empty() {
            rows = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter(|(k, _)| query.select.iter().any(|c| c == k))
                        .collect()
                })
                .collect();
        }

        Ok(rows)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| row_matches(r, filters)).count())
            .unwrap_or(0) as u64)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut state = self.lock()?;
        let State { tables, next_id } = &mut *state;
        let next = next_id.entry(table.to_string()).or_insert(1);
        let stored = tables.entry(table.to_string()).or_default();

        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            match row.get("id").and_then(Value::as_i64) {
                Some(id) => {
                    if stored.iter().any(|r| r.get("id").and_then(Value::as_i64) == Some(id)) {
                        return Err(Error::RemoteStatus {
                            table: table.to_string(),
                            status: 409,
                            body: format!("duplicate key value violates unique constraint (id={})", id),
                        });
                    }
                    *next = (*next).max(id + 1);
                }
                None => {
                    row.insert("id".to_string(), Value::from(*next));
                    *next += 1;
                }
            }
            stored.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>> {
        let mut state = self.lock()?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| row_matches(r, filters)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|r| !row_matches(r, filters));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgrest::FilterOp;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let tables = MemoryTables::new();
        let rows = tables
            .insert("coordinators", vec![row(json!({"name": "Ana"})), row(json!({"name": "Eva"}))])
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));

        tables.insert("coordinators", vec![row(json!({"id": 10, "name": "Pau"}))]).await.unwrap();
        let next = tables.insert("coordinators", vec![row(json!({"name": "Rut"}))]).await.unwrap();
        assert_eq!(next[0]["id"], json!(11));

        let dup = tables.insert("coordinators", vec![row(json!({"id": 10, "name": "X"}))]).await;
        assert!(matches!(dup, Err(Error::RemoteStatus { status: 409, .. })));
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let tables = MemoryTables::new();
        tables
            .insert(
                "incident_records",
                vec![
                    row(json!({"date": "2025-01-03", "status": "Pendiente"})),
                    row(json!({"date": "2025-01-01", "status": "Solucionado"})),
                    row(json!({"date": "2025-01-02", "status": "Pendiente"})),
                ],
            )
            .await
            .unwrap();

        let q = Query::table("incident_records")
            .filter(Filter::new("status", FilterOp::Neq, "Solucionado"))
            .order("date", OrderDirection::Desc)
            .limit(1);
        let rows = tables.select(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["date"], json!("2025-01-03"));

        assert_eq!(tables.count("incident_records", &[]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let tables = MemoryTables::new();
        tables
            .insert("incidents", vec![row(json!({"code": "001"})), row(json!({"code": "002"}))])
            .await
            .unwrap();

        let updated = tables
            .update("incidents", &[Filter::new("id", FilterOp::Eq, 2)], row(json!({"code": "XYZ"})))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(tables.rows("incidents")[1]["code"], json!("XYZ"));

        tables.delete("incidents", &[Filter::new("id", FilterOp::Neq, 0)]).await.unwrap();
        assert!(tables.rows("incidents").is_empty());
    }
}
