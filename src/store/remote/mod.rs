//! Hosted engine over a PostgREST-style table API
//!
//! Rows travel as JSON objects through a [`Tables`] transport. The adapter
//! owns column renaming (see [`columns`]) and the two-step "insert action,
//! then mirror status" sequence, which the API cannot make atomic.

pub mod columns;
pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use pgrest::{Filter, FilterOp, OrderDirection, Query};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{keep_decoded, BackendKind, Snapshot, Store, TABLES};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::model::*;

pub use memory::MemoryTables;
pub use postgrest::HttpTables;

/// A row as exchanged with the table API
pub type Row = serde_json::Map<String, Value>;

/// Row-level operations offered by the hosted service
#[async_trait]
pub trait Tables: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Exact number of rows matching `filters`
    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// Insert rows and return them as stored
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>>;

    /// Patch every row matching `filters` and return the patched rows
    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;
}

const COORDINATORS: &str = TABLES[0];
const VERIFIERS: &str = TABLES[1];
const WAREHOUSES: &str = TABLES[2];
const INCIDENTS: &str = TABLES[3];
const RECORDS: &str = TABLES[4];
const ACTIONS: &str = TABLES[5];

fn id_filter(id: Id) -> Filter {
    Filter::new("id", FilterOp::Eq, id)
}

/// Remote store bound to one transport
#[derive(Clone)]
pub struct RemoteStore {
    tables: Arc<dyn Tables>,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore").finish_non_exhaustive()
    }
}

impl RemoteStore {
    pub fn new(tables: Arc<dyn Tables>) -> Self {
        Self { tables }
    }

    /// Build the HTTP transport; no request is made until the first call
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let tables = HttpTables::new(config)?;
        info!(endpoint = %config.endpoint(), "Configured remote store");
        Ok(Self::new(Arc::new(tables)))
    }

    /// Store backed by [`MemoryTables`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTables::new()))
    }

    async fn list<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>> {
        let rows = self.tables.select(&query).await?;
        Ok(keep_decoded(
            &query.table,
            rows.into_iter()
                .map(|row| columns::decode(&query.table, row))
                .collect(),
        ))
    }

    async fn one<T: DeserializeOwned>(&self, query: Query) -> Result<Option<T>> {
        let table = query.table.clone();
        let row = self.tables.select(&query.limit(1)).await?.into_iter().next();
        row.map(|row| columns::decode(&table, row)).transpose()
    }

    async fn by_id<T: DeserializeOwned>(&self, table: &str, id: Id) -> Result<Option<T>> {
        self.one(Query::table(table).filter(id_filter(id))).await
    }

    async fn insert_one<P: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        payload: &P,
    ) -> Result<T> {
        let row = columns::encode(table, payload)?;
        let stored = self
            .tables
            .insert(table, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::integrity(format!("{}: insert returned no row", table)))?;
        columns::decode(table, stored)
    }

    async fn update_one<P: Serialize + Sync>(
        &self,
        entity: &'static str,
        table: &str,
        id: Id,
        patch: &P,
    ) -> Result<()> {
        let patch = columns::encode(table, patch)?;
        let updated = self.tables.update(table, &[id_filter(id)], patch).await?;
        if updated.is_empty() {
            return Err(Error::not_found(entity, id));
        }
        Ok(())
    }

    async fn insert_all<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows = rows
            .iter()
            .map(|r| columns::encode(table, r))
            .collect::<Result<Vec<_>>>()?;
        self.tables.insert(table, rows).await?;
        Ok(())
    }
}

/// Record payload with a blank link written as null
fn record_payload(fields: &NewIncidentRecord) -> NewIncidentRecord {
    let mut payload = fields.clone();
    payload.enlace = payload.enlace.filter(|link| !link.trim().is_empty());
    payload
}

#[async_trait]
impl Store for RemoteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn ping(&self) -> Result<()> {
        self.tables.count(COORDINATORS, &[]).await.map(|_| ())
    }

    async fn insert_coordinator(&self, new: &NewCoordinator) -> Result<Coordinator> {
        self.insert_one(COORDINATORS, new).await
    }

    async fn insert_verifier(&self, new: &NewVerifier) -> Result<Verifier> {
        self.insert_one(VERIFIERS, new).await
    }

    async fn insert_warehouse(&self, new: &NewWarehouse) -> Result<Warehouse> {
        self.insert_one(WAREHOUSES, new).await
    }

    async fn create_incident(&self, code: &str, description: &str) -> Result<Incident> {
        self.insert_one(
            INCIDENTS,
            &serde_json::json!({ "code": code, "description": description }),
        )
        .await
    }

    async fn insert_incident_record(&self, new: &NewIncidentRecord) -> Result<IncidentRecord> {
        self.insert_one(RECORDS, &record_payload(new)).await
    }

    /// Two sequential row calls: insert the action, then patch the parent.
    ///
    /// The API offers no transaction, so a concurrent status edit between the
    /// two calls can be overwritten (lost update). A failed patch is logged
    /// and returned; the action row stays.
    async fn insert_incident_action(&self, new: &NewIncidentAction) -> Result<IncidentAction> {
        if self
            .by_id::<IncidentRecord>(RECORDS, new.incident_record_id)
            .await?
            .is_none()
        {
            return Err(Error::not_found("Incident record", new.incident_record_id));
        }

        let action: IncidentAction = self.insert_one(ACTIONS, new).await?;

        if let Some(status) = new.new_status {
            let mut patch = Row::new();
            patch.insert("status".to_string(), Value::from(status.label()));
            let result = self
                .tables
                .update(RECORDS, &[id_filter(new.incident_record_id)], patch)
                .await;
            if let Err(e) = result {
                error!(
                    action_id = action.id,
                    record_id = new.incident_record_id,
                    error = %e,
                    "Action stored but parent status was not updated"
                );
                warn!(
                    action_id = action.id,
                    "Orphaned action {} left without a status change on its record",
                    action.id
                );
                return Err(e);
            }
        }

        Ok(action)
    }

    async fn coordinators(&self) -> Result<Vec<Coordinator>> {
        self.list(Query::table(COORDINATORS).order("id", OrderDirection::Asc))
            .await
    }

    async fn verifiers(&self) -> Result<Vec<Verifier>> {
        self.list(Query::table(VERIFIERS).order("id", OrderDirection::Asc))
            .await
    }

    async fn warehouses(&self) -> Result<Vec<Warehouse>> {
        self.list(Query::table(WAREHOUSES).order("id", OrderDirection::Asc))
            .await
    }

    async fn incidents(&self) -> Result<Vec<Incident>> {
        self.list(Query::table(INCIDENTS).order("id", OrderDirection::Asc))
            .await
    }

    async fn incident_records(&self) -> Result<Vec<IncidentRecord>> {
        self.list(
            Query::table(RECORDS)
                .order("date", OrderDirection::Desc)
                .order("id", OrderDirection::Desc),
        )
        .await
    }

    async fn incident_actions(&self, record_id: Option<Id>) -> Result<Vec<IncidentAction>> {
        let mut query = Query::table(ACTIONS)
            .order("action_date", OrderDirection::Asc)
            .order("id", OrderDirection::Asc);
        if let Some(record_id) = record_id {
            query = query.eq("incident_record_id", record_id);
        }
        self.list(query).await
    }

    async fn coordinator(&self, id: Id) -> Result<Option<Coordinator>> {
        self.by_id(COORDINATORS, id).await
    }

    async fn verifier(&self, id: Id) -> Result<Option<Verifier>> {
        self.by_id(VERIFIERS, id).await
    }

    async fn warehouse(&self, id: Id) -> Result<Option<Warehouse>> {
        self.by_id(WAREHOUSES, id).await
    }

    async fn incident(&self, id: Id) -> Result<Option<Incident>> {
        self.by_id(INCIDENTS, id).await
    }

    async fn incident_record(&self, id: Id) -> Result<Option<IncidentRecord>> {
        self.by_id(RECORDS, id).await
    }

    async fn incident_by_code(&self, code: &str) -> Result<Option<Incident>> {
        self.one(Query::table(INCIDENTS).eq("code", code)).await
    }

    async fn records_for_incident(&self, incident_id: Id) -> Result<Vec<IncidentRecord>> {
        self.list(
            Query::table(RECORDS)
                .eq("incident_id", incident_id)
                .order("date", OrderDirection::Desc)
                .order("id", OrderDirection::Desc),
        )
        .await
    }

    async fn count_incidents(&self) -> Result<u64> {
        self.tables.count(INCIDENTS, &[]).await
    }

    async fn update_coordinator(&self, id: Id, fields: &NewCoordinator) -> Result<()> {
        self.update_one("Coordinator", COORDINATORS, id, fields).await
    }

    async fn update_verifier(&self, id: Id, fields: &NewVerifier) -> Result<()> {
        self.update_one("Verifier", VERIFIERS, id, fields).await
    }

    async fn update_warehouse(&self, id: Id, fields: &NewWarehouse) -> Result<()> {
        self.update_one("Warehouse", WAREHOUSES, id, fields).await
    }

    async fn write_incident(&self, id: Id, code: &str, description: &str) -> Result<()> {
        self.update_one(
            "Incident",
            INCIDENTS,
            id,
            &serde_json::json!({ "code": code, "description": description }),
        )
        .await
    }

    async fn update_incident_record(&self, id: Id, fields: &NewIncidentRecord) -> Result<()> {
        self.update_one("Incident record", RECORDS, id, &record_payload(fields))
            .await
    }

    async fn reset(&self) -> Result<()> {
        for table in TABLES.iter().rev() {
            self.tables
                .delete(table, &[Filter::new("id", FilterOp::Neq, 0)])
                .await?;
        }
        warn!("Deleted all rows from the remote store");
        Ok(())
    }

    /// Reset, then re-insert every table parents first, keeping ids.
    ///
    /// Explicit ids do not advance the server's identity sequences; resync
    /// them server-side before inserting new rows.
    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        self.reset().await?;
        self.insert_all(COORDINATORS, &snapshot.coordinators).await?;
        self.insert_all(VERIFIERS, &snapshot.verifiers).await?;
        self.insert_all(WAREHOUSES, &snapshot.warehouses).await?;
        self.insert_all(INCIDENTS, &snapshot.incidents).await?;
        self.insert_all(RECORDS, &snapshot.incident_records).await?;
        self.insert_all(ACTIONS, &snapshot.incident_actions).await?;
        info!(rows = snapshot.total_rows(), "Restored snapshot into the remote store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn store() -> (Arc<MemoryTables>, RemoteStore) {
        let tables = Arc::new(MemoryTables::new());
        let store = RemoteStore::new(tables.clone());
        (tables, store)
    }

    #[tokio::test]
    async fn test_warehouse_code_stored_as_nif() {
        let (tables, store) = store();
        let w = store
            .insert_warehouse(&NewWarehouse::new("Bodega A").code("B001").zone(Zone::Penedes))
            .await
            .unwrap();
        assert_eq!(w.codigo_consejo.as_deref(), Some("B001"));

        let raw = tables.rows("warehouses");
        assert_eq!(raw[0]["nif"], serde_json::json!("B001"));
        assert!(raw[0].get("codigo_consejo").is_none());

        store
            .update_warehouse(w.id, &NewWarehouse::new("Bodega A").code("B999"))
            .await
            .unwrap();
        let raw = tables.rows("warehouses");
        assert_eq!(raw[0]["nif"], serde_json::json!("B999"));
        assert_eq!(
            store.warehouse(w.id).await.unwrap().unwrap().codigo_consejo.as_deref(),
            Some("B999")
        );
    }

    #[tokio::test]
    async fn test_enlace_is_written() {
        let (tables, store) = store();
        let record = store
            .insert_incident_record(&NewIncidentRecord {
                date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                registering_coordinator_id: 1,
                warehouse_id: 1,
                causing_verifier_id: 1,
                incident_id: 1,
                assigned_coordinator_id: 1,
                explanation: "x".to_string(),
                enlace: Some("https://example.com/a".to_string()),
                status: Status::Pendiente,
                responsible: Responsible::Coordinacion,
            })
            .await
            .unwrap();
        assert_eq!(record.enlace.as_deref(), Some("https://example.com/a"));
        assert_eq!(tables.rows("incident_records")[0]["responsible"], serde_json::json!("Coordinacion"));
    }

    #[tokio::test]
    async fn test_action_on_missing_record() {
        let (_tables, store) = store();
        let err = store
            .insert_incident_action(&NewIncidentAction {
                incident_record_id: 5,
                action_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                action_description: "x".to_string(),
                new_status: Some(Status::Solucionado),
                performed_by: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    /// Delegates to memory but rejects every patch on incident records
    struct RejectRecordPatch(MemoryTables);

    #[async_trait]
    impl Tables for RejectRecordPatch {
        async fn select(&self, query: &Query) -> Result<Vec<Row>> {
            self.0.select(query).await
        }

        async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
            self.0.count(table, filters).await
        }

        async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
            self.0.insert(table, rows).await
        }

        async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>> {
            if table == RECORDS {
                return Err(Error::RemoteStatus {
                    table: table.to_string(),
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.0.update(table, filters, patch).await
        }

        async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
            self.0.delete(table, filters).await
        }
    }

    #[tokio::test]
    async fn test_failed_status_patch_keeps_action() {
        let tables = Arc::new(RejectRecordPatch(MemoryTables::new()));
        let store = RemoteStore::new(tables.clone());
        let record = store
            .insert_incident_record(&NewIncidentRecord {
                date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                registering_coordinator_id: 1,
                warehouse_id: 1,
                causing_verifier_id: 1,
                incident_id: 1,
                assigned_coordinator_id: 1,
                explanation: "x".to_string(),
                enlace: None,
                status: Status::Pendiente,
                responsible: Responsible::Bodega,
            })
            .await
            .unwrap();

        let err = store
            .insert_incident_action(&NewIncidentAction {
                incident_record_id: record.id,
                action_date: NaiveDate::from_ymd_opt(2025, 2, 2).unwrap(),
                action_description: "Visita".to_string(),
                new_status: Some(Status::Solucionado),
                performed_by: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteStatus { status: 503, .. }));

        let actions = tables.0.rows("incident_actions");
        assert_eq!(actions.len(), 1);
        assert_eq!(tables.0.rows("incident_records")[0]["status"], serde_json::json!("Pendiente"));
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let (_tables, store) = store();
        store.insert_coordinator(&NewCoordinator::new("Ana", "Ruiz")).await.unwrap();
        store.reset().await.unwrap();
        store.reset().await.unwrap();
        assert!(store.snapshot().await.unwrap().total_rows() == 0);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_tables, store) = store();
        let err = store
            .update_coordinator(3, &NewCoordinator::new("Ana", "Ruiz"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
