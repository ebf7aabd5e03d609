//! Local SQLite engine
//!
//! Opens a fresh connection for every call and drops it on every exit path.
//! Foreign keys are enforced, so dangling references surface as
//! `Error::Integrity`.

use async_trait::async_trait;
use chrono::Local;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use super::{keep_decoded, BackendKind, Snapshot, Store};
use crate::backup;
use crate::error::{Error, Result};
use crate::model::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS coordinators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    surnames TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS verifiers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    surnames TEXT NOT NULL,
    phone TEXT,
    zone TEXT
);
CREATE TABLE IF NOT EXISTS warehouses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    codigo_consejo TEXT,
    zone TEXT
);
CREATE TABLE IF NOT EXISTS incidents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS incident_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    registering_coordinator_id INTEGER NOT NULL REFERENCES coordinators(id),
    warehouse_id INTEGER NOT NULL REFERENCES warehouses(id),
    causing_verifier_id INTEGER NOT NULL REFERENCES verifiers(id),
    incident_id INTEGER NOT NULL REFERENCES incidents(id),
    assigned_coordinator_id INTEGER NOT NULL REFERENCES coordinators(id),
    explanation TEXT,
    enlace TEXT,
    status TEXT NOT NULL,
    responsible TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS incident_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    incident_record_id INTEGER NOT NULL REFERENCES incident_records(id),
    action_date TEXT NOT NULL,
    action_description TEXT NOT NULL,
    new_status TEXT,
    performed_by INTEGER NOT NULL REFERENCES coordinators(id)
);
"#;

/// Columns added after the first deployments, as `(table, column, type)`
const LATE_COLUMNS: &[(&str, &str, &str)] = &[
    ("warehouses", "codigo_consejo", "TEXT"),
    ("incident_records", "enlace", "TEXT"),
];

const RECORD_COLUMNS: &str = "id, date, registering_coordinator_id, warehouse_id, \
     causing_verifier_id, incident_id, assigned_coordinator_id, explanation, enlace, \
     status, responsible";

const ACTION_COLUMNS: &str =
    "id, incident_record_id, action_date, action_description, new_status, performed_by";

// =============================================================================
// Label columns
// =============================================================================

macro_rules! sql_label {
    ($($ty:ty),+) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.label()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: UnknownLabel| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_label!(Zone, Status, Responsible);

/// Nullable label column where blanks also mean "unset"
fn optional_label<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = UnknownLabel>,
{
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}

fn optional_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn blank_to_null(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Row mappers
// =============================================================================

fn coordinator_row(row: &Row<'_>) -> rusqlite::Result<Coordinator> {
    Ok(Coordinator {
        id: row.get(0)?,
        name: row.get(1)?,
        surnames: row.get(2)?,
    })
}

fn verifier_row(row: &Row<'_>) -> rusqlite::Result<Verifier> {
    Ok(Verifier {
        id: row.get(0)?,
        name: row.get(1)?,
        surnames: row.get(2)?,
        phone: optional_text(row, 3)?,
        zone: optional_label(row, 4)?,
    })
}

fn warehouse_row(row: &Row<'_>) -> rusqlite::Result<Warehouse> {
    Ok(Warehouse {
        id: row.get(0)?,
        name: row.get(1)?,
        codigo_consejo: optional_text(row, 2)?,
        zone: optional_label(row, 3)?,
    })
}

fn incident_row(row: &Row<'_>) -> rusqlite::Result<Incident> {
    Ok(Incident {
        id: row.get(0)?,
        code: row.get(1)?,
        description: row.get(2)?,
    })
}

fn record_row(row: &Row<'_>) -> rusqlite::Result<IncidentRecord> {
    Ok(IncidentRecord {
        id: row.get(0)?,
        date: row.get(1)?,
        registering_coordinator_id: row.get(2)?,
        warehouse_id: row.get(3)?,
        causing_verifier_id: row.get(4)?,
        incident_id: row.get(5)?,
        assigned_coordinator_id: row.get(6)?,
        explanation: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        enlace: optional_text(row, 8)?,
        status: row.get(9)?,
        responsible: row.get(10)?,
    })
}

fn action_row(row: &Row<'_>) -> rusqlite::Result<IncidentAction> {
    Ok(IncidentAction {
        id: row.get(0)?,
        incident_record_id: row.get(1)?,
        action_date: row.get(2)?,
        action_description: row.get(3)?,
        new_status: optional_label(row, 4)?,
        performed_by: row.get(5)?,
    })
}

// =============================================================================
// Store
// =============================================================================

/// SQLite-backed store at a fixed file path
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) the database file and bring its schema up to date
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| Error::FileWriteError {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let store = Self { path };
        store.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            add_late_columns(conn)?;
            Ok(())
        })?;

        if let Err(e) = store.integrity_check() {
            error!(path = %store.path.display(), error = %e, "Database integrity check failed");
        }

        info!(path = %store.path.display(), "Opened local store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `PRAGMA integrity_check`, failing unless SQLite answers "ok"
    pub fn integrity_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            let verdict: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            if verdict != "ok" {
                return Err(Error::integrity(verdict));
            }
            Ok(())
        })
    }

    /// Copy the live database into `dest` through SQLite's online backup
    pub fn backup_to(&self, dest: &Path) -> Result<()> {
        self.with_conn(|conn| {
            conn.backup(rusqlite::DatabaseName::Main, dest, None)?;
            Ok(())
        })
    }

    /// Overwrite the live database with the content of `src`
    pub fn restore_from(&self, src: &Path) -> Result<()> {
        if !src.is_file() {
            return Err(Error::not_found("Backup file", src.display()));
        }
        let mut conn = self.connect()?;
        conn.restore(
            rusqlite::DatabaseName::Main,
            src,
            None::<fn(rusqlite::backup::Progress)>,
        )?;
        drop(conn);

        // Restored files may predate the late columns
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            add_late_columns(conn)
        })
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Run `f` on a fresh connection that is closed when `f` returns
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.connect()?;
        f(&mut conn)
    }

    fn list<T>(
        &self,
        table: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params, map)?
                .map(|row| row.map_err(Error::from))
                .collect::<Vec<_>>();
            Ok(keep_decoded(table, rows))
        })
    }

    fn one<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        self.with_conn(|conn| Ok(conn.query_row(sql, params, map).optional()?))
    }

    fn update(&self, entity: &'static str, id: Id, sql: &str, params: impl rusqlite::Params) -> Result<()> {
        let changed = self.with_conn(|conn| Ok(conn.execute(sql, params)?))?;
        if changed == 0 {
            return Err(Error::not_found(entity, id));
        }
        debug!(entity, id, "Updated row");
        Ok(())
    }
}

fn add_late_columns(conn: &Connection) -> Result<()> {
    for (table, column, ty) in LATE_COLUMNS {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let present = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|name| name.ok())
            .any(|name| name == *column);

        if !present {
            conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, ty))?;
            warn!(table, column, "Added missing column");
        }
    }
    Ok(())
}

fn insert_record_row(conn: &Connection, id: Option<Id>, r: &NewIncidentRecord) -> Result<Id> {
    conn.execute(
        "INSERT INTO incident_records (id, date, registering_coordinator_id, warehouse_id, \
         causing_verifier_id, incident_id, assigned_coordinator_id, explanation, enlace, status, \
         responsible) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            r.date,
            r.registering_coordinator_id,
            r.warehouse_id,
            r.causing_verifier_id,
            r.incident_id,
            r.assigned_coordinator_id,
            r.explanation.trim(),
            blank_to_null(&r.enlace),
            r.status,
            r.responsible,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_action_row(conn: &Connection, id: Option<Id>, a: &NewIncidentAction) -> Result<Id> {
    conn.execute(
        "INSERT INTO incident_actions (id, incident_record_id, action_date, action_description, \
         new_status, performed_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            a.incident_record_id,
            a.action_date,
            a.action_description.trim(),
            a.new_status,
            a.performed_by,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn record_fields(r: &IncidentRecord) -> NewIncidentRecord {
    NewIncidentRecord {
        date: r.date,
        registering_coordinator_id: r.registering_coordinator_id,
        warehouse_id: r.warehouse_id,
        causing_verifier_id: r.causing_verifier_id,
        incident_id: r.incident_id,
        assigned_coordinator_id: r.assigned_coordinator_id,
        explanation: r.explanation.clone(),
        enlace: r.enlace.clone(),
        status: r.status,
        responsible: r.responsible,
    }
}

fn action_fields(a: &IncidentAction) -> NewIncidentAction {
    NewIncidentAction {
        incident_record_id: a.incident_record_id,
        action_date: a.action_date,
        action_description: a.action_description.clone(),
        new_status: a.new_status,
        performed_by: a.performed_by,
    }
}

fn delete_all(conn: &Connection) -> Result<()> {
    for table in super::TABLES.iter().rev() {
        conn.execute(&format!("DELETE FROM {}", table), [])?;
    }
    conn.execute(
        "DELETE FROM sqlite_sequence WHERE name IN (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            super::TABLES[0],
            super::TABLES[1],
            super::TABLES[2],
            super::TABLES[3],
            super::TABLES[4],
            super::TABLES[5],
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Store for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    async fn insert_coordinator(&self, new: &NewCoordinator) -> Result<Coordinator> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO coordinators (name, surnames) VALUES (?1, ?2)",
                params![new.name.trim(), new.surnames.trim()],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.coordinator(id)
            .await?
            .ok_or_else(|| Error::not_found("Coordinator", id))
    }

    async fn insert_verifier(&self, new: &NewVerifier) -> Result<Verifier> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO verifiers (name, surnames, phone, zone) VALUES (?1, ?2, ?3, ?4)",
                params![new.name.trim(), new.surnames.trim(), blank_to_null(&new.phone), new.zone],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.verifier(id)
            .await?
            .ok_or_else(|| Error::not_found("Verifier", id))
    }

    async fn insert_warehouse(&self, new: &NewWarehouse) -> Result<Warehouse> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO warehouses (name, codigo_consejo, zone) VALUES (?1, ?2, ?3)",
                params![new.name.trim(), blank_to_null(&new.codigo_consejo), new.zone],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.warehouse(id)
            .await?
            .ok_or_else(|| Error::not_found("Warehouse", id))
    }

    async fn create_incident(&self, code: &str, description: &str) -> Result<Incident> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO incidents (code, description) VALUES (?1, ?2)",
                params![code, description],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(Incident {
            id,
            code: code.to_string(),
            description: description.to_string(),
        })
    }

    async fn insert_incident_record(&self, new: &NewIncidentRecord) -> Result<IncidentRecord> {
        let id = self.with_conn(|conn| insert_record_row(conn, None, new))?;
        self.incident_record(id)
            .await?
            .ok_or_else(|| Error::not_found("Incident record", id))
    }

    async fn insert_incident_action(&self, new: &NewIncidentAction) -> Result<IncidentAction> {
        let id = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let id = insert_action_row(&tx, None, new)?;
            if let Some(status) = new.new_status {
                tx.execute(
                    "UPDATE incident_records SET status = ?1 WHERE id = ?2",
                    params![status, new.incident_record_id],
                )?;
            }
            tx.commit()?;
            Ok(id)
        })?;

        Ok(IncidentAction {
            id,
            incident_record_id: new.incident_record_id,
            action_date: new.action_date,
            action_description: new.action_description.trim().to_string(),
            new_status: new.new_status,
            performed_by: new.performed_by,
        })
    }

    async fn coordinators(&self) -> Result<Vec<Coordinator>> {
        self.list(
            "coordinators",
            "SELECT id, name, surnames FROM coordinators ORDER BY id",
            [],
            coordinator_row,
        )
    }

    async fn verifiers(&self) -> Result<Vec<Verifier>> {
        self.list(
            "verifiers",
            "SELECT id, name, surnames, phone, zone FROM verifiers ORDER BY id",
            [],
            verifier_row,
        )
    }

    async fn warehouses(&self) -> Result<Vec<Warehouse>> {
        self.list(
            "warehouses",
            "SELECT id, name, codigo_consejo, zone FROM warehouses ORDER BY id",
            [],
            warehouse_row,
        )
    }

    async fn incidents(&self) -> Result<Vec<Incident>> {
        self.list(
            "incidents",
            "SELECT id, code, description FROM incidents ORDER BY id",
            [],
            incident_row,
        )
    }

    async fn incident_records(&self) -> Result<Vec<IncidentRecord>> {
        self.list(
            "incident_records",
            &format!(
                "SELECT {} FROM incident_records ORDER BY date DESC, id DESC",
                RECORD_COLUMNS
            ),
            [],
            record_row,
        )
    }

    async fn incident_actions(&self, record_id: Option<Id>) -> Result<Vec<IncidentAction>> {
        match record_id {
            Some(record_id) => self.list(
                "incident_actions",
                &format!(
                    "SELECT {} FROM incident_actions WHERE incident_record_id = ?1 \
                     ORDER BY action_date, id",
                    ACTION_COLUMNS
                ),
                [record_id],
                action_row,
            ),
            None => self.list(
                "incident_actions",
                &format!(
                    "SELECT {} FROM incident_actions ORDER BY action_date, id",
                    ACTION_COLUMNS
                ),
                [],
                action_row,
            ),
        }
    }

    async fn coordinator(&self, id: Id) -> Result<Option<Coordinator>> {
        self.one(
            "SELECT id, name, surnames FROM coordinators WHERE id = ?1",
            [id],
            coordinator_row,
        )
    }

    async fn verifier(&self, id: Id) -> Result<Option<Verifier>> {
        self.one(
            "SELECT id, name, surnames, phone, zone FROM verifiers WHERE id = ?1",
            [id],
            verifier_row,
        )
    }

    async fn warehouse(&self, id: Id) -> Result<Option<Warehouse>> {
        self.one(
            "SELECT id, name, codigo_consejo, zone FROM warehouses WHERE id = ?1",
            [id],
            warehouse_row,
        )
    }

    async fn incident(&self, id: Id) -> Result<Option<Incident>> {
        self.one(
            "SELECT id, code, description FROM incidents WHERE id = ?1",
            [id],
            incident_row,
        )
    }

    async fn incident_record(&self, id: Id) -> Result<Option<IncidentRecord>> {
        self.one(
            &format!("SELECT {} FROM incident_records WHERE id = ?1", RECORD_COLUMNS),
            [id],
            record_row,
        )
    }

    async fn incident_by_code(&self, code: &str) -> Result<Option<Incident>> {
        self.one(
            "SELECT id, code, description FROM incidents WHERE code = ?1",
            [code],
            incident_row,
        )
    }

    async fn records_for_incident(&self, incident_id: Id) -> Result<Vec<IncidentRecord>> {
        self.list(
            "incident_records",
            &format!(
                "SELECT {} FROM incident_records WHERE incident_id = ?1 ORDER BY date DESC, id DESC",
                RECORD_COLUMNS
            ),
            [incident_id],
            record_row,
        )
    }

    async fn count_incidents(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    async fn update_coordinator(&self, id: Id, fields: &NewCoordinator) -> Result<()> {
        self.update(
            "Coordinator",
            id,
            "UPDATE coordinators SET name = ?1, surnames = ?2 WHERE id = ?3",
            params![fields.name.trim(), fields.surnames.trim(), id],
        )
    }

    async fn update_verifier(&self, id: Id, fields: &NewVerifier) -> Result<()> {
        self.update(
            "Verifier",
            id,
            "UPDATE verifiers SET name = ?1, surnames = ?2, phone = ?3, zone = ?4 WHERE id = ?5",
            params![
                fields.name.trim(),
                fields.surnames.trim(),
                blank_to_null(&fields.phone),
                fields.zone,
                id
            ],
        )
    }

    async fn update_warehouse(&self, id: Id, fields: &NewWarehouse) -> Result<()> {
        self.update(
            "Warehouse",
            id,
            "UPDATE warehouses SET name = ?1, codigo_consejo = ?2, zone = ?3 WHERE id = ?4",
            params![
                fields.name.trim(),
                blank_to_null(&fields.codigo_consejo),
                fields.zone,
                id
            ],
        )
    }

    async fn write_incident(&self, id: Id, code: &str, description: &str) -> Result<()> {
        self.update(
            "Incident",
            id,
            "UPDATE incidents SET code = ?1, description = ?2 WHERE id = ?3",
            params![code, description, id],
        )
    }

    async fn update_incident_record(&self, id: Id, r: &NewIncidentRecord) -> Result<()> {
        self.update(
            "Incident record",
            id,
            "UPDATE incident_records SET date = ?1, registering_coordinator_id = ?2, \
             warehouse_id = ?3, causing_verifier_id = ?4, incident_id = ?5, \
             assigned_coordinator_id = ?6, explanation = ?7, enlace = ?8, status = ?9, \
             responsible = ?10 WHERE id = ?11",
            params![
                r.date,
                r.registering_coordinator_id,
                r.warehouse_id,
                r.causing_verifier_id,
                r.incident_id,
                r.assigned_coordinator_id,
                r.explanation.trim(),
                blank_to_null(&r.enlace),
                r.status,
                r.responsible,
                id
            ],
        )
    }

    async fn reset(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            delete_all(&tx)?;
            tx.commit()?;
            Ok(())
        })?;
        warn!(path = %self.path.display(), "Deleted all rows from the local store");
        Ok(())
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            delete_all(&tx)?;

            for c in &snapshot.coordinators {
                tx.execute(
                    "INSERT INTO coordinators (id, name, surnames) VALUES (?1, ?2, ?3)",
                    params![c.id, c.name, c.surnames],
                )?;
            }
            for v in &snapshot.verifiers {
                tx.execute(
                    "INSERT INTO verifiers (id, name, surnames, phone, zone) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![v.id, v.name, v.surnames, v.phone, v.zone],
                )?;
            }
            for w in &snapshot.warehouses {
                tx.execute(
                    "INSERT INTO warehouses (id, name, codigo_consejo, zone) VALUES (?1, ?2, ?3, ?4)",
                    params![w.id, w.name, w.codigo_consejo, w.zone],
                )?;
            }
            for i in &snapshot.incidents {
                tx.execute(
                    "INSERT INTO incidents (id, code, description) VALUES (?1, ?2, ?3)",
                    params![i.id, i.code, i.description],
                )?;
            }
            for r in &snapshot.incident_records {
                insert_record_row(&tx, Some(r.id), &record_fields(r))?;
            }
            for a in &snapshot.incident_actions {
                insert_action_row(&tx, Some(a.id), &action_fields(a))?;
            }

            tx.commit()?;
            Ok(())
        })?;

        info!(rows = snapshot.total_rows(), "Restored snapshot into the local store");
        Ok(())
    }

    /// File-level copy named `cavacrm_backup_<timestamp>.db`
    async fn backup(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|source| Error::FileWriteError {
            path: dir.to_path_buf(),
            source,
        })?;
        let dest = dir.join(format!(
            "{}{}.db",
            backup::LOCAL_BACKUP_PREFIX,
            Local::now().format(backup::TIMESTAMP_FORMAT)
        ));
        self.backup_to(&dest)?;
        info!(path = %dest.display(), "Created local backup");
        Ok(dest)
    }

    /// Accepts both database copies and JSON snapshots
    async fn restore_backup(&self, path: &Path) -> Result<()> {
        if backup::is_json_snapshot(path) {
            let snapshot = backup::read_snapshot(path)?;
            return self.restore(&snapshot).await;
        }
        self.restore_from(path)?;
        info!(path = %path.display(), "Restored local store from backup");
        Ok(())
    }
}
