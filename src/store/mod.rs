//! Storage engine contract
//!
//! Both engines implement [`Store`] with identical signatures and identical
//! success/failure semantics. Shared behaviour (incident code assignment,
//! snapshots, JSON backups) lives here as provided methods so neither engine
//! can drift from it.

pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::backup;
use crate::error::{Error, Result};
use crate::model::*;

pub use local::LocalStore;
pub use remote::RemoteStore;

/// The engine behind a [`Store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

/// Table names, parents before children
pub const TABLES: [&str; 6] = [
    "coordinators",
    "verifiers",
    "warehouses",
    "incidents",
    "incident_records",
    "incident_actions",
];

/// Every row of every table, under logical column names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub coordinators: Vec<Coordinator>,
    pub verifiers: Vec<Verifier>,
    pub warehouses: Vec<Warehouse>,
    pub incidents: Vec<Incident>,
    pub incident_records: Vec<IncidentRecord>,
    pub incident_actions: Vec<IncidentAction>,
}

impl Snapshot {
    /// `(table, rows)` pairs in [`TABLES`] order
    pub fn row_counts(&self) -> [(&'static str, usize); 6] {
        [
            (TABLES[0], self.coordinators.len()),
            (TABLES[1], self.verifiers.len()),
            (TABLES[2], self.warehouses.len()),
            (TABLES[3], self.incidents.len()),
            (TABLES[4], self.incident_records.len()),
            (TABLES[5], self.incident_actions.len()),
        ]
    }

    pub fn total_rows(&self) -> usize {
        self.row_counts().iter().map(|(_, n)| n).sum()
    }
}

/// Format a sequence number as an incident code (`1` -> `"001"`)
pub fn format_incident_code(n: u64) -> String {
    format!("{:03}", n)
}

/// Uniform CRUD and query surface over one storage engine
///
/// Listing order is fixed: catalog tables by id, incident records newest
/// first, incident actions oldest first.
#[async_trait]
pub trait Store: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Cheap round trip proving the store is reachable
    async fn ping(&self) -> Result<()>;

    // =========================================================================
    // Inserts
    // =========================================================================

    async fn insert_coordinator(&self, new: &NewCoordinator) -> Result<Coordinator>;

    async fn insert_verifier(&self, new: &NewVerifier) -> Result<Verifier>;

    async fn insert_warehouse(&self, new: &NewWarehouse) -> Result<Warehouse>;

    /// Store an incident type under a code that has already been resolved
    async fn create_incident(&self, code: &str, description: &str) -> Result<Incident>;

    async fn insert_incident_record(&self, new: &NewIncidentRecord) -> Result<IncidentRecord>;

    /// Insert an audit entry and, when `new_status` is set, copy it onto the
    /// parent record's status
    async fn insert_incident_action(&self, new: &NewIncidentAction) -> Result<IncidentAction>;

    // =========================================================================
    // Listings
    // =========================================================================

    async fn coordinators(&self) -> Result<Vec<Coordinator>>;

    async fn verifiers(&self) -> Result<Vec<Verifier>>;

    async fn warehouses(&self) -> Result<Vec<Warehouse>>;

    async fn incidents(&self) -> Result<Vec<Incident>>;

    async fn incident_records(&self) -> Result<Vec<IncidentRecord>>;

    /// Actions for one record, or all actions when `record_id` is `None`
    async fn incident_actions(&self, record_id: Option<Id>) -> Result<Vec<IncidentAction>>;

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn coordinator(&self, id: Id) -> Result<Option<Coordinator>>;

    async fn verifier(&self, id: Id) -> Result<Option<Verifier>>;

    async fn warehouse(&self, id: Id) -> Result<Option<Warehouse>>;

    async fn incident(&self, id: Id) -> Result<Option<Incident>>;

    async fn incident_record(&self, id: Id) -> Result<Option<IncidentRecord>>;

    async fn incident_by_code(&self, code: &str) -> Result<Option<Incident>>;

    async fn records_for_incident(&self, incident_id: Id) -> Result<Vec<IncidentRecord>>;

    async fn count_incidents(&self) -> Result<u64>;

    // =========================================================================
    // Updates (NotFound when the id does not exist)
    // =========================================================================

    async fn update_coordinator(&self, id: Id, fields: &NewCoordinator) -> Result<()>;

    async fn update_verifier(&self, id: Id, fields: &NewVerifier) -> Result<()>;

    async fn update_warehouse(&self, id: Id, fields: &NewWarehouse) -> Result<()>;

    /// Overwrite code and description; uniqueness is checked by the caller
    async fn write_incident(&self, id: Id, code: &str, description: &str) -> Result<()>;

    async fn update_incident_record(&self, id: Id, fields: &NewIncidentRecord) -> Result<()>;

    // =========================================================================
    // Whole-store operations
    // =========================================================================

    /// Delete every row of every table, children first
    async fn reset(&self) -> Result<()>;

    /// Replace the whole content with `snapshot`, keeping its ids
    async fn restore(&self, snapshot: &Snapshot) -> Result<()>;

    // =========================================================================
    // Provided
    // =========================================================================

    /// Next free sequential code: `count + 1`, bumped past any collision
    async fn next_incident_code(&self) -> Result<String> {
        let mut n = self.count_incidents().await? + 1;
        loop {
            let code = format_incident_code(n);
            if self.incident_by_code(&code).await?.is_none() {
                return Ok(code);
            }
            n += 1;
        }
    }

    /// Create an incident type, generating its code when none is given
    ///
    /// An explicit code that is already taken fails with `DuplicateKey` and
    /// creates nothing.
    async fn insert_incident(&self, new: &NewIncident) -> Result<Incident> {
        let requested = new.code.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let code = match requested {
            Some(code) => {
                if self.incident_by_code(code).await?.is_some() {
                    return Err(Error::DuplicateKey {
                        code: code.to_string(),
                    });
                }
                code.to_string()
            }
            None => self.next_incident_code().await?,
        };
        self.create_incident(&code, new.description.trim()).await
    }

    /// Edit an incident type; the new code must not belong to another row
    async fn update_incident(&self, id: Id, code: &str, description: &str) -> Result<()> {
        let code = code.trim();
        if let Some(existing) = self.incident_by_code(code).await? {
            if existing.id != id {
                return Err(Error::DuplicateKey {
                    code: code.to_string(),
                });
            }
        }
        self.write_incident(id, code, description.trim()).await
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let (coordinators, verifiers, warehouses, incidents, incident_records, incident_actions) = tokio::try_join!(
            self.coordinators(),
            self.verifiers(),
            self.warehouses(),
            self.incidents(),
            self.incident_records(),
            self.incident_actions(None),
        )?;

        Ok(Snapshot {
            coordinators,
            verifiers,
            warehouses,
            incidents,
            incident_records,
            incident_actions,
        })
    }

    /// Write a backup into `dir` and return its path
    ///
    /// The default writes a JSON snapshot with one array per table.
    async fn backup(&self, dir: &Path) -> Result<PathBuf> {
        let snapshot = self.snapshot().await?;
        backup::write_snapshot(dir, backup::REMOTE_BACKUP_PREFIX, &snapshot)
    }

    /// Restore from a file written by [`Store::backup`]
    async fn restore_backup(&self, path: &Path) -> Result<()> {
        let snapshot = backup::read_snapshot(path)?;
        self.restore(&snapshot).await
    }
}

/// Keep decodable rows, logging and dropping the rest
pub(crate) fn keep_decoded<T>(table: &str, rows: Vec<Result<T>>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match row {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::error!(table, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect()
}
