//! The flat CRM surface
//!
//! [`Crm`] is bound to one [`Store`] at startup and is the only thing the
//! CLI talks to. Form validation happens here, before any storage call.
//!
//! Failure translation at this boundary:
//! - writes, code lookups and file operations return [`Result`]
//! - listings return an empty `Vec` on failure, by-id reads return `None`;
//!   the error is logged with full context either way

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::backup;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{self, report::GroupSection, ReportData, TemplateEngine};
use crate::import::{self, ImportReport};
use crate::model::*;
use crate::readmodel::{
    self, dashboard, filter, grouping, ActionRow, DashboardStats, GroupBy, GroupCount,
    IncidentRow, Lookups, PendingFilter, RecordDetails,
};
use crate::seed::{self, SeedReport};
use crate::selector::{self, BackendKind};
use crate::store::{RemoteStore, Snapshot, Store};
use crate::validation;

fn or_empty<T>(what: &'static str, result: Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        error!(what, error = %e, "Listing failed");
        Vec::new()
    })
}

fn or_none<T>(what: &'static str, id: Id, result: Result<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        error!(what, id, error = %e, "Lookup failed");
        None
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Data-access surface bound to one storage engine
pub struct Crm {
    store: Box<dyn Store>,
    config: Config,
}

impl Crm {
    pub fn new(store: Box<dyn Store>, config: Config) -> Self {
        Self { store, config }
    }

    /// Select the engine for `config` and bind to it
    pub async fn open(config: Config) -> Result<Self> {
        let store = selector::open_store(&config).await?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.store.kind()
    }

    /// Whether the bound store answers a round trip
    pub async fn check_connection(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                error!(backend = %self.backend_kind(), error = %e, "Connection check failed");
                false
            }
        }
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    pub async fn insert_coordinator(&self, new: &NewCoordinator) -> Result<Coordinator> {
        validation::validate_coordinator(new)?;
        let created = self.store.insert_coordinator(new).await?;
        info!(id = created.id, name = %created.full_name(), "Inserted coordinator");
        Ok(created)
    }

    pub async fn insert_verifier(&self, new: &NewVerifier) -> Result<Verifier> {
        validation::validate_verifier(new)?;
        let created = self.store.insert_verifier(new).await?;
        info!(id = created.id, name = %created.full_name(), "Inserted verifier");
        Ok(created)
    }

    pub async fn insert_warehouse(&self, new: &NewWarehouse) -> Result<Warehouse> {
        validation::validate_warehouse(new)?;
        let created = self.store.insert_warehouse(new).await?;
        info!(id = created.id, name = %created.name, "Inserted warehouse");
        Ok(created)
    }

    /// Create an incident type from the two-part form
    ///
    /// `code: None` assigns the next sequential code.
    pub async fn insert_incident(
        &self,
        kind: &str,
        detail: &str,
        code: Option<&str>,
    ) -> Result<Incident> {
        let new = validation::validate_incident_form(kind, detail, code)?;
        let created = self.store.insert_incident(&new).await.map_err(|e| {
            if let Error::DuplicateKey { code } = &e {
                warn!(code = %code, "Incident code already exists");
            }
            e
        })?;
        info!(id = created.id, code = %created.code, "Inserted incident type");
        Ok(created)
    }

    pub async fn insert_incident_record(&self, new: &NewIncidentRecord) -> Result<IncidentRecord> {
        validation::validate_record(new)?;
        self.ensure_references(new).await?;
        let created = self.store.insert_incident_record(new).await?;
        info!(id = created.id, status = %created.status, "Inserted incident record");
        Ok(created)
    }

    /// Record an action; a `new_status` is mirrored onto the parent record
    pub async fn insert_incident_action(&self, new: &NewIncidentAction) -> Result<IncidentAction> {
        validation::validate_action(new)?;
        if self.store.incident_record(new.incident_record_id).await?.is_none() {
            return Err(Error::not_found("Incident record", new.incident_record_id));
        }
        if self.store.coordinator(new.performed_by).await?.is_none() {
            return Err(Error::not_found("Coordinator", new.performed_by));
        }
        let created = self.store.insert_incident_action(new).await?;
        info!(
            id = created.id,
            record_id = created.incident_record_id,
            new_status = ?created.new_status,
            "Inserted incident action"
        );
        Ok(created)
    }

    /// Every foreign key of a record must point at an existing row
    async fn ensure_references(&self, record: &NewIncidentRecord) -> Result<()> {
        let (registering, warehouse, verifier, incident, assigned) = tokio::try_join!(
            self.store.coordinator(record.registering_coordinator_id),
            self.store.warehouse(record.warehouse_id),
            self.store.verifier(record.causing_verifier_id),
            self.store.incident(record.incident_id),
            self.store.coordinator(record.assigned_coordinator_id),
        )?;

        if registering.is_none() {
            return Err(Error::not_found("Coordinator", record.registering_coordinator_id));
        }
        if warehouse.is_none() {
            return Err(Error::not_found("Warehouse", record.warehouse_id));
        }
        if verifier.is_none() {
            return Err(Error::not_found("Verifier", record.causing_verifier_id));
        }
        if incident.is_none() {
            return Err(Error::not_found("Incident", record.incident_id));
        }
        if assigned.is_none() {
            return Err(Error::not_found("Coordinator", record.assigned_coordinator_id));
        }
        Ok(())
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub async fn get_coordinators(&self) -> Vec<Coordinator> {
        or_empty("coordinators", self.store.coordinators().await)
    }

    pub async fn get_verifiers(&self) -> Vec<Verifier> {
        or_empty("verifiers", self.store.verifiers().await)
    }

    pub async fn get_warehouses(&self) -> Vec<Warehouse> {
        or_empty("warehouses", self.store.warehouses().await)
    }

    pub async fn get_incidents(&self) -> Vec<Incident> {
        or_empty("incidents", self.store.incidents().await)
    }

    /// `(id, label)` pairs for selection lists, newest first
    pub async fn get_incident_records(&self) -> Vec<(Id, String)> {
        self.get_all_incident_records()
            .await
            .iter()
            .map(|row| (row.id, row.display_label()))
            .collect()
    }

    /// Action history of one record, oldest first
    pub async fn get_incident_actions(&self, record_id: Id) -> Vec<ActionRow> {
        let result = async {
            let record = self
                .store
                .incident_record(record_id)
                .await?
                .ok_or_else(|| Error::not_found("Incident record", record_id))?;
            let (lookups, actions) = tokio::try_join!(
                Lookups::load(self.store()),
                self.store.incident_actions(Some(record_id)),
            )?;
            Ok::<_, Error>(readmodel::action_rows(&actions, &[record], &lookups))
        }
        .await;
        or_empty("incident_actions", result)
    }

    /// The wide incident table, newest first
    pub async fn get_all_incident_records(&self) -> Vec<IncidentRow> {
        or_empty("incident_records", readmodel::incident_table(self.store()).await)
    }

    /// The wide table narrowed by `column=op.value` expressions
    pub async fn get_filtered_incident_records<S: AsRef<str>>(
        &self,
        exprs: &[S],
    ) -> Result<Vec<IncidentRow>> {
        let filters = filter::parse_where(exprs)?;
        let rows = readmodel::incident_table(self.store()).await?;
        Ok(filter::apply(rows, &filters))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get_coordinator_by_id(&self, id: Id) -> Option<Coordinator> {
        or_none("coordinator", id, self.store.coordinator(id).await)
    }

    pub async fn get_verifier_by_id(&self, id: Id) -> Option<Verifier> {
        or_none("verifier", id, self.store.verifier(id).await)
    }

    pub async fn get_warehouse_by_id(&self, id: Id) -> Option<Warehouse> {
        or_none("warehouse", id, self.store.warehouse(id).await)
    }

    pub async fn get_incident_by_id(&self, id: Id) -> Option<Incident> {
        or_none("incident", id, self.store.incident(id).await)
    }

    pub async fn get_incident_record_by_id(&self, id: Id) -> Option<IncidentRecord> {
        or_none("incident_record", id, self.store.incident_record(id).await)
    }

    /// One record with resolved names and its action history
    pub async fn get_incident_record_details(&self, id: Id) -> Option<RecordDetails> {
        or_none("incident_record", id, readmodel::record_details(self.store(), id).await)
    }

    pub async fn search_incident_by_code(&self, code: &str) -> Result<Incident> {
        let code = code.trim();
        self.store
            .incident_by_code(code)
            .await?
            .ok_or_else(|| Error::IncidentCodeNotFound {
                code: code.to_string(),
            })
    }

    /// Wide rows of every record of one incident type, newest first
    pub async fn get_incident_records_by_incident_code(&self, code: &str) -> Result<Vec<IncidentRow>> {
        let incident = self.search_incident_by_code(code).await?;
        let (lookups, records) = tokio::try_join!(
            Lookups::load(self.store()),
            self.store.records_for_incident(incident.id),
        )?;
        if records.is_empty() {
            return Err(Error::NoRecordsForCode { code: incident.code });
        }
        Ok(readmodel::assemble(&records, &lookups))
    }

    // =========================================================================
    // Updates
    // =========================================================================

    pub async fn update_coordinator(&self, id: Id, fields: &NewCoordinator) -> Result<()> {
        validation::validate_coordinator(fields)?;
        self.store.update_coordinator(id, fields).await?;
        info!(id, "Updated coordinator");
        Ok(())
    }

    pub async fn update_verifier(&self, id: Id, fields: &NewVerifier) -> Result<()> {
        validation::validate_verifier(fields)?;
        self.store.update_verifier(id, fields).await?;
        info!(id, "Updated verifier");
        Ok(())
    }

    pub async fn update_warehouse(&self, id: Id, fields: &NewWarehouse) -> Result<()> {
        validation::validate_warehouse(fields)?;
        self.store.update_warehouse(id, fields).await?;
        info!(id, "Updated warehouse");
        Ok(())
    }

    pub async fn update_incident(&self, id: Id, code: &str, description: &str) -> Result<()> {
        validation::validate_incident_edit(code, description)?;
        self.store.update_incident(id, code, description).await?;
        info!(id, code = %code.trim(), "Updated incident type");
        Ok(())
    }

    pub async fn update_incident_record(&self, id: Id, fields: &NewIncidentRecord) -> Result<()> {
        validation::validate_record_edit(fields)?;
        self.ensure_references(fields).await?;
        self.store.update_incident_record(id, fields).await?;
        info!(id, status = %fields.status, "Updated incident record");
        Ok(())
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    async fn grouped(&self, group: GroupBy) -> Vec<GroupCount> {
        grouping::count_by(&self.get_all_incident_records().await, group)
    }

    pub async fn count_by_zone(&self) -> Vec<GroupCount> {
        self.grouped(GroupBy::Zone).await
    }

    pub async fn count_by_verifier(&self) -> Vec<GroupCount> {
        self.grouped(GroupBy::Verifier).await
    }

    pub async fn count_by_warehouse(&self) -> Vec<GroupCount> {
        self.grouped(GroupBy::Warehouse).await
    }

    pub async fn count_by_type(&self) -> Vec<GroupCount> {
        self.grouped(GroupBy::Type).await
    }

    pub async fn count_by_status(&self) -> Vec<GroupCount> {
        self.grouped(GroupBy::Status).await
    }

    /// Records the verifier is responsible for, per causing verifier
    pub async fn count_assignments_by_verifier(&self) -> Vec<GroupCount> {
        grouping::count_assignments_by_verifier(&self.get_all_incident_records().await)
    }

    pub async fn get_dashboard_stats(&self) -> DashboardStats {
        DashboardStats::compute(&self.get_all_incident_records().await, today())
    }

    pub async fn get_pending_incidents_summary(&self) -> Vec<IncidentRow> {
        self.get_pending_incidents_by_coordinator(None).await
    }

    pub async fn get_pending_incidents_by_coordinator(&self, coordinator: Option<Id>) -> Vec<IncidentRow> {
        dashboard::pending_summary(&self.get_all_incident_records().await, coordinator)
    }

    pub async fn get_filtered_pending_incidents(&self, filter: &PendingFilter) -> Vec<IncidentRow> {
        dashboard::filtered_pending(&self.get_all_incident_records().await, filter, today())
    }

    /// Latest `limit` actions with performer and warehouse resolved
    pub async fn get_recent_actions(&self, limit: usize) -> Vec<ActionRow> {
        let result = async {
            let (lookups, records, actions) = tokio::try_join!(
                Lookups::load(self.store()),
                self.store.incident_records(),
                self.store.incident_actions(None),
            )?;
            Ok::<_, Error>(readmodel::action_rows(&actions, &records, &lookups))
        }
        .await;
        dashboard::recent_actions(or_empty("incident_actions", result), limit)
    }

    // =========================================================================
    // Bulk data
    // =========================================================================

    pub async fn load_csv_to_verifiers(&self, bytes: &[u8]) -> Result<ImportReport> {
        import::import_verifiers(self.store(), bytes).await
    }

    pub async fn load_csv_to_warehouses(&self, bytes: &[u8]) -> Result<ImportReport> {
        import::import_warehouses(self.store(), bytes).await
    }

    pub async fn seed_defaults(&self) -> Result<SeedReport> {
        seed::seed_defaults(self.store()).await
    }

    /// Write the two-sheet history workbook into the export directory
    pub async fn export_incidents_to_excel(&self) -> Result<PathBuf> {
        let (lookups, records, actions) = tokio::try_join!(
            Lookups::load(self.store()),
            self.store.incident_records(),
            self.store.incident_actions(None),
        )?;
        export::export_workbook(
            &self.config.export_dir,
            &readmodel::assemble(&records, &lookups),
            &readmodel::action_rows(&actions, &records, &lookups),
        )
    }

    /// Gather everything the HTML report shows
    pub async fn report_data(&self) -> Result<ReportData> {
        let rows = readmodel::incident_table(self.store()).await?;
        let groups = GroupBy::ALL
            .iter()
            .map(|group| GroupSection {
                title: group.title().to_string(),
                counts: grouping::count_by(&rows, *group),
            })
            .chain(std::iter::once(GroupSection {
                title: "Asignaciones a verificadores".to_string(),
                counts: grouping::count_assignments_by_verifier(&rows),
            }))
            .collect();

        Ok(ReportData {
            generated_at: Local::now().naive_local(),
            backend: self.backend_kind().to_string(),
            stats: DashboardStats::compute(&rows, today()),
            groups,
            pending: dashboard::pending_summary(&rows, None),
            recent_actions: self.get_recent_actions(dashboard::RECENT_ACTIONS_LIMIT).await,
        })
    }

    /// Render the HTML report into the export directory
    pub async fn write_report(&self) -> Result<PathBuf> {
        let data = self.report_data().await?;
        TemplateEngine::new()?.write_report(&self.config.export_dir, &data)
    }

    // =========================================================================
    // Whole-store operations
    // =========================================================================

    /// Delete every row; requires the configured access code
    pub async fn reset_database(&self, access_code: &str) -> Result<()> {
        let expected = self
            .config
            .reset_access_code
            .as_deref()
            .ok_or(Error::ResetRefused {
                reason: "no reset access code is configured",
            })?;
        if access_code.trim() != expected {
            warn!("Reset attempted with a wrong access code");
            return Err(Error::ResetRefused {
                reason: "access code does not match",
            });
        }

        self.store.reset().await?;
        warn!(backend = %self.backend_kind(), "Database reset");
        Ok(())
    }

    pub async fn create_backup(&self) -> Result<PathBuf> {
        let path = self.store.backup(&self.config.backup_dir).await?;
        info!(path = %path.display(), "Created backup");
        Ok(path)
    }

    pub async fn restore_backup(&self, path: &Path) -> Result<()> {
        self.store.restore_backup(path).await?;
        info!(path = %path.display(), "Restored backup");
        Ok(())
    }

    /// Backups in the configured directory, newest first
    pub fn list_backups(&self) -> Vec<PathBuf> {
        backup::list_backups(&self.config.backup_dir)
    }

    /// Copy the whole content of the bound store into `target`, keeping ids
    pub async fn migrate_to(&self, target: &dyn Store) -> Result<Snapshot> {
        let snapshot = self.store.snapshot().await?;
        target.restore(&snapshot).await?;
        info!(
            from = %self.backend_kind(),
            to = %target.kind(),
            rows = snapshot.total_rows(),
            "Migrated data"
        );
        Ok(snapshot)
    }

    /// Copy the local store into the configured remote engine
    pub async fn migrate_to_remote(&self) -> Result<Snapshot> {
        if self.backend_kind() != BackendKind::Local {
            return Err(Error::Config {
                message: "migration source must be the local backend".to_string(),
            });
        }
        let remote = self.config.remote.as_ref().ok_or_else(|| Error::Config {
            message: "SUPABASE_URL and SUPABASE_KEY must be set to migrate".to_string(),
        })?;
        let target = RemoteStore::connect(remote)?;
        target.ping().await?;
        self.migrate_to(&target).await
    }
}
