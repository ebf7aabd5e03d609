//! Read-model assembly
//!
//! Incident records hold only foreign keys. This module joins them with the
//! catalog tables into flat, display-ready rows. All referenced rows are
//! loaded once per call and joined in memory, so building the table costs
//! one listing per table regardless of how many records there are.

pub mod dashboard;
pub mod filter;
pub mod grouping;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::Result;
use crate::model::*;
use crate::store::Store;

pub use dashboard::{DashboardStats, PendingFilter};
pub use grouping::{GroupBy, GroupCount};

/// Rendered in place of a name whose row cannot be found
pub const NOT_AVAILABLE: &str = "N/A";

/// Catalog rows keyed by id
#[derive(Debug, Default, Clone)]
pub struct Lookups {
    coordinators: HashMap<Id, Coordinator>,
    verifiers: HashMap<Id, Verifier>,
    warehouses: HashMap<Id, Warehouse>,
    incidents: HashMap<Id, Incident>,
}

impl Lookups {
    /// Load every catalog table from `store`, concurrently
    pub async fn load(store: &dyn Store) -> Result<Self> {
        let (coordinators, verifiers, warehouses, incidents) = tokio::try_join!(
            store.coordinators(),
            store.verifiers(),
            store.warehouses(),
            store.incidents(),
        )?;
        Ok(Self::from_parts(coordinators, verifiers, warehouses, incidents))
    }

    pub fn from_parts(
        coordinators: Vec<Coordinator>,
        verifiers: Vec<Verifier>,
        warehouses: Vec<Warehouse>,
        incidents: Vec<Incident>,
    ) -> Self {
        Self {
            coordinators: coordinators.into_iter().map(|c| (c.id, c)).collect(),
            verifiers: verifiers.into_iter().map(|v| (v.id, v)).collect(),
            warehouses: warehouses.into_iter().map(|w| (w.id, w)).collect(),
            incidents: incidents.into_iter().map(|i| (i.id, i)).collect(),
        }
    }

    pub fn coordinator_name(&self, id: Id) -> String {
        self.coordinators
            .get(&id)
            .map(Coordinator::full_name)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn verifier_name(&self, id: Id) -> String {
        self.verifiers
            .get(&id)
            .map(Verifier::full_name)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    fn verifier_zone(&self, id: Id) -> String {
        zone_label(self.verifiers.get(&id).and_then(|v| v.zone))
    }

    pub fn warehouse_name(&self, id: Id) -> String {
        self.warehouses
            .get(&id)
            .map(|w| w.name.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    fn warehouse_zone(&self, id: Id) -> String {
        zone_label(self.warehouses.get(&id).and_then(|w| w.zone))
    }

    fn incident(&self, id: Id) -> Option<&Incident> {
        self.incidents.get(&id)
    }
}

fn zone_label(zone: Option<Zone>) -> String {
    zone.map(|z| z.label().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// One incident record with every foreign key resolved to a readable name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentRow {
    pub id: Id,
    pub date: NaiveDate,
    pub registering_coordinator: String,
    pub warehouse: String,
    pub warehouse_zone: String,
    pub causing_verifier: String,
    pub verifier_zone: String,
    pub incident_code: String,
    /// Incident type description
    pub incident_type: String,
    pub assigned_coordinator_id: Id,
    pub assigned_coordinator: String,
    pub explanation: String,
    /// Empty when the record has no link
    pub enlace: String,
    pub status: Status,
    pub responsible: Responsible,
}

impl IncidentRow {
    pub fn from_record(record: &IncidentRecord, lookups: &Lookups) -> Self {
        let incident = lookups.incident(record.incident_id);
        Self {
            id: record.id,
            date: record.date,
            registering_coordinator: lookups.coordinator_name(record.registering_coordinator_id),
            warehouse: lookups.warehouse_name(record.warehouse_id),
            warehouse_zone: lookups.warehouse_zone(record.warehouse_id),
            causing_verifier: lookups.verifier_name(record.causing_verifier_id),
            verifier_zone: lookups.verifier_zone(record.causing_verifier_id),
            incident_code: incident
                .map(|i| i.code.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            incident_type: incident
                .map(|i| i.description.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            assigned_coordinator_id: record.assigned_coordinator_id,
            assigned_coordinator: lookups.coordinator_name(record.assigned_coordinator_id),
            explanation: record.explanation.clone(),
            enlace: record.enlace.clone().unwrap_or_default(),
            status: record.status,
            responsible: record.responsible,
        }
    }

    /// `"<code> - <description>"`, or `N/A` when the type is missing
    pub fn incident_label(&self) -> String {
        if self.incident_code == NOT_AVAILABLE {
            NOT_AVAILABLE.to_string()
        } else {
            format!("{} - {}", self.incident_code, self.incident_type)
        }
    }

    /// One-line label used in selection lists
    pub fn display_label(&self) -> String {
        format!(
            "ID: {} - Fecha: {} - Incidencia: {} - Bodega: {} - Verificador: {} - Coordinador: {}",
            self.id,
            self.date,
            self.incident_label(),
            self.warehouse,
            self.causing_verifier,
            self.assigned_coordinator
        )
    }
}

/// Join every record, keeping the input order
pub fn assemble(records: &[IncidentRecord], lookups: &Lookups) -> Vec<IncidentRow> {
    records
        .iter()
        .map(|r| IncidentRow::from_record(r, lookups))
        .collect()
}

/// Build the wide table for every record in `store`, newest first
pub async fn incident_table(store: &dyn Store) -> Result<Vec<IncidentRow>> {
    let (lookups, records) = tokio::try_join!(Lookups::load(store), store.incident_records())?;
    Ok(assemble(&records, &lookups))
}

/// An incident action with its performer resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    pub id: Id,
    pub incident_record_id: Id,
    pub action_date: NaiveDate,
    pub action_description: String,
    pub new_status: Option<Status>,
    pub performed_by: String,
    /// Warehouse of the parent record
    pub warehouse: String,
}

impl ActionRow {
    pub fn new(action: &IncidentAction, warehouse: String, lookups: &Lookups) -> Self {
        Self {
            id: action.id,
            incident_record_id: action.incident_record_id,
            action_date: action.action_date,
            action_description: action.action_description.clone(),
            new_status: action.new_status,
            performed_by: lookups.coordinator_name(action.performed_by),
            warehouse,
        }
    }

    pub fn new_status_label(&self) -> &'static str {
        self.new_status.map(|s| s.label()).unwrap_or("")
    }
}

/// Resolve actions against their parent records
pub fn action_rows(
    actions: &[IncidentAction],
    records: &[IncidentRecord],
    lookups: &Lookups,
) -> Vec<ActionRow> {
    let warehouse_of: HashMap<Id, Id> = records.iter().map(|r| (r.id, r.warehouse_id)).collect();
    actions
        .iter()
        .map(|a| {
            let warehouse = warehouse_of
                .get(&a.incident_record_id)
                .map(|w| lookups.warehouse_name(*w))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            ActionRow::new(a, warehouse, lookups)
        })
        .collect()
}

/// A record's wide row plus its action history, oldest action first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDetails {
    pub record: IncidentRow,
    pub registering_coordinator_id: Id,
    pub actions: Vec<ActionRow>,
}

/// Load one record with its history; `None` when the id does not exist
pub async fn record_details(store: &dyn Store, id: Id) -> Result<Option<RecordDetails>> {
    let record = match store.incident_record(id).await? {
        Some(record) => record,
        None => return Ok(None),
    };
    let (lookups, actions) = tokio::try_join!(Lookups::load(store), store.incident_actions(Some(id)))?;

    let warehouse = lookups.warehouse_name(record.warehouse_id);
    Ok(Some(RecordDetails {
        record: IncidentRow::from_record(&record, &lookups),
        registering_coordinator_id: record.registering_coordinator_id,
        actions: actions
            .iter()
            .map(|a| ActionRow::new(a, warehouse.clone(), &lookups))
            .collect(),
    }))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn lookups() -> Lookups {
        Lookups::from_parts(
            vec![
                Coordinator { id: 1, name: "Ana".into(), surnames: "Ruiz".into() },
                Coordinator { id: 2, name: "Eva".into(), surnames: "Sol".into() },
            ],
            vec![
                Verifier {
                    id: 1,
                    name: "Luis".into(),
                    surnames: "Paz".into(),
                    phone: Some("600000001".into()),
                    zone: Some(Zone::Penedes),
                },
                Verifier { id: 2, name: "Marta".into(), surnames: "Gil".into(), phone: None, zone: None },
            ],
            vec![
                Warehouse {
                    id: 1,
                    name: "Bodega A".into(),
                    codigo_consejo: Some("B001".into()),
                    zone: Some(Zone::Penedes),
                },
                Warehouse {
                    id: 2,
                    name: "Bodega B".into(),
                    codigo_consejo: None,
                    zone: Some(Zone::Requena),
                },
            ],
            vec![
                Incident { id: 1, code: "001".into(), description: "Calidad - Botellas rotas".into() },
                Incident { id: 2, code: "002".into(), description: "Entrega - Retraso".into() },
            ],
        )
    }

    pub fn record(id: Id, day: &str, warehouse: Id, verifier: Id, status: Status) -> IncidentRecord {
        IncidentRecord {
            id,
            date: date(day),
            registering_coordinator_id: 1,
            warehouse_id: warehouse,
            causing_verifier_id: verifier,
            incident_id: 1,
            assigned_coordinator_id: 2,
            explanation: "Explicación de prueba".into(),
            enlace: None,
            status,
            responsible: Responsible::Verificador,
        }
    }
}
