//! Grouped counts over the wide incident table

use serde::Serialize;
use std::collections::BTreeMap;

use super::IncidentRow;
use crate::model::Responsible;

/// Column a grouped count is taken over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Warehouse zone
    Zone,
    /// Causing verifier
    Verifier,
    Warehouse,
    /// Incident type description
    Type,
    Status,
}

impl GroupBy {
    pub const ALL: [GroupBy; 5] = [
        GroupBy::Zone,
        GroupBy::Verifier,
        GroupBy::Warehouse,
        GroupBy::Type,
        GroupBy::Status,
    ];

    /// Heading shown above the counts
    pub fn title(&self) -> &'static str {
        match self {
            GroupBy::Zone => "Zona Bodega",
            GroupBy::Verifier => "Verificador Causante",
            GroupBy::Warehouse => "Bodega",
            GroupBy::Type => "Tipo de Incidencia",
            GroupBy::Status => "Estado",
        }
    }

    fn key(&self, row: &IncidentRow) -> String {
        match self {
            GroupBy::Zone => row.warehouse_zone.clone(),
            GroupBy::Verifier => row.causing_verifier.clone(),
            GroupBy::Warehouse => row.warehouse.clone(),
            GroupBy::Type => row.incident_type.clone(),
            GroupBy::Status => row.status.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub value: String,
    pub count: usize,
}

fn tally(keys: impl Iterator<Item = String>) -> Vec<GroupCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(value, count)| GroupCount { value, count })
        .collect()
}

/// Count rows per group value, ordered by value
pub fn count_by(rows: &[IncidentRow], group: GroupBy) -> Vec<GroupCount> {
    tally(rows.iter().map(|r| group.key(r)))
}

/// Records whose responsible party is the verifier, per causing verifier
pub fn count_assignments_by_verifier(rows: &[IncidentRow]) -> Vec<GroupCount> {
    tally(
        rows.iter()
            .filter(|r| r.responsible == Responsible::Verificador)
            .map(|r| r.causing_verifier.clone()),
    )
}

/// Largest groups first; ties broken by value
pub fn sort_by_count_desc(mut counts: Vec<GroupCount>) -> Vec<GroupCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    counts
}
