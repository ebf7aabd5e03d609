//! Dashboard aggregates and pending-work summaries
//!
//! Everything here is recomputed from the wide table on each read. `today`
//! is passed in so results are reproducible.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::grouping::{count_by, sort_by_count_desc, GroupBy, GroupCount};
use super::{ActionRow, IncidentRow};
use crate::model::{Id, Status};

/// Records dated within this many days count as recent
pub const RECENT_DAYS: i64 = 7;

/// Rows in the dashboard's pending summary
pub const PENDING_SUMMARY_LIMIT: usize = 10;

/// Rows returned by the filtered pending view
pub const FILTERED_PENDING_LIMIT: usize = 20;

/// Actions shown in the recent activity list by default
pub const RECENT_ACTIONS_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_incidents: usize,
    /// Status other than Solucionado
    pub pending_incidents: usize,
    pub resolved_incidents: usize,
    pub recent_incidents: usize,
    /// Largest status group first
    pub by_status: Vec<GroupCount>,
}

impl DashboardStats {
    pub fn compute(rows: &[IncidentRow], today: NaiveDate) -> Self {
        let resolved = rows.iter().filter(|r| r.status.is_resolved()).count();
        let since = today - Duration::days(RECENT_DAYS);
        Self {
            total_incidents: rows.len(),
            pending_incidents: rows.len() - resolved,
            resolved_incidents: resolved,
            recent_incidents: rows.iter().filter(|r| r.date >= since).count(),
            by_status: sort_by_count_desc(count_by(rows, GroupBy::Status)),
        }
    }
}

/// Optional narrowing of the pending view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFilter {
    /// Assigned coordinator
    pub coordinator: Option<Id>,
    /// Exact status; unresolved statuses when `None`
    pub status: Option<Status>,
    /// Only records dated within the last `days` days
    pub days: Option<u32>,
}

fn newest_first(mut rows: Vec<IncidentRow>) -> Vec<IncidentRow> {
    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
    rows
}

/// Newest unresolved records, optionally for one assigned coordinator
pub fn pending_summary(rows: &[IncidentRow], coordinator: Option<Id>) -> Vec<IncidentRow> {
    let pending = rows
        .iter()
        .filter(|r| !r.status.is_resolved())
        .filter(|r| coordinator.map_or(true, |c| r.assigned_coordinator_id == c))
        .cloned()
        .collect();
    newest_first(pending)
        .into_iter()
        .take(PENDING_SUMMARY_LIMIT)
        .collect()
}

pub fn filtered_pending(
    rows: &[IncidentRow],
    filter: &PendingFilter,
    today: NaiveDate,
) -> Vec<IncidentRow> {
    let since = filter
        .days
        .map(|days| today - Duration::days(i64::from(days)));

    let matching = rows
        .iter()
        .filter(|r| match filter.status {
            Some(status) => r.status == status,
            None => !r.status.is_resolved(),
        })
        .filter(|r| filter.coordinator.map_or(true, |c| r.assigned_coordinator_id == c))
        .filter(|r| since.map_or(true, |since| r.date >= since))
        .cloned()
        .collect();
    newest_first(matching)
        .into_iter()
        .take(FILTERED_PENDING_LIMIT)
        .collect()
}

/// Latest `limit` actions, newest first
pub fn recent_actions(mut actions: Vec<ActionRow>, limit: usize) -> Vec<ActionRow> {
    actions.sort_by(|a, b| {
        b.action_date
            .cmp(&a.action_date)
            .then_with(|| b.id.cmp(&a.id))
    });
    actions.truncate(limit);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IncidentAction;
    use crate::readmodel::fixtures::*;
    use crate::readmodel::{action_rows, assemble};

    fn rows() -> Vec<IncidentRow> {
        let mut records = vec![
            record(1, "2025-03-01", 1, 1, Status::Pendiente),
            record(2, "2025-03-09", 1, 1, Status::Solucionado),
            record(3, "2025-03-08", 2, 2, Status::EnProceso),
            record(4, "2025-02-01", 2, 2, Status::Pendiente),
        ];
        records[3].assigned_coordinator_id = 1;
        assemble(&records, &lookups())
    }

    fn ids(rows: &[IncidentRow]) -> Vec<Id> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_dashboard_counts() {
        let stats = DashboardStats::compute(&rows(), date("2025-03-10"));
        assert_eq!(stats.total_incidents, 4);
        assert_eq!(stats.pending_incidents, 3);
        assert_eq!(stats.resolved_incidents, 1);
        assert_eq!(stats.recent_incidents, 2);
        assert_eq!(stats.by_status[0].value, "Pendiente");
        let sum: usize = stats.by_status.iter().map(|c| c.count).sum();
        assert_eq!(sum, stats.total_incidents);
    }

    #[test]
    fn test_dashboard_empty() {
        let stats = DashboardStats::compute(&[], date("2025-03-10"));
        assert_eq!(stats, DashboardStats::default());
    }

    #[test]
    fn test_pending_summary_newest_first() {
        assert_eq!(ids(&pending_summary(&rows(), None)), vec![3, 1, 4]);
        assert_eq!(ids(&pending_summary(&rows(), Some(1))), vec![4]);
    }

    #[test]
    fn test_filtered_pending() {
        let today = date("2025-03-10");
        let all = filtered_pending(&rows(), &PendingFilter::default(), today);
        assert_eq!(ids(&all), vec![3, 1, 4]);

        let recent = PendingFilter { days: Some(10), ..Default::default() };
        assert_eq!(ids(&filtered_pending(&rows(), &recent, today)), vec![3, 1]);

        let solved = PendingFilter { status: Some(Status::Solucionado), ..Default::default() };
        assert_eq!(ids(&filtered_pending(&rows(), &solved, today)), vec![2]);

        let mine = PendingFilter { coordinator: Some(2), status: Some(Status::Pendiente), days: None };
        assert_eq!(ids(&filtered_pending(&rows(), &mine, today)), vec![1]);
    }

    #[test]
    fn test_recent_actions_limit() {
        let records = vec![record(1, "2025-03-01", 1, 1, Status::Pendiente)];
        let actions: Vec<IncidentAction> = (1..=7)
            .map(|i| IncidentAction {
                id: i,
                incident_record_id: 1,
                action_date: date(&format!("2025-03-0{}", i)),
                action_description: format!("Paso {}", i),
                new_status: None,
                performed_by: 1,
            })
            .collect();
        let recent = recent_actions(action_rows(&actions, &records, &lookups()), RECENT_ACTIONS_LIMIT);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].id, 7);
        assert_eq!(recent[0].warehouse, "Bodega A");
    }
}
