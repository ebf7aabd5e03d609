//! Integration tests for cavacrm
//!
//! Every scenario runs against both engines through the `Crm` surface: the
//! local engine on a temporary SQLite file and the remote engine on the
//! in-memory table transport.

use cavacrm::model::*;
use cavacrm::{BackendChoice, BackendKind, Config, Crm, Error, RemoteStore, Store};
use chrono::{Duration, Local, NaiveDate};
use tempfile::TempDir;

const ACCESS_CODE: &str = "cava-reset";

fn test_config(tmp: &TempDir) -> Config {
    Config {
        database_path: tmp.path().join("db/cavacrm.db"),
        backup_dir: tmp.path().join("backups"),
        export_dir: tmp.path().join("exports"),
        backend: BackendChoice::Local,
        remote: None,
        reset_access_code: Some(ACCESS_CODE.to_string()),
    }
}

/// Helper to open a CRM over a fresh local database
async fn setup_local() -> (TempDir, Crm) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let crm = Crm::open(test_config(&tmp)).await.expect("Failed to open local store");
    assert_eq!(crm.backend_kind(), BackendKind::Local);
    (tmp, crm)
}

/// Helper to open a CRM over an empty in-memory remote
fn setup_remote() -> (TempDir, Crm) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let crm = Crm::new(Box::new(RemoteStore::in_memory()), test_config(&tmp));
    (tmp, crm)
}

async fn engines() -> Vec<(TempDir, Crm)> {
    vec![setup_local().await, setup_remote()]
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

struct Catalog {
    coordinator: Coordinator,
    warehouse: Warehouse,
    verifier: Verifier,
    incident: Incident,
}

async fn catalog(crm: &Crm) -> Catalog {
    let coordinator = crm
        .insert_coordinator(&NewCoordinator::new("Ana", "Ruiz"))
        .await
        .expect("coordinator");
    let warehouse = crm
        .insert_warehouse(&NewWarehouse::new("Bodega A").code("B001").zone(Zone::Penedes))
        .await
        .expect("warehouse");
    let verifier = crm
        .insert_verifier(&NewVerifier::new("Luis", "Paz").phone("600000001").zone(Zone::Penedes))
        .await
        .expect("verifier");
    let incident = crm
        .insert_incident("Calidad", "Botellas rotas en el palé", None)
        .await
        .expect("incident");
    Catalog {
        coordinator,
        warehouse,
        verifier,
        incident,
    }
}

fn record_for(catalog: &Catalog, date: NaiveDate, status: Status) -> NewIncidentRecord {
    NewIncidentRecord {
        date,
        registering_coordinator_id: catalog.coordinator.id,
        warehouse_id: catalog.warehouse.id,
        causing_verifier_id: catalog.verifier.id,
        incident_id: catalog.incident.id,
        assigned_coordinator_id: catalog.coordinator.id,
        explanation: "Detectado en la recepción".to_string(),
        enlace: None,
        status,
        responsible: Responsible::Bodega,
    }
}

fn action_on(record: &IncidentRecord, status: Option<Status>) -> NewIncidentAction {
    NewIncidentAction {
        incident_record_id: record.id,
        action_date: today(),
        action_description: "Revisión con la bodega".to_string(),
        new_status: status,
        performed_by: record.assigned_coordinator_id,
    }
}

// =============================================================================
// Incident codes
// =============================================================================

#[tokio::test]
async fn test_incident_codes_are_sequential() {
    for (_tmp, crm) in engines().await {
        let first = crm
            .insert_incident("Calidad", "Botellas rotas en el palé", None)
            .await
            .unwrap();
        let second = crm
            .insert_incident("Entrega", "Retraso de más de dos días", None)
            .await
            .unwrap();

        assert_eq!(first.code, "001", "{}", crm.backend_kind());
        assert_eq!(second.code, "002", "{}", crm.backend_kind());
        assert_eq!(first.description, "Calidad - Botellas rotas en el palé");
    }
}

#[tokio::test]
async fn test_duplicate_code_creates_nothing() {
    for (_tmp, crm) in engines().await {
        crm.insert_incident("Calidad", "Botellas rotas en el palé", Some("CAL"))
            .await
            .unwrap();

        let err = crm
            .insert_incident("Calidad", "Etiquetas despegadas", Some("CAL"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref code } if code == "CAL"));
        assert!(err.suggestion().is_some());
        assert_eq!(crm.get_incidents().await.len(), 1, "{}", crm.backend_kind());
    }
}

#[tokio::test]
async fn test_search_unknown_code() {
    for (_tmp, crm) in engines().await {
        let err = crm.search_incident_by_code("404").await.unwrap_err();
        assert!(matches!(err, Error::IncidentCodeNotFound { .. }));
        assert!(err.is_recoverable());
    }
}

// =============================================================================
// Catalog round trips
// =============================================================================

#[tokio::test]
async fn test_warehouse_code_round_trip() {
    for (_tmp, crm) in engines().await {
        let created = crm
            .insert_warehouse(&NewWarehouse::new("Bodega Norte").code("B99887766A").zone(Zone::Requena))
            .await
            .unwrap();

        let found = crm.get_warehouse_by_id(created.id).await.unwrap();
        assert_eq!(found.codigo_consejo.as_deref(), Some("B99887766A"));
        assert_eq!(found.zone, Some(Zone::Requena));

        crm.update_warehouse(created.id, &NewWarehouse::new("Bodega Norte").code("B11111111A"))
            .await
            .unwrap();
        let updated = crm.get_warehouse_by_id(created.id).await.unwrap();
        assert_eq!(updated.codigo_consejo.as_deref(), Some("B11111111A"));
        assert_eq!(updated.zone, None);
    }
}

#[tokio::test]
async fn test_update_missing_row() {
    for (_tmp, crm) in engines().await {
        let err = crm
            .update_coordinator(42, &NewCoordinator::new("Eva", "Sol"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "{}", crm.backend_kind());
        assert!(crm.get_coordinator_by_id(42).await.is_none());
    }
}

#[tokio::test]
async fn test_record_link_round_trip() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        let mut new = record_for(&catalog, today(), Status::Pendiente);
        new.enlace = Some("https://fotos.example.com/incidencia/1".to_string());

        let created = crm.insert_incident_record(&new).await.unwrap();
        let found = crm.get_incident_record_by_id(created.id).await.unwrap();
        assert_eq!(found.enlace, new.enlace, "{}", crm.backend_kind());

        new.enlace = Some("ftp://nope".to_string());
        assert!(matches!(
            crm.insert_incident_record(&new).await,
            Err(Error::Validation { .. })
        ));
    }
}

// =============================================================================
// Actions
// =============================================================================

#[tokio::test]
async fn test_action_mirrors_status() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        let record = crm
            .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
            .await
            .unwrap();

        crm.insert_incident_action(&action_on(&record, None)).await.unwrap();
        let unchanged = crm.get_incident_record_by_id(record.id).await.unwrap();
        assert_eq!(unchanged.status, Status::Pendiente);

        crm.insert_incident_action(&action_on(&record, Some(Status::EnProceso)))
            .await
            .unwrap();
        let changed = crm.get_incident_record_by_id(record.id).await.unwrap();
        assert_eq!(changed.status, Status::EnProceso, "{}", crm.backend_kind());

        let history = crm.get_incident_actions(record.id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].new_status, Some(Status::EnProceso));
        assert_eq!(history[0].performed_by, "Ana Ruiz");
    }
}

#[tokio::test]
async fn test_action_on_missing_record() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        let err = crm
            .insert_incident_action(&NewIncidentAction {
                incident_record_id: 99,
                action_date: today(),
                action_description: "Nada que revisar".to_string(),
                new_status: Some(Status::Solucionado),
                performed_by: catalog.coordinator.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "{}", crm.backend_kind());
        assert!(crm.get_recent_actions(5).await.is_empty());
    }
}

// =============================================================================
// Read model
// =============================================================================

#[tokio::test]
async fn test_grouped_counts_sum_to_total() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        let other = crm
            .insert_warehouse(&NewWarehouse::new("Bodega B"))
            .await
            .unwrap();

        for (days_ago, status) in [(0, Status::Pendiente), (3, Status::Solucionado), (30, Status::Rrhh)] {
            crm.insert_incident_record(&record_for(&catalog, today() - Duration::days(days_ago), status))
                .await
                .unwrap();
        }
        let mut elsewhere = record_for(&catalog, today(), Status::EnProceso);
        elsewhere.warehouse_id = other.id;
        crm.insert_incident_record(&elsewhere).await.unwrap();

        let total = crm.get_all_incident_records().await.len();
        assert_eq!(total, 4);

        for counts in [
            crm.count_by_status().await,
            crm.count_by_zone().await,
            crm.count_by_warehouse().await,
            crm.count_by_verifier().await,
            crm.count_by_type().await,
        ] {
            assert_eq!(counts.iter().map(|c| c.count).sum::<usize>(), total);
        }

        let zones = crm.count_by_zone().await;
        assert!(zones.iter().any(|c| c.value == "N/A" && c.count == 1));

        let stats = crm.get_dashboard_stats().await;
        assert_eq!(stats.pending_incidents, 3);
        assert_eq!(stats.resolved_incidents, 1);
        assert_eq!(stats.recent_incidents, 3);
    }
}

#[tokio::test]
async fn test_records_table_filter() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        crm.insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
            .await
            .unwrap();
        crm.insert_incident_record(&record_for(&catalog, today(), Status::Solucionado))
            .await
            .unwrap();

        let open = crm
            .get_filtered_incident_records(&["status=neq.Solucionado"])
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].status, Status::Pendiente);

        let err = crm
            .get_filtered_incident_records(&["colour=eq.red"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}

#[tokio::test]
async fn test_records_by_incident_code() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        assert!(matches!(
            crm.get_incident_records_by_incident_code("001").await,
            Err(Error::NoRecordsForCode { .. })
        ));

        let record = crm
            .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
            .await
            .unwrap();
        let rows = crm.get_incident_records_by_incident_code("001").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, record.id);
        assert_eq!(rows[0].warehouse, "Bodega A");
    }
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_register_and_resolve_incident() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        assert_eq!(catalog.incident.code, "001");

        let record = crm
            .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
            .await
            .unwrap();

        let stats = crm.get_dashboard_stats().await;
        assert_eq!((stats.pending_incidents, stats.resolved_incidents), (1, 0));
        assert_eq!(crm.get_pending_incidents_summary().await.len(), 1);

        let label = &crm.get_incident_records().await[0].1;
        assert!(label.contains("Incidencia: 001 - Calidad - Botellas rotas en el palé"));
        assert!(label.contains("Bodega: Bodega A"));
        assert!(label.contains("Verificador: Luis Paz"));

        crm.insert_incident_action(&action_on(&record, Some(Status::Solucionado)))
            .await
            .unwrap();

        let stats = crm.get_dashboard_stats().await;
        assert_eq!((stats.pending_incidents, stats.resolved_incidents), (0, 1), "{}", crm.backend_kind());
        assert!(crm.get_pending_incidents_summary().await.is_empty());

        let details = crm.get_incident_record_details(record.id).await.unwrap();
        assert_eq!(details.record.status, Status::Solucionado);
        assert_eq!(details.record.warehouse_zone, "PENEDÈS");
        assert_eq!(details.actions.len(), 1);
    }
}

// =============================================================================
// Bulk data
// =============================================================================

#[tokio::test]
async fn test_csv_import_skips_existing() {
    for (_tmp, crm) in engines().await {
        crm.insert_verifier(&NewVerifier::new("Luis", "Paz")).await.unwrap();

        let csv = "Name;Surnames;Phone;Zone\nLuis;Paz;600000001;PENEDÈS\nMarta;Gil;;REQUENA\n";
        let report = crm.load_csv_to_verifiers(csv.as_bytes()).await.unwrap();
        assert_eq!((report.inserted, report.skipped, report.failed), (1, 1, 0));
        assert_eq!(crm.get_verifiers().await.len(), 2);

        let err = crm
            .load_csv_to_warehouses(b"name,zone\nBodega A,PENEDES\n")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("codigo_consejo"));
        assert!(crm.get_warehouses().await.is_empty());
    }
}

#[tokio::test]
async fn test_seed_defaults_once() {
    for (_tmp, crm) in engines().await {
        let report = crm.seed_defaults().await.unwrap();
        assert_eq!(report.total(), 3 + 8 + 6 + 6);
        assert_eq!(crm.search_incident_by_code("INC008").await.unwrap().code, "INC008");

        assert_eq!(crm.seed_defaults().await.unwrap().total(), 0);
        assert_eq!(crm.get_coordinators().await.len(), 3);
    }
}

#[tokio::test]
async fn test_export_and_report_files() {
    for (tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        let record = crm
            .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
            .await
            .unwrap();
        crm.insert_incident_action(&action_on(&record, Some(Status::EnProceso)))
            .await
            .unwrap();

        let workbook = crm.export_incidents_to_excel().await.unwrap();
        assert!(workbook.starts_with(tmp.path().join("exports")));
        assert!(std::fs::metadata(&workbook).unwrap().len() > 0);

        let report = crm.write_report().await.unwrap();
        let html = std::fs::read_to_string(report).unwrap();
        assert!(html.contains("Bodega A"));
        assert!(html.contains("Revisión con la bodega"));
    }
}

// =============================================================================
// Whole-store operations
// =============================================================================

#[tokio::test]
async fn test_reset_is_idempotent() {
    for (_tmp, crm) in engines().await {
        let catalog = catalog(&crm).await;
        let record = crm
            .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
            .await
            .unwrap();
        crm.insert_incident_action(&action_on(&record, None)).await.unwrap();

        assert!(matches!(
            crm.reset_database("wrong").await,
            Err(Error::ResetRefused { .. })
        ));

        crm.reset_database(ACCESS_CODE).await.unwrap();
        crm.reset_database(ACCESS_CODE).await.unwrap();

        assert!(crm.get_coordinators().await.is_empty());
        assert!(crm.get_all_incident_records().await.is_empty());
        assert_eq!(crm.store().snapshot().await.unwrap().total_rows(), 0);
    }
}

#[tokio::test]
async fn test_local_backup_and_restore() {
    let (_tmp, crm) = setup_local().await;
    crm.insert_coordinator(&NewCoordinator::new("Ana", "Ruiz")).await.unwrap();

    let backup = crm.create_backup().await.unwrap();
    assert_eq!(backup.extension().and_then(|e| e.to_str()), Some("db"));
    assert_eq!(crm.list_backups(), vec![backup.clone()]);

    crm.insert_coordinator(&NewCoordinator::new("Eva", "Sol")).await.unwrap();
    assert_eq!(crm.get_coordinators().await.len(), 2);

    crm.restore_backup(&backup).await.unwrap();
    let restored = crm.get_coordinators().await;
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].full_name(), "Ana Ruiz");

    let missing = crm.restore_backup(&_tmp.path().join("nope.db")).await.unwrap_err();
    assert!(matches!(missing, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_remote_backup_restores_into_local() {
    let (_remote_tmp, remote) = setup_remote();
    let catalog = catalog(&remote).await;
    let record = remote
        .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
        .await
        .unwrap();
    remote
        .insert_incident_action(&action_on(&record, Some(Status::Solucionado)))
        .await
        .unwrap();

    let snapshot_file = remote.create_backup().await.unwrap();
    assert_eq!(snapshot_file.extension().and_then(|e| e.to_str()), Some("json"));

    let (_local_tmp, local) = setup_local().await;
    local.restore_backup(&snapshot_file).await.unwrap();

    assert_eq!(
        local.store().snapshot().await.unwrap(),
        remote.store().snapshot().await.unwrap()
    );
    let restored = local.get_incident_record_by_id(record.id).await.unwrap();
    assert_eq!(restored.status, Status::Solucionado);

    // Ids continue after the restored rows
    let next = local
        .insert_coordinator(&NewCoordinator::new("Eva", "Sol"))
        .await
        .unwrap();
    assert!(next.id > catalog.coordinator.id);
}

#[tokio::test]
async fn test_migrate_local_to_remote() {
    let (_tmp, local) = setup_local().await;
    let catalog = catalog(&local).await;
    local
        .insert_incident_record(&record_for(&catalog, today(), Status::Pendiente))
        .await
        .unwrap();

    let target = RemoteStore::in_memory();
    let snapshot = local.migrate_to(&target).await.unwrap();
    assert_eq!(snapshot.total_rows(), 5);
    assert_eq!(target.snapshot().await.unwrap(), snapshot);

    let code = target.next_incident_code().await.unwrap();
    assert_eq!(code, "002");
}

#[tokio::test]
async fn test_forced_remote_without_credentials_falls_back() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.backend = BackendChoice::Remote;

    let crm = Crm::open(config).await.unwrap();
    assert_eq!(crm.backend_kind(), BackendKind::Local);
    assert!(crm.check_connection().await);
    assert!(matches!(
        crm.migrate_to_remote().await,
        Err(Error::Config { .. })
    ));
}
