//! CavaCRM CLI - incident tracking for winery inspections

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cavacrm::model::{
    Id, NewCoordinator, NewIncidentAction, NewIncidentRecord, NewVerifier, NewWarehouse,
    Responsible, Status, Zone,
};
use cavacrm::readmodel::dashboard::RECENT_ACTIONS_LIMIT;
use cavacrm::{
    ActionRow, BackendChoice, Config, Crm, GroupCount, ImportReport, IncidentRow, PendingFilter,
};

#[derive(Parser)]
#[command(name = "cavacrm")]
#[command(about = "Incident tracking for winery quality inspections", long_about = None)]
struct Cli {
    /// Config file (defaults to ./cavacrm.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage engine to bind
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Local database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the bound backend and row counts
    Status,

    /// Insert default catalog data into empty tables
    Seed,

    /// Manage coordinators
    #[command(subcommand)]
    Coordinator(CoordinatorCommand),

    /// Manage verifiers
    #[command(subcommand)]
    Verifier(VerifierCommand),

    /// Manage warehouses
    #[command(subcommand)]
    Warehouse(WarehouseCommand),

    /// Manage incident types
    #[command(subcommand)]
    Incident(IncidentCommand),

    /// Manage incident records
    #[command(subcommand)]
    Record(RecordCommand),

    /// Manage incident actions
    #[command(subcommand)]
    Action(ActionCommand),

    /// Bulk import a CSV file
    Import {
        #[arg(value_enum)]
        kind: ImportKind,
        file: PathBuf,
    },

    /// Dashboard figures
    Stats,

    /// Grouped counts over all incident records
    Analytics,

    /// Print the wide incident table
    RecordsTable {
        /// Filter expression such as `status=neq.Solucionado` (repeatable)
        #[arg(long = "where")]
        filters: Vec<String>,
    },

    /// List unresolved incident records
    Pending {
        /// Assigned coordinator id
        #[arg(long)]
        coordinator: Option<Id>,
        #[arg(long)]
        status: Option<Status>,
        /// Only records from the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Export the incident history workbook
    Export,

    /// Render the HTML report
    Report,

    /// Create a backup of the bound store
    Backup,

    /// List backups, newest first
    Backups,

    /// Restore a backup file over the bound store
    Restore { file: PathBuf },

    /// Copy the local store into the configured remote backend
    Migrate,

    /// Delete every row of every table
    Reset {
        #[arg(long)]
        access_code: String,
    },
}

#[derive(Subcommand)]
enum CoordinatorCommand {
    Add { name: String, surnames: String },
    Edit {
        id: Id,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        surnames: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
enum VerifierCommand {
    Add {
        name: String,
        surnames: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        zone: Option<Zone>,
    },
    Edit {
        id: Id,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        surnames: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        zone: Option<Zone>,
    },
    List,
}

#[derive(Subcommand)]
enum WarehouseCommand {
    Add {
        name: String,
        /// Site code (codigo consejo)
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        zone: Option<Zone>,
    },
    Edit {
        id: Id,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        zone: Option<Zone>,
    },
    List,
}

#[derive(Subcommand)]
enum IncidentCommand {
    /// Create an incident type; the code is generated when omitted
    Add {
        /// Short type label, e.g. "Calidad"
        #[arg(long)]
        kind: String,
        /// Detailed description
        #[arg(long)]
        detail: String,
        #[arg(long)]
        code: Option<String>,
    },
    Edit {
        id: Id,
        #[arg(long)]
        code: String,
        #[arg(long)]
        description: String,
    },
    List,
    /// Show an incident type and its records
    Search { code: String },
}

#[derive(Subcommand)]
enum RecordCommand {
    Add {
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        registered_by: Id,
        #[arg(long)]
        warehouse: Id,
        #[arg(long)]
        verifier: Id,
        #[arg(long)]
        incident: Id,
        #[arg(long)]
        assigned_to: Id,
        #[arg(long, default_value = "")]
        explanation: String,
        #[arg(long)]
        enlace: Option<String>,
        #[arg(long, default_value = "Pendiente")]
        status: Status,
        #[arg(long)]
        responsible: Responsible,
    },
    Edit {
        id: Id,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        registered_by: Option<Id>,
        #[arg(long)]
        warehouse: Option<Id>,
        #[arg(long)]
        verifier: Option<Id>,
        #[arg(long)]
        incident: Option<Id>,
        #[arg(long)]
        assigned_to: Option<Id>,
        #[arg(long)]
        explanation: Option<String>,
        #[arg(long)]
        enlace: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        responsible: Option<Responsible>,
    },
    List,
    Show { id: Id },
}

#[derive(Subcommand)]
enum ActionCommand {
    Add {
        record: Id,
        #[arg(long)]
        description: String,
        /// Coordinator performing the action
        #[arg(long)]
        by: Id,
        /// New status mirrored onto the record
        #[arg(long)]
        status: Option<Status>,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    List { record: Id },
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportKind {
    Verifiers,
    Warehouses,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e.downcast_ref::<cavacrm::Error>().and_then(|e| e.suggestion()) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let crm = Crm::open(load_config(&cli)?).await?;

    match cli.command {
        Commands::Status => show_status(&crm).await,
        Commands::Seed => {
            let report = crm.seed_defaults().await?;
            println!(
                "Seeded {} coordinators, {} incident types, {} verifiers, {} warehouses.",
                report.coordinators, report.incidents, report.verifiers, report.warehouses
            );
            Ok(())
        }
        Commands::Coordinator(cmd) => coordinator(&crm, cmd).await,
        Commands::Verifier(cmd) => verifier(&crm, cmd).await,
        Commands::Warehouse(cmd) => warehouse(&crm, cmd).await,
        Commands::Incident(cmd) => incident(&crm, cmd).await,
        Commands::Record(cmd) => record(&crm, cmd).await,
        Commands::Action(cmd) => action(&crm, cmd).await,
        Commands::Import { kind, file } => import(&crm, kind, &file).await,
        Commands::Stats => show_stats(&crm).await,
        Commands::Analytics => show_analytics(&crm).await,
        Commands::RecordsTable { filters } => {
            let rows = crm.get_filtered_incident_records(filters.as_slice()).await?;
            print_rows(&rows);
            Ok(())
        }
        Commands::Pending {
            coordinator,
            status,
            days,
        } => {
            let filter = PendingFilter {
                coordinator,
                status,
                days,
            };
            print_rows(&crm.get_filtered_pending_incidents(&filter).await);
            Ok(())
        }
        Commands::Export => {
            let path = crm.export_incidents_to_excel().await?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Commands::Report => {
            let path = crm.write_report().await?;
            println!("Report written to {}", path.display());
            Ok(())
        }
        Commands::Backup => {
            let path = crm.create_backup().await?;
            println!("Backup created at {}", path.display());
            Ok(())
        }
        Commands::Backups => {
            let backups = crm.list_backups();
            if backups.is_empty() {
                println!("No backups found in {}.", crm.config().backup_dir.display());
            }
            for path in backups {
                println!("  {}", path.display());
            }
            Ok(())
        }
        Commands::Restore { file } => {
            crm.restore_backup(&file).await?;
            println!("Restored {}", file.display());
            Ok(())
        }
        Commands::Migrate => {
            let snapshot = crm.migrate_to_remote().await?;
            for (table, rows) in snapshot.row_counts() {
                println!("  {:<18} {}", table, rows);
            }
            println!("Migrated {} rows.", snapshot.total_rows());
            Ok(())
        }
        Commands::Reset { access_code } => {
            crm.reset_database(&access_code).await?;
            println!("All tables cleared.");
            Ok(())
        }
    }
}

async fn show_status(crm: &Crm) -> anyhow::Result<()> {
    println!("CavaCRM Status");
    println!("==============");
    println!("Backend: {}", crm.backend_kind());
    if crm.backend_kind() == cavacrm::BackendKind::Local {
        println!("Database: {}", crm.config().database_path.display());
    }

    if !crm.check_connection().await {
        println!("Connection: unavailable");
        return Ok(());
    }
    println!("Connection: ok");
    println!();

    let snapshot = crm.store().snapshot().await?;
    for (table, rows) in snapshot.row_counts() {
        println!("  {:<18} {}", table, rows);
    }
    Ok(())
}

async fn coordinator(crm: &Crm, cmd: CoordinatorCommand) -> anyhow::Result<()> {
    match cmd {
        CoordinatorCommand::Add { name, surnames } => {
            let created = crm.insert_coordinator(&NewCoordinator::new(name, surnames)).await?;
            println!("Coordinator {} created: {}", created.id, created.full_name());
        }
        CoordinatorCommand::Edit { id, name, surnames } => {
            let current = crm
                .get_coordinator_by_id(id)
                .await
                .with_context(|| format!("coordinator {} not found", id))?;
            let fields = NewCoordinator::new(
                name.unwrap_or(current.name),
                surnames.unwrap_or(current.surnames),
            );
            crm.update_coordinator(id, &fields).await?;
            println!("Coordinator {} updated.", id);
        }
        CoordinatorCommand::List => {
            for c in crm.get_coordinators().await {
                println!("{:>4}  {}", c.id, c.full_name());
            }
        }
    }
    Ok(())
}

async fn verifier(crm: &Crm, cmd: VerifierCommand) -> anyhow::Result<()> {
    match cmd {
        VerifierCommand::Add {
            name,
            surnames,
            phone,
            zone,
        } => {
            let mut new = NewVerifier::new(name, surnames);
            new.phone = phone;
            new.zone = zone;
            let created = crm.insert_verifier(&new).await?;
            println!("Verifier {} created: {}", created.id, created.full_name());
        }
        VerifierCommand::Edit {
            id,
            name,
            surnames,
            phone,
            zone,
        } => {
            let current = crm
                .get_verifier_by_id(id)
                .await
                .with_context(|| format!("verifier {} not found", id))?;
            let fields = NewVerifier {
                name: name.unwrap_or(current.name),
                surnames: surnames.unwrap_or(current.surnames),
                phone: phone.or(current.phone),
                zone: zone.or(current.zone),
            };
            crm.update_verifier(id, &fields).await?;
            println!("Verifier {} updated.", id);
        }
        VerifierCommand::List => {
            for v in crm.get_verifiers().await {
                println!(
                    "{:>4}  {:<30} {:<10} {}",
                    v.id,
                    v.full_name(),
                    v.phone.as_deref().unwrap_or("-"),
                    v.zone.map(|z| z.label()).unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn warehouse(crm: &Crm, cmd: WarehouseCommand) -> anyhow::Result<()> {
    match cmd {
        WarehouseCommand::Add { name, code, zone } => {
            let mut new = NewWarehouse::new(name);
            new.codigo_consejo = code;
            new.zone = zone;
            let created = crm.insert_warehouse(&new).await?;
            println!("Warehouse {} created: {}", created.id, created.name);
        }
        WarehouseCommand::Edit {
            id,
            name,
            code,
            zone,
        } => {
            let current = crm
                .get_warehouse_by_id(id)
                .await
                .with_context(|| format!("warehouse {} not found", id))?;
            let fields = NewWarehouse {
                name: name.unwrap_or(current.name),
                codigo_consejo: code.or(current.codigo_consejo),
                zone: zone.or(current.zone),
            };
            crm.update_warehouse(id, &fields).await?;
            println!("Warehouse {} updated.", id);
        }
        WarehouseCommand::List => {
            for w in crm.get_warehouses().await {
                println!(
                    "{:>4}  {:<30} {:<12} {}",
                    w.id,
                    w.name,
                    w.codigo_consejo.as_deref().unwrap_or("-"),
                    w.zone.map(|z| z.label()).unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn incident(crm: &Crm, cmd: IncidentCommand) -> anyhow::Result<()> {
    match cmd {
        IncidentCommand::Add { kind, detail, code } => {
            let created = crm.insert_incident(&kind, &detail, code.as_deref()).await?;
            println!("Incident type created: {}", created.label());
        }
        IncidentCommand::Edit {
            id,
            code,
            description,
        } => {
            crm.update_incident(id, &code, &description).await?;
            println!("Incident type {} updated.", id);
        }
        IncidentCommand::List => {
            for i in crm.get_incidents().await {
                println!("{:>4}  {}", i.id, i.label());
            }
        }
        IncidentCommand::Search { code } => {
            let found = crm.search_incident_by_code(&code).await?;
            println!("{}", found.label());
            println!();
            match crm.get_incident_records_by_incident_code(&code).await {
                Ok(rows) => print_rows(&rows),
                Err(cavacrm::Error::NoRecordsForCode { .. }) => println!("No records yet."),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

async fn record(crm: &Crm, cmd: RecordCommand) -> anyhow::Result<()> {
    match cmd {
        RecordCommand::Add {
            date,
            registered_by,
            warehouse,
            verifier,
            incident,
            assigned_to,
            explanation,
            enlace,
            status,
            responsible,
        } => {
            let new = NewIncidentRecord {
                date: date.unwrap_or_else(today),
                registering_coordinator_id: registered_by,
                warehouse_id: warehouse,
                causing_verifier_id: verifier,
                incident_id: incident,
                assigned_coordinator_id: assigned_to,
                explanation,
                enlace,
                status,
                responsible,
            };
            let created = crm.insert_incident_record(&new).await?;
            println!("Incident record {} created ({}).", created.id, created.status);
        }
        RecordCommand::Edit {
            id,
            date,
            registered_by,
            warehouse,
            verifier,
            incident,
            assigned_to,
            explanation,
            enlace,
            status,
            responsible,
        } => {
            let current = crm
                .get_incident_record_by_id(id)
                .await
                .with_context(|| format!("incident record {} not found", id))?;
            let fields = NewIncidentRecord {
                date: date.unwrap_or(current.date),
                registering_coordinator_id: registered_by.unwrap_or(current.registering_coordinator_id),
                warehouse_id: warehouse.unwrap_or(current.warehouse_id),
                causing_verifier_id: verifier.unwrap_or(current.causing_verifier_id),
                incident_id: incident.unwrap_or(current.incident_id),
                assigned_coordinator_id: assigned_to.unwrap_or(current.assigned_coordinator_id),
                explanation: explanation.unwrap_or(current.explanation),
                enlace: enlace.or(current.enlace),
                status: status.unwrap_or(current.status),
                responsible: responsible.unwrap_or(current.responsible),
            };
            crm.update_incident_record(id, &fields).await?;
            println!("Incident record {} updated.", id);
        }
        RecordCommand::List => {
            for (_, label) in crm.get_incident_records().await {
                println!("{}", label);
            }
        }
        RecordCommand::Show { id } => {
            let details = crm
                .get_incident_record_details(id)
                .await
                .with_context(|| format!("incident record {} not found", id))?;
            let r = &details.record;
            println!("--- Record {} ---", r.id);
            println!("  Fecha:                   {}", r.date);
            println!("  Incidencia:              {}", r.incident_label());
            println!("  Bodega:                  {} ({})", r.warehouse, r.warehouse_zone);
            println!("  Verificador:             {} ({})", r.causing_verifier, r.verifier_zone);
            println!("  Coordinador registrante: {}", r.registering_coordinator);
            println!("  Coordinador asignado:    {}", r.assigned_coordinator);
            println!("  Estado:                  {}", r.status);
            println!("  Responsable:             {}", r.responsible);
            if !r.enlace.is_empty() {
                println!("  Enlace:                  {}", r.enlace);
            }
            if !r.explanation.is_empty() {
                println!("  Explicación:             {}", r.explanation);
            }
            println!();
            print_actions(&details.actions);
        }
    }
    Ok(())
}

async fn action(crm: &Crm, cmd: ActionCommand) -> anyhow::Result<()> {
    match cmd {
        ActionCommand::Add {
            record,
            description,
            by,
            status,
            date,
        } => {
            let new = NewIncidentAction {
                incident_record_id: record,
                action_date: date.unwrap_or_else(today),
                action_description: description,
                new_status: status,
                performed_by: by,
            };
            let created = crm.insert_incident_action(&new).await?;
            println!("Action {} recorded on record {}.", created.id, record);
        }
        ActionCommand::List { record } => print_actions(&crm.get_incident_actions(record).await),
    }
    Ok(())
}

async fn import(crm: &Crm, kind: ImportKind, file: &PathBuf) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let report: ImportReport = match kind {
        ImportKind::Verifiers => crm.load_csv_to_verifiers(&bytes).await?,
        ImportKind::Warehouses => crm.load_csv_to_warehouses(&bytes).await?,
    };
    println!(
        "Inserted {}, skipped {} existing, {} failed.",
        report.inserted, report.skipped, report.failed
    );
    Ok(())
}

async fn show_stats(crm: &Crm) -> anyhow::Result<()> {
    let stats = crm.get_dashboard_stats().await;
    println!("Total:          {}", stats.total_incidents);
    println!("Pendientes:     {}", stats.pending_incidents);
    println!("Resueltas:      {}", stats.resolved_incidents);
    println!("Últimos 7 días: {}", stats.recent_incidents);
    println!();
    print_counts("Por estado", &stats.by_status);

    println!("Pendientes recientes:");
    print_rows(&crm.get_pending_incidents_summary().await);
    println!();
    println!("Acciones recientes:");
    print_actions(&crm.get_recent_actions(RECENT_ACTIONS_LIMIT).await);
    Ok(())
}

async fn show_analytics(crm: &Crm) -> anyhow::Result<()> {
    print_counts("Zona Bodega", &crm.count_by_zone().await);
    print_counts("Verificador Causante", &crm.count_by_verifier().await);
    print_counts("Bodega", &crm.count_by_warehouse().await);
    print_counts("Tipo de Incidencia", &crm.count_by_type().await);
    print_counts("Estado", &crm.count_by_status().await);
    print_counts("Asignaciones a verificadores", &crm.count_assignments_by_verifier().await);
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_counts(title: &str, counts: &[GroupCount]) {
    println!("{}:", title);
    if counts.is_empty() {
        println!("  (sin datos)");
    }
    for c in counts {
        println!("  {:<40} {}", c.value, c.count);
    }
    println!();
}

fn print_rows(rows: &[IncidentRow]) {
    if rows.is_empty() {
        println!("(0 rows)");
        return;
    }
    for r in rows {
        println!(
            "{:>4}  {}  {:<20} {:<24} {:<20} {:<12} {}",
            r.id,
            r.date,
            r.warehouse,
            r.causing_verifier,
            r.assigned_coordinator,
            r.status.label(),
            r.incident_type
        );
    }
    println!("({} row(s))", rows.len());
}

fn print_actions(actions: &[ActionRow]) {
    if actions.is_empty() {
        println!("(no actions)");
        return;
    }
    for a in actions {
        println!(
            "  {}  #{:<4} {:<40} {:<20} {}",
            a.action_date,
            a.incident_record_id,
            a.action_description,
            a.new_status_label(),
            a.performed_by
        );
    }
}
