//! Incident history workbook
//!
//! Sheet `Incidencias` holds one wide row per incident record, sheet
//! `Acciones` one row per action with the performer's name resolved.

use chrono::{Local, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backup::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};
use crate::readmodel::{ActionRow, IncidentRow};

/// File name prefix of exported workbooks
pub const EXCEL_PREFIX: &str = "historial_incidencias_";

const INCIDENT_HEADERS: [&str; 14] = [
    "ID Registro",
    "Fecha",
    "Coordinador Registrante",
    "Bodega",
    "Zona Bodega",
    "Verificador Causante",
    "Zona Verificador",
    "Código Incidencia",
    "Tipo de Incidencia",
    "Coordinador Asignado",
    "Explicación",
    "Enlace",
    "Estado",
    "Responsable",
];

const ACTION_HEADERS: [&str; 5] = [
    "ID Registro",
    "Fecha Acción",
    "Descripción Acción",
    "Nuevo Estado",
    "Realizado Por",
];

/// Widest a column is allowed to grow
const MAX_COLUMN_WIDTH: usize = 50;

enum Cell {
    Number(i64),
    Text(String),
}

impl Cell {
    fn width(&self) -> usize {
        match self {
            Cell::Number(n) => n.to_string().len(),
            Cell::Text(s) => s.chars().count(),
        }
    }
}

fn day(date: NaiveDate) -> Cell {
    Cell::Text(date.format("%d/%m/%Y").to_string())
}

fn incident_cells(row: &IncidentRow) -> Vec<Cell> {
    vec![
        Cell::Number(row.id),
        day(row.date),
        Cell::Text(row.registering_coordinator.clone()),
        Cell::Text(row.warehouse.clone()),
        Cell::Text(row.warehouse_zone.clone()),
        Cell::Text(row.causing_verifier.clone()),
        Cell::Text(row.verifier_zone.clone()),
        Cell::Text(row.incident_code.clone()),
        Cell::Text(row.incident_type.clone()),
        Cell::Text(row.assigned_coordinator.clone()),
        Cell::Text(row.explanation.clone()),
        Cell::Text(row.enlace.clone()),
        Cell::Text(row.status.label().to_string()),
        Cell::Text(row.responsible.label().to_string()),
    ]
}

fn action_cells(row: &ActionRow) -> Vec<Cell> {
    vec![
        Cell::Number(row.incident_record_id),
        day(row.action_date),
        Cell::Text(row.action_description.clone()),
        Cell::Text(row.new_status_label().to_string()),
        Cell::Text(row.performed_by.clone()),
    ]
}

/// `min(longest cell + 2, 50)` per column, headers included
fn column_widths(headers: &[&str], rows: &[Vec<Cell>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = rows
                .iter()
                .filter_map(|r| r.get(col))
                .map(Cell::width)
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    headers: &[&str],
    rows: &[Vec<Cell>],
) -> std::result::Result<(), rust_xlsxwriter::XlsxError> {
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Number(n) => sheet.write_number(r, col as u16, *n as f64)?,
                Cell::Text(s) => sheet.write_string(r, col as u16, s)?,
            };
        }
    }

    for (col, width) in column_widths(headers, rows).into_iter().enumerate() {
        sheet.set_column_width(col as u16, width as f64)?;
    }
    Ok(())
}

/// Write `historial_incidencias_<timestamp>.xlsx` into `dir`
pub fn export_workbook(dir: &Path, incidents: &[IncidentRow], actions: &[ActionRow]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| Error::FileWriteError {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!(
        "{}{}.xlsx",
        EXCEL_PREFIX,
        Local::now().format(TIMESTAMP_FORMAT)
    ));

    let incident_rows: Vec<Vec<Cell>> = incidents.iter().map(incident_cells).collect();
    let action_rows: Vec<Vec<Cell>> = actions.iter().map(action_cells).collect();

    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, "Incidencias", &INCIDENT_HEADERS, &incident_rows)?;
    write_sheet(&mut workbook, "Acciones", &ACTION_HEADERS, &action_rows)?;
    workbook.save(&path)?;

    info!(
        path = %path.display(),
        incidents = incidents.len(),
        actions = actions.len(),
        "Exported incident history"
    );
    Ok(path)
}
