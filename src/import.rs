//! CSV bulk import for verifiers and warehouses
//!
//! Input is raw bytes as uploaded. The delimiter is guessed from the header
//! line and headers are normalised before the required columns are checked.
//! Rows whose natural key already exists are skipped, never overwritten.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{NewVerifier, NewWarehouse, Zone};
use crate::store::Store;
use crate::validation;

const BOM: char = '\u{feff}';

/// Required columns of a verifier file
pub const VERIFIER_COLUMNS: &[&str] = &["name", "surnames"];

/// Required columns of a warehouse file
pub const WAREHOUSE_COLUMNS: &[&str] = &["name", "codigo_consejo"];

/// Outcome of one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    /// Natural key already present in the store or earlier in the file
    pub skipped: usize,
    /// Rows rejected by validation or by the store
    pub failed: usize,
}

/// Trim, lower-case, spaces to underscores, BOM removed
pub fn normalize_header(header: &str) -> String {
    header
        .replace(BOM, "")
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// `;` when the header line has more semicolons than commas, else `,`
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// A parsed CSV file keyed by normalised header
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl CsvTable {
    /// Parse `bytes`, failing before any row is used if a required column is missing
    pub fn parse(bytes: &[u8], required: &[&str]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches(BOM);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(detect_delimiter(text))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h == col))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation {
                field: "csv".to_string(),
                message: format!(
                    "missing required columns [{}]; available columns [{}]",
                    missing.join(", "),
                    headers.join(", ")
                ),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(
                headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }
}

fn cell<'a>(row: &'a HashMap<String, String>, column: &str) -> Option<&'a str> {
    row.get(column).map(String::as_str).filter(|v| !v.is_empty())
}

fn zone_cell(row: &HashMap<String, String>) -> std::result::Result<Option<Zone>, String> {
    match cell(row, "zone") {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e| format!("{}", e)),
    }
}

fn verifier_from_row(row: &HashMap<String, String>) -> std::result::Result<NewVerifier, String> {
    let mut new = NewVerifier::new(
        cell(row, "name").unwrap_or_default(),
        cell(row, "surnames").unwrap_or_default(),
    );
    new.phone = cell(row, "phone").map(str::to_string);
    new.zone = zone_cell(row)?;
    validation::validate_verifier(&new).map_err(|e| e.to_string())?;
    Ok(new)
}

fn warehouse_from_row(row: &HashMap<String, String>) -> std::result::Result<NewWarehouse, String> {
    let code = cell(row, "codigo_consejo").ok_or("codigo_consejo is required")?;
    let mut new = NewWarehouse::new(cell(row, "name").unwrap_or_default()).code(code);
    new.zone = zone_cell(row)?;
    validation::validate_warehouse(&new).map_err(|e| e.to_string())?;
    Ok(new)
}

fn verifier_key(name: &str, surnames: &str) -> (String, String) {
    (name.trim().to_string(), surnames.trim().to_string())
}

/// Import verifiers; the natural key is `(name, surnames)`
pub async fn import_verifiers(store: &dyn Store, bytes: &[u8]) -> Result<ImportReport> {
    let table = CsvTable::parse(bytes, VERIFIER_COLUMNS)?;
    let mut seen: HashSet<(String, String)> = store
        .verifiers()
        .await?
        .iter()
        .map(|v| verifier_key(&v.name, &v.surnames))
        .collect();

    let mut report = ImportReport::default();
    for (line, row) in table.rows.iter().enumerate() {
        let new = match verifier_from_row(row) {
            Ok(new) => new,
            Err(reason) => {
                warn!(line = line + 2, reason = %reason, "Rejected verifier row");
                report.failed += 1;
                continue;
            }
        };

        let key = verifier_key(&new.name, &new.surnames);
        if seen.contains(&key) {
            info!(name = %new.name, surnames = %new.surnames, "Verifier already exists, skipping");
            report.skipped += 1;
            continue;
        }

        match store.insert_verifier(&new).await {
            Ok(_) => {
                seen.insert(key);
                report.inserted += 1;
            }
            Err(e) => {
                warn!(line = line + 2, error = %e, "Failed to insert verifier row");
                report.failed += 1;
            }
        }
    }

    info!(?report, "Imported verifiers");
    Ok(report)
}

/// Import warehouses; the natural key is the site code
pub async fn import_warehouses(store: &dyn Store, bytes: &[u8]) -> Result<ImportReport> {
    let table = CsvTable::parse(bytes, WAREHOUSE_COLUMNS)?;
    let mut seen: HashSet<String> = store
        .warehouses()
        .await?
        .into_iter()
        .filter_map(|w| w.codigo_consejo)
        .map(|code| code.trim().to_string())
        .collect();

    let mut report = ImportReport::default();
    for (line, row) in table.rows.iter().enumerate() {
        let new = match warehouse_from_row(row) {
            Ok(new) => new,
            Err(reason) => {
                warn!(line = line + 2, reason = %reason, "Rejected warehouse row");
                report.failed += 1;
                continue;
            }
        };

        let key = new.codigo_consejo.clone().unwrap_or_default();
        if seen.contains(&key) {
            info!(code = %key, "Warehouse already exists, skipping");
            report.skipped += 1;
            continue;
        }

        match store.insert_warehouse(&new).await {
            Ok(_) => {
                seen.insert(key);
                report.inserted += 1;
            }
            Err(e) => {
                warn!(line = line + 2, error = %e, "Failed to insert warehouse row");
                report.failed += 1;
            }
        }
    }

    info!(?report, "Imported warehouses");
    Ok(report)
}
