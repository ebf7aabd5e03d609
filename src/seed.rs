//! Default catalog data for a fresh store
//!
//! Each table is seeded only while it is empty, so seeding is safe to run
//! on every start.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::{NewCoordinator, NewIncident, NewVerifier, NewWarehouse, Zone};
use crate::store::Store;

const COORDINATORS: &[(&str, &str)] = &[
    ("Admin", "Sistema"),
    ("Coordinador", "Principal"),
    ("Supervisor", "General"),
];

const INCIDENTS: &[(&str, &str)] = &[
    ("INC001", "Problema de calidad del producto"),
    ("INC002", "Retraso en la entrega"),
    ("INC003", "Documentación incorrecta"),
    ("INC004", "Problema de temperatura"),
    ("INC005", "Daño en el transporte"),
    ("INC006", "Cantidad incorrecta"),
    ("INC007", "Problema de etiquetado"),
    ("INC008", "Incumplimiento de especificaciones"),
];

/// Rows inserted per table; zero means the table already had data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub coordinators: usize,
    pub incidents: usize,
    pub verifiers: usize,
    pub warehouses: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.coordinators + self.incidents + self.verifiers + self.warehouses
    }
}

/// One verifier per zone: `Verificador<n>` / `Zona<ZONE>` / `60000000<n>`
fn default_verifier(n: usize, zone: Zone) -> NewVerifier {
    NewVerifier::new(format!("Verificador{}", n), format!("Zona{}", zone))
        .phone(format!("60000000{}", n))
        .zone(zone)
}

/// One warehouse per zone: `Bodega <ZONE>` with code `B<12345678 + n>A`
fn default_warehouse(n: usize, zone: Zone) -> NewWarehouse {
    NewWarehouse::new(format!("Bodega {}", zone))
        .code(format!("B{:08}A", 12_345_678 + n))
        .zone(zone)
}

pub async fn seed_defaults(store: &dyn Store) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if store.coordinators().await?.is_empty() {
        for (name, surnames) in COORDINATORS {
            store
                .insert_coordinator(&NewCoordinator::new(*name, *surnames))
                .await?;
            report.coordinators += 1;
        }
    }

    if store.count_incidents().await? == 0 {
        for (code, description) in INCIDENTS {
            store
                .insert_incident(&NewIncident::new(*description).with_code(*code))
                .await?;
            report.incidents += 1;
        }
    }

    if store.verifiers().await?.is_empty() {
        for (i, zone) in Zone::ALL.iter().enumerate() {
            store.insert_verifier(&default_verifier(i + 1, *zone)).await?;
            report.verifiers += 1;
        }
    }

    if store.warehouses().await?.is_empty() {
        for (i, zone) in Zone::ALL.iter().enumerate() {
            store.insert_warehouse(&default_warehouse(i + 1, *zone)).await?;
            report.warehouses += 1;
        }
    }

    info!(?report, "Seeded default data");
    Ok(report)
}
