//! Entities, closed enumerations and insert payloads
//!
//! Field names here are the logical names every caller sees. Storage
//! engines that name a column differently translate at their own boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row identifier assigned by the storage engine
pub type Id = i64;

// =============================================================================
// Enumerations
// =============================================================================

/// Error returned when a stored or submitted label is outside a closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed label set with canonical spellings and accepted aliases
macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical label as stored and displayed
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($label) $(|| trimmed.eq_ignore_ascii_case($alias))* {
                        return Ok($name::$variant);
                    }
                )+
                // Non-ASCII labels (PENEDÈS, CARIÑENA) need a full case fold
                let folded = trimmed.to_uppercase();
                $(
                    if folded == $label.to_uppercase() {
                        return Ok($name::$variant);
                    }
                )+
                Err(UnknownLabel { kind: $kind, value: s.to_string() })
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownLabel;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.label().to_string()
            }
        }
    };
}

label_enum! {
    /// Geographic zone shared by verifiers and warehouses
    Zone, "zone" {
        Penedes => "PENEDÈS" | "PENEDES",
        AltCamp => "ALT CAMP",
        ConcaDeBarbera => "CONCA DE BARBERÀ" | "CONCA" | "CONCA DE BARBERA",
        Almendralejo => "ALMENDRALEJO",
        Requena => "REQUENA",
        Carinena => "CARIÑENA" | "CARINENA",
    }
}

label_enum! {
    /// Incident record status
    Status, "status" {
        Pendiente => "Pendiente",
        EnProceso => "En Proceso",
        Solucionado => "Solucionado" | "Resuelto",
        AsignadoATecnicos => "Asignado a Técnicos" | "Asignado a Tecnicos",
        Rrhh => "RRHH",
    }
}

label_enum! {
    /// Party responsible for an incident record
    Responsible, "responsible" {
        Bodega => "Bodega",
        Verificador => "Verificador",
        Rrhh => "RRHH",
        Coordinacion => "Coordinacion" | "Coordinador" | "Coordinación",
        ServiciosInformaticos => "Servicios Informáticos" | "Servicios Informaticos",
    }
}

impl Status {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Status::Solucionado)
    }
}

/// Reads a missing, null or blank cell as `None`
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinator {
    pub id: Id,
    pub name: String,
    pub surnames: String,
}

impl Coordinator {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surnames)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verifier {
    pub id: Id,
    pub name: String,
    pub surnames: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub zone: Option<Zone>,
}

impl Verifier {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surnames)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Id,
    pub name: String,
    /// Site code; the hosted engine stores it as `nif`
    #[serde(default, deserialize_with = "blank_as_none")]
    pub codigo_consejo: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub zone: Option<Zone>,
}

/// Incident type: a catalog entry, not an occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Id,
    pub code: String,
    pub description: String,
}

impl Incident {
    /// `"<code> - <description>"`, as shown in selection lists
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.description)
    }
}

/// One occurrence of an incident type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: Id,
    pub date: NaiveDate,
    pub registering_coordinator_id: Id,
    pub warehouse_id: Id,
    pub causing_verifier_id: Id,
    pub incident_id: Id,
    pub assigned_coordinator_id: Id,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub explanation: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub enlace: Option<String>,
    pub status: Status,
    pub responsible: Responsible,
}

/// Audit entry on an incident record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentAction {
    pub id: Id,
    pub incident_record_id: Id,
    pub action_date: NaiveDate,
    pub action_description: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub new_status: Option<Status>,
    pub performed_by: Id,
}

// =============================================================================
// Insert / update payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoordinator {
    pub name: String,
    pub surnames: String,
}

impl NewCoordinator {
    pub fn new(name: impl Into<String>, surnames: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surnames: surnames.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVerifier {
    pub name: String,
    pub surnames: String,
    pub phone: Option<String>,
    pub zone: Option<Zone>,
}

impl NewVerifier {
    pub fn new(name: impl Into<String>, surnames: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surnames: surnames.into(),
            phone: None,
            zone: None,
        }
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub codigo_consejo: Option<String>,
    pub zone: Option<Zone>,
}

impl NewWarehouse {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codigo_consejo: None,
            zone: None,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.codigo_consejo = Some(code.into());
        self
    }

    pub fn zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }
}

/// Incident type to create; `code: None` asks for the next sequential code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub code: Option<String>,
    pub description: String,
}

impl NewIncident {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            code: None,
            description: description.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build from the two-part form: a short type label and a detailed description
    pub fn from_form(kind: &str, detail: &str) -> Self {
        Self::new(format!("{} - {}", kind.trim(), detail.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncidentRecord {
    pub date: NaiveDate,
    pub registering_coordinator_id: Id,
    pub warehouse_id: Id,
    pub causing_verifier_id: Id,
    pub incident_id: Id,
    pub assigned_coordinator_id: Id,
    pub explanation: String,
    pub enlace: Option<String>,
    pub status: Status,
    pub responsible: Responsible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncidentAction {
    pub incident_record_id: Id,
    pub action_date: NaiveDate,
    pub action_description: String,
    pub new_status: Option<Status>,
    pub performed_by: Id,
}
