//! Input validation for cavacrm
//!
//! Form-level rules checked before any storage call. A payload that fails
//! here never reaches a storage engine.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::model::{
    NewCoordinator, NewIncident, NewIncidentAction, NewIncidentRecord, NewVerifier, NewWarehouse,
};

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{0} is required")]
    Required(&'static str),

    #[error("phone '{0}' must be exactly 9 digits")]
    InvalidPhone(String),

    #[error("link '{0}' is not an http(s) URL")]
    InvalidUrl(String),
}

impl ValidationError {
    /// The form field the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::TooShort { field, .. } => field,
            ValidationError::Required(field) => field,
            ValidationError::InvalidPhone(_) => "phone",
            ValidationError::InvalidUrl(_) => "enlace",
        }
    }
}

/// Minimum length for person names and surnames
pub const MIN_NAME_LENGTH: usize = 2;

/// Minimum length for the short incident type label
pub const MIN_INCIDENT_TYPE_LENGTH: usize = 3;

/// Minimum length for user-supplied incident codes
pub const MIN_CODE_LENGTH: usize = 3;

/// Minimum length for detailed descriptions and edited explanations
pub const MIN_DETAIL_LENGTH: usize = 10;

const PHONE_PATTERN: &str = r"^[0-9]{9}$";
const URL_PATTERN: &str = r"^https?://[^\s/$.?#][^\s]*$";

static PHONE: OnceLock<Regex> = OnceLock::new();
static URL: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid pattern"))
}

fn is_phone(value: &str) -> bool {
    compiled(&PHONE, PHONE_PATTERN).is_match(value)
}

fn is_url(value: &str) -> bool {
    compiled(&URL, URL_PATTERN).is_match(value)
}

/// Validate a coordinator form
pub fn validate_coordinator(new: &NewCoordinator) -> Result<(), ValidationError> {
    min_length("name", &new.name, MIN_NAME_LENGTH)?;
    min_length("surnames", &new.surnames, MIN_NAME_LENGTH)
}

/// Validate a verifier form
///
/// Rules:
/// - Name and surnames at least 2 characters
/// - Phone optional, exactly 9 digits when present
pub fn validate_verifier(new: &NewVerifier) -> Result<(), ValidationError> {
    min_length("name", &new.name, MIN_NAME_LENGTH)?;
    min_length("surnames", &new.surnames, MIN_NAME_LENGTH)?;

    if let Some(phone) = new.phone.as_deref().map(str::trim) {
        if !phone.is_empty() && !is_phone(phone) {
            return Err(ValidationError::InvalidPhone(phone.to_string()));
        }
    }
    Ok(())
}

/// Validate a warehouse form
pub fn validate_warehouse(new: &NewWarehouse) -> Result<(), ValidationError> {
    required("name", &new.name)
}

/// Validate the two-part incident type form and build the payload
///
/// The stored description is `"<kind> - <detail>"`. `code: None` requests an
/// auto-generated code.
pub fn validate_incident_form(
    kind: &str,
    detail: &str,
    code: Option<&str>,
) -> Result<NewIncident, ValidationError> {
    min_length("incident type", kind, MIN_INCIDENT_TYPE_LENGTH)?;
    min_length("description", detail, MIN_DETAIL_LENGTH)?;

    let mut new = NewIncident::from_form(kind, detail);
    if let Some(code) = code {
        min_length("code", code, MIN_CODE_LENGTH)?;
        new.code = Some(code.trim().to_string());
    }
    Ok(new)
}

/// Validate an incident type payload
pub fn validate_incident(new: &NewIncident) -> Result<(), ValidationError> {
    required("description", &new.description)?;
    if let Some(code) = &new.code {
        min_length("code", code, MIN_CODE_LENGTH)?;
    }
    Ok(())
}

/// Validate an incident type edit; both fields must be filled in
pub fn validate_incident_edit(code: &str, description: &str) -> Result<(), ValidationError> {
    required("code", code)?;
    required("description", description)
}

/// Validate a new incident record
pub fn validate_record(new: &NewIncidentRecord) -> Result<(), ValidationError> {
    reference("registering coordinator", new.registering_coordinator_id)?;
    reference("warehouse", new.warehouse_id)?;
    reference("causing verifier", new.causing_verifier_id)?;
    reference("incident", new.incident_id)?;
    reference("assigned coordinator", new.assigned_coordinator_id)?;

    if let Some(link) = new.enlace.as_deref().map(str::trim) {
        if !link.is_empty() && !is_url(link) {
            return Err(ValidationError::InvalidUrl(link.to_string()));
        }
    }
    Ok(())
}

/// Validate an incident record edit, which also requires a real explanation
pub fn validate_record_edit(edit: &NewIncidentRecord) -> Result<(), ValidationError> {
    validate_record(edit)?;
    min_length("explanation", &edit.explanation, MIN_DETAIL_LENGTH)
}

/// Validate an incident action
pub fn validate_action(new: &NewIncidentAction) -> Result<(), ValidationError> {
    reference("incident record", new.incident_record_id)?;
    required("action description", &new.action_description)?;
    reference("performed by", new.performed_by)
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

fn min_length(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    if value.chars().count() < min {
        return Err(ValidationError::TooShort { field, min });
    }
    Ok(())
}

fn reference(field: &'static str, id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}
