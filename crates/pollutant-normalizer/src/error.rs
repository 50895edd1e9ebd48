//! Normalizer Error Types

use thiserror::Error;

use crate::Coercion;

/// Errors raised while building a pollutant schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No fields were given
    #[error("Pollutant schema must contain at least one field")]
    Empty,

    /// A field name appears more than once
    #[error("Duplicate pollutant field: {0}")]
    Duplicate(String),

    /// A field name is empty or only whitespace
    #[error("Pollutant field names must not be blank")]
    BlankField,
}

/// Errors raised by strict validation
///
/// Plain normalization never produces these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// One or more fields could not be taken at face value
    #[error("{} pollutant field(s) rejected: {}", .issues.len(), describe(.issues))]
    Rejected { issues: Vec<Coercion> },
}

fn describe(issues: &[Coercion]) -> String {
    issues
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
