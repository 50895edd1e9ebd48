//! Strict validation
//!
//! Opt-in alternative to zero-filling. Unit suffixes and similar noise are
//! still tolerated, but a field that would have been replaced with zero is
//! reported back to the caller instead.

use serde_json::Value;
use tracing::warn;

use crate::{normalize_with_report, PollutantReading, PollutantSchema, ValidationError};

/// Normalize `input`, rejecting it if any field had to be zero-filled
pub fn validate_strict(
    input: &Value,
    schema: &PollutantSchema,
) -> Result<PollutantReading, ValidationError> {
    let (reading, coercions) = normalize_with_report(input, schema);

    let issues: Vec<_> = coercions.into_iter().filter(|c| !c.kept_value()).collect();
    if issues.is_empty() {
        Ok(reading)
    } else {
        warn!("Strict validation rejected {} of {} fields", issues.len(), schema.len());
        Err(ValidationError::Rejected { issues })
    }
}
