//! Pollutant Normalization
//!
//! Turns loosely-typed pollutant payloads into complete, strictly numeric
//! readings over a configured field schema.
//!
//! Normalization is total: missing, null, empty or unparsable values are
//! coerced to zero instead of being rejected. Callers that prefer to reject
//! such input can opt into [`Normalizer::validate_strict`].

mod error;
mod normalizer;
mod schema;
mod validator;

pub use error::{SchemaError, ValidationError};
pub use normalizer::{
    normalize, normalize_with_report, Coercion, CoercionKind, Normalizer, PollutantReading,
};
pub use schema::{PollutantSchema, CANONICAL_FIELDS, REDUCED_FIELDS};
pub use validator::validate_strict;
