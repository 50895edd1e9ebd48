//! Pollutant field schemas

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Full field set expected by the seven-feature prediction model
pub const CANONICAL_FIELDS: [&str; 7] = ["pm2_5", "pm10", "no", "no2", "co", "so2", "o3"];

/// Six-field subset used by models trained without NO
pub const REDUCED_FIELDS: [&str; 6] = ["pm2_5", "pm10", "no2", "so2", "co", "o3"];

/// Ordered, duplicate-free set of pollutant field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PollutantSchema {
    fields: Vec<String>,
}

impl PollutantSchema {
    /// Build a schema from field names, keeping their order
    pub fn new<I, S>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into().trim().to_string();
            if field.is_empty() {
                return Err(SchemaError::BlankField);
            }
            if out.contains(&field) {
                return Err(SchemaError::Duplicate(field));
            }
            out.push(field);
        }

        if out.is_empty() {
            return Err(SchemaError::Empty);
        }

        Ok(Self { fields: out })
    }

    /// `pm2_5, pm10, no, no2, co, so2, o3`
    pub fn canonical() -> Self {
        Self {
            fields: CANONICAL_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// `pm2_5, pm10, no2, so2, co, o3`
    pub fn reduced() -> Self {
        Self {
            fields: REDUCED_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Field names in schema order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

impl Default for PollutantSchema {
    fn default() -> Self {
        Self::canonical()
    }
}

impl TryFrom<Vec<String>> for PollutantSchema {
    type Error = SchemaError;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<PollutantSchema> for Vec<String> {
    fn from(schema: PollutantSchema) -> Self {
        schema.fields
    }
}
