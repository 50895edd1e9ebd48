//! Pollutant payload normalization
//!
//! Every schema field ends up in the output as a finite number. Values that
//! cannot be read are replaced with zero and reported as a [`Coercion`],
//! never as an error.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

use crate::{PollutantSchema, ValidationError};

/// Wrapper key some clients nest the reading under
const POLLUTANTS_KEY: &str = "pollutants";

/// Complete numeric reading over a schema, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct PollutantReading {
    values: Vec<(String, f64)>,
}

impl PollutantReading {
    /// Value for a field, if the field is part of the reading
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| *value)
    }

    /// Iterate `(field, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for PollutantReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// How a raw value was altered on its way into a reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoercionKind {
    /// Key absent from the input
    Missing,
    /// Explicit `null`
    Null,
    /// Empty string
    EmptyString,
    /// Text that parsed once non-numeric characters were dropped
    Stripped { raw: String },
    /// Text with no usable number in it
    Unparsable { raw: String },
    /// Boolean, array or object
    NonNumeric { json_type: &'static str },
}

impl fmt::Display for CoercionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionKind::Missing => write!(f, "missing"),
            CoercionKind::Null => write!(f, "null"),
            CoercionKind::EmptyString => write!(f, "empty string"),
            CoercionKind::Stripped { raw } => write!(f, "stripped from {:?}", raw),
            CoercionKind::Unparsable { raw } => write!(f, "unparsable {:?}", raw),
            CoercionKind::NonNumeric { json_type } => write!(f, "non-numeric {}", json_type),
        }
    }
}

/// A single field altered during normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coercion {
    pub field: String,
    #[serde(flatten)]
    pub kind: CoercionKind,
}

impl Coercion {
    /// Whether the input value contributed a number to the reading
    pub fn kept_value(&self) -> bool {
        matches!(self.kind, CoercionKind::Stripped { .. })
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

/// Normalize a payload against a schema.
///
/// Accepts either a flat mapping or one nested under `pollutants`. Never
/// fails: anything that is not a finite number becomes `0.0`.
pub fn normalize(input: &Value, schema: &PollutantSchema) -> PollutantReading {
    normalize_with_report(input, schema).0
}

/// Same as [`normalize`], also returning every coercion that was applied
pub fn normalize_with_report(
    input: &Value,
    schema: &PollutantSchema,
) -> (PollutantReading, Vec<Coercion>) {
    let empty = Map::new();
    let source = unwrap_pollutants(input).unwrap_or(&empty);

    let mut values = Vec::with_capacity(schema.len());
    let mut coercions = Vec::new();

    for field in schema.fields() {
        let (value, kind) = coerce(source.get(field));
        if let Some(kind) = kind {
            debug!("Coerced pollutant {} ({}) to {}", field, kind, value);
            coercions.push(Coercion {
                field: field.clone(),
                kind,
            });
        }
        values.push((field.clone(), value));
    }

    (PollutantReading { values }, coercions)
}

/// Prefer a nested `pollutants` object, else the input itself
fn unwrap_pollutants(input: &Value) -> Option<&Map<String, Value>> {
    let outer = input.as_object()?;
    match outer.get(POLLUTANTS_KEY) {
        Some(Value::Object(inner)) => Some(inner),
        _ => Some(outer),
    }
}

fn coerce(raw: Option<&Value>) -> (f64, Option<CoercionKind>) {
    match raw {
        None => (0.0, Some(CoercionKind::Missing)),
        Some(Value::Null) => (0.0, Some(CoercionKind::Null)),
        Some(Value::String(s)) if s.is_empty() => (0.0, Some(CoercionKind::EmptyString)),
        Some(Value::String(s)) => coerce_text(s),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => (v, None),
            _ => (
                0.0,
                Some(CoercionKind::Unparsable { raw: n.to_string() }),
            ),
        },
        Some(Value::Bool(b)) => (
            if *b { 1.0 } else { 0.0 },
            Some(CoercionKind::NonNumeric { json_type: "bool" }),
        ),
        Some(Value::Array(_)) => (0.0, Some(CoercionKind::NonNumeric { json_type: "array" })),
        Some(Value::Object(_)) => (0.0, Some(CoercionKind::NonNumeric { json_type: "object" })),
    }
}

fn coerce_text(raw: &str) -> (f64, Option<CoercionKind>) {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match parse_leading_number(&cleaned) {
        Some((value, consumed)) if consumed == raw.len() => (value, None),
        Some((value, _)) => (
            value,
            Some(CoercionKind::Stripped {
                raw: raw.to_string(),
            }),
        ),
        None => (
            0.0,
            Some(CoercionKind::Unparsable {
                raw: raw.to_string(),
            }),
        ),
    }
}

/// Parse the longest `-?digits[.digits]` prefix, returning the value and the
/// number of bytes it spans. Needs at least one digit.
fn parse_leading_number(text: &str) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| (v, end))
}

/// Schema-bound normalizer shared by request handlers
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    schema: PollutantSchema,
}

impl Normalizer {
    /// Create a normalizer for the given schema
    pub fn new(schema: PollutantSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &PollutantSchema {
        &self.schema
    }

    /// See [`normalize`]
    pub fn normalize(&self, input: &Value) -> PollutantReading {
        normalize(input, &self.schema)
    }

    /// See [`normalize_with_report`]
    pub fn normalize_with_report(&self, input: &Value) -> (PollutantReading, Vec<Coercion>) {
        normalize_with_report(input, &self.schema)
    }

    /// See [`crate::validate_strict`]
    pub fn validate_strict(&self, input: &Value) -> Result<PollutantReading, ValidationError> {
        crate::validate_strict(input, &self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn schema() -> PollutantSchema {
        PollutantSchema::canonical()
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let reading = normalize(&json!({}), &schema());
        assert_eq!(reading.len(), 7);
        for (_, value) in reading.iter() {
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn test_numbers_pass_through() {
        let reading = normalize(&json!({"pm10": 42.75, "co": -3, "o3": 0}), &schema());
        assert_eq!(reading.get("pm10"), Some(42.75));
        assert_eq!(reading.get("co"), Some(-3.0));
        assert_eq!(reading.get("o3"), Some(0.0));
    }

    #[test]
    fn test_units_are_stripped() {
        let reading = normalize(&json!({"pm2_5": "12.5 µg/m³"}), &schema());
        assert_eq!(reading.get("pm2_5"), Some(12.5));
    }

    #[test]
    fn test_garbage_text_is_zero() {
        let reading = normalize(&json!({"no2": "abc", "so2": "-", "o3": "."}), &schema());
        assert_eq!(reading.get("no2"), Some(0.0));
        assert_eq!(reading.get("so2"), Some(0.0));
        assert_eq!(reading.get("o3"), Some(0.0));
    }

    #[test]
    fn test_null_and_empty_are_zero() {
        let reading = normalize(&json!({"pm10": null, "co": ""}), &schema());
        assert_eq!(reading.get("pm10"), Some(0.0));
        assert_eq!(reading.get("co"), Some(0.0));
    }

    #[test]
    fn test_nested_pollutants_win() {
        let input = json!({"pm10": 99, "pollutants": {"pm10": 5}});
        let reading = normalize(&input, &schema());
        assert_eq!(reading.get("pm10"), Some(5.0));
    }

    #[test]
    fn test_non_object_wrapper_is_ignored() {
        let input = json!({"pm10": 7, "pollutants": "n/a"});
        assert_eq!(normalize(&input, &schema()).get("pm10"), Some(7.0));

        let reading = normalize(&json!([1, 2, 3]), &schema());
        assert!(reading.iter().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn test_output_keys_match_schema() {
        let schema = PollutantSchema::reduced();
        let reading = normalize(&json!({"no": 3, "benzene": 8, "pm10": 1}), &schema);
        let fields: Vec<&str> = reading.fields().collect();
        assert_eq!(fields, ["pm2_5", "pm10", "no2", "so2", "co", "o3"]);
        assert_eq!(reading.get("no"), None);
        assert_eq!(reading.get("benzene"), None);
    }

    #[test]
    fn test_leading_prefix_parse() {
        let reading = normalize(
            &json!({"pm2_5": "1.2.3", "pm10": ".5", "no": "12-3", "no2": "-.25", "co": "7."}),
            &schema(),
        );
        assert_eq!(reading.get("pm2_5"), Some(1.2));
        assert_eq!(reading.get("pm10"), Some(0.5));
        assert_eq!(reading.get("no"), Some(12.0));
        assert_eq!(reading.get("no2"), Some(-0.25));
        assert_eq!(reading.get("co"), Some(7.0));
    }

    #[test]
    fn test_overflowing_text_is_zero() {
        let huge = "9".repeat(400);
        let reading = normalize(&json!({ "co": huge }), &schema());
        assert_eq!(reading.get("co"), Some(0.0));
    }

    #[test]
    fn test_booleans_and_containers() {
        let input = json!({"pm10": true, "no": false, "co": [4], "o3": {"v": 1}});
        let reading = normalize(&input, &schema());
        assert_eq!(reading.get("pm10"), Some(1.0));
        assert_eq!(reading.get("no"), Some(0.0));
        assert_eq!(reading.get("co"), Some(0.0));
        assert_eq!(reading.get("o3"), Some(0.0));
    }

    #[test]
    fn test_mixed_payload() {
        let input = json!({
            "pm2_5": "35.2",
            "pm10": null,
            "no": 0.4,
            "no2": "",
            "co": "1.1mg",
            "so2": 2,
            "o3": "bad"
        });
        let reading = normalize(&input, &schema());
        let expected = [
            ("pm2_5", 35.2),
            ("pm10", 0.0),
            ("no", 0.4),
            ("no2", 0.0),
            ("co", 1.1),
            ("so2", 2.0),
            ("o3", 0.0),
        ];
        let actual: Vec<(&str, f64)> = reading.iter().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_report_names_each_coercion() {
        let input = json!({
            "pm2_5": "35.2", "pm10": null, "no2": "", "co": "1.1mg", "so2": 2, "o3": "bad"
        });
        let (_, report) = normalize_with_report(&input, &schema());
        let summary: Vec<(&str, &CoercionKind)> =
            report.iter().map(|c| (c.field.as_str(), &c.kind)).collect();

        assert_eq!(
            summary,
            vec![
                ("pm10", &CoercionKind::Null),
                ("no", &CoercionKind::Missing),
                ("no2", &CoercionKind::EmptyString),
                ("co", &CoercionKind::Stripped { raw: "1.1mg".to_string() }),
                ("o3", &CoercionKind::Unparsable { raw: "bad".to_string() }),
            ]
        );
    }

    #[test]
    fn test_serializes_in_schema_order() {
        let reading = normalize(&json!({"o3": 1, "pm2_5": 2}), &schema());
        let text = serde_json::to_string(&reading).unwrap();
        assert_eq!(
            text,
            r#"{"pm2_5":2.0,"pm10":0.0,"no":0.0,"no2":0.0,"co":0.0,"so2":0.0,"o3":1.0}"#
        );
    }

    #[test]
    fn test_normalizer_binds_schema() {
        let normalizer = Normalizer::new(PollutantSchema::reduced());
        let reading = normalizer.normalize(&json!({"pollutants": {"so2": "4"}}));
        assert_eq!(reading.len(), 6);
        assert_eq!(reading.get("so2"), Some(4.0));
    }

    fn raw_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|v| json!(v)),
            any::<f64>()
                .prop_filter("finite", |v| v.is_finite())
                .prop_map(|v| json!(v)),
            ".{0,12}".prop_map(Value::String),
            "-?[0-9]{0,4}(\\.[0-9]{0,3})?[a-z/ ]{0,4}".prop_map(Value::String),
        ]
    }

    fn raw_payload() -> impl Strategy<Value = Value> {
        let field = prop_oneof![
            Just("pm2_5"),
            Just("pm10"),
            Just("no"),
            Just("no2"),
            Just("co"),
            Just("so2"),
            Just("o3"),
            Just("extra"),
        ];
        (
            proptest::collection::btree_map(field, raw_value(), 0..8),
            any::<bool>(),
        )
            .prop_map(|(fields, nested)| {
                let map: Map<String, Value> =
                    fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
                if nested {
                    json!({ "pollutants": Value::Object(map) })
                } else {
                    Value::Object(map)
                }
            })
    }

    proptest! {
        #[test]
        fn prop_numbers_survive(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let reading = normalize(&json!({ "o3": v }), &schema());
            prop_assert_eq!(reading.get("o3"), Some(v));
        }

        #[test]
        fn prop_always_complete_and_finite(input in raw_payload()) {
            let reading = normalize(&input, &schema());
            let fields: Vec<&str> = reading.fields().collect();
            prop_assert_eq!(fields, crate::CANONICAL_FIELDS.to_vec());
            prop_assert!(reading.iter().all(|(_, v)| v.is_finite()));
        }

        #[test]
        fn prop_idempotent(input in raw_payload()) {
            let once = normalize(&input, &schema());
            let again = normalize(&serde_json::to_value(&once).unwrap(), &schema());
            prop_assert_eq!(once, again);
        }
    }
}
