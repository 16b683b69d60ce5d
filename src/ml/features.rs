use crate::error::{AppError, Result};
use crate::models::{RawInput, TransportMode};
use ndarray::{Array1, Array2, Axis};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use strum::IntoEnumIterator;

pub const GENDER: &str = "gender";
pub const AGE: &str = "age";
pub const HEIGHT: &str = "height";
pub const WEIGHT: &str = "weight";
pub const FAMILY_HISTORY: &str = "family_history";
pub const FREQUENT_CALORIC_FOOD: &str = "frequent_caloric_food";
pub const VEGETABLE_FREQUENCY: &str = "vegetable_frequency";
pub const MEALS_PER_DAY: &str = "meals_per_day";
pub const SNACKING_FREQUENCY: &str = "snacking_frequency";
pub const SMOKER: &str = "smoker";
pub const WATER_INTAKE: &str = "water_intake";
pub const MONITORS_CALORIES: &str = "monitors_calories";
pub const PHYSICAL_ACTIVITY: &str = "physical_activity";
pub const SCREEN_TIME: &str = "screen_time";
pub const ALCOHOL_FREQUENCY: &str = "alcohol_frequency";

/// Non-transport columns in canonical order
pub const BASE_COLUMNS: [&str; 15] = [
    GENDER,
    AGE,
    HEIGHT,
    WEIGHT,
    FAMILY_HISTORY,
    FREQUENT_CALORIC_FOOD,
    VEGETABLE_FREQUENCY,
    MEALS_PER_DAY,
    SNACKING_FREQUENCY,
    SMOKER,
    WATER_INTAKE,
    MONITORS_CALORIES,
    PHYSICAL_ACTIVITY,
    SCREEN_TIME,
    ALCOHOL_FREQUENCY,
];

pub const TRANSPORT_PREFIX: &str = "transport_mode_";

/// One-hot column name for a transport category
pub fn transport_column(mode: TransportMode) -> String {
    format!("{}{}", TRANSPORT_PREFIX, mode)
}

/// Ordered, validated list of feature-column names a classifier was fit on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(AppError::SchemaMismatch(
                "feature column list is empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                return Err(AppError::SchemaMismatch(format!(
                    "feature column at position {} is blank",
                    position
                )));
            }
            if !seen.insert(column.as_str()) {
                return Err(AppError::SchemaMismatch(format!(
                    "duplicate feature column '{}'",
                    column
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Base columns followed by one column per known transport category
    pub fn canonical() -> Self {
        let columns = BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(TransportMode::iter().map(transport_column))
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Reindex an expanded record against this schema. Columns the record
    /// lacks are filled with 0, columns the schema lacks are dropped.
    pub fn align(&self, expanded: &[(String, f64)]) -> FeatureVector {
        let lookup: HashMap<&str, f64> = expanded
            .iter()
            .map(|(column, value)| (column.as_str(), *value))
            .collect();

        let values = self
            .columns
            .iter()
            .map(|column| lookup.get(column.as_str()).copied().unwrap_or(0.0))
            .collect();

        FeatureVector {
            columns: self.columns.clone(),
            values,
        }
    }
}

impl Serialize for FeatureSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.columns.serialize(serializer)
    }
}

/// Numeric feature vector aligned to a [`FeatureSchema`]
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Single-row matrix for classifier input
    pub fn to_array(&self) -> Array2<f64> {
        Array1::from_vec(self.values.clone()).insert_axis(Axis(0))
    }
}

/// Serialized as an ordered `{column: value}` object
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &value)?;
        }
        map.end()
    }
}

/// Map a raw record to named numeric columns before schema alignment.
///
/// Emits the base columns followed by the transport one-hot block. An
/// unrecognized transport string yields a block of zeros.
pub fn expand(raw: &RawInput) -> Vec<(String, f64)> {
    let base = [
        raw.gender.code(),
        raw.age as f64,
        raw.height,
        raw.weight,
        raw.family_history.code(),
        raw.frequent_caloric_food.code(),
        raw.vegetable_frequency as f64,
        raw.meals_per_day as f64,
        raw.snacking_frequency.code(),
        raw.smoker.code(),
        raw.water_intake as f64,
        raw.monitors_calories.code(),
        raw.physical_activity as f64,
        raw.screen_time as f64,
        raw.alcohol_frequency.code(),
    ];

    let transport = raw.transport();
    if transport.is_none() {
        tracing::debug!(
            transport_mode = %raw.transport_mode,
            "Unrecognized transport mode, encoding as all-zero block"
        );
    }

    let mut expanded: Vec<(String, f64)> = BASE_COLUMNS
        .iter()
        .zip(base)
        .map(|(column, value)| (column.to_string(), value))
        .collect();

    expanded.extend(TransportMode::iter().map(|mode| {
        let hot = if Some(mode) == transport { 1.0 } else { 0.0 };
        (transport_column(mode), hot)
    }));

    expanded
}

/// Encode one record against an explicit column list
pub fn encode(raw: &RawInput, feature_columns: &[String]) -> Result<FeatureVector> {
    let schema = FeatureSchema::new(feature_columns.to_vec())?;
    Ok(schema.align(&expand(raw)))
}

/// Encoder bound to a validated schema, reused across requests
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
}

impl FeatureEncoder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encode(&self, raw: &RawInput) -> FeatureVector {
        self.schema.align(&expand(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, Gender, YesNo};

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_schema_rejects_malformed_columns() {
        assert!(matches!(
            FeatureSchema::new(vec![]),
            Err(AppError::SchemaMismatch(_))
        ));
        assert!(matches!(
            FeatureSchema::new(columns(&["age", " "])),
            Err(AppError::SchemaMismatch(_))
        ));
        assert!(matches!(
            FeatureSchema::new(columns(&["age", "age"])),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_canonical_schema_layout() {
        let schema = FeatureSchema::canonical();
        assert_eq!(schema.len(), 20);
        assert_eq!(schema.columns()[0], GENDER);
        assert_eq!(schema.columns()[14], ALCOHOL_FREQUENCY);
        assert_eq!(schema.columns()[15], "transport_mode_public_transport");
        assert_eq!(schema.columns()[19], "transport_mode_bike");
    }

    #[test]
    fn test_expand_mapping_table() {
        let raw = RawInput {
            gender: Gender::Female,
            family_history: YesNo::Yes,
            snacking_frequency: Frequency::Frequently,
            alcohol_frequency: Frequency::Always,
            ..RawInput::default()
        };
        let expanded: HashMap<String, f64> = expand(&raw).into_iter().collect();

        assert_eq!(expanded[GENDER], 0.0);
        assert_eq!(expanded[FAMILY_HISTORY], 1.0);
        assert_eq!(expanded[SNACKING_FREQUENCY], 2.0);
        assert_eq!(expanded[ALCOHOL_FREQUENCY], 3.0);
        assert_eq!(expanded[AGE], 25.0);
        assert_eq!(expanded["transport_mode_public_transport"], 1.0);
        assert_eq!(expanded["transport_mode_walking"], 0.0);
    }

    #[test]
    fn test_align_fills_missing_and_drops_extra() {
        let schema = FeatureSchema::new(columns(&["age", "not_in_record", "gender"])).unwrap();
        let vector = schema.align(&expand(&RawInput::default()));

        assert_eq!(vector.columns(), schema.columns());
        assert_eq!(vector.values(), &[25.0, 0.0, 1.0]);
        assert!(vector.get("transport_mode_walking").is_none());
    }

    #[test]
    fn test_unknown_transport_is_all_zero() {
        let raw = RawInput {
            transport_mode: "jetpack".to_string(),
            ..RawInput::default()
        };
        let vector = FeatureEncoder::new(FeatureSchema::canonical()).encode(&raw);
        let hot: f64 = vector
            .iter()
            .filter(|(c, _)| c.starts_with(TRANSPORT_PREFIX))
            .map(|(_, v)| v)
            .sum();
        assert_eq!(hot, 0.0);
    }

    #[test]
    fn test_encode_with_bad_columns_is_schema_mismatch() {
        let err = encode(&RawInput::default(), &[]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_vector_serializes_in_column_order() {
        let schema = FeatureSchema::new(columns(&["weight", "age"])).unwrap();
        let vector = schema.align(&expand(&RawInput::default()));
        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, r#"{"weight":70.0,"age":25.0}"#);

        let array = vector.to_array();
        assert_eq!(array.shape(), &[1, 2]);
        assert_eq!(array[[0, 1]], 25.0);
    }
}
