use crate::error::{AppError, Result};
use crate::ml::features::{transport_column, BASE_COLUMNS, TRANSPORT_PREFIX};
use crate::models::{Frequency, Gender, TransportMode, YesNo};
use ndarray::Array2;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// One row of the obesity survey CSV, with the dataset's own column names
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetRecord {
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Height")]
    pub height: f64,
    #[serde(rename = "Weight")]
    pub weight: f64,
    pub family_history: String,
    #[serde(rename = "FAVC")]
    pub favc: String,
    #[serde(rename = "FCVC")]
    pub fcvc: f64,
    #[serde(rename = "NCP")]
    pub ncp: f64,
    #[serde(rename = "CAEC")]
    pub caec: String,
    #[serde(rename = "SMOKE")]
    pub smoke: String,
    #[serde(rename = "CH2O")]
    pub ch2o: f64,
    #[serde(rename = "SCC")]
    pub scc: String,
    #[serde(rename = "FAF")]
    pub faf: f64,
    #[serde(rename = "TUE")]
    pub tue: f64,
    #[serde(rename = "CALC")]
    pub calc: String,
    #[serde(rename = "MTRANS")]
    pub mtrans: String,
    #[serde(rename = "Obesity")]
    pub obesity: String,
}

impl DatasetRecord {
    /// Base feature values in [`BASE_COLUMNS`] order.
    ///
    /// Survey ordinals are rounded half-to-even. Categorical values outside
    /// the known vocabulary become 0.
    pub fn base_values(&self) -> [f64; 15] {
        [
            category::<Gender>(&self.gender, Gender::code),
            self.age,
            self.height,
            self.weight,
            category::<YesNo>(&self.family_history, YesNo::code),
            category::<YesNo>(&self.favc, YesNo::code),
            self.fcvc.round_ties_even(),
            self.ncp.round_ties_even(),
            category::<Frequency>(&self.caec, Frequency::code),
            category::<YesNo>(&self.smoke, YesNo::code),
            self.ch2o.round_ties_even(),
            category::<YesNo>(&self.scc, YesNo::code),
            self.faf.round_ties_even(),
            self.tue.round_ties_even(),
            category::<Frequency>(&self.calc, Frequency::code),
        ]
    }
}

fn category<T: FromStr>(value: &str, code: fn(&T) -> f64) -> f64 {
    match value.trim().parse::<T>() {
        Ok(parsed) => code(&parsed),
        Err(_) => {
            debug!(value, "Unmapped categorical value, using 0");
            0.0
        }
    }
}

/// One-hot column name for a transport value as spelled in the dataset
pub fn transport_dummy_column(value: &str) -> String {
    match value.trim().parse::<TransportMode>() {
        Ok(mode) => transport_column(mode),
        Err(_) => format!("{}{}", TRANSPORT_PREFIX, value.trim().to_lowercase()),
    }
}

/// Numeric design matrix plus raw target labels
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x: Array2<f64>,
    pub labels: Vec<String>,
    pub feature_columns: Vec<String>,
}

/// Loaded survey rows
#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    records: Vec<DatasetRecord>,
}

impl TrainingDataset {
    pub fn new(records: Vec<DatasetRecord>) -> Self {
        Self { records }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            AppError::Training(format!("cannot open dataset {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file)?;
        info!(path = %path.display(), rows = dataset.len(), "Dataset loaded");
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let records = csv_reader
            .deserialize()
            .collect::<std::result::Result<Vec<DatasetRecord>, csv::Error>>()?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build the design matrix.
    ///
    /// Transport dummies follow the base columns, one per distinct dataset
    /// spelling in sorted order; `drop_first` removes the first of them.
    pub fn prepare(&self, drop_first: bool) -> Result<PreparedData> {
        if self.records.is_empty() {
            return Err(AppError::Training("dataset has no rows".to_string()));
        }

        let categories: BTreeSet<&str> = self.records.iter().map(|r| r.mtrans.trim()).collect();
        let mut dummies: Vec<String> = Vec::with_capacity(categories.len());
        for category in categories.iter().skip(usize::from(drop_first)) {
            let column = transport_dummy_column(category);
            if !dummies.contains(&column) {
                dummies.push(column);
            }
        }

        let mut feature_columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        feature_columns.extend(dummies.iter().cloned());
        let n_features = feature_columns.len();

        let mut values = Vec::with_capacity(self.records.len() * n_features);
        for record in &self.records {
            values.extend_from_slice(&record.base_values());
            let own = transport_dummy_column(&record.mtrans);
            values.extend(dummies.iter().map(|d| if *d == own { 1.0 } else { 0.0 }));
        }

        let x = Array2::from_shape_vec((self.records.len(), n_features), values)
            .map_err(|e| AppError::Internal(format!("design matrix shape: {}", e)))?;
        let labels = self.records.iter().map(|r| r.obesity.clone()).collect();

        debug!(
            rows = self.records.len(),
            n_features,
            transport_columns = ?dummies,
            "Dataset prepared"
        );

        Ok(PreparedData {
            x,
            labels,
            feature_columns,
        })
    }
}
