//! Shared fixtures for integration tests: patient records, a synthetic
//! survey dataset and classifier test doubles.
#![allow(dead_code)]

use ndarray::Array2;
use obesity_risk::{
    error::{AppError, Result},
    ml::{
        Classifier, FeatureSchema, LabelEncoder, ModelArtifacts, ModelMetadata, ModelType,
    },
    models::{Frequency, Gender, RawInput, YesNo},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CLASSES: [&str; 7] = [
    "Insufficient_Weight",
    "Normal_Weight",
    "Obesity_Type_I",
    "Obesity_Type_II",
    "Obesity_Type_III",
    "Overweight_Level_I",
    "Overweight_Level_II",
];

const TRANSPORT_SPELLINGS: [&str; 5] = [
    "Public_Transportation",
    "Walking",
    "Automobile",
    "Motorbike",
    "Bike",
];

/// The reference patient: 25-year-old man, sometimes snacks and drinks,
/// commutes by public transport
pub fn sample_input() -> RawInput {
    RawInput {
        gender: Gender::Male,
        age: 25,
        height: 1.70,
        weight: 70.0,
        family_history: YesNo::Yes,
        frequent_caloric_food: YesNo::Yes,
        vegetable_frequency: 2,
        meals_per_day: 3,
        snacking_frequency: Frequency::Sometimes,
        smoker: YesNo::No,
        water_intake: 2,
        monitors_calories: YesNo::No,
        physical_activity: 1,
        screen_time: 1,
        alcohol_frequency: Frequency::Sometimes,
        transport_mode: "public_transport".to_string(),
    }
}

pub fn label_encoder() -> LabelEncoder {
    LabelEncoder::fit(&CLASSES)
}

/// Returns the same distribution for every row
#[derive(Debug)]
pub struct StubClassifier {
    pub proba: Vec<f64>,
    pub n_features: usize,
}

impl Classifier for StubClassifier {
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((features.nrows(), self.proba.len()));
        for mut row in out.rows_mut() {
            for (slot, p) in row.iter_mut().zip(&self.proba) {
                *slot = *p;
            }
        }
        Ok(out)
    }

    fn n_classes(&self) -> usize {
        self.proba.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn model_type(&self) -> ModelType {
        ModelType::Custom
    }
}

/// Always fails at inference time
#[derive(Debug)]
pub struct FailingClassifier {
    pub n_features: usize,
    pub n_classes: usize,
}

impl Classifier for FailingClassifier {
    fn predict_proba(&self, _features: &Array2<f64>) -> Result<Array2<f64>> {
        Err(AppError::Inference("numeric overflow in tree 3".to_string()))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn model_type(&self) -> ModelType {
        ModelType::Custom
    }
}

/// Artifacts over the canonical schema and the seven survey classes
pub fn artifacts_with(classifier: Arc<dyn Classifier>) -> ModelArtifacts {
    ModelArtifacts::new(
        classifier,
        label_encoder(),
        FeatureSchema::canonical(),
        ModelMetadata::new("stub", ModelType::Custom),
    )
    .unwrap()
}

pub fn stub_artifacts(proba: Vec<f64>) -> ModelArtifacts {
    let n_features = FeatureSchema::canonical().len();
    artifacts_with(Arc::new(StubClassifier { proba, n_features }))
}

pub fn failing_artifacts() -> ModelArtifacts {
    artifacts_with(Arc::new(FailingClassifier {
        n_features: FeatureSchema::canonical().len(),
        n_classes: CLASSES.len(),
    }))
}

/// Deterministic survey rows whose label follows BMI band
pub fn synthetic_csv(rows: usize) -> String {
    let mut csv = String::from(
        "Gender,Age,Height,Weight,family_history,FAVC,FCVC,NCP,CAEC,SMOKE,CH2O,SCC,FAF,TUE,CALC,MTRANS,Obesity\n",
    );
    let bands = [
        (17.0, "Insufficient_Weight"),
        (22.0, "Normal_Weight"),
        (27.5, "Overweight_Level_I"),
        (33.0, "Obesity_Type_I"),
    ];
    let frequencies = ["no", "Sometimes", "Frequently", "Always"];

    for i in 0..rows {
        let (bmi, label) = bands[i % bands.len()];
        let bmi = bmi + ((i / bands.len()) % 5) as f64 * 0.3;
        let height = 1.55 + (i % 9) as f64 * 0.04;
        let weight = bmi * height * height;
        csv.push_str(&format!(
            "{},{},{:.2},{:.1},{},{},{:.3},{:.3},{},{},{:.3},{},{:.3},{:.3},{},{},{}\n",
            if i % 2 == 0 { "Male" } else { "Female" },
            18.0 + (i % 40) as f64 + 0.5,
            height,
            weight,
            if i % 3 == 0 { "yes" } else { "no" },
            if i % 4 == 0 { "no" } else { "yes" },
            1.0 + (i % 5) as f64 * 0.45,
            1.0 + (i % 7) as f64 * 0.5,
            frequencies[i % 4],
            if i % 11 == 0 { "yes" } else { "no" },
            1.0 + (i % 3) as f64 * 0.9,
            if i % 6 == 0 { "yes" } else { "no" },
            (i % 4) as f64 * 0.8,
            (i % 3) as f64 * 0.7,
            frequencies[(i / 2) % 4],
            TRANSPORT_SPELLINGS[i % TRANSPORT_SPELLINGS.len()],
            label,
        ));
    }
    csv
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
