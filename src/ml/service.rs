use crate::error::{AppError, Result};
use crate::metrics::{DIAGNOSES_TOTAL, DIAGNOSIS_DURATION_SECONDS, DIAGNOSIS_ERRORS_TOTAL};
use crate::ml::artifacts::ModelArtifacts;
use crate::ml::classifier::argmax;
use crate::ml::features::{FeatureEncoder, FeatureVector};
use crate::ml::models::{ClassProbability, Prediction};
use crate::models::{Diagnosis, RawInput};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn};

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Encoder plus inference adapter over one set of loaded artifacts.
///
/// All front-ends go through this type. It holds no mutable state, so a
/// single instance can be shared across request handlers.
#[derive(Debug, Clone)]
pub struct DiagnosisService {
    artifacts: Arc<ModelArtifacts>,
    encoder: FeatureEncoder,
}

impl DiagnosisService {
    pub fn new(artifacts: Arc<ModelArtifacts>) -> Self {
        let encoder = FeatureEncoder::new(artifacts.schema().clone());
        Self { artifacts, encoder }
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    /// Map a raw record to the model's feature vector
    pub fn encode(&self, raw: &RawInput) -> FeatureVector {
        self.encoder.encode(raw)
    }

    /// Run the classifier on an aligned vector
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        if features.columns() != self.artifacts.feature_columns() {
            return Err(AppError::SchemaMismatch(
                "feature vector columns differ from the model schema".to_string(),
            ));
        }

        let proba = self
            .artifacts
            .classifier()
            .predict_proba(&features.to_array())
            .map_err(|e| match e {
                AppError::Inference(_) => e,
                other => AppError::Inference(other.to_string()),
            })?;

        let classes = self.artifacts.label_encoder().classes();
        if proba.nrows() != 1 || proba.ncols() != classes.len() {
            return Err(AppError::Inference(format!(
                "classifier returned {}x{} probabilities, expected 1x{}",
                proba.nrows(),
                proba.ncols(),
                classes.len()
            )));
        }

        let row = proba.row(0);
        if row.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(AppError::Inference(
                "classifier returned an invalid probability".to_string(),
            ));
        }
        let total = row.sum();
        if total <= 0.0 {
            return Err(AppError::Inference(
                "classifier returned an all-zero distribution".to_string(),
            ));
        }
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            warn!(total, "Class probabilities do not sum to 1, renormalizing");
        }

        let probabilities: Vec<ClassProbability> = classes
            .iter()
            .zip(row.iter())
            .map(|(label, p)| ClassProbability::new(label.as_str(), p / total))
            .collect();

        let index = argmax(probabilities.iter().map(|p| p.probability));
        let label = self.artifacts.label_encoder().inverse_transform(index)?.to_string();
        let confidence = probabilities[index].probability;

        debug!(label = %label, confidence, "Prediction computed");

        Ok(Prediction {
            label,
            index,
            confidence,
            probabilities,
        })
    }

    /// Encode, predict and attach a risk level
    pub fn diagnose(&self, raw: &RawInput) -> Result<Diagnosis> {
        let span = info_span!("diagnose", transport_mode = %raw.transport_mode);
        let _guard = span.enter();
        let start = Instant::now();

        let result = self
            .predict(&self.encode(raw))
            .map(Diagnosis::from_prediction);

        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(diagnosis) => {
                let risk_level = diagnosis.risk_level.to_string();
                DIAGNOSES_TOTAL
                    .with_label_values(&[&diagnosis.label, &risk_level])
                    .inc();
                DIAGNOSIS_DURATION_SECONDS
                    .with_label_values(&["success"])
                    .observe(elapsed);
                debug!(
                    id = %diagnosis.id,
                    label = %diagnosis.label,
                    risk_level = %risk_level,
                    "Diagnosis complete"
                );
            }
            Err(e) => {
                DIAGNOSIS_ERRORS_TOTAL
                    .with_label_values(&[e.error_code()])
                    .inc();
                DIAGNOSIS_DURATION_SECONDS
                    .with_label_values(&["error"])
                    .observe(elapsed);
                warn!(error = %e, "Diagnosis failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::Classifier;
    use crate::ml::features::FeatureSchema;
    use crate::ml::models::{LabelEncoder, ModelMetadata, ModelType};
    use crate::models::RiskLevel;
    use ndarray::Array2;

    #[derive(Debug)]
    struct Fixed {
        proba: Vec<f64>,
        n_features: usize,
    }

    impl Classifier for Fixed {
        fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
            let mut out = Array2::zeros((features.nrows(), self.proba.len()));
            for mut row in out.rows_mut() {
                for (o, p) in row.iter_mut().zip(&self.proba) {
                    *o = *p;
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

    fn service(proba: Vec<f64>) -> DiagnosisService {
        let schema = FeatureSchema::canonical();
        let labels = LabelEncoder::fit(&["Normal_Weight", "Obesity_Type_I", "Overweight_Level_I"]);
        let classifier = Fixed {
            proba,
            n_features: schema.len(),
        };
        let artifacts = ModelArtifacts::new(
            Arc::new(classifier),
            labels,
            schema,
            ModelMetadata::new("fixed", ModelType::Custom),
        )
        .unwrap();
        DiagnosisService::new(Arc::new(artifacts))
    }

    #[test]
    fn test_predict_picks_argmax() {
        let service = service(vec![0.2, 0.5, 0.3]);
        let features = service.encode(&RawInput::default());
        let prediction = service.predict(&features).unwrap();

        assert_eq!(prediction.label, "Obesity_Type_I");
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.confidence, 0.5);
        let labels: Vec<&str> = prediction.probabilities.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Normal_Weight", "Obesity_Type_I", "Overweight_Level_I"]);
    }

    #[test]
    fn test_ties_go_to_first_class() {
        let service = service(vec![0.4, 0.4, 0.2]);
        let prediction = service.predict(&service.encode(&RawInput::default())).unwrap();
        assert_eq!(prediction.label, "Normal_Weight");
    }

    #[test]
    fn test_unnormalized_output_is_rescaled() {
        let service = service(vec![2.0, 1.0, 1.0]);
        let prediction = service.predict(&service.encode(&RawInput::default())).unwrap();
        assert!((prediction.total_probability() - 1.0).abs() < 1e-6);
        assert_eq!(prediction.confidence, 0.5);
    }

    #[test]
    fn test_invalid_distribution_is_inference_error() {
        let service = service(vec![0.0, 0.0, 0.0]);
        let err = service.predict(&service.encode(&RawInput::default())).unwrap_err();
        assert!(matches!(err, AppError::Inference(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_foreign_vector_is_rejected() {
        let service = service(vec![1.0, 0.0, 0.0]);
        let schema = FeatureSchema::new(vec!["age".to_string()]).unwrap();
        let vector = FeatureEncoder::new(schema).encode(&RawInput::default());
        assert!(matches!(
            service.predict(&vector),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_diagnose_sets_risk_level() {
        let service = service(vec![0.1, 0.2, 0.7]);
        let diagnosis = service.diagnose(&RawInput::default()).unwrap();
        assert_eq!(diagnosis.label, "Overweight_Level_I");
        assert_eq!(diagnosis.risk_level, RiskLevel::Elevated);
    }
}
