use crate::error::{AppError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps target class labels to contiguous indices.
///
/// Classes are kept sorted and de-duplicated, so index order is the
/// lexicographic order of the labels seen at fit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the raw target column
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Rebuild from an already-ordered class list
    pub fn from_classes(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(AppError::SchemaMismatch(
                "label encoder has no classes".to_string(),
            ));
        }
        if classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::SchemaMismatch(
                "label encoder classes must be sorted and unique".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn transform(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| AppError::Validation(format!("unknown class label '{}'", label)))
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::Inference(format!(
                    "class index {} outside label encoder range 0..{}",
                    index,
                    self.classes.len()
                ))
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Probability assigned to one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

impl ClassProbability {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Prediction result with confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class label
    pub label: String,

    /// Predicted class index in label-encoder order
    pub index: usize,

    /// Probability of the predicted class (0.0 - 1.0)
    pub confidence: f64,

    /// All class probabilities, in label-encoder order
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }

    pub fn total_probability(&self) -> f64 {
        self.probabilities.iter().map(|p| p.probability).sum()
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Confusion matrix (rows = true class, columns = predicted class)
    pub confusion_matrix: Option<Array2<usize>>,

    /// Per-class metrics keyed by class label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: None,
            per_class_metrics: BTreeMap::new(),
        }
    }

    /// Score predicted class indices against the truth
    pub fn evaluate(y_true: &[usize], y_pred: &[usize], classes: &[String]) -> Self {
        let n_samples = y_true.len();
        let n_classes = classes.len();
        if n_samples == 0 || n_classes == 0 {
            return Self::new();
        }

        let mut confusion = Array2::<usize>::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < n_classes && p < n_classes {
                confusion[[t, p]] += 1;
            }
        }

        let correct: usize = (0..n_classes).map(|i| confusion[[i, i]]).sum();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = BTreeMap::new();
        for (class_idx, label) in classes.iter().enumerate() {
            let tp = confusion[[class_idx, class_idx]];
            let predicted: usize = confusion.column(class_idx).sum();
            let support: usize = confusion.row(class_idx).sum();

            let precision = if predicted > 0 {
                tp as f64 / predicted as f64
            } else {
                0.0
            };

            let recall = if support > 0 {
                tp as f64 / support as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support,
                },
            );
        }

        let avg = |f: fn(&ClassMetrics) -> f64| {
            per_class.values().map(f).sum::<f64>() / n_classes as f64
        };

        Self {
            accuracy,
            precision: avg(|m| m.precision),
            recall: avg(|m| m.recall),
            f1_score: avg(|m| m.f1_score),
            confusion_matrix: Some(confusion),
            per_class_metrics: per_class,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Importance of one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Holdout metrics, when a split was requested
    #[serde(default)]
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, String>,

    /// Impurity-based importances, highest first
    #[serde(default)]
    pub feature_importances: Vec<FeatureImportance>,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_type,
            trained_at: chrono::Utc::now(),
            n_training_samples: 0,
            n_features: 0,
            validation_metrics: None,
            hyperparameters: BTreeMap::new(),
            feature_importances: Vec::new(),
        }
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Random forest
    RandomForest,

    /// Hand-built or test classifier
    Custom,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
            ModelType::Custom => write!(f, "Custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[test]
    fn test_label_encoder_sorts_and_dedups() {
        let encoder = LabelEncoder::fit(&["Obesity_Type_I", "Normal_Weight", "Obesity_Type_I"]);
        assert_eq!(encoder.classes(), &["Normal_Weight", "Obesity_Type_I"]);
        assert_eq!(encoder.transform("Obesity_Type_I").unwrap(), 1);
        assert_eq!(encoder.inverse_transform(0).unwrap(), "Normal_Weight");
        assert!(encoder.transform("Unknown").is_err());
        assert!(encoder.inverse_transform(2).is_err());
    }

    #[test]
    fn test_label_encoder_from_classes_rejects_unsorted() {
        assert!(LabelEncoder::from_classes(vec!["b".into(), "a".into()]).is_err());
        assert!(LabelEncoder::from_classes(vec![]).is_err());
        assert!(LabelEncoder::from_classes(classes()).is_ok());
    }

    #[test]
    fn test_metrics_evaluate() {
        let y_true = vec![0, 0, 1, 1, 2, 2];
        let y_pred = vec![0, 0, 1, 2, 2, 2];

        let metrics = ModelMetrics::evaluate(&y_true, &y_pred, &classes());

        assert!((metrics.accuracy - 5.0 / 6.0).abs() < 1e-12);
        let b = &metrics.per_class_metrics["b"];
        assert_eq!(b.support, 2);
        assert_eq!(b.precision, 1.0);
        assert_eq!(b.recall, 0.5);
        let confusion = metrics.confusion_matrix.unwrap();
        assert_eq!(confusion[[1, 2]], 1);
    }

    #[test]
    fn test_metrics_evaluate_empty() {
        let metrics = ModelMetrics::evaluate(&[], &[], &classes());
        assert_eq!(metrics.accuracy, 0.0);
        assert!(metrics.per_class_metrics.is_empty());
    }

    #[test]
    fn test_prediction_helpers() {
        let prediction = Prediction {
            label: "b".to_string(),
            index: 1,
            confidence: 0.7,
            probabilities: vec![
                ClassProbability::new("a", 0.3),
                ClassProbability::new("b", 0.7),
            ],
        };
        assert_eq!(prediction.probability_of("a"), Some(0.3));
        assert_eq!(prediction.probability_of("z"), None);
        assert!((prediction.total_probability() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_type_display() {
        assert_eq!(ModelType::RandomForest.to_string(), "Random Forest");
        assert_eq!(ModelType::Custom.to_string(), "Custom");
    }
}
