use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::artifacts::{ArtifactBundle, FORMAT_VERSION};
use crate::ml::classifier::{Classifier, ForestParams, RandomForest};
use crate::ml::models::{FeatureImportance, LabelEncoder, ModelMetadata, ModelMetrics, ModelType};
use crate::training::dataset::TrainingDataset;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Instant;
use tracing::info;

pub const MODEL_NAME: &str = "obesity-risk-random-forest";

/// Fits a random forest on a survey dataset and packages the artifacts
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train and return the bundle ready to be saved.
    ///
    /// With `test_size > 0` the forest is fit on the training split only and
    /// the holdout scores are recorded in the metadata.
    pub fn train(&self, dataset: &TrainingDataset) -> Result<ArtifactBundle> {
        let start = Instant::now();
        let test_size = self.config.test_size;
        if !(0.0..1.0).contains(&test_size) {
            return Err(AppError::Training(format!(
                "test_size must be in [0, 1), got {}",
                test_size
            )));
        }

        let prepared = dataset.prepare(self.config.drop_first)?;
        let label_encoder = LabelEncoder::fit(&prepared.labels);
        let y = prepared
            .labels
            .iter()
            .map(|label| label_encoder.transform(label))
            .collect::<Result<Vec<usize>>>()?;

        let params = ForestParams::from(&self.config);
        let n_samples = prepared.x.nrows();

        let (classifier, validation_metrics, n_training_samples) = if test_size > 0.0 {
            let (train_idx, test_idx) = holdout_split(n_samples, test_size, self.config.seed)?;

            let x_train = prepared.x.select(Axis(0), &train_idx);
            let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
            let forest = RandomForest::fit(&x_train, &y_train, label_encoder.len(), &params)?;

            let x_test = prepared.x.select(Axis(0), &test_idx);
            let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();
            let y_pred = forest.predict(&x_test)?;
            let metrics = ModelMetrics::evaluate(&y_test, &y_pred, label_encoder.classes());

            info!(
                accuracy = metrics.accuracy,
                f1_score = metrics.f1_score,
                test_rows = test_idx.len(),
                "Holdout evaluation complete"
            );

            (forest, Some(metrics), train_idx.len())
        } else {
            let forest = RandomForest::fit(&prepared.x, &y, label_encoder.len(), &params)?;
            (forest, None, n_samples)
        };

        let mut importances: Vec<FeatureImportance> = prepared
            .feature_columns
            .iter()
            .zip(classifier.feature_importances())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let mut metadata = ModelMetadata::new(MODEL_NAME, ModelType::RandomForest);
        metadata.n_training_samples = n_training_samples;
        metadata.n_features = prepared.feature_columns.len();
        metadata.validation_metrics = validation_metrics;
        metadata.hyperparameters = classifier.params().to_map();
        metadata
            .hyperparameters
            .insert("drop_first".to_string(), self.config.drop_first.to_string());
        metadata
            .hyperparameters
            .insert("test_size".to_string(), test_size.to_string());
        metadata.feature_importances = importances;

        info!(
            samples = n_training_samples,
            features = metadata.n_features,
            classes = label_encoder.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training complete"
        );

        Ok(ArtifactBundle {
            format_version: FORMAT_VERSION,
            classifier,
            label_encoder,
            feature_columns: prepared.feature_columns,
            metadata,
        })
    }
}

/// Seeded shuffle split, returning (train, test) row indices
fn holdout_split(n_samples: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = (n_samples as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(AppError::Training(format!(
            "test_size {} leaves no rows on one side of a {}-row split",
            test_size, n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holdout_split_sizes() {
        let (train, test) = holdout_split(10, 0.2, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_holdout_split_is_seeded() {
        assert_eq!(holdout_split(50, 0.3, 7).unwrap(), holdout_split(50, 0.3, 7).unwrap());
    }

    #[test]
    fn test_holdout_split_rejects_degenerate() {
        assert!(holdout_split(1, 0.5, 42).is_err());
    }

    #[test]
    fn test_rejects_bad_test_size() {
        let trainer = Trainer::new(TrainingConfig {
            test_size: 1.5,
            ..TrainingConfig::default()
        });
        let err = trainer.train(&TrainingDataset::default()).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }
}
