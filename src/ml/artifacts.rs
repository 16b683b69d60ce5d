use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, RandomForest};
use crate::ml::features::FeatureSchema;
use crate::ml::models::{LabelEncoder, ModelMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Current on-disk layout version
pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of a trained model, written by the trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub format_version: u32,
    pub classifier: RandomForest,
    pub label_encoder: LabelEncoder,

    /// Absent in malformed bundles, rejected as a schema mismatch on load
    #[serde(default)]
    pub feature_columns: Vec<String>,

    pub metadata: ModelMetadata,
}

impl ArtifactBundle {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;

        info!(path = %path.display(), "Model artifacts saved");
        Ok(())
    }

    /// Read a bundle from disk.
    ///
    /// `feature_columns` is checked before the typed parse so that a column
    /// list of the wrong shape surfaces as a schema mismatch, not as a
    /// corrupt file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let corrupt = |e: serde_json::Error| {
            AppError::ArtifactLoad(format!("corrupt artifact bundle {}: {}", path.display(), e))
        };

        let file = File::open(path).map_err(|e| {
            AppError::ArtifactLoad(format!("cannot open {}: {}", path.display(), e))
        })?;

        let mut document: Value = serde_json::from_reader(BufReader::new(file)).map_err(corrupt)?;
        let feature_columns = take_feature_columns(&mut document)?;

        let mut bundle: Self = serde_json::from_value(document).map_err(corrupt)?;
        bundle.feature_columns = feature_columns;
        Ok(bundle)
    }
}

/// Remove `feature_columns` from a raw bundle, requiring a list of strings.
/// A missing field yields an empty list, which schema validation rejects.
fn take_feature_columns(document: &mut Value) -> Result<Vec<String>> {
    let raw = match document
        .as_object_mut()
        .and_then(|fields| fields.remove("feature_columns"))
    {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };

    let items = raw.as_array().ok_or_else(|| {
        AppError::SchemaMismatch(format!("feature_columns must be a list, got {}", raw))
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                AppError::SchemaMismatch(format!(
                    "feature column {} must be a string, got {}",
                    index, item
                ))
            })
        })
        .collect()
}

/// Immutable, validated model loaded once and shared read-only
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    classifier: Arc<dyn Classifier>,
    label_encoder: LabelEncoder,
    schema: FeatureSchema,
    metadata: ModelMetadata,
}

impl ModelArtifacts {
    /// Assemble artifacts, checking classifier shape against schema and labels
    pub fn new(
        classifier: Arc<dyn Classifier>,
        label_encoder: LabelEncoder,
        schema: FeatureSchema,
        metadata: ModelMetadata,
    ) -> Result<Self> {
        if classifier.n_features() != schema.len() {
            return Err(AppError::SchemaMismatch(format!(
                "classifier expects {} features but schema lists {} columns",
                classifier.n_features(),
                schema.len()
            )));
        }
        if classifier.n_classes() != label_encoder.len() {
            return Err(AppError::SchemaMismatch(format!(
                "classifier has {} classes but label encoder has {}",
                classifier.n_classes(),
                label_encoder.len()
            )));
        }

        Ok(Self {
            classifier,
            label_encoder,
            schema,
            metadata,
        })
    }

    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self> {
        if bundle.format_version != FORMAT_VERSION {
            return Err(AppError::ArtifactLoad(format!(
                "unsupported artifact format version {} (expected {})",
                bundle.format_version, FORMAT_VERSION
            )));
        }

        bundle.classifier.validate()?;
        let schema = FeatureSchema::new(bundle.feature_columns)?;
        let label_encoder = LabelEncoder::from_classes(bundle.label_encoder.classes().to_vec())?;

        Self::new(
            Arc::new(bundle.classifier),
            label_encoder,
            schema,
            bundle.metadata,
        )
    }

    /// Read and validate a bundle from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let artifacts = Self::from_bundle(ArtifactBundle::read(path)?)?;

        info!(
            path = %path.display(),
            model = %artifacts.metadata.model_type,
            n_features = artifacts.schema.len(),
            n_classes = artifacts.label_encoder.len(),
            "Model artifacts loaded"
        );

        Ok(artifacts)
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
