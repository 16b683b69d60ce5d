//! Feature encoding, the random forest classifier and the inference adapter
//!
//! Artifacts produced by the trainer are loaded once into
//! [`ModelArtifacts`] and shared behind an `Arc`; [`DiagnosisService`]
//! turns a [`crate::models::RawInput`] into a [`Prediction`].

pub mod artifacts;
pub mod classifier;
pub mod features;
pub mod models;
pub mod service;
pub mod tree;

pub use artifacts::{ArtifactBundle, ModelArtifacts, FORMAT_VERSION};
pub use classifier::{Classifier, ForestParams, RandomForest};
pub use features::{encode, expand, FeatureEncoder, FeatureSchema, FeatureVector};
pub use models::{
    ClassMetrics, ClassProbability, FeatureImportance, LabelEncoder, ModelMetadata, ModelMetrics,
    ModelType, Prediction,
};
pub use service::DiagnosisService;
pub use tree::{DecisionTree, Node, TreeParams};
