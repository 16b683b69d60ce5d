//! Offline pipeline turning the survey CSV into an artifact bundle

pub mod dataset;
pub mod trainer;

pub use dataset::{DatasetRecord, PreparedData, TrainingDataset};
pub use trainer::Trainer;
