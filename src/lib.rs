//! Obesity-risk decision support.
//!
//! A pre-trained random forest classifies a patient's lifestyle and
//! physiological attributes into an obesity category. The crate contains
//! the feature encoder that maps raw form answers onto the model's column
//! schema, the inference adapter, the trainer that produces the artifact
//! bundle, and an HTTP front-end.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod training;

pub use error::{AppError, Result};
