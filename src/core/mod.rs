pub mod batch;
pub mod service;

pub use crate::domain::model::{ClassificationResult, Feature, FeatureVector};
pub use crate::domain::ports::{ArtifactStore, Classifier};
pub use crate::utils::error::Result;
