pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{label_encoder::LabelEncoder, storage::LocalStorage, xgboost::XgbModel};
pub use core::service::{classify, load_artifacts, Artifacts, InferenceService};
pub use domain::model::{ClassificationResult, Feature, FeatureVector};
pub use utils::error::{InferenceError, LoadError, Result};
