mod classifier;
mod loader;
mod registry;
mod types;

#[cfg(feature = "tch-backend")]
pub mod tch_backend;

pub use classifier::Classifier;
pub use loader::LoadedModel;
pub use registry::ModelRegistry;
pub use types::{ModelInfo, ModelMetadata, PredictionRequest, PredictionResponse};
