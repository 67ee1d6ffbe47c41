pub mod config;
pub mod error;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod server;

pub use config::AppConfig;
pub use labels::ClassLabels;
pub use model::{Classifier, LoadedModel, ModelRegistry, PredictionResponse};
pub use preprocess::{ImageTensor, PreprocessConfig};
pub use server::build_router;
