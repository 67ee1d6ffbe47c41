use std::{fs, sync::Arc};

use crate::{
    config::AppConfig,
    error::ServiceError,
    labels::ClassLabels,
    model::{Classifier, ModelMetadata},
    preprocess::PreprocessConfig,
};

/// A classifier together with everything needed to serve it.
pub struct LoadedModel {
    pub classifier: Arc<dyn Classifier>,
    pub labels: ClassLabels,
    pub preprocess: PreprocessConfig,
    pub metadata: Option<ModelMetadata>,
}

impl LoadedModel {
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        let path = config.model_path.as_path();
        if !path.exists() {
            return Err(ServiceError::Other(format!(
                "model artifact missing: {}",
                path.display()
            )));
        }
        let size_bytes = fs::metadata(path)?.len();
        let classifier = load_backend(config)?;

        Ok(Self {
            classifier,
            labels: config.class_labels()?,
            preprocess: config.preprocess,
            metadata: Some(ModelMetadata {
                path: path.display().to_string(),
                backend: BACKEND_NAME.to_string(),
                size_bytes,
            }),
        })
    }

    pub fn from_classifier(
        classifier: Arc<dyn Classifier>,
        labels: ClassLabels,
        preprocess: PreprocessConfig,
    ) -> Self {
        Self {
            classifier,
            labels,
            preprocess,
            metadata: None,
        }
    }
}

#[cfg(feature = "tch-backend")]
const BACKEND_NAME: &str = "torchscript";
#[cfg(not(feature = "tch-backend"))]
const BACKEND_NAME: &str = "none";

#[cfg(feature = "tch-backend")]
fn load_backend(config: &AppConfig) -> Result<Arc<dyn Classifier>, ServiceError> {
    let classifier = crate::model::tch_backend::TorchClassifier::load(
        &config.model_path,
        config.device,
        &config.preprocess,
        config.apply_softmax,
    )?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "tch-backend"))]
fn load_backend(_config: &AppConfig) -> Result<Arc<dyn Classifier>, ServiceError> {
    Err(ServiceError::Other(
        "no inference backend compiled in; enable the `tch-backend` feature".into(),
    ))
}
