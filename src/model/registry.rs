use std::sync::Arc;

use tokio::task;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{ModelInfo, PredictionResponse, loader::LoadedModel},
};

/// Process-wide handle to the single served model, if it loaded.
pub struct ModelRegistry {
    model: Option<Arc<LoadedModel>>,
}

impl ModelRegistry {
    /// Load the configured artifact. Failure leaves the registry empty so the
    /// service can still answer health checks.
    pub fn initialize(config: &AppConfig) -> Self {
        match LoadedModel::load(config) {
            Ok(model) => {
                if let Some(meta) = model.metadata.as_ref() {
                    tracing::info!(
                        path = %meta.path,
                        backend = %meta.backend,
                        size_bytes = meta.size_bytes,
                        input_shape = ?model.preprocess.input_shape(),
                        outputs = model.classifier.num_outputs(),
                        "disease detection model loaded"
                    );
                }
                Self::with_model(model)
            }
            Err(err) => {
                tracing::error!(
                    path = %config.model_path.display(),
                    error = %err,
                    "model could not be loaded; serving without a model"
                );
                Self::empty()
            }
        }
    }

    pub fn with_model(model: LoadedModel) -> Self {
        if model.labels.len() != model.classifier.num_outputs() {
            tracing::warn!(
                classes = model.labels.len(),
                outputs = model.classifier.num_outputs(),
                "class name count does not match model outputs"
            );
        }
        Self {
            model: Some(Arc::new(model)),
        }
    }

    pub fn empty() -> Self {
        Self { model: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Class names of the loaded model; empty while no model is loaded.
    pub fn classes(&self) -> Vec<String> {
        self.model
            .as_ref()
            .map(|m| m.labels.names().to_vec())
            .unwrap_or_default()
    }

    pub fn model_info(&self) -> Result<ModelInfo, ServiceError> {
        let model = self.model.as_ref().ok_or(ServiceError::ModelNotLoaded)?;
        Ok(ModelInfo {
            input_shape: model.preprocess.input_shape(),
            output_shape: vec![None, Some(model.classifier.num_outputs())],
            classes: model.labels.names().to_vec(),
            num_classes: model.labels.len(),
        })
    }

    pub async fn predict(&self, payload: String) -> Result<PredictionResponse, ServiceError> {
        let model = self.model.clone().ok_or(ServiceError::ModelNotLoaded)?;

        task::spawn_blocking(move || {
            let input = model.preprocess.prepare(&payload)?;
            let outputs = model.classifier.forward(&input)?;
            model.labels.summarize(&outputs)
        })
        .await
        .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))?
    }
}
