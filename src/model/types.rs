use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub prediction: String,
    pub confidence: f64,
    pub all_predictions: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub input_shape: Vec<Option<usize>>,
    pub output_shape: Vec<Option<usize>>,
    pub classes: Vec<String>,
    pub num_classes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub path: String,
    pub backend: String,
    pub size_bytes: u64,
}
