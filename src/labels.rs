use std::{collections::BTreeMap, fs, path::Path};

use crate::{error::ServiceError, model::PredictionResponse};

pub const DEFAULT_CLASS_NAMES: &[&str] = &[
    "Healthy",
    "Bacterial_Blight",
    "Brown_Spot",
    "Leaf_Smut",
    "Early_Blight",
    "Late_Blight",
    "Powdery_Mildew",
    "Rust",
    "Mosaic_Virus",
    "Yellowing",
];

/// Ordered label list; position `i` names model output `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect())
    }
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Parse a comma-separated list, skipping blank entries.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Read labels from a JSON array of strings, or one label per line.
    pub fn load_from_path(path: &Path) -> Result<Self, ServiceError> {
        let raw = fs::read_to_string(path)?;
        if raw.trim_start().starts_with('[') {
            let names: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
                ServiceError::Other(format!("invalid class names file {}: {e}", path.display()))
            })?;
            return Ok(Self::new(names));
        }

        Ok(Self::new(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn label(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Class_{index}"))
    }

    pub fn summarize(&self, outputs: &[f32]) -> Result<PredictionResponse, ServiceError> {
        // max_by keeps the last maximum; compare reversed indices so ties pick the first
        let (best, best_score) = outputs
            .iter()
            .copied()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ib.cmp(ia)))
            .ok_or_else(|| ServiceError::Inference("model returned an empty output".into()))?;

        let all_predictions: BTreeMap<String, f64> = outputs
            .iter()
            .enumerate()
            .map(|(idx, &score)| (self.label(idx), as_percentage(score)))
            .collect();

        Ok(PredictionResponse {
            success: true,
            prediction: self.label(best),
            confidence: as_percentage(best_score),
            all_predictions,
        })
    }
}

/// Probability to percentage, rounded to two decimals.
fn as_percentage(score: f32) -> f64 {
    (score as f64 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_highest_score() {
        let labels = ClassLabels::from_csv("Healthy, Rust ,Leaf_Smut");
        let response = labels.summarize(&[0.1, 0.7, 0.2]).unwrap();

        assert!(response.success);
        assert_eq!(response.prediction, "Rust");
        assert_eq!(response.confidence, 70.0);
        assert_eq!(response.all_predictions["Healthy"], 10.0);
        assert_eq!(response.all_predictions["Leaf_Smut"], 20.0);
    }

    #[test]
    fn ties_resolve_to_the_first_index() {
        let labels = ClassLabels::from_csv("a,b,c");
        let response = labels.summarize(&[0.4, 0.4, 0.2]).unwrap();
        assert_eq!(response.prediction, "a");
    }

    #[test]
    fn unnamed_outputs_get_positional_labels() {
        let labels = ClassLabels::from_csv("Healthy");
        let response = labels.summarize(&[0.25, 0.75]).unwrap();
        assert_eq!(response.prediction, "Class_1");
        assert_eq!(response.all_predictions.len(), 2);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(as_percentage(0.123456), 12.35);
        assert_eq!(as_percentage(1.0), 100.0);
    }

    #[test]
    fn empty_output_is_an_inference_error() {
        let err = ClassLabels::default().summarize(&[]).unwrap_err();
        assert!(matches!(err, ServiceError::Inference(_)));
    }

    #[test]
    fn default_list_has_ten_classes() {
        let labels = ClassLabels::default();
        assert_eq!(labels.len(), 10);
        assert_eq!(labels.label(0), "Healthy");
        assert_eq!(labels.label(9), "Yellowing");
    }

    #[test]
    fn loads_json_and_line_files() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("classes.json");
        fs::write(&json_path, r#"["Healthy", "Rust"]"#).unwrap();
        let labels = ClassLabels::load_from_path(&json_path).unwrap();
        assert_eq!(labels.names(), ["Healthy", "Rust"]);

        let text_path = dir.path().join("classes.txt");
        fs::write(&text_path, "Healthy\n\n  Late_Blight \n").unwrap();
        let labels = ClassLabels::load_from_path(&text_path).unwrap();
        assert_eq!(labels.names(), ["Healthy", "Late_Blight"]);
    }
}
