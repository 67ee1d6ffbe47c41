use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("No image data provided")]
    MissingImage,
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid image data: {0}")]
    InvalidImage(String),
    #[error("Prediction failed: {0}")]
    Inference(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("other: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::MissingImage
            | ServiceError::BadRequest(_)
            | ServiceError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ServiceError::ModelNotLoaded | ServiceError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Io(_) | ServiceError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "rejected request");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_bad_request() {
        assert_eq!(ServiceError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::InvalidImage("bad padding".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn inference_errors_echo_the_cause() {
        let err = ServiceError::Inference("shape mismatch".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Prediction failed: shape mismatch");
        assert_eq!(ServiceError::ModelNotLoaded.to_string(), "Model not loaded");
    }
}
