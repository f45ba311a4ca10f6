use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model file not found at: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Class names file not found at: {}", .0.display())]
    ClassNamesNotFound(PathBuf),

    #[error("Error loading model: {0}")]
    ModelLoad(String),

    #[error("Error loading class names: {0}")]
    ClassNames(String),

    #[error("Model produced {outputs} scores but {classes} class names are configured")]
    ClassCountMismatch { outputs: usize, classes: usize },

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// 启动时缓存下来的资源加载错误
    #[error(transparent)]
    ResourcesUnavailable(Arc<ClassifierError>),
}

impl ClassifierError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifierError::ResourcesUnavailable(inner) => inner.status_code(),
            ClassifierError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifierError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifierError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifierError::Base64(_) => StatusCode::BAD_REQUEST,
            ClassifierError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ClassifierError::ModelNotFound(_)
            | ClassifierError::ClassNamesNotFound(_)
            | ClassifierError::ModelLoad(_)
            | ClassifierError::ClassNames(_) => StatusCode::SERVICE_UNAVAILABLE,
            ClassifierError::ClassCountMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ClassifierError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifierError::ResourcesUnavailable(inner) => inner.error_code(),
            ClassifierError::ModelNotFound(_) => "MODEL_NOT_FOUND",
            ClassifierError::ClassNamesNotFound(_) => "CLASS_NAMES_NOT_FOUND",
            ClassifierError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            ClassifierError::ClassNames(_) => "CLASS_NAMES_ERROR",
            ClassifierError::ClassCountMismatch { .. } => "CLASS_COUNT_MISMATCH",
            ClassifierError::ImageProcessing(_) => "IMAGE_PROCESSING_ERROR",
            ClassifierError::Inference(_) => "INFERENCE_ERROR",
            ClassifierError::InvalidInput(_) => "INVALID_INPUT",
            ClassifierError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifierError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifierError::Config(_) => "CONFIG_ERROR",
            ClassifierError::Base64(_) => "BASE64_DECODE_ERROR",
            ClassifierError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            ClassifierError::Ort(_) => "ORT_ERROR",
            ClassifierError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 面向用户的修复提示
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ClassifierError::ResourcesUnavailable(inner) => inner.hint(),
            ClassifierError::ModelNotFound(_) => Some(
                "Please make sure the model has been exported to ONNX and placed at the configured path (see --models-dir / --model-file).",
            ),
            ClassifierError::ClassNamesNotFound(_) => Some(
                "Please create a class_names.json file in the models directory containing a JSON list of your class names.",
            ),
            ClassifierError::ClassNames(_) => Some(
                "The class names file must contain a non-empty JSON array of strings.",
            ),
            ClassifierError::ClassCountMismatch { .. } => Some(
                "The class names list must have exactly one entry per model output.",
            ),
            ClassifierError::ImageDecode(_) | ClassifierError::UnsupportedFormat(_) => {
                Some("Upload a valid JPEG or PNG fundus image and try again.")
            }
            _ => None,
        }
    }

    /// 以JSON形式描述错误，供API响应和健康检查共用
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        if let Some(hint) = self.hint() {
            body["hint"] = serde_json::Value::from(hint);
        }
        body
    }
}

impl IntoResponse for ClassifierError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "success": false,
            "error": self.to_json(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resources_are_unavailable_with_hint() {
        let err = ClassifierError::ModelNotFound(PathBuf::from("saved_models/model.onnx"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
        assert!(err.hint().is_some());
        assert!(err.to_string().contains("saved_models/model.onnx"));

        let err = ClassifierError::ClassNamesNotFound(PathBuf::from("class_names.json"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.hint().unwrap().contains("class_names.json"));
    }

    #[test]
    fn class_count_mismatch_is_a_configuration_error() {
        let err = ClassifierError::ClassCountMismatch { outputs: 5, classes: 4 };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "CLASS_COUNT_MISMATCH");
        assert!(err.hint().is_some());
        assert_eq!(
            err.to_string(),
            "Model produced 5 scores but 4 class names are configured"
        );
    }

    #[test]
    fn cached_load_error_reports_as_its_cause() {
        let cause = ClassifierError::ModelLoad("bad graph".to_string());
        let err = ClassifierError::ResourcesUnavailable(Arc::new(cause));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "MODEL_LOAD_ERROR");
        assert_eq!(err.to_string(), "Error loading model: bad graph");
    }

    #[test]
    fn json_body_omits_hint_when_absent() {
        let body = ClassifierError::Internal("boom".to_string()).to_json();
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(body.get("hint").is_none());

        let body = ClassifierError::UnsupportedFormat("image/gif".to_string()).to_json();
        assert!(body["hint"].is_string());
    }
}
