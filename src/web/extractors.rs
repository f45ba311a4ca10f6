use crate::image::NormalizationMode;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;

/// 验证的JSON提取器
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationError::from_rejection)?;

        value.validate().map_err(ValidationError::Validation)?;

        Ok(ValidatedJson(value))
    }
}

/// 验证trait
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// 验证错误类型
#[derive(Debug)]
pub enum ValidationError {
    JsonParse(String),
    PayloadTooLarge(String),
    Validation(String),
}

impl ValidationError {
    fn from_rejection(err: JsonRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ValidationError::PayloadTooLarge(err.body_text())
        } else {
            ValidationError::JsonParse(err.body_text())
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::PayloadTooLarge(_) => "FILE_TOO_LARGE",
            _ => "VALIDATION_ERROR",
        }
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        tracing::warn!("Request rejected: {}", self);

        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (self.status_code(), Json(body)).into_response()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::JsonParse(msg) => write!(f, "JSON parse error: {}", msg),
            ValidationError::PayloadTooLarge(msg) => write!(f, "Request body too large: {}", msg),
            ValidationError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl Validate for crate::web::handlers::PredictJsonRequest {
    fn validate(&self) -> Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        // 非调试模式下mode被忽略
        if let Some(mode) = self.mode.as_deref().filter(|_| self.debug) {
            if !mode.trim().is_empty() {
                mode.parse::<NormalizationMode>().map_err(|e| e.to_string())?;
            }
        }

        Ok(())
    }
}

/// 请求ID提取器：优先使用 X-Request-ID 头
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::handlers::PredictJsonRequest;

    fn request(image: &str, mode: Option<&str>) -> PredictJsonRequest {
        PredictJsonRequest {
            image: image.to_string(),
            debug: true,
            mode: mode.map(str::to_string),
        }
    }

    fn json_request(body: String) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap()
    }

    #[test]
    fn unknown_mode_is_ignored_without_debug() {
        let mut req = request("aGVsbG8=", Some("imagenet"));
        req.debug = false;
        assert!(req.validate().is_ok());
    }

    #[tokio::test]
    async fn oversized_body_is_413_not_a_parse_error() {
        // 未设置DefaultBodyLimit时axum默认上限为2MB
        let image = "A".repeat(3 * 1024 * 1024);
        let body = serde_json::json!({ "image": image }).to_string();

        let err = ValidatedJson::<PredictJsonRequest>::from_request(json_request(body), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::PayloadTooLarge(_)));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn malformed_json_stays_a_validation_error() {
        let err = ValidatedJson::<PredictJsonRequest>::from_request(
            json_request("{not json".to_string()),
            &(),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn rejects_blank_image_and_unknown_mode() {
        assert!(request("   ", None).validate().is_err());
        let err = request("aGVsbG8=", Some("imagenet")).validate().unwrap_err();
        assert!(err.contains("imagenet"));
        assert!(request("aGVsbG8=", Some("rescaling")).validate().is_ok());
        assert!(request("aGVsbG8=", Some("")).validate().is_ok());
    }

    #[tokio::test]
    async fn request_id_prefers_header() {
        let (mut parts, _) = axum::http::Request::builder()
            .header("X-Request-ID", "abc-123")
            .body(())
            .unwrap()
            .into_parts();
        let RequestId(id) = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, "abc-123");

        let (mut parts, _) = axum::http::Request::builder().body(()).unwrap().into_parts();
        let RequestId(id) = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id.len(), 36);
    }
}
