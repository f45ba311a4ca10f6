use crate::{
    diagnosis::{DiagnosisOptions, DiagnosisResult, DiagnosisStatus},
    image::{ImageLoader, NormalizationMode},
    utils::error::ClassifierError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct PredictJsonRequest {
    /// Base64编码的图像数据
    pub image: String,

    /// 是否返回调试信息
    #[serde(default)]
    pub debug: bool,

    /// 归一化方式（仅调试模式生效）
    #[serde(default)]
    pub mode: Option<String>,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// 开发模式下输出处理进度
fn progress_channel(
    state: &AppState,
    request_id: &str,
) -> Option<mpsc::UnboundedSender<DiagnosisStatus>> {
    if !state.config.dev_mode {
        return None;
    }

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<DiagnosisStatus>();
    let request_id = request_id.to_string();
    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            tracing::debug!(
                "Progress [{}]: {:?} - {:.1}% - {}",
                request_id,
                status.stage,
                status.progress * 100.0,
                status.message
            );
        }
    });

    Some(status_tx)
}

fn parse_mode(value: Option<&str>) -> Result<Option<NormalizationMode>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

/// 归一化方式只在调试模式下读取，否则忽略
fn diagnosis_options(debug: bool, mode: Option<&str>) -> Result<DiagnosisOptions> {
    let mode = if debug { parse_mode(mode)? } else { None };
    Ok(DiagnosisOptions { debug, mode })
}

/// Multipart文件上传处理器
pub async fn predict_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<DiagnosisResult>>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart predict request: request_id={}", request_id);

    let mut image_data: Option<Bytes> = None;
    let mut debug = false;
    let mut mode: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !ImageLoader::is_supported_content_type(content_type) {
                        return Err(ClassifierError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    ClassifierError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifierError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "debug" => {
                let value = field.text().await.map_err(|e| {
                    ClassifierError::InvalidInput(format!("Failed to read debug field: {}", e))
                })?;
                debug = matches!(value.trim(), "true" | "1" | "on");
            }
            "mode" => {
                let value = field.text().await.map_err(|e| {
                    ClassifierError::InvalidInput(format!("Failed to read mode field: {}", e))
                })?;
                mode = Some(value);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| ClassifierError::InvalidInput("No image file provided".to_string()))?;

    let options = diagnosis_options(debug, mode.as_deref())?;

    let status_tx = progress_channel(&state, &request_id);
    let result = state
        .pipeline
        .process_bytes(image_data, options, status_tx)
        .await?;

    tracing::info!(
        "Prediction completed: request_id={}, class={}, confidence={}, time={:.3}s",
        request_id,
        result.prediction.class_name,
        result.confidence_label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

/// JSON base64上传处理器
pub async fn predict_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<PredictJsonRequest>,
) -> Result<Json<ApiResponse<DiagnosisResult>>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON predict request: request_id={}, debug={}, mode={:?}",
        request_id,
        request.debug,
        request.mode
    );

    let options = diagnosis_options(request.debug, request.mode.as_deref())?;

    let status_tx = progress_channel(&state, &request_id);
    let result = state
        .pipeline
        .process_base64(request.image, options, status_tx)
        .await?;

    tracing::info!(
        "Prediction completed: request_id={}, class={}, confidence={}, time={:.3}s",
        request_id,
        result.prediction.class_name,
        result.confidence_label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}
