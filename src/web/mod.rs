pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::{diagnosis::DiagnosisPipeline, models::ModelManager, utils::error::ClassifierError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: DiagnosisPipeline,
}

impl AppState {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self {
            config: manager.config().clone(),
            pipeline: DiagnosisPipeline::new(manager),
        }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        self.pipeline.manager()
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // 初始化模型管理器（只加载一次）
    let manager = ModelManager::init(config.clone())?;

    tracing::warn!(
        "Default preprocessing mode is '{}'; it must match the input distribution the exported model was trained with",
        config.default_mode
    );

    let app = create_app(AppState::new(manager));

    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ClassifierError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /                  - Web UI");
    tracing::info!("  POST /api/predict       - Multipart file upload");
    tracing::info!("  POST /api/predict/json  - JSON base64 upload");
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  GET  /api/info          - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ClassifierError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ClassifierError::Internal(format!("Server failed: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;
    let multipart_limit = server_config.multipart_body_limit;
    let json_limit = server_config.json_body_limit;
    let request_timeout = server_config.request_timeout;

    Router::new()
        // 预测API路由：两种上传方式各自的请求体上限
        .route(
            "/api/predict",
            post(handlers::predict_upload_handler)
                .layer::<_, Infallible>(DefaultBodyLimit::max(multipart_limit))
                .layer(RequestBodyLimitLayer::new(multipart_limit)),
        )
        .route(
            "/api/predict/json",
            post(handlers::predict_json_handler)
                .layer::<_, Infallible>(DefaultBodyLimit::max(json_limit))
                .layer(RequestBodyLimitLayer::new(json_limit)),
        )
        // Web UI路由
        .route("/", get(ui::index_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout),
        ))
        .layer(CorsLayer::permissive())
        .layer(from_fn(middleware::security_headers))
        .layer(from_fn(middleware::request_logging))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Response {
    match state.manager().health_check() {
        Ok(()) => Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "version": env!("CARGO_PKG_VERSION"),
                "error": e.to_json(),
            })),
        )
            .into_response(),
    }
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let manager = state.manager();
    let stats = manager.get_stats();
    let error = manager.health_check().err().map(|e| e.to_json());

    Json(json!({
        "service": "Fundus Classifier",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": stats,
        "error": error,
        "input": {
            "shape": [1, crate::config::INPUT_SIZE, crate::config::INPUT_SIZE, 3],
            "modes": crate::image::NormalizationMode::ALL,
            "formats": ["jpeg", "png"],
            "max_upload_bytes": state.config.server_config.max_request_size,
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
