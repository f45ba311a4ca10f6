use crate::{
    diagnosis::{
        DebugReport, DiagnosisOptions, DiagnosisResult, DiagnosisStage, DiagnosisStatus,
        Postprocessor,
    },
    image::{ImageLoader, ImagePreprocessor},
    models::ModelManager,
    utils::error::ClassifierError,
    Result,
};
use axum::body::Bytes;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

type StatusSender = Option<mpsc::UnboundedSender<DiagnosisStatus>>;

/// 预处理 → 推理 → 后处理 流水线
#[derive(Clone)]
pub struct DiagnosisPipeline {
    manager: Arc<ModelManager>,
}

impl DiagnosisPipeline {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// 处理上传的字节流图像
    pub async fn process_bytes(
        &self,
        bytes: Bytes,
        options: DiagnosisOptions,
        status_tx: StatusSender,
    ) -> Result<DiagnosisResult> {
        let manager = Arc::clone(&self.manager);
        Self::spawn(move || {
            let start_time = Instant::now();
            Self::send(&status_tx, DiagnosisStage::Decoding, 0.1, "Loading image from upload");
            let max_bytes = manager.config().server_config.max_request_size;
            let image = ImageLoader::from_bytes(&bytes, max_bytes)?;
            Self::process_image(&manager, &image, &options, &status_tx, start_time)
        })
        .await
    }

    /// 处理base64图像
    pub async fn process_base64(
        &self,
        data: String,
        options: DiagnosisOptions,
        status_tx: StatusSender,
    ) -> Result<DiagnosisResult> {
        let manager = Arc::clone(&self.manager);
        Self::spawn(move || {
            let start_time = Instant::now();
            Self::send(&status_tx, DiagnosisStage::Decoding, 0.1, "Loading image from base64");
            let max_bytes = manager.config().server_config.max_request_size;
            let image = ImageLoader::from_base64(&data, max_bytes)?;
            Self::process_image(&manager, &image, &options, &status_tx, start_time)
        })
        .await
    }

    /// 解码和推理都是CPU密集型，放到阻塞线程池执行
    async fn spawn<F>(job: F) -> Result<DiagnosisResult>
    where
        F: FnOnce() -> Result<DiagnosisResult> + Send + 'static,
    {
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| ClassifierError::Internal(format!("Inference task join error: {}", e)))?
    }

    /// 核心处理流程（同步）
    pub fn process_image(
        manager: &ModelManager,
        image: &DynamicImage,
        options: &DiagnosisOptions,
        status_tx: &StatusSender,
        start_time: Instant,
    ) -> Result<DiagnosisResult> {
        // 资源不可用时直接返回加载阶段的诊断
        let (classifier, class_names) = manager.resources()?;

        let mode = options.effective_mode(manager.config().default_mode);

        Self::send(status_tx, DiagnosisStage::Preprocessing, 0.3, "Preprocessing image");
        let input = ImagePreprocessor::preprocess(image, mode)?;
        let input_stats = options.debug.then(|| input.stats());
        if let Some(ref stats) = input_stats {
            tracing::debug!(
                "Input tensor: mode={}, min={:.2}, max={:.2}, mean={:.2}, shape={:?}",
                mode,
                stats.min,
                stats.max,
                stats.mean,
                stats.shape
            );
        }

        Self::send(status_tx, DiagnosisStage::Inference, 0.5, "Running model");
        let inference_start = Instant::now();
        let logits = classifier.logits(&input)?;
        let inference_time = inference_start.elapsed();

        Self::send(status_tx, DiagnosisStage::Postprocessing, 0.8, "Computing probabilities");
        let prediction = Postprocessor::interpret(&logits, &class_names)?;

        let debug = input_stats.map(|input_stats| DebugReport {
            mode,
            input_stats,
            raw_logits: logits,
            model_summary: classifier.summary(),
        });

        let processing_time = start_time.elapsed().as_secs_f32();
        Self::send(status_tx, DiagnosisStage::Completed, 1.0, "Analysis complete");

        tracing::debug!(
            "Prediction: class={}, confidence={:.2}%, inference={:.3}s",
            prediction.class_name,
            prediction.confidence,
            inference_time.as_secs_f32()
        );

        Ok(DiagnosisResult {
            processing_time,
            mode,
            confidence_label: prediction.confidence_label(),
            prediction,
            debug,
        })
    }

    fn send(status_tx: &StatusSender, stage: DiagnosisStage, progress: f32, message: &str) {
        if let Some(tx) = status_tx {
            let _ = tx.send(DiagnosisStatus::new(stage, progress, message));
        }
    }
}
