use crate::image::{NormalizationMode, TensorStats};
use serde::Serialize;

/// 单次预测的选项
#[derive(Debug, Clone, Default)]
pub struct DiagnosisOptions {
    /// 是否返回调试信息
    pub debug: bool,

    /// 归一化方式（仅在调试模式下生效）
    pub mode: Option<NormalizationMode>,
}

impl DiagnosisOptions {
    /// 实际使用的归一化方式：非调试模式始终使用配置的默认值
    pub fn effective_mode(&self, default_mode: NormalizationMode) -> NormalizationMode {
        if self.debug {
            self.mode.unwrap_or(default_mode)
        } else {
            default_mode
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub class_name: String,
    pub probability: f32,
}

/// 预测结果
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub class_name: String,
    /// 最大概率 × 100，保留两位小数
    pub confidence: f32,
    /// 与类别名称顺序一致的完整概率分布
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    pub fn confidence_label(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub mode: NormalizationMode,
    pub input_stats: TensorStats,
    /// softmax之前的原始分数
    pub raw_logits: Vec<f32>,
    pub model_summary: String,
}

/// 完整的诊断结果
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisResult {
    /// 处理耗时（秒）
    pub processing_time: f32,
    pub mode: NormalizationMode,
    pub prediction: Prediction,
    pub confidence_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugReport>,
}

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosisStage {
    Decoding,
    Preprocessing,
    Inference,
    Postprocessing,
    Completed,
}

/// 处理状态
#[derive(Debug, Clone)]
pub struct DiagnosisStatus {
    /// 当前处理阶段
    pub stage: DiagnosisStage,
    /// 进度百分比 (0.0 - 1.0)
    pub progress: f32,
    /// 状态消息
    pub message: String,
}

impl DiagnosisStatus {
    pub fn new(stage: DiagnosisStage, progress: f32, message: &str) -> Self {
        Self {
            stage,
            progress,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_override_only_applies_in_debug() {
        let opts = DiagnosisOptions {
            debug: false,
            mode: Some(NormalizationMode::Raw),
        };
        assert_eq!(opts.effective_mode(NormalizationMode::Mobilenet), NormalizationMode::Mobilenet);

        let opts = DiagnosisOptions {
            debug: true,
            mode: Some(NormalizationMode::Raw),
        };
        assert_eq!(opts.effective_mode(NormalizationMode::Mobilenet), NormalizationMode::Raw);

        let opts = DiagnosisOptions {
            debug: true,
            mode: None,
        };
        assert_eq!(opts.effective_mode(NormalizationMode::Rescaling), NormalizationMode::Rescaling);
    }

    #[test]
    fn confidence_label_has_two_decimals() {
        let prediction = Prediction {
            class_index: 0,
            class_name: "normal".to_string(),
            confidence: 87.5,
            probabilities: Vec::new(),
        };
        assert_eq!(prediction.confidence_label(), "87.50%");
    }
}
