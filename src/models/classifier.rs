use crate::image::InputTensor;
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// 图像分类模型的抽象：流水线只依赖这个接口，不依赖具体推理后端
pub trait ImageClassifier: Send + Sync {
    /// 前向推理，返回softmax之前的原始分数
    fn logits(&self, input: &InputTensor) -> Result<Vec<f32>>;

    /// 模型声明的输出类别数（动态维度时为None）
    fn num_outputs(&self) -> Option<usize>;

    /// 模型结构的文本摘要
    fn summary(&self) -> String;
}

pub struct OnnxClassifier {
    session: Mutex<Session>,
    model_path: PathBuf,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
    num_outputs: Option<usize>,
    summary: String,
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        Self::from_file(&config.model_path(), config)
    }

    pub fn from_file(model_path: &Path, config: &Config) -> Result<Self> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_path_buf()));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let optimization_level = if config.onnx_config.enable_optimization {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        };

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(optimization_level))
            .and_then(|b| b.with_intra_threads(config.onnx_config.intra_threads))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(ClassifierError::ModelLoad(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(ClassifierError::ModelLoad(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        // 记录所有输入输出用于调试
        for (i, input) in session.inputs.iter().enumerate() {
            tracing::debug!("Model input[{}]: '{}' {:?}", i, input.name, input.input_type);
        }
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Model output[{}]: '{}' {:?}", i, output.name, output.output_type);
        }

        let num_outputs = session.outputs[0]
            .output_type
            .tensor_shape()
            .and_then(|shape| static_class_count(shape));

        let summary = Self::describe(&session, model_path);

        tracing::info!(
            "Classification model ready: input='{}', output='{}', classes={:?}",
            input_name,
            output_name,
            num_outputs
        );

        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.to_path_buf(),
            input_name,
            output_name,
            num_outputs,
            summary,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn describe(session: &Session, model_path: &Path) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Model: {}", model_path.display());
        let _ = writeln!(out, "Inputs:");
        for input in &session.inputs {
            let _ = writeln!(out, "  {:<24} {:?}", input.name, input.input_type);
        }
        let _ = writeln!(out, "Outputs:");
        for output in &session.outputs {
            let _ = writeln!(out, "  {:<24} {:?}", output.name, output.output_type);
        }
        out
    }
}

/// 输出形状最后一维为类别数；-1等非正值表示动态维度
fn static_class_count(shape: &[i64]) -> Option<usize> {
    shape
        .last()
        .copied()
        .filter(|&dim| dim > 0)
        .and_then(|dim| usize::try_from(dim).ok())
}

/// 期望 (N) 或 (1, N)
fn score_vector(shape: &[usize], scores: Vec<f32>) -> Result<Vec<f32>> {
    match shape {
        [_] | [1, _] => Ok(scores),
        other => Err(ClassifierError::Inference(format!(
            "Expected a single score vector, got output shape {:?}",
            other
        ))),
    }
}

impl ImageClassifier for OnnxClassifier {
    fn logits(&self, input: &InputTensor) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input.data.clone())?;

        // 在锁内提取数据，避免输出借用session
        let (shape, scores) = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => {
                    let array = output.try_extract_array::<f32>()?;
                    (array.shape().to_vec(), array.iter().copied().collect::<Vec<f32>>())
                }
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(ClassifierError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        score_vector(&shape, scores)
    }

    fn num_outputs(&self) -> Option<usize> {
        self.num_outputs
    }

    fn summary(&self) -> String {
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_count_comes_from_static_last_dimension() {
        assert_eq!(static_class_count(&[-1, 4]), Some(4));
        assert_eq!(static_class_count(&[1, 5]), Some(5));
        assert_eq!(static_class_count(&[7]), Some(7));
        assert_eq!(static_class_count(&[-1, -1]), None);
        assert_eq!(static_class_count(&[1, 0]), None);
        assert_eq!(static_class_count(&[]), None);
    }

    #[test]
    fn only_single_score_vectors_are_accepted() {
        let scores = vec![0.1, 0.2, 0.7];
        assert_eq!(score_vector(&[3], scores.clone()).unwrap(), scores);
        assert_eq!(score_vector(&[1, 3], scores.clone()).unwrap(), scores);

        let err = score_vector(&[2, 3], vec![0.0; 6]).unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
        assert!(err.to_string().contains("[2, 3]"));

        let err = score_vector(&[1, 1, 3], scores).unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
    }

    #[test]
    fn missing_model_file_is_reported_before_session_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.onnx");
        let err = OnnxClassifier::from_file(&path, &Config::default()).err().unwrap();
        assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
    }
}
