use crate::models::{ClassNames, ImageClassifier, OnnxClassifier};
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

/// 进程级模型资源：只加载一次，之后只读共享
enum Resources {
    Ready {
        classifier: Arc<dyn ImageClassifier>,
        class_names: Arc<ClassNames>,
    },
    /// 加载失败的结果同样被缓存，不做重试
    Unavailable(Arc<ClassifierError>),
}

pub struct ModelManager {
    resources: Resources,
    config: Config,
}

static MODEL_MANAGER: OnceCell<Arc<ModelManager>> = OnceCell::new();

impl ModelManager {
    /// 初始化全局模型管理器；重复初始化返回 Internal 错误
    pub fn init(config: Config) -> Result<Arc<ModelManager>> {
        if MODEL_MANAGER.get().is_some() {
            return Err(ClassifierError::Internal(
                "Model manager already initialized".to_string(),
            ));
        }

        MODEL_MANAGER
            .set(Arc::new(Self::load(config)))
            .map_err(|_| ClassifierError::Internal("Model manager already initialized".to_string()))?;

        Self::instance()
    }

    /// 获取全局模型管理器实例
    pub fn instance() -> Result<Arc<ModelManager>> {
        MODEL_MANAGER
            .get()
            .cloned()
            .ok_or_else(|| ClassifierError::Internal("Model manager not initialized".to_string()))
    }

    /// 加载模型与类别名称；失败时记录诊断信息而不是终止进程
    pub fn load(config: Config) -> Self {
        tracing::info!("Initializing model manager...");

        let resources = match Self::load_resources(&config) {
            Ok((classifier, class_names)) => {
                tracing::info!("Model manager initialized successfully");
                Resources::Ready {
                    classifier,
                    class_names: Arc::new(class_names),
                }
            }
            Err(e) => {
                tracing::error!("{}", e);
                if let Some(hint) = e.hint() {
                    tracing::error!("{}", hint);
                }
                tracing::error!("Predictions are disabled until the service is restarted with valid resources");
                Resources::Unavailable(Arc::new(e))
            }
        };

        Self { resources, config }
    }

    /// 使用已构造的分类器创建管理器（嵌入或测试场景）
    pub fn with_classifier(
        config: Config,
        classifier: Arc<dyn ImageClassifier>,
        class_names: ClassNames,
    ) -> Self {
        let resources = match Self::check_class_count(classifier.as_ref(), &class_names) {
            Ok(()) => Resources::Ready {
                classifier,
                class_names: Arc::new(class_names),
            },
            Err(e) => Resources::Unavailable(Arc::new(e)),
        };

        Self { resources, config }
    }

    fn load_resources(config: &Config) -> Result<(Arc<dyn ImageClassifier>, ClassNames)> {
        // 先检查两个文件是否存在，给出最直接的提示
        let model_path = config.model_path();
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path));
        }

        let class_names = ClassNames::load(&config.class_names_path())?;
        let classifier = OnnxClassifier::new(config)?;

        Self::check_class_count(&classifier, &class_names)?;

        let classifier: Arc<dyn ImageClassifier> = Arc::new(classifier);
        Ok((classifier, class_names))
    }

    fn check_class_count(classifier: &dyn ImageClassifier, class_names: &ClassNames) -> Result<()> {
        match classifier.num_outputs() {
            Some(outputs) if outputs != class_names.len() => {
                Err(ClassifierError::ClassCountMismatch {
                    outputs,
                    classes: class_names.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// 获取分类器和类别名称；资源不可用时返回加载时的诊断
    pub fn resources(&self) -> Result<(Arc<dyn ImageClassifier>, Arc<ClassNames>)> {
        match &self.resources {
            Resources::Ready {
                classifier,
                class_names,
            } => Ok((Arc::clone(classifier), Arc::clone(class_names))),
            Resources::Unavailable(e) => Err(ClassifierError::ResourcesUnavailable(Arc::clone(e))),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.resources, Resources::Ready { .. })
    }

    /// 获取配置引用
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 模型健康检查
    pub fn health_check(&self) -> Result<()> {
        self.resources().map(|_| ())
    }

    /// 获取模型统计信息
    pub fn get_stats(&self) -> ModelStats {
        let (ready, num_classes, class_names) = match &self.resources {
            Resources::Ready { class_names, .. } => {
                (true, class_names.len(), class_names.as_slice().to_vec())
            }
            Resources::Unavailable(_) => (false, 0, Vec::new()),
        };

        ModelStats {
            ready,
            model_path: self.config.model_path().display().to_string(),
            class_names_path: self.config.class_names_path().display().to_string(),
            num_classes,
            class_names,
            default_mode: self.config.default_mode.to_string(),
            intra_threads: self.config.onnx_config.intra_threads,
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub ready: bool,
    pub model_path: String,
    pub class_names_path: String,
    pub num_classes: usize,
    pub class_names: Vec<String>,
    pub default_mode: String,
    pub intra_threads: usize,
}
