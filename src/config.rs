use crate::image::{loader::DEFAULT_MAX_IMAGE_BYTES, NormalizationMode};
use crate::utils::error::ClassifierError;
use crate::Result;
use std::path::PathBuf;

/// 输入图像边长（训练时的尺寸）
pub const INPUT_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// ONNX模型文件名
    pub model_file: String,

    /// 类别名称JSON文件名
    pub class_names_file: String,

    /// 非调试模式下使用的归一化方式
    pub default_mode: NormalizationMode,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 启用图优化
    pub enable_optimization: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大图像大小（字节）
    pub max_request_size: usize,

    /// multipart上传的请求体上限
    pub multipart_body_limit: usize,

    /// JSON上传的请求体上限（base64膨胀4/3）
    pub json_body_limit: usize,
}

/// 请求体中除图像以外的表单字段和JSON外壳
pub const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

impl ServerConfig {
    pub fn new(request_timeout: u64, max_request_size: usize) -> Result<Self> {
        let overflow = || {
            ClassifierError::Config(format!(
                "Maximum upload size of {} bytes is too large",
                max_request_size
            ))
        };

        let multipart_body_limit = max_request_size
            .checked_add(FORM_OVERHEAD_BYTES)
            .ok_or_else(overflow)?;
        let json_body_limit = max_request_size
            .div_ceil(3)
            .checked_mul(4)
            .and_then(|n| n.checked_add(FORM_OVERHEAD_BYTES))
            .ok_or_else(overflow)?;

        Ok(Self {
            request_timeout,
            max_request_size,
            multipart_body_limit,
            json_body_limit,
        })
    }
}

impl Config {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bind_addr: String,
        models_dir: String,
        model_file: String,
        class_names_file: String,
        default_mode: NormalizationMode,
        intra_threads: Option<usize>,
        max_upload_mb: usize,
        dev_mode: bool,
    ) -> Result<Self> {
        if model_file.trim().is_empty() {
            return Err(ClassifierError::Config("Model file name cannot be empty".to_string()));
        }
        if class_names_file.trim().is_empty() {
            return Err(ClassifierError::Config(
                "Class names file name cannot be empty".to_string(),
            ));
        }
        if max_upload_mb == 0 {
            return Err(ClassifierError::Config(
                "Maximum upload size must be at least 1 MB".to_string(),
            ));
        }

        let cpu_cores = num_cpus::get();

        let onnx_config = OnnxConfig {
            intra_threads: intra_threads.unwrap_or((cpu_cores * 3 / 4).max(1)), // 使用75%的CPU核心
            enable_optimization: true,
        };

        let max_request_size = max_upload_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            ClassifierError::Config(format!("Maximum upload size of {} MB is too large", max_upload_mb))
        })?;

        // 开发模式更长超时
        let server_config = ServerConfig::new(if dev_mode { 300 } else { 60 }, max_request_size)?;

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            model_file,
            class_names_file,
            default_mode,
            dev_mode,
            onnx_config,
            server_config,
        })
    }

    /// 获取模型路径
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }

    /// 获取类别名称文件路径
    pub fn class_names_path(&self) -> PathBuf {
        self.models_dir.join(&self.class_names_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8501".to_string(),
            models_dir: PathBuf::from("saved_models"),
            model_file: "mobilenet_fundus.onnx".to_string(),
            class_names_file: "class_names.json".to_string(),
            default_mode: NormalizationMode::default(),
            dev_mode: false,
            onnx_config: OnnxConfig {
                intra_threads: 1,
                enable_optimization: true,
            },
            server_config: ServerConfig {
                request_timeout: 60,
                max_request_size: DEFAULT_MAX_IMAGE_BYTES,
                multipart_body_limit: DEFAULT_MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES,
                json_body_limit: DEFAULT_MAX_IMAGE_BYTES.div_ceil(3) * 4 + FORM_OVERHEAD_BYTES,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(models_dir: &str, dev: bool) -> Result<Config> {
        Config::new(
            "127.0.0.1:0".to_string(),
            models_dir.to_string(),
            "mobilenet_fundus.onnx".to_string(),
            "class_names.json".to_string(),
            NormalizationMode::Mobilenet,
            None,
            20,
            dev,
        )
    }

    #[test]
    fn resource_paths_join_models_dir() {
        let config = build("saved_models", false).unwrap();
        assert_eq!(
            config.model_path(),
            PathBuf::from("saved_models/mobilenet_fundus.onnx")
        );
        assert_eq!(
            config.class_names_path(),
            PathBuf::from("saved_models/class_names.json")
        );
    }

    #[test]
    fn dev_mode_extends_timeout() {
        let prod = build("m", false).unwrap();
        let dev = build("m", true).unwrap();
        assert!(dev.server_config.request_timeout > prod.server_config.request_timeout);
        assert_eq!(prod.server_config.max_request_size, 20 * 1024 * 1024);
        assert!(prod.onnx_config.intra_threads >= 1);
    }

    #[test]
    fn rejects_empty_file_names_and_zero_upload_limit() {
        let err = Config::new(
            "127.0.0.1:0".to_string(),
            "m".to_string(),
            " ".to_string(),
            "class_names.json".to_string(),
            NormalizationMode::Raw,
            Some(1),
            20,
            false,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = Config::new(
            "127.0.0.1:0".to_string(),
            "m".to_string(),
            "model.onnx".to_string(),
            "class_names.json".to_string(),
            NormalizationMode::Raw,
            Some(1),
            0,
            false,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn json_limit_leaves_room_for_base64_expansion() {
        let config = build("m", false).unwrap();
        let server = &config.server_config;
        let encoded_len = server.max_request_size.div_ceil(3) * 4;
        assert!(server.json_body_limit >= encoded_len + FORM_OVERHEAD_BYTES);
        assert!(server.multipart_body_limit > server.max_request_size);

        let default = Config::default().server_config;
        let rebuilt = ServerConfig::new(60, DEFAULT_MAX_IMAGE_BYTES).unwrap();
        assert_eq!(default.json_body_limit, rebuilt.json_body_limit);
        assert_eq!(default.multipart_body_limit, rebuilt.multipart_body_limit);
    }

    #[test]
    fn huge_upload_limit_is_a_config_error_not_an_overflow() {
        let err = Config::new(
            "127.0.0.1:0".to_string(),
            "m".to_string(),
            "model.onnx".to_string(),
            "class_names.json".to_string(),
            NormalizationMode::Mobilenet,
            Some(1),
            usize::MAX / 1024,
            false,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = ServerConfig::new(60, usize::MAX - 1).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
