use crate::utils::error::ClassifierError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

/// 默认上传大小限制（20MB）
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str, max_bytes: usize) -> Result<DynamicImage> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::from_bytes(&image_bytes, max_bytes)
    }

    /// 从字节流加载图像，仅接受JPEG/PNG
    pub fn from_bytes(bytes: &[u8], max_bytes: usize) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ClassifierError::InvalidInput("Empty image data".to_string()));
        }

        if bytes.len() > max_bytes {
            return Err(ClassifierError::FileTooLarge(bytes.len(), max_bytes));
        }

        let format = Self::detect_format(bytes)?;
        if !Self::is_supported_format(format) {
            return Err(ClassifierError::UnsupportedFormat(format!(
                "{:?} (only JPEG and PNG are accepted)",
                format
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;

        tracing::debug!(
            "Decoded {:?} image: {}x{} ({:?})",
            format,
            image.width(),
            image.height(),
            image.color()
        );

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat> {
        image::guess_format(bytes).map_err(|_| {
            ClassifierError::UnsupportedFormat("unrecognized image data".to_string())
        })
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Png | ImageFormat::Jpeg)
    }

    /// 验证上传的Content-Type
    pub fn is_supported_content_type(content_type: &str) -> bool {
        matches!(
            content_type,
            "image/jpeg" | "image/jpg" | "image/png" | "application/octet-stream"
        )
    }
}
