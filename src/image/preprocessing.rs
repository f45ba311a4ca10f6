use crate::config::INPUT_SIZE;
use crate::image::NormalizationMode;
use crate::utils::error::ClassifierError;
use crate::Result;
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array3, Array4, Axis};
use serde::Serialize;

/// 模型输入张量 (1, H, W, 3)，NHWC布局
#[derive(Debug, Clone)]
pub struct InputTensor {
    pub data: Array4<f32>,
    pub mode: NormalizationMode,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        let (n, h, w, c) = self.data.dim();
        [n, h, w, c]
    }

    pub fn stats(&self) -> TensorStats {
        TensorStats::of(&self.data)
    }
}

/// 输入张量统计信息（调试面板使用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub shape: Vec<usize>,
}

impl TensorStats {
    pub fn of(tensor: &Array4<f32>) -> Self {
        let (min, max) = tensor
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        // f64累加，避免大张量求和的精度损失
        let mean = if tensor.is_empty() {
            0.0
        } else {
            (tensor.iter().map(|&v| v as f64).sum::<f64>() / tensor.len() as f64) as f32
        };

        Self {
            min,
            max,
            mean,
            shape: tensor.shape().to_vec(),
        }
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 分类预处理流水线：RGB → 拉伸缩放 → f32 → batch维度 → 归一化
    pub fn preprocess(image: &DynamicImage, mode: NormalizationMode) -> Result<InputTensor> {
        Self::preprocess_with_size(image, INPUT_SIZE, mode)
    }

    pub fn preprocess_with_size(
        image: &DynamicImage,
        size: u32,
        mode: NormalizationMode,
    ) -> Result<InputTensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::ImageProcessing(format!(
                "Image has zero area: {}x{}",
                image.width(),
                image.height()
            )));
        }

        // 1. 统一为RGB（丢弃alpha，灰度复制到三个通道）
        let rgb = match image {
            DynamicImage::ImageRgb8(rgb) => rgb.clone(),
            other => other.to_rgb8(),
        };

        // 2. 直接拉伸到目标尺寸，不保持宽高比（双三次插值）
        let resized = if rgb.dimensions() == (size, size) {
            rgb
        } else {
            image::imageops::resize(&rgb, size, size, FilterType::CatmullRom)
        };

        // 3. HWC f32
        let side = size as usize;
        let raw = resized.into_raw();
        let hwc = Array3::from_shape_vec((side, side, 3), raw)
            .map_err(|e| ClassifierError::ImageProcessing(format!("Invalid pixel buffer: {}", e)))?
            .mapv(|v| v as f32);

        // 4. 添加batch维度 (1, H, W, 3)
        let mut data = hwc.insert_axis(Axis(0));

        // 5. 归一化
        mode.apply(&mut data);

        Ok(InputTensor { data, mode })
    }
}
