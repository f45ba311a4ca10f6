use crate::utils::error::ClassifierError;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 输入像素的归一化方式
///
/// - `Mobilenet`: MobileNetV2 风格，`x / 127.5 - 1`，范围 [-1, 1]
/// - `Rescaling`: `x / 255`，范围 [0, 1]
/// - `Raw`: 不做处理，范围 [0, 255]
///
/// 注意：导出的模型是否已经包含内部 Rescaling 层决定了哪种方式正确，
/// 这里不做假设，由配置和调试面板决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    #[default]
    Mobilenet,
    Rescaling,
    Raw,
}

impl NormalizationMode {
    pub const ALL: [NormalizationMode; 3] = [
        NormalizationMode::Mobilenet,
        NormalizationMode::Rescaling,
        NormalizationMode::Raw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationMode::Mobilenet => "mobilenet",
            NormalizationMode::Rescaling => "rescaling",
            NormalizationMode::Raw => "raw",
        }
    }

    /// 该模式下输出值的闭区间
    pub fn value_range(&self) -> (f32, f32) {
        match self {
            NormalizationMode::Mobilenet => (-1.0, 1.0),
            NormalizationMode::Rescaling => (0.0, 1.0),
            NormalizationMode::Raw => (0.0, 255.0),
        }
    }

    /// 原地应用归一化
    pub fn apply(&self, tensor: &mut Array4<f32>) {
        match self {
            NormalizationMode::Mobilenet => tensor.mapv_inplace(|x| x / 127.5 - 1.0),
            NormalizationMode::Rescaling => tensor.mapv_inplace(|x| x / 255.0),
            NormalizationMode::Raw => {}
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationMode {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobilenet" => Ok(NormalizationMode::Mobilenet),
            "rescaling" => Ok(NormalizationMode::Rescaling),
            "raw" => Ok(NormalizationMode::Raw),
            other => Err(ClassifierError::InvalidInput(format!(
                "Invalid preprocessing mode '{}'. Supported modes: mobilenet, rescaling, raw",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes_case_insensitively() {
        assert_eq!("mobilenet".parse::<NormalizationMode>().unwrap(), NormalizationMode::Mobilenet);
        assert_eq!(" Rescaling ".parse::<NormalizationMode>().unwrap(), NormalizationMode::Rescaling);
        assert_eq!("RAW".parse::<NormalizationMode>().unwrap(), NormalizationMode::Raw);
        assert!("imagenet".parse::<NormalizationMode>().is_err());
    }

    #[test]
    fn endpoints_map_to_range_bounds() {
        for mode in NormalizationMode::ALL {
            let mut t = Array4::from_shape_vec((1, 1, 1, 2), vec![0.0, 255.0]).unwrap();
            mode.apply(&mut t);
            let (lo, hi) = mode.value_range();
            assert!((t[[0, 0, 0, 0]] - lo).abs() < 1e-6, "{mode}");
            assert!((t[[0, 0, 0, 1]] - hi).abs() < 1e-6, "{mode}");
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&NormalizationMode::Rescaling).unwrap();
        assert_eq!(json, "\"rescaling\"");
        let mode: NormalizationMode = serde_json::from_str("\"raw\"").unwrap();
        assert_eq!(mode, NormalizationMode::Raw);
    }
}
