use crate::utils::error::ClassifierError;
use crate::Result;
use serde::Serialize;
use std::path::Path;

/// 有序类别名称列表，下标与模型输出一一对应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(ClassifierError::ClassNames(
                "class names list is empty".to_string(),
            ));
        }
        Ok(Self(names))
    }

    /// 从JSON文件加载（内容为字符串数组）
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifierError::ClassNamesNotFound(path.to_path_buf()));
        }

        tracing::info!("Loading class names from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::ClassNames(format!("failed to read {}: {}", path.display(), e))
        })?;

        let names = Self::parse(&content)?;
        tracing::info!("Loaded {} class names", names.len());
        Ok(names)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let names: Vec<String> = serde_json::from_str(content)
            .map_err(|e| ClassifierError::ClassNames(format!("invalid JSON list: {}", e)))?;
        Self::new(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_json_array_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["cataract", "diabetic_retinopathy", "glaucoma", "normal"]"#).unwrap();

        let names = ClassNames::load(file.path()).unwrap();
        assert_eq!(names.len(), 4);
        assert_eq!(names.get(2), Some("glaucoma"));
        assert_eq!(names.get(4), None);
        assert_eq!(names.iter().last(), Some("normal"));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_names.json");

        let err = ClassNames::load(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::ClassNamesNotFound(ref p) if *p == path));
    }

    #[test]
    fn rejects_non_string_lists_and_empty_lists() {
        let err = ClassNames::parse(r#"{"0": "normal"}"#).unwrap_err();
        assert_eq!(err.error_code(), "CLASS_NAMES_ERROR");

        let err = ClassNames::parse("[1, 2, 3]").unwrap_err();
        assert_eq!(err.error_code(), "CLASS_NAMES_ERROR");

        let err = ClassNames::parse("[]").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn serializes_as_plain_array() {
        let names = ClassNames::parse(r#"["a", "b"]"#).unwrap();
        assert_eq!(serde_json::to_string(&names).unwrap(), r#"["a","b"]"#);
    }
}
