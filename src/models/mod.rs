pub mod classifier;
pub mod labels;
pub mod manager;

pub use classifier::{ImageClassifier, OnnxClassifier};
pub use labels::ClassNames;
pub use manager::{ModelManager, ModelStats};
