pub mod pipeline;
pub mod postprocess;
pub mod types;

pub use pipeline::DiagnosisPipeline;
pub use postprocess::{argmax, softmax, Postprocessor};
pub use types::{
    ClassProbability, DebugReport, DiagnosisOptions, DiagnosisResult, DiagnosisStage,
    DiagnosisStatus, Prediction,
};
