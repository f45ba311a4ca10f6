use crate::diagnosis::{ClassProbability, Prediction};
use crate::models::ClassNames;
use crate::utils::error::ClassifierError;
use crate::Result;

/// 数值稳定的softmax（先减去最大值）
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// 第一个最大值的下标
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub struct Postprocessor;

impl Postprocessor {
    /// 原始分数 → 概率分布 → 预测类别
    pub fn interpret(logits: &[f32], class_names: &ClassNames) -> Result<Prediction> {
        if logits.len() != class_names.len() {
            return Err(ClassifierError::ClassCountMismatch {
                outputs: logits.len(),
                classes: class_names.len(),
            });
        }

        if logits.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::Inference(
                "Model returned non-finite scores".to_string(),
            ));
        }

        let probabilities = softmax(logits);
        let class_index = argmax(&probabilities)
            .ok_or_else(|| ClassifierError::Inference("Model returned no scores".to_string()))?;

        let class_name = class_names
            .get(class_index)
            .ok_or(ClassifierError::ClassCountMismatch {
                outputs: logits.len(),
                classes: class_names.len(),
            })?
            .to_string();

        let confidence = (probabilities[class_index] * 100.0 * 100.0).round() / 100.0;

        let probabilities = class_names
            .iter()
            .zip(probabilities)
            .map(|(name, probability)| ClassProbability {
                class_name: name.to_string(),
                probability,
            })
            .collect();

        Ok(Prediction {
            class_index,
            class_name,
            confidence,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> ClassNames {
        ClassNames::new((0..n).map(|i| format!("class_{}", i)).collect()).unwrap()
    }

    #[test]
    fn softmax_sums_to_one_even_for_large_scores() {
        for logits in [
            vec![1.0, 2.0, 3.0, 4.0],
            vec![1000.0, 999.0, -1000.0],
            vec![-50.0, -50.0],
            vec![0.0],
        ] {
            let probs = softmax(&logits);
            let sum: f32 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "{:?} -> {}", logits, sum);
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn prediction_matches_argmax_of_probabilities() {
        let logits = [0.3, -1.2, 2.5, 0.9];
        let prediction = Postprocessor::interpret(&logits, &names(4)).unwrap();

        let probs: Vec<f32> = prediction.probabilities.iter().map(|p| p.probability).collect();
        assert_eq!(prediction.class_index, argmax(&probs).unwrap());
        assert_eq!(prediction.class_index, 2);
        assert_eq!(prediction.class_name, "class_2");
        assert_eq!(prediction.probabilities.len(), 4);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let expected = (probs[2] * 10000.0).round() / 100.0;
        assert!((prediction.confidence - expected).abs() < 1e-4);
    }

    #[test]
    fn probabilities_keep_class_order() {
        let names = ClassNames::parse(r#"["cataract", "glaucoma", "normal"]"#).unwrap();
        let prediction = Postprocessor::interpret(&[0.0, 0.0, 5.0], &names).unwrap();
        let order: Vec<&str> = prediction
            .probabilities
            .iter()
            .map(|p| p.class_name.as_str())
            .collect();
        assert_eq!(order, ["cataract", "glaucoma", "normal"]);
        assert_eq!(prediction.class_name, "normal");
    }

    #[test]
    fn length_mismatch_is_a_configuration_error() {
        let err = Postprocessor::interpret(&[0.1, 0.2, 0.3], &names(4)).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::ClassCountMismatch { outputs: 3, classes: 4 }
        ));
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let err = Postprocessor::interpret(&[f32::NAN, 0.2], &names(2)).unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
    }
}
