use serde::{Deserialize, Serialize};

/// Tunables for one classification request.
///
/// Every field has a default so callers can deserialize a partial JSON
/// document or start from `ClassifyOptions::default()` and override fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyOptions {
    /// Maximum number of ranked results returned.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Predictions and groups below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// When false, classifier output on the original image is returned as-is
    /// instead of the aggregated ensemble.
    #[serde(default = "default_true")]
    pub use_ensemble: bool,
    /// Toggles the filtered/augmented variant passes and the enhanced
    /// detector pass.
    #[serde(default = "default_true")]
    pub use_preprocessing: bool,
}

fn default_top_k() -> usize {
    5
}

fn default_min_confidence() -> f32 {
    0.05
}

fn default_true() -> bool {
    true
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_confidence: default_min_confidence(),
            use_ensemble: true,
            use_preprocessing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ClassifyOptions::default();
        assert_eq!(opts.top_k, 5);
        assert!((opts.min_confidence - 0.05).abs() < f32::EPSILON);
        assert!(opts.use_ensemble);
        assert!(opts.use_preprocessing);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let opts: ClassifyOptions = serde_json::from_str(r#"{"top_k": 3}"#).unwrap();
        assert_eq!(opts.top_k, 3);
        assert!((opts.min_confidence - 0.05).abs() < f32::EPSILON);
        assert!(opts.use_ensemble);
    }
}
