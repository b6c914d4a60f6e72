use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Which of the two models produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelKind {
    Classifier,
    Detector,
}

/// Provenance of one prediction: model plus the variant it was run on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Source {
    pub model: ModelKind,
    pub variant: String,
}

impl Source {
    pub fn new(model: ModelKind, variant: impl Into<String>) -> Self {
        Self {
            model,
            variant: variant.into(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = match self.model {
            ModelKind::Classifier => "classifier",
            ModelKind::Detector => "detector",
        };
        write!(f, "{}-{}", model, self.variant)
    }
}

/// Axis-aligned box in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// One raw model output, immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Model-reported confidence in [0, 1].
    pub score: f32,
    pub source: Source,
    pub category: String,
    /// Static trust multiplier for this source/variant combination.
    pub weight: f32,
    /// Present only for detector outputs.
    pub bounding_box: Option<BoundingBox>,
}

/// Raw detector output before any ensemble treatment.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

/// One entry of the final ranked, deduplicated result list.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub label: String,
    /// Calibrated confidence in [0, 1].
    pub confidence: f32,
    /// Group confidence before post-rank calibration.
    pub raw_confidence: f32,
    pub category: String,
    /// Number of predictions folded into this result.
    pub votes: usize,
    /// `1 - variance` of the member scores.
    pub stability: f32,
    /// Distinct sources that contributed, in first-seen order.
    pub sources: Vec<String>,
    /// All member labels, in first-seen order.
    pub alternative_labels: Vec<String>,
}

impl RankedResult {
    pub fn supporting_source_count(&self) -> usize {
        self.sources.len()
    }
}

/// Summary derived from a ranked result list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultAnalysis {
    pub total_predictions: usize,
    pub high_confidence_predictions: usize,
    pub medium_confidence_predictions: usize,
    pub low_confidence_predictions: usize,
    pub categories: HashMap<String, usize>,
    pub average_confidence: f32,
    pub top_category: Option<String>,
}

/// Resolution/aspect-ratio checks on the input image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageQuality {
    pub resolution: u64,
    pub aspect_ratio: f32,
    pub recommendations: Vec<String>,
}

/// Everything one classification request produces.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyReport {
    pub ensemble: Vec<RankedResult>,
    pub analysis: ResultAnalysis,
    pub image_quality: ImageQuality,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub loading: bool,
    pub classifier_ready: bool,
    pub detector_ready: bool,
    pub error: Option<String>,
}
