use crate::config::ClassifyOptions;
use crate::error::Error;
use crate::models::classify_types::{
    ClassifyReport, ImageQuality, ModelKind, Prediction, RankedResult, Source,
};
use crate::services::classifier::model_manager::{ModelFile, ModelManager};
use crate::services::classifier::{inference, variants};
use crate::services::ensemble;
use crate::services::taxonomy::{self, Taxonomy};
use image::DynamicImage;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

// Static trust multipliers per source/variant combination. Detector output
// outranks classifier output; geometric augmentations are trusted least.
const WEIGHT_CLASSIFIER_ORIGINAL: f32 = 0.8;
const WEIGHT_ENHANCED: f32 = 1.0;
const WEIGHT_FILTERED: f32 = 0.9;
const WEIGHT_AUGMENTED: f32 = 0.7;
const WEIGHT_DETECTOR_ORIGINAL: f32 = 1.2;
const WEIGHT_DETECTOR_ENHANCED: f32 = 1.3;

/// Only the first augmentations are run to bound latency.
const AUGMENTED_PASSES: usize = 3;

/// Detector hits below this score are noise and never enter the ensemble.
const DETECT_MIN_SCORE: f32 = 0.5;

/// Monotonic request counter. Every classification request takes a token at
/// the start; once a newer request has begun, older tokens stop being
/// current and their requests abort with [`Error::Superseded`] instead of
/// racing the newer result.
#[derive(Default)]
struct Generation(AtomicU64);

impl Generation {
    fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, token: u64) -> bool {
        self.0.load(Ordering::SeqCst) == token
    }
}

/// Orchestrates the full ensemble pipeline: variant generation, sequential
/// inference passes over both models, aggregation and calibration.
///
/// Inference calls are awaited one at a time on purpose: fanning many
/// image/model pairs out against one GPU-bound backend causes contention,
/// so each (variant, model) pass completes before the next starts. Each
/// session run is moved to a blocking thread so the runtime stays
/// responsive.
pub struct EnsembleClassifier {
    manager: ModelManager,
    taxonomy: Taxonomy,
    generation: Generation,
}

impl EnsembleClassifier {
    pub fn new(manager: ModelManager) -> Self {
        Self::with_taxonomy(manager, Taxonomy::builtin())
    }

    pub fn with_taxonomy(manager: ModelManager, taxonomy: Taxonomy) -> Self {
        Self {
            manager,
            taxonomy,
            generation: Generation::default(),
        }
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classify one image. Individual variant/model failures are logged and
    /// skipped; only a missing classifier, invalid input or supersession
    /// abort the request.
    pub async fn classify(
        &self,
        image: &DynamicImage,
        options: &ClassifyOptions,
    ) -> Result<ClassifyReport, Error> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput("no image supplied".to_string()));
        }
        if !self.manager.classifier_ready() {
            return Err(Error::ModelUnavailable(
                "classifier not loaded; download and load models first".to_string(),
            ));
        }

        let token = self.generation.begin();
        let image_quality = analyze_image_quality(image);
        let mut all_predictions: Vec<Prediction> = Vec::new();

        // 1. Classifier on the original image, wider than the requested
        // top-k so grouping has material to fold.
        let original = self.classify_pass(image, options.top_k * 2).await?;
        self.push_classified(
            &mut all_predictions,
            original,
            "original",
            WEIGHT_CLASSIFIER_ORIGINAL,
        );

        if options.use_preprocessing {
            // 2. Filtered variants.
            for variant in variants::preprocess_variants(image) {
                let weight = if variant.name == "enhanced" {
                    WEIGHT_ENHANCED
                } else {
                    WEIGHT_FILTERED
                };
                match self.classify_pass(&variant.image, options.top_k).await {
                    Ok(preds) => {
                        self.push_classified(&mut all_predictions, preds, variant.name, weight)
                    }
                    Err(e) => warn!("classification of {} variant failed: {}", variant.name, e),
                }
            }

            // 3. Geometric augmentations, shallower top-k.
            let per_pass = options.top_k.div_ceil(2);
            for variant in variants::augmented_variants(image)
                .into_iter()
                .take(AUGMENTED_PASSES)
            {
                match self.classify_pass(&variant.image, per_pass).await {
                    Ok(preds) => self.push_classified(
                        &mut all_predictions,
                        preds,
                        variant.name,
                        WEIGHT_AUGMENTED,
                    ),
                    Err(e) => warn!("classification of {} variant failed: {}", variant.name, e),
                }
            }
        }

        // 4. Object detection, on the original and the enhanced variant.
        // Failures here degrade to classification-only, never abort.
        if self.manager.detector_ready() {
            match self.detect_pass(image).await {
                Ok(detections) => self.push_detected(
                    &mut all_predictions,
                    detections,
                    "original",
                    WEIGHT_DETECTOR_ORIGINAL,
                ),
                Err(e) => warn!("object detection failed, using classification only: {}", e),
            }

            if options.use_preprocessing {
                let enhanced = variants::preprocess_variants(image).swap_remove(0);
                match self.detect_pass(&enhanced.image).await {
                    Ok(detections) => self.push_detected(
                        &mut all_predictions,
                        detections,
                        "enhanced",
                        WEIGHT_DETECTOR_ENHANCED,
                    ),
                    Err(e) => warn!("enhanced object detection failed: {}", e),
                }
            }
        }

        self.ensure_current(token)?;

        let ensemble = if options.use_ensemble {
            ensemble::calibrate(ensemble::aggregate(
                &all_predictions,
                &self.taxonomy,
                options.min_confidence,
                options.top_k,
            ))
        } else {
            direct_results(&all_predictions, options)
        };

        let analysis = ensemble::analyze(&ensemble);
        Ok(ClassifyReport {
            ensemble,
            analysis,
            image_quality,
        })
    }

    /// Detector output as raw detections, for extraction workflows that do
    /// not need the ensemble treatment.
    pub async fn detect(
        &self,
        image: &DynamicImage,
    ) -> Result<Vec<crate::models::classify_types::Detection>, Error> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput("no image supplied".to_string()));
        }
        self.detect_pass(image).await
    }

    async fn classify_pass(
        &self,
        image: &DynamicImage,
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, Error> {
        let tensor = inference::preprocess_classify(image, ModelFile::Classifier.crop_size())?;
        let labels = self.manager.classifier_labels().await?;
        let lock = self.manager.classifier_lock();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock.lock().unwrap();
            let session = guard.as_mut().ok_or_else(|| {
                Error::ModelUnavailable("classifier session not loaded".to_string())
            })?;
            inference::run_classifier(session, tensor, &labels, top_k)
        })
        .await
        .map_err(|e| Error::Other(format!("inference task failed to join: {}", e)))?
    }

    async fn detect_pass(
        &self,
        image: &DynamicImage,
    ) -> Result<Vec<crate::models::classify_types::Detection>, Error> {
        let tensor = inference::preprocess_detect(image)?;
        let labels = self.manager.detector_labels().await?;
        let lock = self.manager.detector_lock();
        let (width, height) = (image.width(), image.height());

        tokio::task::spawn_blocking(move || {
            let mut guard = lock.lock().unwrap();
            let session = guard.as_mut().ok_or_else(|| {
                Error::ModelUnavailable("detector session not loaded".to_string())
            })?;
            inference::run_detector(session, tensor, &labels, DETECT_MIN_SCORE, width, height)
        })
        .await
        .map_err(|e| Error::Other(format!("inference task failed to join: {}", e)))?
    }

    fn ensure_current(&self, token: u64) -> Result<(), Error> {
        if self.generation.is_current(token) {
            Ok(())
        } else {
            Err(Error::Superseded)
        }
    }

    fn push_classified(
        &self,
        out: &mut Vec<Prediction>,
        preds: Vec<(String, f32)>,
        variant: &str,
        weight: f32,
    ) {
        for (raw_label, score) in preds {
            out.push(Prediction {
                label: taxonomy::format_label(&raw_label),
                score,
                source: Source::new(ModelKind::Classifier, variant),
                category: self.taxonomy.categorize(&raw_label),
                weight,
                bounding_box: None,
            });
        }
    }

    fn push_detected(
        &self,
        out: &mut Vec<Prediction>,
        detections: Vec<crate::models::classify_types::Detection>,
        variant: &str,
        weight: f32,
    ) {
        for detection in detections {
            out.push(Prediction {
                label: taxonomy::format_label(&detection.label),
                score: detection.score,
                source: Source::new(ModelKind::Detector, variant),
                category: self.taxonomy.categorize(&detection.label),
                weight,
                bounding_box: Some(detection.bounding_box),
            });
        }
    }
}

/// The non-ensemble path: classifier output on the original image, passed
/// through unmerged.
fn direct_results(predictions: &[Prediction], options: &ClassifyOptions) -> Vec<RankedResult> {
    predictions
        .iter()
        .filter(|p| {
            p.source.model == ModelKind::Classifier
                && p.source.variant == "original"
                && p.score >= options.min_confidence
        })
        .take(options.top_k)
        .map(|p| RankedResult {
            label: p.label.clone(),
            confidence: p.score,
            raw_confidence: p.score,
            category: p.category.clone(),
            votes: 1,
            stability: 1.0,
            sources: vec![p.source.to_string()],
            alternative_labels: vec![p.label.clone()],
        })
        .collect()
}

/// Resolution and aspect-ratio checks with user-facing recommendations.
pub fn analyze_image_quality(image: &DynamicImage) -> ImageQuality {
    let resolution = image.width() as u64 * image.height() as u64;
    let aspect_ratio = if image.height() > 0 {
        image.width() as f32 / image.height() as f32
    } else {
        0.0
    };

    let mut recommendations = Vec::new();
    if resolution < 100_000 {
        recommendations
            .push("Image resolution is low - try using a higher quality image".to_string());
    }
    if aspect_ratio < 0.5 || aspect_ratio > 2.0 {
        recommendations.push(
            "Unusual aspect ratio detected - square or landscape images work best".to_string(),
        );
    }

    ImageQuality {
        resolution,
        aspect_ratio,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([128, 128, 128, 255])))
    }

    #[tokio::test]
    async fn classify_without_models_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = EnsembleClassifier::new(ModelManager::new(dir.path().to_path_buf()));
        let result = classifier
            .classify(&blank(640, 480), &ClassifyOptions::default())
            .await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn empty_image_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = EnsembleClassifier::new(ModelManager::new(dir.path().to_path_buf()));
        let result = classifier
            .classify(
                &DynamicImage::ImageRgba8(RgbaImage::new(0, 0)),
                &ClassifyOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn quality_flags_low_resolution_and_odd_aspect() {
        let quality = analyze_image_quality(&blank(100, 100));
        assert_eq!(quality.resolution, 10_000);
        assert_eq!(quality.recommendations.len(), 1);

        let quality = analyze_image_quality(&blank(1200, 400));
        assert!((quality.aspect_ratio - 3.0).abs() < 1e-6);
        assert!(quality
            .recommendations
            .iter()
            .any(|r| r.contains("aspect ratio")));

        let quality = analyze_image_quality(&blank(800, 600));
        assert!(quality.recommendations.is_empty());
    }

    #[test]
    fn newer_request_supersedes_older_token() {
        let generation = Generation::default();
        let first = generation.begin();
        assert!(generation.is_current(first));

        let second = generation.begin();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }

    #[test]
    fn stale_token_aborts_with_superseded() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = EnsembleClassifier::new(ModelManager::new(dir.path().to_path_buf()));
        let token = classifier.generation.begin();
        classifier.generation.begin();
        assert!(matches!(
            classifier.ensure_current(token),
            Err(Error::Superseded)
        ));
    }

    #[test]
    fn direct_results_keep_only_original_classifier_passes() {
        let opts = ClassifyOptions::default();
        let preds = vec![
            Prediction {
                label: "Dog".to_string(),
                score: 0.8,
                source: Source::new(ModelKind::Classifier, "original"),
                category: "animals-mammals".to_string(),
                weight: 0.8,
                bounding_box: None,
            },
            Prediction {
                label: "Dog".to_string(),
                score: 0.9,
                source: Source::new(ModelKind::Detector, "original"),
                category: "animals-mammals".to_string(),
                weight: 1.2,
                bounding_box: None,
            },
            Prediction {
                label: "Cat".to_string(),
                score: 0.01,
                source: Source::new(ModelKind::Classifier, "original"),
                category: "animals-mammals".to_string(),
                weight: 0.8,
                bounding_box: None,
            },
        ];
        let results = direct_results(&preds, &opts);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "Dog");
        assert!((results[0].confidence - 0.8).abs() < 1e-6);
    }
}
