//! Ensemble image classification with ONNX models.
//!
//! Two pretrained models (an image classifier and an object detector) are
//! run over a set of deterministic image variants; their raw predictions are
//! merged into a single ranked, deduplicated result list with heuristic
//! confidence calibration. Color analysis and object extraction/removal sit
//! alongside as independent services.
//!
//! ```no_run
//! use lenswise::{ClassifyOptions, EnsembleClassifier, ModelManager};
//!
//! # async fn run(image: image::DynamicImage) -> Result<(), lenswise::Error> {
//! let manager = ModelManager::new("./data".into());
//! manager.download_models().await?;
//! manager.load_models(|pct, stage| println!("{pct}% {stage}")).await?;
//!
//! let classifier = EnsembleClassifier::new(manager);
//! let report = classifier.classify(&image, &ClassifyOptions::default()).await?;
//! for result in &report.ensemble {
//!     println!("{}: {:.1}%", result.label, result.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::ClassifyOptions;
pub use error::Error;
pub use models::classify_types::{
    BoundingBox, ClassifyReport, Detection, ImageQuality, ModelKind, ModelStatus, Prediction,
    RankedResult, ResultAnalysis, Source,
};
pub use models::color_types::ColorReport;
pub use services::classifier::model_manager::{ModelFile, ModelManager};
pub use services::classifier::service::EnsembleClassifier;
pub use services::taxonomy::Taxonomy;
