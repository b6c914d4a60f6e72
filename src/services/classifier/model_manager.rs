use crate::error::Error;
use crate::models::classify_types::ModelStatus;
use futures::StreamExt;
use ort::session::Session;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The two model artifacts the pipeline runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelFile {
    Classifier,
    Detector,
}

impl ModelFile {
    /// (model URL, config URL, model filename, config filename)
    fn config(&self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            ModelFile::Classifier => (
                "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/onnx/model.onnx",
                "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/config.json",
                "mobilenet_v2_224.onnx",
                "mobilenet_v2_224-config.json",
            ),
            ModelFile::Detector => (
                "https://huggingface.co/Xenova/detr-resnet-50/resolve/main/onnx/model.onnx",
                "https://huggingface.co/Xenova/detr-resnet-50/resolve/main/config.json",
                "detr-resnet-50.onnx",
                "detr-resnet-50-config.json",
            ),
        }
    }

    pub fn crop_size(&self) -> u32 {
        match self {
            ModelFile::Classifier => 224,
            ModelFile::Detector => super::inference::DETECT_SIZE,
        }
    }
}

/// Owns both ONNX sessions and their label tables.
///
/// Constructed explicitly at startup and passed by reference to whatever
/// needs it; sessions are loaded once and shared read-only behind their
/// mutexes afterwards. Classifier load failure is fatal to classification;
/// detector load failure degrades the pipeline to classifier-only.
#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    classifier: Arc<std::sync::Mutex<Option<Session>>>,
    detector: Arc<std::sync::Mutex<Option<Session>>>,
    classifier_labels: Arc<Mutex<Option<Vec<String>>>>,
    detector_labels: Arc<Mutex<Option<Vec<String>>>>,
    loading: Arc<Mutex<bool>>,
    error: Arc<Mutex<Option<String>>>,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            model_dir: data_dir.join("models"),
            classifier: Arc::new(std::sync::Mutex::new(None)),
            detector: Arc::new(std::sync::Mutex::new(None)),
            classifier_labels: Arc::new(Mutex::new(None)),
            detector_labels: Arc::new(Mutex::new(None)),
            loading: Arc::new(Mutex::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn model_path(&self, model: ModelFile) -> PathBuf {
        let (_, _, filename, _) = model.config();
        self.model_dir.join(filename)
    }

    pub fn config_path(&self, model: ModelFile) -> PathBuf {
        let (_, _, _, filename) = model.config();
        self.model_dir.join(filename)
    }

    pub fn is_downloaded(&self, model: ModelFile) -> bool {
        self.model_path(model).exists() && self.config_path(model).exists()
    }

    pub fn classifier_ready(&self) -> bool {
        self.classifier.lock().unwrap().is_some()
    }

    pub fn detector_ready(&self) -> bool {
        self.detector.lock().unwrap().is_some()
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.lock().await
    }

    pub async fn get_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            downloaded: self.is_downloaded(ModelFile::Classifier)
                && self.is_downloaded(ModelFile::Detector),
            loading: self.is_loading().await,
            classifier_ready: self.classifier_ready(),
            detector_ready: self.detector_ready(),
            error: self.get_error().await,
        }
    }

    pub fn classifier_lock(&self) -> Arc<std::sync::Mutex<Option<Session>>> {
        self.classifier.clone()
    }

    pub fn detector_lock(&self) -> Arc<std::sync::Mutex<Option<Session>>> {
        self.detector.clone()
    }

    pub async fn classifier_labels(&self) -> Result<Vec<String>, Error> {
        self.classifier_labels
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::ModelUnavailable("classifier labels not loaded".to_string()))
    }

    pub async fn detector_labels(&self) -> Result<Vec<String>, Error> {
        self.detector_labels
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::ModelUnavailable("detector labels not loaded".to_string()))
    }

    /// Download any missing model/config files. Detector download failure is
    /// tolerated; the classifier is required.
    pub async fn download_models(&self) -> Result<(), Error> {
        std::fs::create_dir_all(&self.model_dir)
            .map_err(|e| Error::Other(format!("failed to create model directory: {}", e)))?;

        self.download_one(ModelFile::Classifier).await?;
        if let Err(e) = self.download_one(ModelFile::Detector).await {
            warn!("detector download failed, continuing with classifier only: {}", e);
        }
        Ok(())
    }

    async fn download_one(&self, model: ModelFile) -> Result<(), Error> {
        let (model_url, config_url, _, _) = model.config();
        let config_path = self.config_path(model);
        let model_path = self.model_path(model);

        if !config_path.exists() {
            download_file(config_url, &config_path).await?;
        }
        if !model_path.exists() {
            download_file(model_url, &model_path).await?;
        }
        Ok(())
    }

    /// Load both sessions. `on_progress` receives coarse (percent, stage)
    /// updates the way the UI expects them.
    pub async fn load_models<F: Fn(u8, &str)>(&self, on_progress: F) -> Result<(), Error> {
        {
            let mut loading = self.loading.lock().await;
            if *loading {
                return Err(Error::Other("models are already loading".to_string()));
            }
            *loading = true;
        }
        *self.error.lock().await = None;

        on_progress(10, "Initializing inference runtime...");
        let result = self.do_load_models(&on_progress).await;

        *self.loading.lock().await = false;
        if let Err(ref e) = result {
            *self.error.lock().await = Some(e.to_string());
        }
        result
    }

    async fn do_load_models<F: Fn(u8, &str)>(&self, on_progress: &F) -> Result<(), Error> {
        on_progress(30, "Loading classifier model...");
        let labels = self.read_labels(ModelFile::Classifier).await?;
        let session = self.build_session(ModelFile::Classifier).await?;
        *self.classifier_labels.lock().await = Some(labels);
        *self.classifier.lock().unwrap() = Some(session);
        info!("classifier session loaded");
        on_progress(70, "Classifier loaded successfully...");

        // The detector is optional: keep going when it cannot be loaded.
        on_progress(80, "Loading object detection model...");
        match self.load_detector().await {
            Ok(()) => {
                info!("detector session loaded");
                on_progress(100, "All models loaded successfully!");
            }
            Err(e) => {
                warn!("detector failed to load, continuing with classifier only: {}", e);
                on_progress(100, "Classifier loaded successfully!");
            }
        }
        Ok(())
    }

    async fn load_detector(&self) -> Result<(), Error> {
        let labels = self.read_labels(ModelFile::Detector).await?;
        let session = self.build_session(ModelFile::Detector).await?;
        *self.detector_labels.lock().await = Some(labels);
        *self.detector.lock().unwrap() = Some(session);
        Ok(())
    }

    async fn read_labels(&self, model: ModelFile) -> Result<Vec<String>, Error> {
        let config_path = self.config_path(model);
        let config_content = tokio::fs::read_to_string(&config_path).await.map_err(|e| {
            Error::ModelUnavailable(format!(
                "failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        parse_id2label(&config_content)
    }

    async fn build_session(&self, model: ModelFile) -> Result<Session, Error> {
        let model_path = self.model_path(model);
        if !model_path.exists() {
            return Err(Error::ModelUnavailable(format!(
                "model file {} not downloaded",
                model_path.display()
            )));
        }

        tokio::task::spawn_blocking(move || -> Result<Session, Error> {
            let _ = ort::init().with_name("lenswise").commit();

            let session = Session::builder()
                .map_err(|e| Error::Other(format!("failed to create session builder: {}", e)))?
                .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
                .map_err(|e| Error::Other(format!("failed to set optimization level: {}", e)))?
                .with_intra_threads(4)
                .map_err(|e| Error::Other(format!("failed to set intra threads: {}", e)))?
                .commit_from_file(model_path)
                .map_err(|e| Error::ModelUnavailable(format!("failed to load ONNX model: {}", e)))?;
            Ok(session)
        })
        .await
        .map_err(|e| Error::Other(format!("failed to join model loading task: {}", e)))?
    }
}

/// Labels from a Hugging Face model config's `id2label` map, ordered by
/// class index.
fn parse_id2label(config_content: &str) -> Result<Vec<String>, Error> {
    let config: serde_json::Value = serde_json::from_str(config_content)?;
    let id2label = config["id2label"]
        .as_object()
        .ok_or_else(|| Error::Other("config missing id2label field".to_string()))?;

    let mut labels: Vec<(usize, String)> = id2label
        .iter()
        .map(|(k, v)| {
            let idx = k.parse::<usize>().unwrap_or(0);
            let label = v.as_str().unwrap_or("unknown").to_string();
            (idx, label)
        })
        .collect();
    labels.sort_by_key(|(idx, _)| *idx);
    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

async fn download_file(url: &str, dest: &PathBuf) -> Result<(), Error> {
    let client = reqwest::Client::new();
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(Error::Other(format!(
            "failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::Other(format!("failed to create file {}: {}", dest.display(), e)))?;

    let mut stream = response.bytes_stream();
    let mut last_logged = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| Error::Other(format!("failed to write to file: {}", e)))?;

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress > last_logged {
                debug!("downloading {}: {}%", dest.display(), progress);
                last_logged = progress;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_sorted_by_class_index() {
        let config = r#"{"id2label": {"2": "bird", "0": "cat", "1": "dog"}}"#;
        let labels = parse_id2label(config).unwrap();
        assert_eq!(labels, vec!["cat", "dog", "bird"]);
    }

    #[test]
    fn missing_id2label_is_an_error() {
        assert!(parse_id2label(r#"{"architectures": []}"#).is_err());
    }

    #[test]
    fn fresh_manager_reports_nothing_ready() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        assert!(!manager.classifier_ready());
        assert!(!manager.detector_ready());
        assert!(!manager.is_downloaded(ModelFile::Classifier));
    }

    #[tokio::test]
    async fn status_surfaces_unloaded_state() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        let status = manager.status().await;
        assert!(!status.downloaded);
        assert!(!status.loading);
        assert!(!status.classifier_ready);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn loading_without_download_fails_with_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path().to_path_buf());
        let result = manager.load_models(|_, _| {}).await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
        assert!(manager.get_error().await.is_some());
        // guard must be released for the next attempt
        assert!(!manager.is_loading().await);
    }
}
