use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use log::{error, info};
use ort::session::Session;

use super::error::ClassifierError;
use super::inference::ImageInference;
use super::utils::{softmax, top_k};
use super::{ImageClassifier, ModelLoader, Prediction};
use crate::runtime::{create_session_builder, RuntimeConfig};
use crate::{BuiltinModel, ModelError, ModelManager};

/// Number of predictions returned per image unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// A thread-safe MobileNet image classifier running on ONNX Runtime.
///
/// `Session` is `Send + Sync`, so a `MobileNet` can be shared behind an `Arc`
/// and driven from the blocking thread pool.
#[derive(Debug)]
pub struct MobileNet {
    model_path: PathBuf,
    session: Session,
    labels: Vec<String>,
    input_size: u32,
    top_k: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<MobileNet>();
    }
};

impl ImageInference for MobileNet {
    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }
}

impl MobileNet {
    /// Loads a model and its labels file.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The classifier, or `ModelLoadFailed` if:
    ///   - Either path does not exist
    ///   - The labels file is empty
    ///   - The ONNX session cannot be created
    ///   - The model has no input or output tensors
    pub fn from_files(
        model_path: impl AsRef<Path>,
        labels_path: impl AsRef<Path>,
        input_size: u32,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();
        if !model_path.exists() {
            return Err(ClassifierError::ModelLoadFailed(format!(
                "Model file not found: {}", model_path.display()
            )));
        }
        if !labels_path.exists() {
            return Err(ClassifierError::ModelLoadFailed(format!(
                "Labels file not found: {}", labels_path.display()
            )));
        }

        let raw = fs::read_to_string(labels_path).map_err(|e| {
            error!("Failed to read labels: {}", e);
            ClassifierError::ModelLoadFailed(format!("Failed to read labels: {}", e))
        })?;
        let labels = parse_labels(&raw);
        if labels.is_empty() {
            return Err(ClassifierError::ModelLoadFailed("Labels file contains no labels".into()));
        }
        info!("Loaded {} labels from {:?}", labels.len(), labels_path);

        let session = create_session_builder(runtime_config)?
            .commit_from_file(model_path)?;
        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        Ok(Self {
            model_path: model_path.to_path_buf(),
            session,
            labels,
            input_size,
            top_k: DEFAULT_TOP_K,
        })
    }

    /// Sets how many predictions `classify` returns (at least one).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.is_empty() {
            return Err(ClassifierError::ModelLoadFailed("Model must have an image input".into()));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelLoadFailed("Model must have a score output".into()));
        }
        Ok(())
    }
}

impl ImageClassifier for MobileNet {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, ClassifierError> {
        let scores = self.run_scores(image)?;
        Ok(rank_scores(&scores, &self.labels, self.top_k))
    }
}

/// Converts raw model scores into the `k` most likely labels.
///
/// Scores that already form a distribution are used as is, anything else
/// (logits) goes through softmax first.
fn rank_scores(scores: &[f32], labels: &[String], k: usize) -> Vec<Prediction> {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    let probs = if is_distribution { scores.to_vec() } else { softmax(scores) };

    top_k(&probs, k)
        .into_iter()
        .map(|(index, confidence)| {
            let label = labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", index));
            Prediction::new(label, confidence)
        })
        .collect()
}

/// Reads one label per line, dropping a leading WordNet id such as `n07873807`.
fn parse_labels(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(' ') {
            Some((id, rest)) if is_wordnet_id(id) => rest.trim().to_string(),
            _ => line.to_string(),
        })
        .collect()
}

fn is_wordnet_id(token: &str) -> bool {
    token.len() == 9
        && token.starts_with('n')
        && token[1..].chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone)]
enum ModelSource {
    Builtin { manager: ModelManager, model: BuiltinModel, download: bool },
    Files { model_path: PathBuf, labels_path: PathBuf },
}

/// Loads a [`MobileNet`] off the async runtime.
#[derive(Debug, Clone)]
pub struct MobileNetLoader {
    source: ModelSource,
    runtime_config: RuntimeConfig,
    top_k: usize,
}

impl MobileNetLoader {
    /// Uses a built-in model from the cache, downloading it first when `download` is set.
    pub fn builtin(manager: ModelManager, model: BuiltinModel, download: bool) -> Self {
        Self {
            source: ModelSource::Builtin { manager, model, download },
            runtime_config: RuntimeConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Uses model and label files from arbitrary paths.
    pub fn from_files(model_path: impl Into<PathBuf>, labels_path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Files {
                model_path: model_path.into(),
                labels_path: labels_path.into(),
            },
            runtime_config: RuntimeConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[async_trait]
impl ModelLoader for MobileNetLoader {
    async fn load(&self) -> Result<Arc<dyn ImageClassifier>, ClassifierError> {
        let (model_path, labels_path, input_size) = match &self.source {
            ModelSource::Builtin { manager, model, download } => {
                if *download {
                    manager.ensure_model_downloaded(*model).await
                        .map_err(|e| ClassifierError::ModelLoadFailed(e.to_string()))?;
                } else if !manager.is_model_downloaded(*model) {
                    let missing = ModelError::NotDownloaded(format!(
                        "{:?} (run `food-identifier download` first)",
                        model
                    ));
                    return Err(ClassifierError::ModelLoadFailed(missing.to_string()));
                }
                (
                    manager.get_model_path(*model),
                    manager.get_labels_path(*model),
                    model.characteristics().input_size,
                )
            }
            ModelSource::Files { model_path, labels_path } => {
                (model_path.clone(), labels_path.clone(), BuiltinModel::MobileNetV2.characteristics().input_size)
            }
        };

        let runtime_config = self.runtime_config.clone();
        let top_k = self.top_k;
        let mobilenet = tokio::task::spawn_blocking(move || {
            MobileNet::from_files(&model_path, &labels_path, input_size, &runtime_config)
                .map(|m| m.with_top_k(top_k))
        })
        .await
        .map_err(|e| ClassifierError::ModelLoadFailed(format!("Loader task failed: {}", e)))??;

        Ok(Arc::new(mobilenet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels_strips_wordnet_ids() {
        let raw = "n07873807 pizza, pizza pie\n\nstrawberry\n  n0000 not an id  \n";
        assert_eq!(
            parse_labels(raw),
            vec!["pizza, pizza pie", "strawberry", "n0000 not an id"]
        );
    }

    #[test]
    fn test_rank_scores_applies_softmax_to_logits() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = rank_scores(&[2.0, 5.0, -1.0], &labels, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label, "b");
        assert_eq!(ranked[1].label, "a");
        assert!(ranked.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
    }

    #[test]
    fn test_rank_scores_keeps_probabilities() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let ranked = rank_scores(&[0.25, 0.75], &labels, 3);
        assert_eq!(ranked, vec![Prediction::new("b", 0.75), Prediction::new("a", 0.25)]);
    }

    #[test]
    fn test_rank_scores_names_unknown_indices() {
        let ranked = rank_scores(&[0.1, 0.9], &["a".to_string()], 1);
        assert_eq!(ranked[0].label, "class_1");
    }

    #[tokio::test]
    async fn test_loader_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let loader = MobileNetLoader::from_files(dir.path().join("model.onnx"), dir.path().join("labels.txt"));
        let err = loader.load().await.err().unwrap();
        assert!(matches!(err, ClassifierError::ModelLoadFailed(msg) if msg.contains("Model file not found")));
    }

    #[tokio::test]
    async fn test_builtin_loader_without_download_requires_cached_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        let loader = MobileNetLoader::builtin(manager, BuiltinModel::MobileNetV2, false);
        let err = loader.load().await.err().unwrap();
        assert!(matches!(err, ClassifierError::ModelLoadFailed(msg) if msg.contains("not downloaded")));
    }
}
