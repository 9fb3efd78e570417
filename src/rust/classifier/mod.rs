use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;

use crate::category::{category_of, CategoryTag};

mod error;
mod handle;
mod inference;
mod mobilenet;
mod utils;

pub use error::ClassifierError;
pub use handle::{ModelHandle, ModelState};
pub use mobilenet::{MobileNet, MobileNetLoader, DEFAULT_TOP_K};

/// A single ranked label returned by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Probability in [0, 1]. Values across a result need not sum to 1.
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Confidence as shown to the user, e.g. `94.00%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", f64::from(self.confidence) * 100.0)
    }
}

/// Non-empty list of predictions ordered by descending confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    predictions: Vec<Prediction>,
}

impl ClassificationResult {
    /// Validates and sorts raw classifier output.
    pub fn from_predictions(mut predictions: Vec<Prediction>) -> Result<Self, ClassifierError> {
        if predictions.is_empty() {
            return Err(ClassifierError::ClassificationFailed(
                "Classifier returned no labels".into(),
            ));
        }
        if let Some(bad) = predictions
            .iter()
            .find(|p| !p.confidence.is_finite() || !(0.0..=1.0).contains(&p.confidence))
        {
            return Err(ClassifierError::ClassificationFailed(format!(
                "Confidence for '{}' out of range: {}",
                bad.label, bad.confidence
            )));
        }
        predictions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { predictions })
    }

    /// The highest-confidence prediction.
    pub fn top(&self) -> &Prediction {
        &self.predictions[0]
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// A classification result together with the meal course of its top label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedResult {
    pub result: ClassificationResult,
    pub category: CategoryTag,
}

impl AnnotatedResult {
    pub fn new(result: ClassificationResult) -> Self {
        let category = category_of(&result.top().label);
        Self { result, category }
    }

    /// Predictions in rank order. Only rank 0 carries a category, and only
    /// when the label is in one of the tables.
    pub fn rows(&self) -> impl Iterator<Item = (&Prediction, Option<CategoryTag>)> + '_ {
        let category = self.category;
        self.result
            .predictions()
            .iter()
            .enumerate()
            .map(move |(rank, prediction)| {
                let tag = (rank == 0 && category.is_classified()).then_some(category);
                (prediction, tag)
            })
    }
}

/// Opaque image classification capability.
///
/// Implementations may block for as long as inference takes; [`ModelHandle`]
/// runs them on the blocking thread pool.
pub trait ImageClassifier: Send + Sync {
    /// Returns ranked labels for `image`. Must not be empty on success.
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, ClassifierError>;
}

/// Asynchronously produces a ready [`ImageClassifier`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ImageClassifier>, ClassifierError>;
}
