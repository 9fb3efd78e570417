use std::fmt;
use std::sync::{Arc, OnceLock};

use image::DynamicImage;
use log::{error, info, warn};
use tokio::sync::{watch, Mutex};

use super::error::ClassifierError;
use super::{ClassificationResult, ImageClassifier, ModelLoader};

/// Lifecycle of the shared classification model.
///
/// `Unloaded -> Loading -> Ready | LoadFailed`. A load that is dropped before
/// it finishes also ends in `LoadFailed`. The only way back to `Loading` is an
/// explicit [`ModelHandle::retry`] from `LoadFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    LoadFailed(String),
}

impl ModelState {
    /// True once loading has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, ModelState::Ready | ModelState::LoadFailed(_))
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Unloaded => f.write_str("unloaded"),
            ModelState::Loading => f.write_str("loading"),
            ModelState::Ready => f.write_str("ready"),
            ModelState::LoadFailed(reason) => write!(f, "load failed: {}", reason),
        }
    }
}

struct Inner {
    state: watch::Sender<ModelState>,
    classifier: OnceLock<Arc<dyn ImageClassifier>>,
    inference_lock: Mutex<()>,
}

/// Marks an abandoned load as failed.
///
/// Held for as long as the state is `Loading`. If the load future is dropped
/// or the loader panics, the state moves to `LoadFailed` so that
/// [`ModelHandle::retry`] can start over and waiters wake up.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<ModelState>,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == ModelState::Loading {
                warn!("Model load was cancelled before it finished");
                *state = ModelState::LoadFailed(LOAD_CANCELLED.to_string());
                true
            } else {
                false
            }
        });
    }
}

const LOAD_CANCELLED: &str = "load cancelled";

/// Process-wide handle to the classification model.
///
/// Cloning is cheap and every clone observes the same state. The model is
/// loaded once and then reused for every classification; classify calls are
/// serialized.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<Inner>,
}

impl Default for ModelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl ModelHandle {
    /// Creates a handle in the `Unloaded` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ModelState::Unloaded);
        Self {
            inner: Arc::new(Inner {
                state,
                classifier: OnceLock::new(),
                inference_lock: Mutex::new(()),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.inner.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.state.borrow(), ModelState::Ready)
    }

    /// Receiver that is notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.inner.state.subscribe()
    }

    /// Suspends until the model is `Ready` or `LoadFailed`.
    pub async fn wait_until_settled(&self) -> ModelState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(ModelState::is_settled).await.map(|state| state.clone());
        // The sender lives in `self`, so the channel cannot close while we wait.
        settled.unwrap_or_else(|_| self.state())
    }

    /// Loads the model if nothing has been loaded yet.
    ///
    /// Only the first call from `Unloaded` does any work; later calls return
    /// the current state without touching the loader.
    pub async fn load<L>(&self, loader: &L) -> ModelState
    where
        L: ModelLoader + ?Sized,
    {
        let Some(guard) = self.begin_loading(|state| matches!(state, ModelState::Unloaded)) else {
            return self.state();
        };
        self.run_loader(loader, guard).await
    }

    /// Attempts the load again after a failure. Does nothing in any other state.
    pub async fn retry<L>(&self, loader: &L) -> ModelState
    where
        L: ModelLoader + ?Sized,
    {
        let Some(guard) = self.begin_loading(|state| matches!(state, ModelState::LoadFailed(_))) else {
            warn!("Retry ignored, model is {}", self.state());
            return self.state();
        };
        info!("Retrying model load");
        self.run_loader(loader, guard).await
    }

    fn begin_loading(&self, allowed: impl Fn(&ModelState) -> bool) -> Option<LoadingGuard<'_>> {
        let started = self.inner.state.send_if_modified(|state| {
            if allowed(state) {
                *state = ModelState::Loading;
                true
            } else {
                false
            }
        });
        started.then(|| LoadingGuard {
            state: &self.inner.state,
            armed: true,
        })
    }

    async fn run_loader<L>(&self, loader: &L, mut guard: LoadingGuard<'_>) -> ModelState
    where
        L: ModelLoader + ?Sized,
    {
        info!("Loading classification model...");
        let next = match loader.load().await {
            Ok(classifier) => {
                // A retry can only follow a failure, so the slot is still empty here.
                let _ = self.inner.classifier.set(classifier);
                info!("Classification model ready");
                ModelState::Ready
            }
            Err(e) => {
                error!("Failed to load classification model: {}", e);
                ModelState::LoadFailed(e.to_string())
            }
        };
        guard.armed = false;
        self.inner.state.send_replace(next.clone());
        next
    }

    /// Classifies a decoded image.
    ///
    /// Fails with [`ClassifierError::ModelNotReady`] unless the model is
    /// `Ready`. Inference runs on the blocking pool and concurrent calls are
    /// queued behind each other.
    pub async fn classify(&self, image: DynamicImage) -> Result<ClassificationResult, ClassifierError> {
        let classifier = {
            let state = self.inner.state.borrow();
            match (&*state, self.inner.classifier.get()) {
                (ModelState::Ready, Some(classifier)) => Arc::clone(classifier),
                (state, _) => {
                    warn!("Classification refused, model is {}", state);
                    return Err(ClassifierError::ModelNotReady(state.to_string()));
                }
            }
        };

        let _guard = self.inner.inference_lock.lock().await;
        let predictions = tokio::task::spawn_blocking(move || classifier.classify(&image))
            .await
            .map_err(|e| {
                ClassifierError::ClassificationFailed(format!("Inference task failed: {}", e))
            })??;

        ClassificationResult::from_predictions(predictions)
    }
}
