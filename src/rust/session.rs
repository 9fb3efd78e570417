//! Per-user classification session.
//!
//! The controller owns the history and the current image, and turns user
//! events into state transitions:
//!
//! ```text
//! NoImage --select--> ImageLoaded --classify--> Classifying --ok--> ResultsReady
//!                         ^                         |
//!                         +--------- error ---------+
//! any state --clear--> NoImage
//! ```
//!
//! Every selection, clear or new classify request bumps a generation number.
//! A classification that finishes after a newer event is discarded instead of
//! overwriting the newer state.

use log::{debug, info, warn};

use crate::classifier::{AnnotatedResult, ClassificationResult, ClassifierError, ModelHandle};
use crate::history::{HistoryStore, HISTORY_DISPLAY_LIMIT};
use crate::image_source::{ImageFetcher, ImageReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoImage,
    ImageLoaded,
    Classifying,
    ResultsReady,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No image selected")]
    NoImageSelected,
    #[error("History index {index} out of range ({len} entries)")]
    HistoryIndexOutOfRange { index: usize, len: usize },
    #[error("Classification was superseded by a newer request")]
    Superseded,
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Proof of a classify request, handed back with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyTicket {
    generation: u64,
    image: ImageReference,
}

impl ClassifyTicket {
    pub fn image(&self) -> &ImageReference {
        &self.image
    }
}

/// Everything the presentation layer needs to render the session.
#[derive(Debug)]
pub struct SessionView<'a> {
    pub state: SessionState,
    pub current: Option<&'a ImageReference>,
    pub results: Option<&'a AnnotatedResult>,
    pub error: Option<&'a str>,
    pub recent: Vec<&'a ImageReference>,
}

#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    current: Option<ImageReference>,
    history: HistoryStore,
    results: Option<AnnotatedResult>,
    last_error: Option<String>,
    generation: u64,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self::with_history(HistoryStore::new())
    }

    /// Starts a session on top of a pre-configured history store.
    pub fn with_history(history: HistoryStore) -> Self {
        Self {
            state: SessionState::NoImage,
            current: None,
            history,
            results: None,
            last_error: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_image(&self) -> Option<&ImageReference> {
        self.current.as_ref()
    }

    pub fn results(&self) -> Option<&AnnotatedResult> {
        self.results.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// A new image was uploaded or pasted.
    pub fn select_image(&mut self, reference: ImageReference) {
        info!("Image selected: {}", reference);
        self.history.record(reference.clone());
        self.current = Some(reference);
        self.results = None;
        self.last_error = None;
        self.state = SessionState::ImageLoaded;
        self.generation += 1;
    }

    /// Re-selects a history entry. The entry is added to the front again
    /// rather than moved.
    pub fn select_history_item(&mut self, index: usize) -> Result<(), SessionError> {
        let reference = self
            .history
            .get(index)
            .cloned()
            .ok_or(SessionError::HistoryIndexOutOfRange {
                index,
                len: self.history.len(),
            })?;
        self.select_image(reference);
        Ok(())
    }

    /// Drops the current image and results. History is kept.
    pub fn clear(&mut self) {
        if self.state != SessionState::NoImage {
            info!("Image cleared");
        }
        self.current = None;
        self.results = None;
        self.last_error = None;
        self.state = SessionState::NoImage;
        self.generation += 1;
    }

    /// Starts a classification of the current image.
    pub fn begin_classify(&mut self) -> Result<ClassifyTicket, SessionError> {
        let image = self.current.clone().ok_or(SessionError::NoImageSelected)?;
        self.generation += 1;
        self.state = SessionState::Classifying;
        Ok(ClassifyTicket {
            generation: self.generation,
            image,
        })
    }

    /// Applies the outcome of a classification started with [`begin_classify`].
    ///
    /// Stale tickets are rejected with [`SessionError::Superseded`] and change
    /// nothing. Failures keep the image and any earlier results and are
    /// remembered for display.
    ///
    /// [`begin_classify`]: SessionController::begin_classify
    pub fn finish_classify(
        &mut self,
        ticket: ClassifyTicket,
        outcome: Result<ClassificationResult, ClassifierError>,
    ) -> Result<&AnnotatedResult, SessionError> {
        if ticket.generation != self.generation {
            debug!(
                "Discarding stale classification for {} (generation {}, latest {})",
                ticket.image, ticket.generation, self.generation
            );
            return Err(SessionError::Superseded);
        }

        match outcome {
            Ok(result) => {
                let annotated = AnnotatedResult::new(result);
                info!(
                    "Classified {} as '{}' ({})",
                    ticket.image,
                    annotated.result.top().label,
                    annotated.category
                );
                self.last_error = None;
                self.state = SessionState::ResultsReady;
                Ok(self.results.insert(annotated))
            }
            Err(e) => {
                warn!("Classification of {} failed: {}", ticket.image, e);
                self.last_error = Some(e.to_string());
                self.state = if self.results.is_some() {
                    SessionState::ResultsReady
                } else {
                    SessionState::ImageLoaded
                };
                Err(e.into())
            }
        }
    }

    /// Fetches the current image and classifies it.
    ///
    /// A model that is not ready fails fast without reading the image.
    pub async fn classify(
        &mut self,
        model: &ModelHandle,
        images: &ImageFetcher,
    ) -> Result<&AnnotatedResult, SessionError> {
        let ticket = self.begin_classify()?;
        let outcome = if !model.is_ready() {
            Err(ClassifierError::ModelNotReady(model.state().to_string()))
        } else {
            match images.fetch(ticket.image()).await {
                Ok(image) => model.classify(image).await,
                Err(e) => Err(e),
            }
        };
        self.finish_classify(ticket, outcome)
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            state: self.state,
            current: self.current.as_ref(),
            results: self.results.as_ref(),
            error: self.last_error.as_deref(),
            recent: self.history.window(HISTORY_DISPLAY_LIMIT),
        }
    }
}
