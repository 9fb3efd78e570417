//! Identify food in photos and sort it into meal courses.
//!
//! A MobileNet ONNX model classifies an image, the top label is mapped to an
//! appetizer, main course or dessert, and recently selected images are kept in
//! a most-recent-first history.
//!
//! # Basic Usage
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use food_identifier::{
//!     BuiltinModel, ImageFetcher, ImageReference, MobileNetLoader, ModelHandle, ModelManager,
//!     SessionController,
//! };
//!
//! let model = ModelHandle::new();
//! let loader = MobileNetLoader::builtin(ModelManager::new_default()?, BuiltinModel::MobileNetV2, true);
//! model.load(&loader).await;
//!
//! let mut session = SessionController::new();
//! session.select_image(ImageReference::parse("https://example.com/pizza.jpg").unwrap());
//! let annotated = session.classify(&model, &ImageFetcher::new()).await?;
//! println!("{} -> {}", annotated.result.top().label, annotated.category);
//! # Ok(())
//! # }
//! ```
//!
//! # Sharing the model
//!
//! [`ModelHandle`] is cheap to clone and every clone sees the same model, so
//! one handle can serve any number of sessions. Classify calls are queued and
//! run one at a time on the blocking thread pool.

pub mod category;
pub mod classifier;
pub mod history;
pub mod image_source;
pub mod model_manager;
pub mod models;
pub mod nutrition;
pub mod pokedex;
mod runtime;
pub mod session;

pub use category::{category_of, CategoryTag};
pub use classifier::{
    AnnotatedResult, ClassificationResult, ClassifierError, ImageClassifier, MobileNet,
    MobileNetLoader, ModelHandle, ModelLoader, ModelState, Prediction, DEFAULT_TOP_K,
};
pub use history::{HistoryStore, HISTORY_DISPLAY_LIMIT};
pub use image_source::{ImageFetcher, ImageReference};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use session::{ClassifyTicket, SessionController, SessionError, SessionState, SessionView};

pub fn init_logger() {
    env_logger::init();
}
