use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use food_identifier::{
    CategoryTag, ClassifierError, HistoryStore, ImageClassifier, ImageFetcher, ImageReference,
    ModelHandle, ModelLoader, ModelState, Prediction, SessionController, SessionError,
    SessionState, HISTORY_DISPLAY_LIMIT,
};
use image::{DynamicImage, Rgb, RgbImage};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Returns canned predictions and counts how often it ran.
struct ScriptedClassifier {
    predictions: Vec<Prediction>,
    calls: AtomicUsize,
}

impl ImageClassifier for ScriptedClassifier {
    fn classify(&self, _image: &DynamicImage) -> Result<Vec<Prediction>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.predictions.clone())
    }
}

struct ScriptedLoader(Arc<ScriptedClassifier>);

#[async_trait]
impl ModelLoader for ScriptedLoader {
    async fn load(&self) -> Result<Arc<dyn ImageClassifier>, ClassifierError> {
        Ok(self.0.clone())
    }
}

struct BrokenLoader;

#[async_trait]
impl ModelLoader for BrokenLoader {
    async fn load(&self) -> Result<Arc<dyn ImageClassifier>, ClassifierError> {
        Err(ClassifierError::ModelLoadFailed("weights missing".into()))
    }
}

/// Holds the load open until the gate is released.
struct GatedLoader {
    gate: Arc<Notify>,
    classifier: Arc<ScriptedClassifier>,
}

#[async_trait]
impl ModelLoader for GatedLoader {
    async fn load(&self) -> Result<Arc<dyn ImageClassifier>, ClassifierError> {
        self.gate.notified().await;
        Ok(self.classifier.clone())
    }
}

fn scripted(predictions: Vec<(&str, f32)>) -> Arc<ScriptedClassifier> {
    Arc::new(ScriptedClassifier {
        predictions: predictions
            .into_iter()
            .map(|(label, confidence)| Prediction::new(label, confidence))
            .collect(),
        calls: AtomicUsize::new(0),
    })
}

async fn ready_model(classifier: Arc<ScriptedClassifier>) -> ModelHandle {
    let model = ModelHandle::new();
    assert_eq!(model.load(&ScriptedLoader(classifier)).await, ModelState::Ready);
    model
}

fn write_image(dir: &Path, name: &str) -> ImageReference {
    let path = dir.join(name);
    RgbImage::from_pixel(8, 8, Rgb([120, 60, 30]))
        .save(&path)
        .expect("write test image");
    ImageReference::File(path)
}

#[tokio::test]
async fn pizza_is_a_main_course() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempfile::tempdir()?;
    let model = ready_model(scripted(vec![
        ("pizza, pizza pie", 0.94),
        ("potpie", 0.03),
        ("plate", 0.01),
    ]))
    .await;

    let mut session = SessionController::new();
    session.select_image(write_image(dir.path(), "pizza.png"));
    let annotated = session.classify(&model, &ImageFetcher::new()).await?;

    assert_eq!(annotated.category, CategoryTag::MainCourse);
    assert_eq!(annotated.result.top().confidence_percent(), "94.00%");
    let tags: Vec<Option<CategoryTag>> = annotated.rows().map(|(_, tag)| tag).collect();
    assert_eq!(tags, vec![Some(CategoryTag::MainCourse), None, None]);
    assert_eq!(session.state(), SessionState::ResultsReady);
    Ok(())
}

#[tokio::test]
async fn strawberry_is_a_dessert() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let model = ready_model(scripted(vec![("trifle", 0.2), ("strawberry", 0.7)])).await;

    let mut session = SessionController::new();
    session.select_image(write_image(dir.path(), "berry.png"));
    let annotated = session.classify(&model, &ImageFetcher::new()).await?;

    assert_eq!(annotated.result.top().label, "strawberry");
    assert_eq!(annotated.category, CategoryTag::Dessert);
    Ok(())
}

#[tokio::test]
async fn unknown_label_is_unclassified() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let model = ready_model(scripted(vec![("bicycle", 0.8), ("pizza, pizza pie", 0.1)])).await;

    let mut session = SessionController::new();
    session.select_image(write_image(dir.path(), "bike.png"));
    let annotated = session.classify(&model, &ImageFetcher::new()).await?;

    assert_eq!(annotated.category, CategoryTag::Unclassified);
    assert!(annotated.rows().all(|(_, tag)| tag.is_none()));
    Ok(())
}

#[test]
fn history_window_returns_newest_first() {
    let refs: Vec<ImageReference> = ["a", "b", "c"]
        .iter()
        .map(|name| ImageReference::Url(format!("https://img.test/{}.png", name)))
        .collect();

    for mut history in [HistoryStore::new(), HistoryStore::bounded(HISTORY_DISPLAY_LIMIT)] {
        for reference in &refs {
            history.record(reference.clone());
        }
        assert_eq!(history.window(2), vec![&refs[2], &refs[1]]);
        assert_eq!(history.window(2), history.window(2));
    }
}

#[tokio::test]
async fn failed_load_never_classifies() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempfile::tempdir()?;
    let model = ModelHandle::new();
    assert!(matches!(model.load(&BrokenLoader).await, ModelState::LoadFailed(_)));

    let mut session = SessionController::new();
    session.select_image(write_image(dir.path(), "cake.png"));

    for _ in 0..3 {
        let err = assert_err!(session.classify(&model, &ImageFetcher::new()).await);
        assert!(matches!(err, SessionError::Classifier(ClassifierError::ModelNotReady(_))));
        assert!(matches!(model.state(), ModelState::LoadFailed(_)));
    }
    assert_eq!(session.history().len(), 1);
    assert!(session.results().is_none());
    assert_eq!(session.state(), SessionState::ImageLoaded);
    Ok(())
}

#[tokio::test]
async fn not_ready_model_does_not_read_the_image() {
    let model = ModelHandle::new();
    let mut session = SessionController::new();
    // The file does not exist: reading it would report ImageUnavailable instead.
    session.select_image(ImageReference::File("/no/such/image.png".into()));

    let err = assert_err!(session.classify(&model, &ImageFetcher::new()).await);
    assert!(matches!(err, SessionError::Classifier(ClassifierError::ModelNotReady(_))));
    assert_eq!(model.state(), ModelState::Unloaded);
}

#[tokio::test]
async fn malformed_image_keeps_session_intact() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let classifier = scripted(vec![("strawberry", 0.9)]);
    let model = ready_model(classifier.clone()).await;

    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, b"definitely not a png")?;

    let mut session = SessionController::new();
    session.select_image(ImageReference::File(bogus.clone()));
    let err = assert_err!(session.classify(&model, &ImageFetcher::new()).await);

    assert!(matches!(err, SessionError::Classifier(ClassifierError::ClassificationFailed(_))));
    assert_eq!(session.current_image(), Some(&ImageReference::File(bogus)));
    assert_eq!(session.history().len(), 1);
    assert!(session.last_error().is_some());
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn model_is_loaded_once_and_shared() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let classifier = scripted(vec![("guacamole", 0.6)]);
    let model = ready_model(classifier.clone()).await;
    let shared = model.clone();
    assert_eq!(shared.load(&BrokenLoader).await, ModelState::Ready);

    let image = write_image(dir.path(), "dip.png");
    let mut first = SessionController::new();
    let mut second = SessionController::new();
    first.select_image(image.clone());
    second.select_image(image);

    let fetcher = ImageFetcher::new();
    assert_eq!(assert_ok!(first.classify(&model, &fetcher).await).category, CategoryTag::Appetizer);
    assert_eq!(assert_ok!(second.classify(&shared, &fetcher).await).category, CategoryTag::Appetizer);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn reselected_history_item_is_classified_again() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let model = ready_model(scripted(vec![("ice cream, icecream", 0.88)])).await;
    let fetcher = ImageFetcher::new();

    let mut session = SessionController::new();
    let first = write_image(dir.path(), "first.png");
    session.select_image(first.clone());
    session.select_image(write_image(dir.path(), "second.png"));

    session.select_history_item(1)?;
    assert_eq!(session.current_image(), Some(&first));
    assert_eq!(session.view().recent.len(), 3);
    assert_eq!(session.view().recent[0], &first);

    let annotated = session.classify(&model, &fetcher).await?;
    assert_eq!(annotated.category, CategoryTag::Dessert);
    Ok(())
}

#[tokio::test]
async fn classify_during_load_is_refused_without_touching_history() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempfile::tempdir()?;
    let gate = Arc::new(Notify::new());
    let classifier = scripted(vec![("pizza, pizza pie", 0.9)]);
    let model = ModelHandle::new();

    let background = model.clone();
    let loader = GatedLoader {
        gate: gate.clone(),
        classifier: classifier.clone(),
    };
    let load = tokio::spawn(async move { background.load(&loader).await });
    let mut states = model.subscribe();
    states.wait_for(|state| *state == ModelState::Loading).await?;

    let mut session = SessionController::new();
    session.select_image(write_image(dir.path(), "pizza.png"));
    let err = assert_err!(session.classify(&model, &ImageFetcher::new()).await);
    assert!(matches!(err, SessionError::Classifier(ClassifierError::ModelNotReady(_))));
    assert_eq!(model.state(), ModelState::Loading);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.state(), SessionState::ImageLoaded);
    assert!(session.results().is_none());
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);

    gate.notify_one();
    assert_eq!(load.await?, ModelState::Ready);
    let annotated = session.classify(&model, &ImageFetcher::new()).await?;
    assert_eq!(annotated.category, CategoryTag::MainCourse);
    Ok(())
}
