use std::collections::HashMap;

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use super::error::ClassifierError;

/// ImageNet channel means (RGB).
pub(crate) const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB).
pub(crate) const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Runs an ONNX image classification model on decoded images.
///
/// The model is expected to:
/// - Accept one input of shape [batch_size=1, 3, input_size, input_size] (NCHW, f32)
/// - Output one score per class, shape [1, num_classes]
pub(crate) trait ImageInference {
    /// Returns the initialized ONNX session if available
    fn session(&self) -> Option<&Session>;

    /// Side length of the square model input
    fn input_size(&self) -> u32;

    /// Resizes and normalizes `image` into an NCHW tensor.
    fn to_input_array(&self, image: &DynamicImage) -> Array4<f32> {
        let size = self.input_size();
        let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        let mut array = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel.0[channel]) / 255.0;
                array[[0, channel, y as usize, x as usize]] =
                    (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
            }
        }
        array
    }

    /// Runs the model and returns the raw scores of the first output.
    ///
    /// # Errors
    /// - `ClassificationFailed` if the session is not initialized
    /// - `ClassificationFailed` if tensor creation, execution or extraction fails
    fn run_scores(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassifierError> {
        let session = self.session()
            .ok_or_else(|| ClassifierError::ClassificationFailed("Session not initialized".into()))?;
        let input_name = session.inputs.first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ClassifierError::ClassificationFailed("Model has no inputs".into()))?;

        let input = Tensor::from_array(self.to_input_array(image))
            .map_err(|e| ClassifierError::ClassificationFailed(format!("Failed to create input tensor: {}", e)))?;
        let mut input_tensors = HashMap::new();
        input_tensors.insert(input_name, input);

        let outputs = session.run(input_tensors)
            .map_err(|e| ClassifierError::ClassificationFailed(format!("Failed to run model: {}", e)))?;
        let scores = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ClassificationFailed(format!("Failed to extract output tensor: {}", e)))?;

        let scores: Vec<f32> = scores.iter().cloned().collect();
        if scores.is_empty() {
            return Err(ClassifierError::ClassificationFailed("Model produced no scores".into()));
        }
        Ok(scores)
    }
}
