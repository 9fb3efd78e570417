/// Built-in classification models that can be downloaded into the model cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModel {
    /// MobileNetV2 trained on ImageNet (1000 classes) from the ONNX model zoo.
    MobileNetV2,
}

/// Where to fetch a model from and how to verify it.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub model_url: String,
    pub labels_url: String,
    /// SHA-256 of the model file. Downloads are only checked when present.
    pub model_hash: Option<String>,
    /// SHA-256 of the labels file. Downloads are only checked when present.
    pub labels_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    pub input_size: u32,
    pub num_classes: usize,
    pub model_size_mb: usize,
}

impl BuiltinModel {
    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            BuiltinModel::MobileNetV2 => ModelInfo {
                name: "mobilenetv2".to_string(),
                model_url: "https://github.com/onnx/models/raw/main/validated/vision/classification/mobilenet/model/mobilenetv2-7.onnx".to_string(),
                labels_url: "https://raw.githubusercontent.com/onnx/models/main/validated/vision/classification/synset.txt".to_string(),
                model_hash: None,
                labels_hash: None,
            },
        }
    }

    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            BuiltinModel::MobileNetV2 => ModelCharacteristics {
                input_size: 224,
                num_classes: 1000,
                model_size_mb: 14,
            },
        }
    }
}
