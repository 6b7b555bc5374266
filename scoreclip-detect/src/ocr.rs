
use std::path::Path;

use anyhow::Context;
use ocrs::{OcrEngine, OcrEngineParams};
use opencv::core::{Mat, MatTraitConst, MatTraitConstManual};

/// Anything that can turn an RGB image region into text.
pub trait TextRecognizer {
    /// Extracts text from an RGBu8 ordered mat.
    /// Lines are separated by newlines.
    fn extract_text(&self, img: &Mat) -> anyhow::Result<String>;
}

/// Paths to the `ocrs` text models.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OcrModels {
    pub detection: std::path::PathBuf,
    pub recognition: std::path::PathBuf,
}

impl Default for OcrModels {
    fn default() -> Self {
        Self {
            detection: "text_models/text-detection.rten".into(),
            recognition: "text_models/text-recognition.rten".into(),
        }
    }
}

pub struct Ocr {
    engine: OcrEngine,
    allowed_chars: Option<String>,
}

impl Ocr {
    pub fn new(models: &OcrModels, allowed_chars: Option<&str>) -> anyhow::Result<Self> {
        let allowed_chars = allowed_chars.map(|s| s.to_string());
        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(load_model(&models.detection)?),
            recognition_model: Some(load_model(&models.recognition)?),
            debug: false,
            decode_method: ocrs::DecodeMethod::Greedy,
            alphabet: None,
            allowed_chars: allowed_chars.clone(),
        })?;
        Ok(Self { engine, allowed_chars })
    }
}

fn load_model(path: &Path) -> anyhow::Result<rten::Model> {
    rten::Model::load_file(path).with_context(|| format!("could not load OCR model {}", path.display()))
}

impl TextRecognizer for Ocr {
    fn extract_text(&self, img: &Mat) -> anyhow::Result<String> {
        if img.empty() {
            return Ok(String::new());
        }
        let size = img.size()?;
        let src = ocrs::ImageSource::from_bytes(
            img.data_bytes()?,
            (size.width as u32, size.height as u32)
        )?;
        let input = self.engine.prepare_input(src)?;
        self.engine.get_text(&input)
    }
}

impl core::fmt::Debug for Ocr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Ocr").field(&self.allowed_chars).finish()
    }
}
